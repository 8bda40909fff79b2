use log::trace;
use pursuit_common::Vec2;

use crate::agent::Agent;

/// Hashes an integer cell coordinate into `0..table_size`.
///
/// Distinct cells may share a bucket; queries scan buckets and leave exact distance checks to
/// the caller.
#[inline(always)]
pub fn hash_cell(cx: i32, cy: i32, table_size: usize) -> usize {
    if table_size == 0 {
        return 0;
    }
    let h = cx.wrapping_mul(92_837_111) ^ cy.wrapping_mul(689_287_499);
    h.unsigned_abs() as usize % table_size
}

/// Bucket-sorted agent index rebuilt from scratch every tick.
///
/// The table has one bucket per agent. `counts[h]..counts[h + 1]` delimits the slice of
/// `buckets` holding the agent indices filed under hash `h`, so a lookup is two reads and a
/// contiguous scan.
#[derive(Debug, Clone)]
pub struct SpatialHashGrid {
    cell_size: f32,
    inv_cell_size: f32,
    // Prefix-summed bucket boundaries, len = agent count + 1
    counts: Vec<u32>,
    // Agent indices grouped by bucket, len = agent count
    buckets: Vec<u32>,
}

impl SpatialHashGrid {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size > 1e-9 { cell_size } else { 1.0 };
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            counts: vec![0],
            buckets: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of agents indexed by the last rebuild.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    #[inline(always)]
    pub fn cell_of(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x * self.inv_cell_size).floor() as i32,
            (pos.y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Counting-sort build over the current agent list. Also caches each agent's bucket id.
    pub fn rebuild(&mut self, agents: &mut [Agent]) {
        let n = agents.len();

        // Phase 1: reset tables sized to the live population.
        self.counts.clear();
        self.counts.resize(n + 1, 0);
        self.buckets.clear();
        self.buckets.resize(n, 0);
        if n == 0 {
            return;
        }

        // Phase 2: hash every agent and count per bucket.
        for agent in agents.iter_mut() {
            let (cx, cy) = self.cell_of(agent.pos);
            let h = hash_cell(cx, cy, n);
            agent.bucket = Some(h as u32);
            self.counts[h] += 1;
        }

        // Phase 3: prefix sum, counts[h] becomes the end of bucket h.
        for i in 1..=n {
            self.counts[i] += self.counts[i - 1];
        }

        // Phase 4: scatter, decrementing each counter down to its bucket start.
        for (idx, agent) in agents.iter().enumerate() {
            let h = agent.bucket.unwrap_or(0) as usize;
            self.counts[h] -= 1;
            self.buckets[self.counts[h] as usize] = idx as u32;
        }

        trace!("Spatial hash rebuilt with {} agents.", n);
    }

    /// Agent indices filed under bucket `h`.
    pub fn bucket(&self, h: usize) -> &[u32] {
        if h + 1 >= self.counts.len() {
            return &[];
        }
        let start = self.counts[h] as usize;
        let end = (self.counts[h + 1] as usize).min(self.buckets.len());
        &self.buckets[start.min(end)..end]
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn buckets(&self) -> &[u32] {
        &self.buckets
    }

    /// Calls `f` for every agent index in the `(2r+1)^2` block of cells around `pos`.
    ///
    /// Candidates are a superset of the true neighbours; each agent is reported at most once
    /// even when several scanned cells collide into the same bucket. Stops early when `f`
    /// returns `false`.
    pub fn for_each_candidate<F>(&self, pos: Vec2, radius_cells: i32, mut f: F)
    where
        F: FnMut(usize) -> bool,
    {
        let n = self.buckets.len();
        if n == 0 {
            return;
        }

        let (cx, cy) = self.cell_of(pos);
        let r = radius_cells.max(0);
        let mut visited: Vec<usize> = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);

        for dy in -r..=r {
            for dx in -r..=r {
                let h = hash_cell(cx.wrapping_add(dx), cy.wrapping_add(dy), n);
                if visited.contains(&h) {
                    continue;
                }
                visited.push(h);

                for &agent_idx in self.bucket(h) {
                    if !f(agent_idx as usize) {
                        return;
                    }
                }
            }
        }
    }

    /// Collects the candidates of [`Self::for_each_candidate`].
    pub fn query(&self, pos: Vec2, radius_cells: i32) -> Vec<usize> {
        let mut out = Vec::new();
        self.for_each_candidate(pos, radius_cells, |idx| {
            out.push(idx);
            true
        });
        out
    }
}
