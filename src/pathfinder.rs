use log::{debug, trace, warn};
use pursuit_common::Vec2;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use crate::agent::Agent;
use crate::tile_grid::{Cell, CellState, TileSource};

/// Accumulated path cost of a cell.
pub type Distance = u32;

/// Never reached by the search.
pub const UNVISITED: Distance = u32::MAX;
/// Wall tile; every wall holds this from the moment a computation starts.
pub const WALL: Distance = u32::MAX - 1;

const NEIGHBORS: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// True for real path costs, false for either sentinel.
#[inline(always)]
pub fn is_finite(d: Distance) -> bool {
    d < WALL
}

/// Whether agents descend the field towards its sources or climb it away from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowMode {
    #[default]
    Pursue,
    Flee,
}

impl FlowMode {
    pub fn is_inverted(self) -> bool {
        self == FlowMode::Flee
    }

    pub fn toggled(self) -> Self {
        match self {
            FlowMode::Pursue => FlowMode::Flee,
            FlowMode::Flee => FlowMode::Pursue,
        }
    }
}

/// Result of one [`FlowFieldPathfinder::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// A distance search is still pending.
    InProgress,
    /// No search is pending; the published distance field is current.
    Completed,
}

/// How much work a single slice may do before suspending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceBudget {
    /// Wall-clock time since the slice began.
    Time(Duration),
    /// Number of queue pops (search) or cells (gradient); 0 behaves like 1.
    Entries(usize),
    Unbounded,
}

impl Default for SliceBudget {
    fn default() -> Self {
        SliceBudget::Time(Duration::from_millis(100))
    }
}

/// Tracks the budget of the slice currently running.
struct SliceClock {
    budget: SliceBudget,
    started: Instant,
    spent: usize,
}

impl SliceClock {
    fn start(budget: SliceBudget) -> Self {
        Self { budget, started: Instant::now(), spent: 0 }
    }

    /// Records one unit of work and reports whether the slice must suspend.
    #[inline(always)]
    fn tick(&mut self) -> bool {
        self.spent += 1;
        self.exhausted()
    }

    fn exhausted(&self) -> bool {
        match self.budget {
            SliceBudget::Time(limit) => self.started.elapsed() >= limit,
            SliceBudget::Entries(limit) => self.spent >= limit.max(1),
            SliceBudget::Unbounded => false,
        }
    }
}

/// Agents per cell, snapshotted once when a computation starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CrowdCostField {
    costs: Vec<u32>,
}

impl CrowdCostField {
    /// Counts live agents per tile. Agents outside the grid add nothing.
    pub fn snapshot<T: TileSource + ?Sized>(tiles: &T, agents: &[Agent]) -> Self {
        let width = tiles.width() as usize;
        let mut costs = vec![0u32; width * tiles.height() as usize];
        for agent in agents.iter().filter(|a| a.alive) {
            let (x, y) = tiles.cell_at(agent.pos);
            if tiles.in_bounds(x, y) {
                costs[y as usize * width + x as usize] += 1;
            }
        }
        Self { costs }
    }

    #[inline(always)]
    pub fn at(&self, idx: usize) -> u32 {
        self.costs.get(idx).copied().unwrap_or(0)
    }

    pub fn occupied_cells(&self) -> usize {
        self.costs.iter().filter(|&&c| c > 0).count()
    }
}

/// A suspended multi-source Dijkstra.
struct Search {
    // (cost, insertion order, cell); the sequence number makes equal costs pop FIFO.
    queue: BinaryHeap<Reverse<(Distance, u64, u32)>>,
    field: Vec<Distance>,
    crowd: CrowdCostField,
    next_seq: u64,
    mode: FlowMode,
    expanded: usize,
    slices: u32,
    started: Instant,
}

impl Search {
    /// Pops until the queue drains or the slice runs out. Returns true once drained.
    fn run(&mut self, width: usize, height: usize, clock: &mut SliceClock) -> bool {
        while let Some(Reverse((dist, _, idx))) = self.queue.pop() {
            let idx = idx as usize;
            if self.field[idx] == UNVISITED {
                self.field[idx] = dist;
                let step_cost = 1 + self.crowd.at(idx);
                let next = dist.saturating_add(step_cost).min(WALL - 1);
                let x = (idx % width) as i32;
                let y = (idx / width) as i32;

                for (dx, dy) in NEIGHBORS {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                        continue;
                    }
                    let n_idx = ny as usize * width + nx as usize;
                    // Walls were seeded up front and settled cells are final.
                    if self.field[n_idx] == UNVISITED {
                        self.queue.push(Reverse((next, self.next_seq, n_idx as u32)));
                        self.next_seq += 1;
                    }
                }
            }

            self.expanded += 1;
            if clock.tick() {
                return self.queue.is_empty();
            }
        }
        true
    }
}

/// Gradient derivation over a published distance field.
struct Derive {
    mode: FlowMode,
    cursor: usize,
    gradient: Vec<Vec2>,
}

impl Derive {
    /// Returns true once every cell has a direction.
    fn run(&mut self, distance: &[Distance], width: usize, height: usize, clock: &mut SliceClock) -> bool {
        while self.cursor < self.gradient.len() {
            let idx = self.cursor;
            self.gradient[idx] = cell_gradient(distance, width, height, idx, self.mode);
            self.cursor += 1;
            if clock.tick() {
                break;
            }
        }
        self.cursor >= self.gradient.len()
    }
}

/// Normalized sum of unit offsets towards every improving 4-neighbour.
fn cell_gradient(distance: &[Distance], width: usize, height: usize, idx: usize, mode: FlowMode) -> Vec2 {
    let d = distance[idx];
    if !is_finite(d) {
        return Vec2::ZERO;
    }

    let x = (idx % width) as i32;
    let y = (idx / width) as i32;
    let mut v = Vec2::ZERO;

    for (dx, dy) in NEIGHBORS {
        let nx = x + dx;
        let ny = y + dy;
        if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
            continue;
        }
        let nd = distance[ny as usize * width + nx as usize];
        if !is_finite(nd) {
            continue;
        }
        let improves = match mode {
            FlowMode::Pursue => nd < d,
            FlowMode::Flee => nd > d,
        };
        if improves {
            v += Vec2::new(dx as f32, dy as f32);
        }
    }

    v.normalize_or_zero()
}

enum Phase {
    Idle,
    Searching(Box<Search>),
    Deriving(Derive),
}

/// Shared-goal flow field over a tile grid, computed in budgeted slices.
///
/// `compute` (re)starts a search; each `step` advances it by one slice. Readers only ever see
/// the last *published* fields: the distance field is swapped in when a search drains, and
/// the gradient field when its derivation (also sliced) finishes.
pub struct FlowFieldPathfinder {
    width: usize,
    height: usize,
    budget: SliceBudget,
    phase: Phase,
    distance: Vec<Distance>,
    gradient: Vec<Vec2>,
    mode: FlowMode,
    gradient_mode: FlowMode,
    generation: u64,
    gradient_generation: u64,
    reachable: u32,
}

impl FlowFieldPathfinder {
    pub fn new<T: TileSource + ?Sized>(tiles: &T, budget: SliceBudget) -> Self {
        let width = tiles.width() as usize;
        let height = tiles.height() as usize;
        Self {
            width,
            height,
            budget,
            phase: Phase::Idle,
            distance: seeded_field(tiles),
            gradient: vec![Vec2::ZERO; width * height],
            mode: FlowMode::Pursue,
            gradient_mode: FlowMode::Pursue,
            generation: 0,
            gradient_generation: 0,
            reachable: 0,
        }
    }

    pub fn set_budget(&mut self, budget: SliceBudget) {
        self.budget = budget;
    }

    /// Starts a fresh computation rooted at every cell in `sources` at distance 0.
    ///
    /// Any unfinished search or derivation is dropped. Crowd costs are counted from `agents`
    /// here and stay fixed until the next call.
    pub fn compute<T: TileSource + ?Sized>(&mut self, tiles: &T, agents: &[Agent], sources: &[Cell], mode: FlowMode) {
        if !matches!(self.phase, Phase::Idle) {
            debug!("Discarding unfinished flow field computation.");
        }

        let width = tiles.width() as usize;
        let height = tiles.height() as usize;
        if width != self.width || height != self.height {
            warn!(
                "Tile grid resized from {}x{} to {}x{}; resetting published fields.",
                self.width, self.height, width, height
            );
            self.width = width;
            self.height = height;
            self.distance = seeded_field(tiles);
            self.gradient = vec![Vec2::ZERO; width * height];
            self.reachable = 0;
        }

        let crowd = CrowdCostField::snapshot(tiles, agents);
        let mut search = Search {
            queue: BinaryHeap::with_capacity(sources.len().max(16)),
            field: seeded_field(tiles),
            crowd,
            next_seq: 0,
            mode,
            expanded: 0,
            slices: 0,
            started: Instant::now(),
        };

        for &(x, y) in sources {
            if !tiles.in_bounds(x, y) {
                warn!("Flow field source ({}, {}) lies outside the {}x{} grid; ignored.", x, y, width, height);
                continue;
            }
            let idx = y as usize * width + x as usize;
            search.queue.push(Reverse((0, search.next_seq, idx as u32)));
            search.next_seq += 1;
        }

        debug!(
            "Flow field computation started from {} source(s) in {:?} mode ({} crowded cells).",
            search.queue.len(),
            mode,
            search.crowd.occupied_cells()
        );
        self.phase = Phase::Searching(Box::new(search));
    }

    /// Advances the pending work by one slice of the configured budget.
    pub fn step(&mut self) -> StepStatus {
        self.step_with(self.budget)
    }

    /// Advances the pending work by one slice of `budget`.
    pub fn step_with(&mut self, budget: SliceBudget) -> StepStatus {
        let mut clock = SliceClock::start(budget);
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);

        self.phase = match phase {
            Phase::Idle => Phase::Idle,
            Phase::Searching(mut search) => {
                search.slices += 1;
                if !search.run(self.width, self.height, &mut clock) {
                    trace!(
                        "Flow field slice {} suspended: {} expanded, {} queued.",
                        search.slices,
                        search.expanded,
                        search.queue.len()
                    );
                    self.phase = Phase::Searching(search);
                    return StepStatus::InProgress;
                }
                let derive = self.publish_distance(*search);
                if clock.exhausted() {
                    Phase::Deriving(derive)
                } else {
                    self.derive_slice(derive, &mut clock)
                }
            }
            Phase::Deriving(derive) => self.derive_slice(derive, &mut clock),
        };

        StepStatus::Completed
    }

    /// Drives any pending work to the end without a budget.
    pub fn run_to_completion(&mut self) {
        while !self.is_idle() {
            self.step_with(SliceBudget::Unbounded);
        }
    }

    fn publish_distance(&mut self, search: Search) -> Derive {
        let Search { field, mode, expanded, slices, started, .. } = search;
        self.reachable = field.iter().filter(|&&d| is_finite(d)).count() as u32;
        self.distance = field;
        self.mode = mode;
        self.generation += 1;
        debug!(
            "Distance field #{} published: {} reachable cells, {} entries expanded over {} slice(s) in {:.2} ms.",
            self.generation,
            self.reachable,
            expanded,
            slices,
            started.elapsed().as_secs_f64() * 1000.0
        );
        Derive {
            mode,
            cursor: 0,
            gradient: vec![Vec2::ZERO; self.width * self.height],
        }
    }

    fn derive_slice(&mut self, mut derive: Derive, clock: &mut SliceClock) -> Phase {
        if derive.run(&self.distance, self.width, self.height, clock) {
            self.gradient = derive.gradient;
            self.gradient_mode = derive.mode;
            self.gradient_generation = self.generation;
            trace!("Gradient field #{} published.", self.gradient_generation);
            Phase::Idle
        } else {
            Phase::Deriving(derive)
        }
    }

    /// True when neither a search nor a gradient derivation is pending.
    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    /// Published distance of `(x, y)`; cells outside the grid report [`WALL`].
    pub fn distance_at(&self, x: i32, y: i32) -> Distance {
        match self.index(x, y) {
            Some(idx) => self.distance[idx],
            None => WALL,
        }
    }

    /// Published direction of `(x, y)`; zero outside the grid.
    pub fn gradient_at(&self, x: i32, y: i32) -> Vec2 {
        match self.index(x, y) {
            Some(idx) => self.gradient[idx],
            None => Vec2::ZERO,
        }
    }

    pub fn distance_field(&self) -> &[Distance] {
        &self.distance
    }

    pub fn gradient_field(&self) -> &[Vec2] {
        &self.gradient
    }

    /// Mode the published distance field was computed for.
    pub fn mode(&self) -> FlowMode {
        self.mode
    }

    /// Mode the published gradient was derived for. Lags [`Self::mode`] while a new
    /// gradient is still being derived.
    pub fn gradient_mode(&self) -> FlowMode {
        self.gradient_mode
    }

    /// Count of distance fields published so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Distance generation the published gradient was derived from.
    pub fn gradient_generation(&self) -> u64 {
        self.gradient_generation
    }

    pub fn reachable_cells(&self) -> u32 {
        self.reachable
    }

    #[inline(always)]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            None
        } else {
            Some(y as usize * self.width + x as usize)
        }
    }
}

/// All cells [`UNVISITED`] except walls, which start as [`WALL`].
fn seeded_field<T: TileSource + ?Sized>(tiles: &T) -> Vec<Distance> {
    let width = tiles.width() as i32;
    let height = tiles.height() as i32;
    let mut field = Vec::with_capacity((width.max(0) * height.max(0)) as usize);
    for y in 0..height {
        for x in 0..width {
            field.push(match tiles.cell_state(x, y) {
                CellState::Wall => WALL,
                CellState::Empty => UNVISITED,
            });
        }
    }
    field
}
