use log::{debug, warn};
use pursuit_common::{NavParams, Vec2};
use rand::prelude::*;

use crate::movement::footprint_blocked;
use crate::pathfinder::FlowMode;
use crate::tile_grid::{TileGrid, TileSource};

/// What the director decided during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectorTick {
    pub spawn_due: bool,
    pub mode_flipped: bool,
}

/// Spawn cadence and the pursuit/flee cycle.
#[derive(Debug, Clone)]
pub struct Director {
    spawn_timer: f32,
    spawn_delay: f32,
    mode_timer: f32,
    flip_interval: f32,
    mode: FlowMode,
    spawn_points: Vec<Vec2>,
    next_point: usize,
}

impl Director {
    pub fn new(params: &NavParams, spawn_points: Vec<Vec2>) -> Self {
        Self {
            spawn_timer: params.initial_spawn_timer,
            spawn_delay: params.spawn_delay,
            mode_timer: params.flip_interval,
            flip_interval: params.flip_interval,
            mode: if params.start_inverted { FlowMode::Flee } else { FlowMode::Pursue },
            spawn_points,
            next_point: 0,
        }
    }

    pub fn mode(&self) -> FlowMode {
        self.mode
    }

    /// Advances both timers by `dt`. At most one spawn is due per tick, so a negative
    /// starting timer plays out as a burst over the first ticks.
    pub fn update(&mut self, dt: f32) -> DirectorTick {
        let mut tick = DirectorTick::default();

        self.spawn_timer -= dt;
        if self.spawn_timer < 0.0 {
            self.spawn_timer += self.spawn_delay;
            tick.spawn_due = true;
        }

        self.mode_timer -= dt;
        if self.mode_timer < 0.0 {
            self.mode_timer += self.flip_interval;
            self.mode = self.mode.toggled();
            tick.mode_flipped = true;
            debug!("Mode flipped to {:?}.", self.mode);
        }

        tick
    }

    /// Next spawn position: configured points in rotation, skipping blocked ones, then a
    /// random empty tile centre. `None` when the grid has no empty tile at all.
    pub fn pick_spawn<R: Rng + ?Sized>(&mut self, tiles: &TileGrid, half_size: f32, rng: &mut R) -> Option<Vec2> {
        for _ in 0..self.spawn_points.len() {
            let candidate = self.spawn_points[self.next_point % self.spawn_points.len()];
            self.next_point = (self.next_point + 1) % self.spawn_points.len();
            if !footprint_blocked(tiles, candidate, half_size) {
                return Some(candidate);
            }
        }

        let empty: Vec<_> = tiles.empty_cells().collect();
        match empty.choose(rng) {
            Some(&cell) => Some(tiles.cell_center(cell)),
            None => {
                warn!("No empty tile available for spawning.");
                None
            }
        }
    }
}
