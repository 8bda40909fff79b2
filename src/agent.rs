use pursuit_common::Vec2;
use serde::{Deserialize, Serialize};

use crate::tile_grid::Cell;

/// One member of the chasing crowd.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Low-pass filtered steering impulse; equals the raw impulse when smoothing is off.
    pub accel: Vec2,
    pub alive: bool,
    /// Bucket this agent was filed under by the last spatial hash rebuild.
    pub bucket: Option<u32>,
    /// Half the side of the square footprint.
    pub half_size: f32,
}

impl Agent {
    pub fn new(pos: Vec2, half_size: f32) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
            accel: Vec2::ZERO,
            alive: true,
            bucket: None,
            half_size,
        }
    }

    pub fn size(&self) -> f32 {
        self.half_size * 2.0
    }
}

/// The tracked target the crowd converges on or flees from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub pos: Vec2,
    pub half_size: f32,
    /// Tile the last field computation was rooted at.
    pub last_cell: Option<Cell>,
}

impl Player {
    pub fn new(pos: Vec2, half_size: f32) -> Self {
        Self { pos, half_size, last_cell: None }
    }
}
