use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::vecmath::Vec2;

/// Runtime parameters derived from the configuration, read every tick by the navigation core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavParams {
    // World & Grid
    pub grid_width: u32,
    pub grid_height: u32,
    pub tile_size: f32,
    pub world_width: f32,
    pub world_height: f32,

    // Time
    pub dt: f32, // Fixed simulation step (s)
    pub max_frame_time: f32,
    pub slice_budget: Duration,

    // Spatial hash
    pub hash_cell_size: f32,

    // Agent steering
    pub agent_size: f32,
    pub agent_speed: f32,
    pub max_velocity: f32,
    pub turning_weight: f32,
    pub goal_weight: f32,
    pub gradient_weight: f32,
    pub accel_smoothing: f32,
    pub separation_strength: f32,
    pub flee_radius: f32,
    pub flee_damping: f32,

    // Spawning
    pub spawn_delay: f32,
    pub initial_spawn_timer: f32,
    pub max_agents: u32,

    // Player
    pub player_size: f32,
    pub player_speed: f32,
    pub player_start: Vec2,

    // Mode cycling
    pub flip_interval: f32,
    pub start_inverted: bool,
}

impl NavParams {
    pub fn half_agent_size(&self) -> f32 {
        self.agent_size * 0.5
    }

    pub fn half_player_size(&self) -> f32 {
        self.player_size * 0.5
    }
}
