use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::NavParams;
use crate::vecmath::Vec2;
use std::path::Path;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    Open,
    Random,
    Rows,
}

// Tile grid dimensions and how the harness builds the level
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_tile_size")]
    pub tile_size: f32,
    #[serde(default = "default_layout")]
    pub layout: LayoutKind,
    #[serde(default = "default_wall_probability")]
    pub wall_probability: f32,
    #[serde(default)]
    pub seed: u64,
    /// Literal rows for `layout = "rows"`; `#` is a wall, anything else is empty.
    #[serde(default)]
    pub rows: Vec<String>,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_fixed_dt")]
    pub fixed_dt: f32,
    #[serde(default = "default_max_frame_time")]
    pub max_frame_time: f32,
    #[serde(default = "default_frame_dt")]
    pub frame_dt: f32,
    pub total_time_s: f32,
    pub record_interval_s: f32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PathfindingConfig {
    /// Wall-clock budget for a single pathfinder slice, in milliseconds.
    #[serde(default = "default_slice_budget_ms")]
    pub slice_budget_ms: f32,
    /// Spatial hash cell size; falls back to the agent footprint.
    #[serde(default)]
    pub hash_cell_size: Option<f32>,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        PathfindingConfig {
            slice_budget_ms: default_slice_budget_ms(),
            hash_cell_size: None,
        }
    }
}

// Steering, separation and spawning parameters for the agent crowd
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_body_size")]
    pub size: f32,
    #[serde(default = "default_agent_speed")]
    pub speed: f32,
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f32,
    #[serde(default = "default_turning_weight")]
    pub turning_weight: f32,
    #[serde(default = "default_goal_weight")]
    pub goal_weight: f32,
    #[serde(default = "default_gradient_weight")]
    pub gradient_weight: f32,
    #[serde(default = "default_accel_smoothing")]
    pub accel_smoothing: f32,
    #[serde(default = "default_separation_strength")]
    pub separation_strength: f32,
    #[serde(default = "default_flee_radius")]
    pub flee_radius: f32,
    #[serde(default = "default_flee_damping")]
    pub flee_damping: f32,
    #[serde(default = "default_spawn_delay")]
    pub spawn_delay_s: f32,
    #[serde(default = "default_initial_spawn_timer")]
    pub initial_spawn_timer_s: f32,
    #[serde(default = "default_max_agents")]
    pub max_agents: u32,
    #[serde(default = "default_spawn_points")]
    pub spawn_points: Vec<[f32; 2]>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            size: default_body_size(),
            speed: default_agent_speed(),
            max_velocity: default_max_velocity(),
            turning_weight: default_turning_weight(),
            goal_weight: default_goal_weight(),
            gradient_weight: default_gradient_weight(),
            accel_smoothing: default_accel_smoothing(),
            separation_strength: default_separation_strength(),
            flee_radius: default_flee_radius(),
            flee_damping: default_flee_damping(),
            spawn_delay_s: default_spawn_delay(),
            initial_spawn_timer_s: default_initial_spawn_timer(),
            max_agents: default_max_agents(),
            spawn_points: default_spawn_points(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PlayerConfig {
    #[serde(default = "default_player_speed")]
    pub speed: f32,
    #[serde(default = "default_body_size")]
    pub size: f32,
    /// World-space start; the centre of the world when absent.
    #[serde(default)]
    pub start: Option<[f32; 2]>,
    /// How long the scripted runner player keeps a heading before re-rolling it.
    #[serde(default = "default_persistence")]
    pub persistence_s: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            speed: default_player_speed(),
            size: default_body_size(),
            start: None,
            persistence_s: default_persistence(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModeConfig {
    #[serde(default = "default_flip_interval")]
    pub flip_interval_s: f32,
    #[serde(default)]
    pub start_inverted: bool,
}

impl Default for ModeConfig {
    fn default() -> Self {
        ModeConfig {
            flip_interval_s: default_flip_interval(),
            start_inverted: false,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunsConfig {
    #[serde(default = "default_run_count")]
    pub count: u32,
    #[serde(default)]
    pub base_seed: u64,
}

impl Default for RunsConfig {
    fn default() -> Self {
        RunsConfig { count: default_run_count(), base_seed: 0 }
    }
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_positions: bool,
    pub save_stats: bool,
    #[serde(default)]
    pub save_positions_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

// Main configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GameConfig {
    pub grid: GridConfig,
    pub timing: TimingConfig,
    #[serde(default)]
    pub pathfinding: PathfindingConfig,
    #[serde(default)]
    pub agents: AgentConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub mode: ModeConfig,
    #[serde(default)]
    pub runs: RunsConfig,
    pub output: OutputConfig,
}

impl GameConfig {
    /// Loads the configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: GameConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid.width == 0 || self.grid.height == 0 {
            anyhow::bail!("grid width and height must be greater than 0.");
        }
        if self.grid.tile_size <= 0.0 {
            anyhow::bail!("tile_size must be positive.");
        }
        if !(0.0..=1.0).contains(&self.grid.wall_probability) {
            anyhow::bail!("wall_probability must lie in [0, 1].");
        }
        if self.timing.fixed_dt <= 0.0 {
            anyhow::bail!("fixed_dt must be positive.");
        }
        if self.timing.max_frame_time < self.timing.fixed_dt {
            anyhow::bail!("max_frame_time must be at least fixed_dt.");
        }
        if self.pathfinding.slice_budget_ms <= 0.0 {
            anyhow::bail!("slice_budget_ms must be positive.");
        }
        if let Some(size) = self.pathfinding.hash_cell_size {
            if size <= 0.0 {
                anyhow::bail!("hash_cell_size must be positive.");
            }
        }
        if self.agents.size <= 0.0 || self.player.size <= 0.0 {
            anyhow::bail!("agent and player sizes must be positive.");
        }
        if self.agents.size >= self.grid.tile_size || self.player.size >= self.grid.tile_size {
            anyhow::bail!("body sizes must be smaller than tile_size.");
        }
        if self.agents.spawn_delay_s <= 0.0 {
            anyhow::bail!("spawn_delay_s must be positive.");
        }
        if self.mode.flip_interval_s <= 0.0 {
            anyhow::bail!("flip_interval_s must be positive.");
        }
        Ok(())
    }

    /// Converts the configuration into parameters used at runtime.
    pub fn nav_params(&self) -> NavParams {
        let tile_size = self.grid.tile_size;
        let world_width = self.grid.width as f32 * tile_size;
        let world_height = self.grid.height as f32 * tile_size;

        let player_start = self
            .player
            .start
            .map(|[x, y]| Vec2::new(x, y))
            .unwrap_or_else(|| Vec2::new(world_width / 2.0, world_height / 2.0));

        NavParams {
            grid_width: self.grid.width,
            grid_height: self.grid.height,
            tile_size,
            world_width,
            world_height,
            dt: self.timing.fixed_dt,
            max_frame_time: self.timing.max_frame_time,
            slice_budget: Duration::from_micros((self.pathfinding.slice_budget_ms * 1000.0).round() as u64),
            hash_cell_size: self.pathfinding.hash_cell_size.unwrap_or(self.agents.size),
            agent_size: self.agents.size,
            agent_speed: self.agents.speed,
            max_velocity: self.agents.max_velocity,
            turning_weight: self.agents.turning_weight,
            goal_weight: self.agents.goal_weight,
            gradient_weight: self.agents.gradient_weight,
            accel_smoothing: clamp_unit(self.agents.accel_smoothing),
            separation_strength: self.agents.separation_strength,
            flee_radius: self.agents.flee_radius,
            flee_damping: self.agents.flee_damping,
            spawn_delay: self.agents.spawn_delay_s,
            initial_spawn_timer: self.agents.initial_spawn_timer_s,
            max_agents: self.agents.max_agents,
            player_size: self.player.size,
            player_speed: self.player.speed,
            player_start,
            flip_interval: self.mode.flip_interval_s,
            start_inverted: self.mode.start_inverted,
        }
    }
}

fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

fn default_tile_size() -> f32 {
    4.0
}

fn default_layout() -> LayoutKind {
    LayoutKind::Random
}

fn default_wall_probability() -> f32 {
    0.2
}

fn default_fixed_dt() -> f32 {
    1.0 / 60.0
}

fn default_max_frame_time() -> f32 {
    0.25
}

fn default_frame_dt() -> f32 {
    1.0 / 60.0
}

fn default_slice_budget_ms() -> f32 {
    100.0
}

fn default_body_size() -> f32 {
    1.0
}

fn default_agent_speed() -> f32 {
    10.0
}

fn default_max_velocity() -> f32 {
    0.8
}

fn default_turning_weight() -> f32 {
    0.04
}

fn default_goal_weight() -> f32 {
    0.25
}

fn default_gradient_weight() -> f32 {
    1.0
}

fn default_accel_smoothing() -> f32 {
    1.0 // 1.0 applies the steering impulse immediately
}

fn default_separation_strength() -> f32 {
    0.05
}

fn default_flee_radius() -> f32 {
    8.0
}

fn default_flee_damping() -> f32 {
    0.5
}

fn default_spawn_delay() -> f32 {
    0.5
}

fn default_initial_spawn_timer() -> f32 {
    -5.0
}

fn default_max_agents() -> u32 {
    500
}

fn default_spawn_points() -> Vec<[f32; 2]> {
    vec![[2.0, 2.0]]
}

fn default_player_speed() -> f32 {
    15.0
}

fn default_persistence() -> f32 {
    1.5
}

fn default_flip_interval() -> f32 {
    10.0
}

fn default_run_count() -> u32 {
    1
}
