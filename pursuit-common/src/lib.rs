pub mod config;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{GameConfig, GridConfig, LayoutKind, TimingConfig, PathfindingConfig, AgentConfig, PlayerConfig, ModeConfig, RunsConfig, OutputConfig};
pub use sim_params::NavParams;
pub use snapshot::Snapshot;
pub use vecmath::{Vec2, clamp};
