use serde::{Serialize, Deserialize};

/// A snapshot of the chase state and metrics at a specific time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulation time in seconds.
    pub time: f32,
    /// Fixed ticks executed so far.
    pub tick: u64,
    /// Live agents at the moment of recording.
    pub agent_count: u32,
    /// True while agents flee the player instead of chasing it.
    pub inverted: bool,
    pub player_position: (f32, f32),
    /// Agents caught by the player during flee phases (cumulative).
    pub kills: u32,
    /// Agents that reached the player during pursuit phases (cumulative).
    pub hits: u32,
    /// Cells with a finite distance in the published field.
    pub reachable_cells: u32,
    /// Number of distance fields published so far.
    pub field_generation: u64,
    /// Mean straight-line distance from the live agents to the player.
    pub mean_distance_to_player: f32,
    #[serde(skip_serializing_if = "Option::is_none")] // Don't write "positions": null
    pub positions: Option<Vec<(f32, f32)>>,
}
