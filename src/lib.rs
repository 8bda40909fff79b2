//! Crowd navigation for a top-down pursuit game: a time-sliced flow-field pathfinder, a
//! counting-sort spatial hash and per-agent steering over a wall/empty tile grid.

pub mod agent;
pub mod clock;
pub mod director;
pub mod grid;
pub mod level;
pub mod movement;
pub mod navigator;
pub mod pathfinder;
pub mod simulation;
pub mod tile_grid;
pub mod world_state;

pub use agent::{Agent, Player};
pub use grid::SpatialHashGrid;
pub use navigator::{AgentNavigator, NavEvent, SteeringParams};
pub use pathfinder::{FlowFieldPathfinder, FlowMode, SliceBudget, StepStatus, UNVISITED, WALL};
pub use simulation::Simulation;
pub use tile_grid::{Cell, CellState, TileGrid, TileSource};
