use pursuit_common::{NavParams, Vec2};
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::grid::SpatialHashGrid;
use crate::movement::Mover;
use crate::pathfinder::{FlowFieldPathfinder, FlowMode};
use crate::tile_grid::TileSource;

/// Steering constants for the crowd.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteeringParams {
    pub goal_weight: f32,
    pub gradient_weight: f32,
    pub turning_weight: f32,
    pub max_velocity: f32,
    /// World units per second at unit velocity.
    pub speed: f32,
    /// Fraction of the new steering impulse blended into `accel` each tick; 1.0 disables smoothing.
    pub accel_smoothing: f32,
    pub separation_strength: f32,
    /// Inside this distance a fleeing agent runs at full strength.
    pub flee_radius: f32,
    /// Scale applied to the flee direction outside `flee_radius`.
    pub flee_damping: f32,
    /// Spatial hash cells scanned around an agent for separation.
    pub neighbor_radius_cells: i32,
}

impl Default for SteeringParams {
    fn default() -> Self {
        Self {
            goal_weight: 0.25,
            gradient_weight: 1.0,
            turning_weight: 0.04,
            max_velocity: 0.8,
            speed: 10.0,
            accel_smoothing: 1.0,
            separation_strength: 0.05,
            flee_radius: 8.0,
            flee_damping: 0.5,
            neighbor_radius_cells: 1,
        }
    }
}

impl From<&NavParams> for SteeringParams {
    fn from(params: &NavParams) -> Self {
        Self {
            goal_weight: params.goal_weight,
            gradient_weight: params.gradient_weight,
            turning_weight: params.turning_weight,
            max_velocity: params.max_velocity,
            speed: params.agent_speed,
            accel_smoothing: params.accel_smoothing,
            separation_strength: params.separation_strength,
            flee_radius: params.flee_radius,
            flee_damping: params.flee_damping,
            neighbor_radius_cells: neighbor_radius_cells(params.agent_size, params.hash_cell_size),
        }
    }
}

/// Hash cells to scan so that every neighbour within one agent size is a candidate.
pub fn neighbor_radius_cells(agent_size: f32, hash_cell_size: f32) -> i32 {
    if hash_cell_size <= 0.0 {
        return 1;
    }
    (agent_size / hash_cell_size).ceil().max(1.0) as i32
}

/// Contact between an agent and the target, reported for the caller to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavEvent {
    /// A pursuing agent reached the target.
    ReachedTarget { agent: usize },
    /// A fleeing agent was caught by the target.
    CaughtByTarget { agent: usize },
}

/// Per-tick steering for every agent: field following, goal attraction, separation and
/// wall-sliding movement.
#[derive(Debug, Clone, Default)]
pub struct AgentNavigator {
    params: SteeringParams,
}

impl AgentNavigator {
    pub fn new(params: SteeringParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SteeringParams {
        &self.params
    }

    /// Steers and moves every live agent once, in list order.
    ///
    /// `hash` must have been rebuilt from `agents` this tick. Agents later in the list see the
    /// already-moved positions of earlier ones.
    #[allow(clippy::too_many_arguments)]
    pub fn update<T: TileSource + ?Sized>(
        &self,
        tiles: &T,
        field: &FlowFieldPathfinder,
        hash: &SpatialHashGrid,
        agents: &mut [Agent],
        target: Vec2,
        mode: FlowMode,
        dt: f32,
    ) -> Vec<NavEvent> {
        let mut events = Vec::new();

        for idx in 0..agents.len() {
            if !agents[idx].alive {
                continue;
            }

            let pos = agents[idx].pos;
            let delta = target - pos;
            let dist = delta.length();
            let goal = delta.normalize_or_zero();

            let (cx, cy) = tiles.cell_at(pos);
            let gradient = self.attracting_gradient(field, cx, cy);
            let direction = self.blend(goal, gradient, dist, mode);

            let agent = &agents[idx];
            let impulse = direction * self.params.turning_weight;
            let accel = agent.accel + (impulse - agent.accel) * self.params.accel_smoothing;
            let mut vel = (agent.vel + accel).clamp_length(self.params.max_velocity);

            vel += self.separation(idx, agents, hash);
            vel = vel.clamp_length(self.params.max_velocity);

            let agent = &mut agents[idx];
            agent.accel = accel;
            agent.vel = vel;
            agent.move_and_collide(tiles, vel * (self.params.speed * dt));

            if dist < agent.size() {
                events.push(match mode {
                    FlowMode::Pursue => NavEvent::ReachedTarget { agent: idx },
                    FlowMode::Flee => NavEvent::CaughtByTarget { agent: idx },
                });
            }
        }

        events
    }

    /// Field direction at `(cx, cy)` oriented towards the field's sources.
    ///
    /// A gradient derived for flee mode climbs away from its sources, so it is negated here;
    /// the flee reversal happens afterwards in [`Self::blend`]. The gradient's own mode is
    /// used, since it trails the distance field while a new derivation is in flight.
    fn attracting_gradient(&self, field: &FlowFieldPathfinder, cx: i32, cy: i32) -> Vec2 {
        let g = field.gradient_at(cx, cy);
        if field.gradient_mode().is_inverted() {
            -g
        } else {
            g
        }
    }

    /// Weighted goal + gradient direction, reversed when fleeing.
    pub fn blend(&self, goal: Vec2, gradient: Vec2, dist: f32, mode: FlowMode) -> Vec2 {
        let toward = (goal * self.params.goal_weight + gradient * self.params.gradient_weight).normalize_or_zero();
        match mode {
            FlowMode::Pursue => toward,
            FlowMode::Flee if dist < self.params.flee_radius => -toward,
            FlowMode::Flee => -toward * self.params.flee_damping,
        }
    }

    /// Repulsion from every live neighbour closer than the agent's footprint, scaled by 1/distance.
    fn separation(&self, idx: usize, agents: &[Agent], hash: &SpatialHashGrid) -> Vec2 {
        let me = &agents[idx];
        let size = me.size();
        let mut push = Vec2::ZERO;

        hash.for_each_candidate(me.pos, self.params.neighbor_radius_cells, |other_idx| {
            if other_idx == idx {
                return true;
            }
            let Some(other) = agents.get(other_idx) else {
                return true;
            };
            if !other.alive {
                return true;
            }
            let away = me.pos - other.pos;
            let len = away.length();
            if len < size && len > 1e-6 {
                push += away.normalize_or_zero() * (self.params.separation_strength / len);
            }
            true
        });

        push
    }
}
