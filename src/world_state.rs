use log::{error, info};
use pursuit_common::{NavParams, Vec2};

use crate::agent::{Agent, Player};

/// Mutable state of one chase: the agent crowd and the player it tracks.
#[derive(Debug)]
pub struct WorldState {
    pub params: NavParams,
    pub agents: Vec<Agent>,
    pub player: Player,
    capacity: usize,
}

impl WorldState {
    pub fn new(params: NavParams) -> Self {
        // Reserve a little above the cap so the initial burst never reallocates
        let capacity = ((params.max_agents as f32 * 1.2).ceil() as usize).max(1);
        let player = Player::new(params.player_start, params.half_player_size());
        Self {
            params,
            agents: Vec::with_capacity(capacity),
            player,
            capacity,
        }
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn live_agent_count(&self) -> usize {
        self.agents.iter().filter(|a| a.alive).count()
    }

    pub fn is_full(&self) -> bool {
        self.agents.len() >= self.params.max_agents as usize
    }

    /// Grows the reserved agent storage to hold `required` agents.
    pub fn ensure_capacity(&mut self, required: usize) {
        if required > self.capacity {
            let new_capacity = (required as f32 * 1.2).ceil() as usize;
            info!("Resizing agent storage from {} to {} capacity.", self.capacity, new_capacity);
            self.agents.reserve(new_capacity - self.agents.len());
            self.capacity = new_capacity;
        }
    }

    /// Appends an agent at `pos`. Returns its index, or `None` once `max_agents` is reached.
    pub fn add_agent(&mut self, pos: Vec2) -> Option<usize> {
        if self.is_full() {
            error!(
                "Attempted to add agent beyond the cap! agents: {}, max_agents: {}",
                self.agents.len(),
                self.params.max_agents
            );
            return None;
        }
        self.ensure_capacity(self.agents.len() + 1);
        self.agents.push(Agent::new(pos, self.params.half_agent_size()));
        Some(self.agents.len() - 1)
    }

    /// Removes dead agents, keeping the survivors in their relative order.
    pub fn prune_dead(&mut self) -> usize {
        let before = self.agents.len();
        self.agents.retain(|a| a.alive);
        before - self.agents.len()
    }

    /// Positions of all live agents.
    pub fn positions(&self) -> Vec<(f32, f32)> {
        self.agents
            .iter()
            .filter(|a| a.alive)
            .map(|a| (a.pos.x, a.pos.y))
            .collect()
    }

    /// Mean straight-line distance from live agents to the player, 0 with no agents.
    pub fn mean_distance_to_player(&self) -> f32 {
        let (sum, n) = self
            .agents
            .iter()
            .filter(|a| a.alive)
            .fold((0.0f32, 0usize), |(sum, n), a| (sum + a.pos.distance(self.player.pos), n + 1));
        if n > 0 { sum / n as f32 } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pursuit_common::GameConfig;

    fn params(max_agents: u32) -> NavParams {
        let text = format!(
            r#"
            [grid]
            width = 10
            height = 10

            [timing]
            total_time_s = 1.0
            record_interval_s = 1.0

            [agents]
            max_agents = {max_agents}

            [output]
            base_filename = "t"
            save_positions = false
            save_stats = false
        "#
        );
        GameConfig::from_toml_str(&text).unwrap().nav_params()
    }

    #[test]
    fn add_respects_cap() {
        let mut state = WorldState::new(params(2));
        assert_eq!(state.add_agent(Vec2::new(1.0, 1.0)), Some(0));
        assert_eq!(state.add_agent(Vec2::new(2.0, 1.0)), Some(1));
        assert!(state.is_full());
        assert_eq!(state.add_agent(Vec2::new(3.0, 1.0)), None);
        assert_eq!(state.agent_count(), 2);
    }

    #[test]
    fn prune_keeps_order() {
        let mut state = WorldState::new(params(10));
        for x in 0..4 {
            state.add_agent(Vec2::new(x as f32 + 0.5, 0.5));
        }
        state.agents[1].alive = false;
        state.agents[2].alive = false;

        assert_eq!(state.prune_dead(), 2);
        assert_eq!(state.positions(), vec![(0.5, 0.5), (3.5, 0.5)]);
    }

    #[test]
    fn player_starts_centred() {
        let state = WorldState::new(params(1));
        assert_eq!(state.player.pos, Vec2::new(20.0, 20.0));
        assert_eq!(state.player.half_size, 0.5);
    }

    #[test]
    fn mean_distance_ignores_dead() {
        let mut state = WorldState::new(params(10));
        state.player.pos = Vec2::ZERO;
        state.add_agent(Vec2::new(3.0, 4.0));
        state.add_agent(Vec2::new(30.0, 40.0));
        state.agents[1].alive = false;
        assert!((state.mean_distance_to_player() - 5.0).abs() < 1e-5);
    }
}
