use crate::clock::FixedTimestep;
use crate::director::Director;
use crate::grid::SpatialHashGrid;
use crate::movement::{footprint_blocked, Mover};
use crate::navigator::{AgentNavigator, NavEvent, SteeringParams};
use crate::pathfinder::{FlowFieldPathfinder, FlowMode, SliceBudget, StepStatus};
use crate::tile_grid::{Cell, TileGrid, TileSource};
use crate::world_state::WorldState;
use anyhow::Result;
use log::{debug, info, trace, warn};
use pursuit_common::{GameConfig, NavParams, Snapshot, Vec2};
use rand::prelude::*;

/// Runs one chase: a player, the crowd hunting or fleeing it, and the flow field between them.
pub struct Simulation {
    /// The configuration this run was built from.
    pub config: GameConfig,
    /// Agents and player.
    pub state: WorldState,
    tiles: TileGrid,
    pathfinder: FlowFieldPathfinder,
    hash: SpatialHashGrid,
    navigator: AgentNavigator,
    director: Director,
    clock: FixedTimestep,
    /// Drives spawn fallbacks; seeded per run.
    pub rng: StdRng,
    /// Requested player direction, applied every tick until changed.
    player_intent: Vec2,
    /// Mode the most recent field request was made for.
    field_mode: Option<FlowMode>,
    kills: u32,
    hits: u32,
    mode_flips: u32,
    cap_reported: bool,
    current_tick: u64,
    recorded_snapshots: Vec<Snapshot>,
}

impl Simulation {
    /// Builds a run over `tiles`. Fails when the player would start inside a wall.
    pub fn new(config: GameConfig, tiles: TileGrid, seed: u64) -> Result<Self> {
        let params = config.nav_params();
        if tiles.width() != params.grid_width || tiles.height() != params.grid_height {
            anyhow::bail!(
                "Level is {}x{} but the configuration expects {}x{}.",
                tiles.width(),
                tiles.height(),
                params.grid_width,
                params.grid_height
            );
        }
        if footprint_blocked(&tiles, params.player_start, params.half_player_size()) {
            anyhow::bail!(
                "Player start ({:.2}, {:.2}) overlaps a wall.",
                params.player_start.x,
                params.player_start.y
            );
        }

        let spawn_points = config
            .agents
            .spawn_points
            .iter()
            .map(|&[x, y]| Vec2::new(x, y))
            .collect();

        let pathfinder = FlowFieldPathfinder::new(&tiles, SliceBudget::Time(params.slice_budget));
        let hash = SpatialHashGrid::new(params.hash_cell_size);
        let navigator = AgentNavigator::new(SteeringParams::from(&params));
        let director = Director::new(&params, spawn_points);
        let clock = FixedTimestep::new(params.dt, params.max_frame_time);
        let state = WorldState::new(params);

        info!(
            "Simulation ready: {}x{} tiles, max {} agents, seed {}.",
            tiles.width(),
            tiles.height(),
            state.params.max_agents,
            seed
        );

        Ok(Self {
            config,
            state,
            tiles,
            pathfinder,
            hash,
            navigator,
            director,
            clock,
            rng: StdRng::seed_from_u64(seed),
            player_intent: Vec2::ZERO,
            field_mode: None,
            kills: 0,
            hits: 0,
            mode_flips: 0,
            cap_reported: false,
            current_tick: 0,
            recorded_snapshots: Vec::new(),
        })
    }

    /// Sets the direction the player walks in. Normalized here; zero stands still.
    pub fn set_player_intent(&mut self, intent: Vec2) {
        self.player_intent = intent.normalize_or_zero();
    }

    /// Replaces the per-tick pathfinder budget, e.g. to make runs independent of host speed.
    pub fn set_slice_budget(&mut self, budget: SliceBudget) {
        self.pathfinder.set_budget(budget);
    }

    /// Feeds one frame of wall-clock time and runs the fixed ticks it pays for.
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        let ticks = self.clock.advance(frame_dt);
        for _ in 0..ticks {
            self.step();
        }
        ticks
    }

    /// Advances the chase by one fixed timestep.
    pub fn step(&mut self) {
        let dt = self.state.params.dt;

        // --- 1. Spawning and mode cycle ---
        let decisions = self.director.update(dt);
        if decisions.mode_flipped {
            self.mode_flips += 1;
            info!(
                "Mode switched to {:?} at tick {} ({} agents live).",
                self.director.mode(),
                self.current_tick,
                self.state.live_agent_count()
            );
        }
        if decisions.spawn_due {
            if self.state.is_full() {
                if !self.cap_reported {
                    warn!("Agent cap of {} reached; further spawns skipped.", self.state.params.max_agents);
                    self.cap_reported = true;
                }
            } else {
                let half = self.state.params.half_agent_size();
                if let Some(pos) = self.director.pick_spawn(&self.tiles, half, &mut self.rng) {
                    self.state.add_agent(pos);
                    debug!("Spawned agent at ({:.2}, {:.2}).", pos.x, pos.y);
                }
            }
        }

        // --- 2. Player movement ---
        let player_delta = self.player_intent * (self.state.params.player_speed * dt);
        self.state.player.move_and_collide(&self.tiles, player_delta);

        // --- 3. Field requests on a new player tile or a new mode ---
        let mode = self.director.mode();
        let cell = self.tiles.cell_at(self.state.player.pos);
        if self.state.player.last_cell != Some(cell) || self.field_mode != Some(mode) {
            self.request_field(cell, mode);
        }

        // --- 4. One pathfinder slice ---
        if self.pathfinder.step() == StepStatus::InProgress {
            trace!("Flow field search still running at tick {}.", self.current_tick);
        }

        // --- 5. Spatial hash ---
        self.hash.rebuild(&mut self.state.agents);

        // --- 6. Steering and movement ---
        let events = self.navigator.update(
            &self.tiles,
            &self.pathfinder,
            &self.hash,
            &mut self.state.agents,
            self.state.player.pos,
            mode,
            dt,
        );
        self.apply_events(&events);

        // --- 7. Remove the dead ---
        let pruned = self.state.prune_dead();
        if pruned > 0 {
            debug!("Pruned {} dead agents at tick {}.", pruned, self.current_tick);
        }

        self.current_tick += 1;
    }

    fn request_field(&mut self, cell: Cell, mode: FlowMode) {
        debug!("Recomputing field from {:?} in {:?} mode.", cell, mode);
        self.pathfinder.compute(&self.tiles, &self.state.agents, &[cell], mode);
        self.state.player.last_cell = Some(cell);
        self.field_mode = Some(mode);
    }

    fn apply_events(&mut self, events: &[NavEvent]) {
        for event in events {
            match *event {
                NavEvent::CaughtByTarget { agent } => {
                    if let Some(a) = self.state.agents.get_mut(agent) {
                        if a.alive {
                            a.alive = false;
                            self.kills += 1;
                        }
                    }
                }
                NavEvent::ReachedTarget { .. } => {
                    self.hits += 1;
                }
            }
        }
    }

    /// Live agent positions.
    pub fn get_results(&self) -> Vec<(f32, f32)> {
        self.state.positions()
    }

    pub fn current_agent_count(&self) -> u32 {
        self.state.live_agent_count() as u32
    }

    pub fn params(&self) -> &NavParams {
        &self.state.params
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn tiles(&self) -> &TileGrid {
        &self.tiles
    }

    pub fn pathfinder(&self) -> &FlowFieldPathfinder {
        &self.pathfinder
    }

    pub fn mode(&self) -> FlowMode {
        self.director.mode()
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// Mode switches made by the director so far.
    pub fn mode_flips(&self) -> u32 {
        self.mode_flips
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Simulated seconds elapsed.
    pub fn time(&self) -> f32 {
        self.current_tick as f32 * self.state.params.dt
    }

    /// Fraction of a fixed tick left over from the last [`Self::advance`].
    pub fn interpolation_alpha(&self) -> f32 {
        self.clock.alpha()
    }

    /// Collects the current metrics into a [`Snapshot`].
    pub fn record_snapshot(&mut self) {
        let current_sim_time = self.time();
        debug!("Recording snapshot at {:.2} s...", current_sim_time);

        let positions = if self.config.output.save_positions_in_snapshot {
            Some(self.get_results())
        } else {
            None
        };

        let snapshot = Snapshot {
            time: current_sim_time,
            tick: self.current_tick,
            agent_count: self.current_agent_count(),
            inverted: self.mode().is_inverted(),
            player_position: (self.state.player.pos.x, self.state.player.pos.y),
            kills: self.kills,
            hits: self.hits,
            reachable_cells: self.pathfinder.reachable_cells(),
            field_generation: self.pathfinder.generation(),
            mean_distance_to_player: self.state.mean_distance_to_player(),
            positions,
        };

        info!(
            "t={:.1}s agents={} kills={} hits={} reachable={}",
            snapshot.time, snapshot.agent_count, snapshot.kills, snapshot.hits, snapshot.reachable_cells
        );
        self.recorded_snapshots.push(snapshot);
    }

    pub fn get_recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinder::is_finite;
    use crate::tile_grid::CellState;

    fn config(extra: &str) -> GameConfig {
        let text = format!(
            r#"
            [grid]
            width = 8
            height = 6
            tile_size = 4.0
            layout = "open"

            [timing]
            fixed_dt = 0.0625
            total_time_s = 5.0
            record_interval_s = 1.0

            [output]
            base_filename = "t"
            save_positions = false
            save_stats = false
            save_positions_in_snapshot = true

            {extra}
        "#
        );
        GameConfig::from_toml_str(&text).unwrap()
    }

    fn open_sim(extra: &str) -> Simulation {
        let config = config(extra);
        let tiles = TileGrid::new(config.grid.width, config.grid.height, config.grid.tile_size);
        let mut sim = Simulation::new(config, tiles, 3).unwrap();
        sim.set_slice_budget(SliceBudget::Unbounded);
        sim
    }

    #[test]
    fn first_tick_requests_a_field_at_the_player() {
        let mut sim = open_sim("");
        sim.step();
        let (px, py) = sim.tiles().cell_at(sim.state.player.pos);
        assert_eq!(sim.pathfinder().distance_at(px, py), 0);
        assert_eq!(sim.pathfinder().generation(), 1);
        assert_eq!(sim.state.player.last_cell, Some((px, py)));
    }

    #[test]
    fn initial_burst_spawns_one_agent_per_tick() {
        let mut sim = open_sim("");
        for _ in 0..4 {
            sim.step();
        }
        assert_eq!(sim.state.agent_count(), 4);
    }

    #[test]
    fn spawning_stops_at_the_cap() {
        let mut sim = open_sim("[agents]\nmax_agents = 3");
        for _ in 0..10 {
            sim.step();
        }
        assert!(sim.state.agent_count() <= 3);
    }

    #[test]
    fn player_walks_and_stops_at_walls() {
        let mut sim = open_sim("");
        sim.set_player_intent(Vec2::new(5.0, 0.0));
        for _ in 0..200 {
            sim.step();
        }
        let p = sim.state.player.pos;
        assert!(p.x < 32.0 - sim.state.player.half_size);
        assert!(p.x > 28.0);
        assert_eq!(p.y, 12.0);
    }

    #[test]
    fn flee_captures_become_kills() {
        let mut sim = open_sim("[mode]\nstart_inverted = true");
        sim.state.add_agent(sim.state.player.pos + Vec2::new(0.1, 0.0));
        sim.step();
        assert_eq!(sim.kills(), 1);
        assert_eq!(sim.hits(), 0);
        // the captured agent is pruned, the burst spawn survives
        assert!(sim.state.agents.iter().all(|a| a.alive));
    }

    #[test]
    fn pursuit_captures_count_hits() {
        let mut sim = open_sim("[agents]\ninitial_spawn_timer_s = 100.0");
        sim.state.add_agent(sim.state.player.pos + Vec2::new(0.1, 0.0));
        sim.step();
        assert_eq!(sim.hits(), 1);
        assert_eq!(sim.kills(), 0);
        assert_eq!(sim.state.agent_count(), 1);
    }

    #[test]
    fn mode_flip_triggers_recompute() {
        let mut sim = open_sim("[mode]\nflip_interval_s = 0.25");
        for _ in 0..3 {
            sim.step();
        }
        let before = sim.pathfinder().generation();
        assert_eq!(sim.mode(), FlowMode::Pursue);
        assert_eq!(sim.mode_flips(), 0);
        for _ in 0..2 {
            sim.step();
        }
        assert_eq!(sim.mode(), FlowMode::Flee);
        assert_eq!(sim.mode_flips(), 1);
        assert!(sim.pathfinder().generation() > before);
        assert_eq!(sim.pathfinder().mode(), FlowMode::Flee);
    }

    #[test]
    fn single_entry_budget_spreads_the_first_field() {
        let mut sim = open_sim("");
        sim.set_slice_budget(SliceBudget::Entries(1));
        let mut ticks = 0;
        while sim.pathfinder().generation() == 0 {
            sim.step();
            ticks += 1;
            assert!(ticks < 1_000, "field never published");
        }
        // at least one heap entry per open tile, one entry per tick
        assert!(ticks >= 48);
        assert_eq!(sim.pathfinder().reachable_cells(), 48);
    }

    #[test]
    fn advance_runs_whole_ticks() {
        let mut sim = open_sim("");
        assert_eq!(sim.advance(0.2), 3);
        assert_eq!(sim.current_tick(), 3);
        assert!((sim.interpolation_alpha() - 0.2).abs() < 1e-4);
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut sim = open_sim("");
        for _ in 0..4 {
            sim.step();
        }
        sim.record_snapshot();
        let snap = &sim.get_recorded_snapshots()[0];
        assert_eq!(snap.tick, 4);
        assert_eq!(snap.agent_count, 4);
        assert_eq!(snap.reachable_cells, 48);
        assert!(!snap.inverted);
        assert_eq!(snap.positions.as_ref().map(Vec::len), Some(4));
    }

    #[test]
    fn agents_close_in_on_a_still_player() {
        let mut sim = open_sim("[agents]\nspawn_points = [[2.0, 2.0]]\nmax_agents = 1");
        sim.step();
        let start = sim.state.mean_distance_to_player();
        for _ in 0..60 {
            sim.step();
        }
        assert!(sim.state.mean_distance_to_player() < start);
        assert!(sim.state.agents.iter().all(|a| a.pos.x.is_finite() && a.pos.y.is_finite()));
    }

    #[test]
    fn mismatched_level_is_rejected() {
        let config = config("");
        assert!(Simulation::new(config, TileGrid::new(3, 3, 4.0), 0).is_err());
    }

    #[test]
    fn walled_start_is_rejected() {
        let config = config("");
        let mut tiles = TileGrid::new(8, 6, 4.0);
        tiles.set(4, 3, CellState::Wall);
        assert!(Simulation::new(config, tiles, 0).is_err());
    }

    #[test]
    fn field_reaches_every_open_tile() {
        let mut sim = open_sim("");
        sim.step();
        assert!(sim.pathfinder().distance_field().iter().all(|&d| is_finite(d)));
    }
}
