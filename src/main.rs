use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::{debug, error, info, trace, warn};
use pursuit_common::{GameConfig, Snapshot, Vec2};
use pursuit_engine::level::build_tile_grid;
use pursuit_engine::Simulation;
use rand::prelude::*;
use rayon::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

/// Headless runner: plays scripted chases and records their metrics.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config.toml file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `runs.count` from the config
    #[arg(short, long)]
    runs: Option<u32>,

    /// Overrides `output.format` ("json", "bincode", "messagepack")
    #[arg(short, long)]
    format: Option<String>,
}

/// Random-walk stand-in for a human player: holds a heading for a while, then re-rolls it.
struct ScriptedPlayer {
    rng: StdRng,
    heading: Vec2,
    remaining: f32,
    persistence: f32,
}

impl ScriptedPlayer {
    fn new(seed: u64, persistence: f32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            heading: Vec2::ZERO,
            remaining: 0.0,
            persistence: persistence.max(0.0),
        }
    }

    fn intent(&mut self, dt: f32) -> Vec2 {
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.remaining += self.persistence.max(dt);
            // Occasionally stand still so the crowd gets to converge
            self.heading = if self.rng.random_bool(0.1) {
                Vec2::ZERO
            } else {
                let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
                Vec2::new(angle.cos(), angle.sin())
            };
        }
        self.heading
    }
}

struct RunOutput {
    run: u32,
    snapshots: Vec<Snapshot>,
    final_positions: Vec<(f32, f32)>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Starting Pursuit Engine (headless)...");

    // --- Load Configuration ---
    let mut config = GameConfig::load(&args.config)?;
    if let Some(runs) = args.runs {
        config.runs.count = runs;
    }
    if let Some(format) = args.format {
        config.output.format = Some(format);
    }
    debug!("Configuration: {:#?}", config);

    info!("Using {} Rayon threads for {} run(s).", rayon::current_num_threads(), config.runs.count);

    let progress_bar = ProgressBar::new(config.runs.count as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} runs ({percent}%) [{eta}]")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let start_time = Instant::now();
    let results: Vec<Result<RunOutput>> = (0..config.runs.count)
        .into_par_iter()
        .progress_with(progress_bar.clone())
        .map(|run| run_once(&config, run))
        .collect();
    progress_bar.finish_with_message("done");

    let total_duration = start_time.elapsed();
    info!("All runs finished in {:.3} seconds.", total_duration.as_secs_f64());

    // --- Save Recorded Data ---
    let mut failures = 0;
    for result in results {
        match result {
            Ok(output) => save_run(&config, &output)?,
            Err(e) => {
                error!("Run failed: {:#}", e);
                failures += 1;
            }
        }
    }
    if failures > 0 {
        anyhow::bail!("{} of {} run(s) failed.", failures, config.runs.count);
    }

    info!("Pursuit Engine Complete.");
    Ok(())
}

/// Plays one full chase with its own seed and returns what it recorded.
fn run_once(config: &GameConfig, run: u32) -> Result<RunOutput> {
    let seed = config.runs.base_seed.wrapping_add(run as u64);
    let params = config.nav_params();

    let mut keep_clear = vec![params.player_start];
    keep_clear.extend(config.agents.spawn_points.iter().map(|&[x, y]| Vec2::new(x, y)));
    let clear_half = params.half_player_size().max(params.half_agent_size());
    let tiles = build_tile_grid(&config.grid, &keep_clear, clear_half)
        .with_context(|| format!("Failed to build the level for run {}", run))?;

    let mut sim = Simulation::new(config.clone(), tiles, seed)?;
    let mut player = ScriptedPlayer::new(seed ^ 0x9E37_79B9_7F4A_7C15, config.player.persistence_s);

    let frame_dt = config.timing.frame_dt.max(1e-6);
    let total_frames = (config.timing.total_time_s / frame_dt).ceil() as u32;
    let record_interval = config.timing.record_interval_s.max(params.dt);
    if config.timing.record_interval_s < params.dt {
        warn!(
            "Record interval ({:.4} s) is smaller than the fixed step ({:.4} s). Recording every tick.",
            config.timing.record_interval_s, params.dt
        );
    }

    sim.record_snapshot();
    let mut next_record = record_interval;

    for frame in 0..total_frames {
        sim.set_player_intent(player.intent(frame_dt));
        let ticks = sim.advance(frame_dt);
        trace!("Run {} frame {} ran {} tick(s).", run, frame, ticks);

        while sim.time() + 1e-6 >= next_record {
            sim.record_snapshot();
            next_record += record_interval;
        }
    }

    info!(
        "Run {} done: {} ticks, {} agents alive, {} kills, {} hits.",
        run,
        sim.current_tick(),
        sim.current_agent_count(),
        sim.kills(),
        sim.hits()
    );

    Ok(RunOutput {
        run,
        snapshots: sim.get_recorded_snapshots().to_vec(),
        final_positions: sim.get_results(),
    })
}

fn run_stem(config: &GameConfig, run: u32) -> String {
    if config.runs.count > 1 {
        format!("{}_run{}", config.output.base_filename, run)
    } else {
        config.output.base_filename.clone()
    }
}

fn save_run(config: &GameConfig, output: &RunOutput) -> Result<()> {
    let stem = run_stem(config, output.run);

    if config.output.save_stats {
        let output_format = config.output.format.as_deref().unwrap_or("json");
        match output_format {
            "json" => write_json(&stem, &output.snapshots),
            "bincode" => {
                let filename = format!("{}_snapshots.bin", stem);
                match File::create(&filename) {
                    Ok(file) => match bincode::serialize_into(file, &output.snapshots) {
                        Ok(_) => info!("Snapshots saved to {} (binary format)", filename),
                        Err(e) => error!("Error serializing snapshots to bincode: {}", e),
                    },
                    Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
                }
            }
            "messagepack" => {
                let filename = format!("{}_snapshots.msgpack", stem);
                match &mut File::create(&filename) {
                    Ok(file) => match rmp_serde::encode::write(file, &output.snapshots) {
                        Ok(_) => info!("Snapshots saved to {} (MessagePack format)", filename),
                        Err(e) => error!("Error serializing snapshots to MessagePack: {}", e),
                    },
                    Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
                }
            }
            _ => {
                error!("Unknown output format: {}. Using JSON instead.", output_format);
                write_json(&stem, &output.snapshots);
            }
        }
    } else {
        debug!("Skipping snapshots for run {} (save_stats is false).", output.run);
    }

    if config.output.save_positions {
        let filename = format!("{}_final_positions.csv", stem);
        let mut writer = csv::Writer::from_path(&filename)
            .with_context(|| format!("Error creating CSV file '{}'", filename))?;
        writer.write_record(["x", "y"])?;
        for (x, y) in &output.final_positions {
            writer.write_record(&[format!("{:.4}", x), format!("{:.4}", y)])?;
        }
        writer.flush()?;
        info!("Final positions saved to {}", filename);
    }

    Ok(())
}

fn write_json(stem: &str, snapshots: &[Snapshot]) {
    let filename = format!("{}_snapshots.json", stem);
    match File::create(&filename) {
        Ok(mut file) => match serde_json::to_string(snapshots) {
            Ok(json_string) => {
                if let Err(e) = file.write_all(json_string.as_bytes()) {
                    error!("Error writing snapshot JSON to file '{}': {}", filename, e);
                } else {
                    info!("Snapshots saved to {} ({} KB)", filename, json_string.len() / 1024);
                }
            }
            Err(e) => error!("Error serializing snapshots to JSON: {}", e),
        },
        Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
    }
}
