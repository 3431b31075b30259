//! Streaming replay: walks a player through the world and reports what the
//! scheduler does each frame.
//!
//! Usage: cargo run --release --bin stream_replay -- [OPTIONS]
//!
//! Options:
//!   --frames <N>       Frames to simulate (default: 600)
//!   --mode <MODE>      Performance mode: normal | minimal (default: normal)
//!   --speed <M>        Player speed in meters per frame (default: 4.0)
//!   --switch-at <N>    Switch to minimal mode at frame N
//!   --threaded <N>     Use the threaded executor with N concurrent jobs
//!   --config <PATH>    Streaming config JSON (flags override its fields)
//!   --report <N>       Print stats every N frames (default: 60)

use std::time::Instant;

use glam::Vec3;

use worldstream::core::{logging, ExecutorKind, Result, StreamingConfig};
use worldstream::streaming::{Collaborators, GenerationStage, PerformanceMode, StreamingStats, WorldStreamer};

fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let frames = parse_u64_arg(&args, "--frames").unwrap_or(600);
    let speed = parse_f32_arg(&args, "--speed").unwrap_or(4.0);
    let switch_at = parse_u64_arg(&args, "--switch-at");
    let report_every = parse_u64_arg(&args, "--report").unwrap_or(60).max(1);

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => StreamingConfig::load(path)?,
        None => StreamingConfig::default(),
    };
    if let Some(mode) = parse_str_arg(&args, "--mode") {
        config.mode = mode;
    }
    if let Some(max_concurrent) = parse_usize_arg(&args, "--threaded") {
        config.executor = ExecutorKind::Threaded { max_concurrent };
    }

    let mut streamer = WorldStreamer::new(&config, Collaborators::default())?;

    println!("=== Worldstream Replay ===");
    println!("Profile:  {}", streamer.profile().name);
    println!("Frames:   {}", frames);
    println!("Speed:    {} m/frame", speed);
    println!("Executor: {:?}", config.executor);
    println!();

    let start = Instant::now();
    let mut totals = StreamingStats::default();
    let mut position = Vec3::new(0.5, 0.0, 0.5);

    for frame in 1..=frames {
        if switch_at == Some(frame) {
            println!("frame {:>5}: switching to minimal", frame);
            streamer.set_profile(PerformanceMode::Minimal);
        }

        let batch = streamer.tick_world_pos(position);
        let stats = *streamer.stats();
        accumulate(&mut totals, &stats);

        if frame % report_every == 0 {
            println!(
                "frame {:>5}: {:>4} actions  resident {:>4}  in flight {:>3}  deferred {:>4}  scene {:>6}",
                frame,
                batch.len(),
                stats.resident,
                stats.in_flight,
                stats.deferred,
                streamer.scene().len()
            );
        }

        position.x += speed;
    }

    let populated = streamer
        .resident_coords()
        .filter(|c| streamer.stage(*c) == Some(GenerationStage::FullyPopulated))
        .count();

    println!();
    println!("=== Summary ===");
    println!("Elapsed:           {:.2?}", start.elapsed());
    println!("Admitted:          {}", totals.admitted);
    println!("Evicted:           {}", totals.evicted);
    println!("Terrain jobs:      {} (+{} refines)", totals.terrain_queued, totals.refines_queued);
    println!("Structure jobs:    {}", totals.structures_queued);
    println!("Environment jobs:  {}", totals.environment_queued);
    println!("Failed / stale:    {} / {}", totals.failed, totals.stale_discarded);
    println!("Entities spawned:  {}", totals.entities_spawned);
    println!("Entities released: {}", totals.entities_released);
    println!("Resident:          {} ({} fully populated)", streamer.resident_count(), populated);

    Ok(())
}

fn accumulate(totals: &mut StreamingStats, frame: &StreamingStats) {
    totals.admitted += frame.admitted;
    totals.evicted += frame.evicted;
    totals.terrain_queued += frame.terrain_queued;
    totals.refines_queued += frame.refines_queued;
    totals.structures_queued += frame.structures_queued;
    totals.environment_queued += frame.environment_queued;
    totals.failed += frame.failed;
    totals.stale_discarded += frame.stale_discarded;
    totals.entities_spawned += frame.entities_spawned;
    totals.entities_released += frame.entities_released;
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u64_arg(args: &[String], flag: &str) -> Option<u64> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
