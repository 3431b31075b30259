use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, Criterion, black_box};

use worldstream::core::StreamingConfig;
use worldstream::streaming::profile::{resolve, PerformanceMode};
use worldstream::streaming::{
    desired_chunks, ChunkCoord, Collaborators, GenerationScheduler, SpatialIndex, WorldStreamer,
};

fn bench_desired_chunks_normal(c: &mut Criterion) {
    let profile = resolve(PerformanceMode::Normal);

    c.bench_function("desired_chunks_normal_uncached", |b| {
        b.iter(|| desired_chunks(black_box(ChunkCoord::new(17, -4)), &profile));
    });

    let index = SpatialIndex::new(&profile);
    c.bench_function("desired_chunks_normal_indexed", |b| {
        let mut x = 0;
        b.iter(|| {
            x += 1;
            index.desired_chunks(black_box(ChunkCoord::new(x, -4)))
        });
    });
}

fn bench_scheduler_first_frame(c: &mut Criterion) {
    let profile = resolve(PerformanceMode::Normal);
    let scheduler = GenerationScheduler::default();
    let desired = desired_chunks(ChunkCoord::new(0, 0), &profile);
    let resident = HashMap::new();

    c.bench_function("scheduler_step_empty_world", |b| {
        b.iter(|| scheduler.step(black_box(&desired), &resident, &profile));
    });
}

fn bench_steady_tick(c: &mut Criterion) {
    let config = StreamingConfig::default();
    let mut streamer = WorldStreamer::new(&config, Collaborators::default()).unwrap();
    let player = ChunkCoord::new(0, 0);

    // Populate everything so the measured tick is pure bookkeeping
    for _ in 0..1000 {
        if streamer.tick(player).is_empty() && streamer.in_flight() == 0 {
            break;
        }
    }

    c.bench_function("tick_steady_state_normal", |b| {
        b.iter(|| streamer.tick(black_box(player)));
    });
}

fn bench_tick_walking(c: &mut Criterion) {
    let config = StreamingConfig {
        mode: "minimal".to_string(),
        ..Default::default()
    };
    let mut streamer = WorldStreamer::new(&config, Collaborators::default()).unwrap();

    c.bench_function("tick_walking_minimal", |b| {
        let mut x = 0;
        b.iter(|| {
            x += 1;
            streamer.tick(black_box(ChunkCoord::new(x / 8, 0)))
        });
    });
}

criterion_group!(
    benches,
    bench_desired_chunks_normal,
    bench_scheduler_first_frame,
    bench_steady_tick,
    bench_tick_walking,
);

criterion_main!(benches);
