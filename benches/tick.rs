//! Benchmarks for the CPU tick pipeline.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use plife::prelude::*;
use plife::spatial::{GridLayout, SpatialGrid};

fn config(count: usize) -> SimulationConfig {
    // keep density roughly constant across sizes
    let height = (count as f32 / 800.0).sqrt().max(2.0);
    SimulationConfig::default()
        .with_particle_count(count)
        .with_species_count(5)
        .with_world(WorldBounds::from_height(height, 16.0 / 9.0))
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.sample_size(20);

    for count in [10_000, 50_000, 100_000] {
        let mut sim = ParticleLife::new();
        if sim.init(config(count)).is_err() {
            continue;
        }
        sim.tuning().randomize_matrix(-1.0, 1.0, true);
        // let the population settle out of its uniform start
        for _ in 0..10 {
            let _ = sim.step(1.0 / 60.0);
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(sim.step(1.0 / 60.0).map(|f| f.len())))
        });
    }

    group.finish();
}

fn bench_grid_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_rebuild");

    for count in [10_000, 100_000] {
        let config = config(count);
        let mut sim = ParticleLife::new();
        if sim.init(config.clone()).is_err() {
            continue;
        }
        let positions = match sim.particles() {
            Some(store) => store.positions().to_vec(),
            None => continue,
        };
        let mut grid = SpatialGrid::new(GridLayout::from_config(&config), count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &positions, |b, positions| {
            b.iter(|| grid.rebuild(black_box(positions)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick, bench_grid_rebuild);
criterion_main!(benches);
