//! Simulation benchmarks for skirmish_core.
//!
//! Run with: `cargo bench -p skirmish_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use skirmish_core::ai::Difficulty;
use skirmish_core::arena::Arena;
use skirmish_core::components::PlayerId;
use skirmish_core::config::MatchConfig;
use skirmish_core::map::{Tile, TileGrid};
use skirmish_core::math::Coord;
use skirmish_core::pathfinding::{find_path, DEFAULT_MAX_STEPS};
use skirmish_core::simulation::Simulation;
use skirmish_core::visibility::compute_visibility;
use skirmish_core::world::Buildings;

fn walled_grid() -> TileGrid {
    let mut tiles = TileGrid::new(64, 64);
    for y in 0..56 {
        tiles.set(Coord::new(32, y), Tile::Rock);
    }
    tiles
}

/// A* across open ground and around a long wall.
pub fn pathfinding_benchmark(c: &mut Criterion) {
    let open = TileGrid::new(64, 64);
    let walled = walled_grid();
    let buildings: Buildings = Arena::new();

    c.bench_function("find_path_open_40", |b| {
        b.iter(|| {
            find_path(
                black_box(&open),
                &buildings,
                Coord::new(4, 4),
                Coord::new(44, 30),
                DEFAULT_MAX_STEPS,
            )
        })
    });

    c.bench_function("find_path_wall_detour", |b| {
        b.iter(|| {
            find_path(
                black_box(&walled),
                &buildings,
                Coord::new(20, 20),
                Coord::new(44, 20),
                2_000,
            )
        })
    });
}

/// Full ticks of an AI-vs-AI match.
pub fn simulation_benchmark(c: &mut Criterion) {
    let config = MatchConfig::ai_vs_ai(Difficulty::Hard, Difficulty::Hard).with_seed(3);

    c.bench_function("tick_ai_vs_ai_100", |b| {
        b.iter_batched(
            || Simulation::new(&config).ok(),
            |sim| {
                if let Some(mut sim) = sim {
                    for _ in 0..100 {
                        black_box(sim.tick());
                    }
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });

    let mut warm = Simulation::new(&config).ok();
    if let Some(sim) = warm.as_mut() {
        sim.run_until(600);
    }
    c.bench_function("visibility_midgame", |b| {
        b.iter(|| {
            warm.as_ref()
                .map(|sim| compute_visibility(black_box(sim.world()), PlayerId(0)))
        })
    });
}

criterion_group!(benches, pathfinding_benchmark, simulation_benchmark);
criterion_main!(benches);
