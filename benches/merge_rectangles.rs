//! Measure merging the blocked tiles of a map into rectangles
//!
//! World is 256 tiles by 256 tiles with roughly a third of them blocked
//!

use bevy_tile_guard_plugin::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Scatter blocked tiles across the grid
fn prepare_grid(columns: u32, rows: u32) -> TileGrid {
	let mut rng = StdRng::seed_from_u64(7);
	let flags = (0..columns * rows).map(|_| rng.random_bool(0.33)).collect();
	TileGrid::from_flags(columns, rows, flags).unwrap()
}

pub fn criterion_benchmark(c: &mut Criterion) {
	let mut group = c.benchmark_group("algorithm_use");
	group.significance_level(0.05).sample_size(100);
	let grid = prepare_grid(256, 256);
	group.bench_function("merge_rectangles", |b| {
		b.iter(|| RectangleMerger::merge(black_box(&grid)))
	});
	group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
