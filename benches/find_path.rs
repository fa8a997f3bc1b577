//! Measure planning a path corner to corner through a maze of walls
//!
//! World is 200 tiles by 200 tiles
//!

use bevy_tile_guard_plugin::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Vertical walls every fourth column with a gap alternating top and bottom
fn prepare_maze(columns: u32, rows: u32) -> TileGrid {
	let mut flags = vec![false; (columns * rows) as usize];
	for column in (2..columns).step_by(4) {
		let gap = if (column / 4) % 2 == 0 { rows - 1 } else { 0 };
		for row in 0..rows {
			if row != gap {
				flags[(row * columns + column) as usize] = true;
			}
		}
	}
	TileGrid::from_flags(columns, rows, flags).unwrap()
}

pub fn criterion_benchmark(c: &mut Criterion) {
	let mut group = c.benchmark_group("algorithm_use");
	group.significance_level(0.05).sample_size(50);
	let grid = prepare_maze(200, 200);
	let planner = PathPlanner::default();
	group.bench_function("find_path", |b| {
		b.iter(|| {
			planner.find_path(
				black_box(&grid),
				black_box(TileCoord(0, 0)),
				black_box(TileCoord(199, 199)),
			)
		})
	});
	group.bench_function("nearest_walkable", |b| {
		b.iter(|| planner.nearest_walkable(black_box(&grid), black_box(TileCoord(2, 100))))
	});
	group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
