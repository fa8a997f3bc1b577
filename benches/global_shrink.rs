//! Measure a boundary shrink over a whole map
//!
//! World is 64 tiles by 64 tiles with a wall sprite on every fourth tile
//!

use bevy::prelude::*;
use bevy_tile_guard_plugin::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Draw walls on a quarter of the tiles and block them on the grid
fn prepare_map(columns: u32, rows: u32) -> (TileGrid, TileArt) {
	let mut flags = vec![false; (columns * rows) as usize];
	let mut art = TileArt::default();
	let walls = art.add_layer("walls", false);
	for row in 0..rows {
		for column in 0..columns {
			if (column + row) % 4 == 0 {
				flags[(row * columns + column) as usize] = true;
				art.paint_rect(walls, TileCoord(column, row), UVec2::ZERO, UVec2::new(32, 20), 255)
					.unwrap();
			}
		}
	}
	(TileGrid::from_flags(columns, rows, flags).unwrap(), art)
}

pub fn criterion_benchmark(c: &mut Criterion) {
	let mut group = c.benchmark_group("algorithm_use");
	group.significance_level(0.05).sample_size(20);
	let (grid, art) = prepare_map(64, 64);
	group.bench_function("global_shrink", |b| {
		b.iter(|| {
			let mut store = SubCellStore::new();
			run_global_shrink(
				black_box(&art),
				&grid,
				&mut store,
				SilhouetteScanner::default(),
				ShrinkOptions::default(),
			)
		})
	});
	group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
