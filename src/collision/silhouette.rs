//! Derive a [SubCellMask] from what a tile actually looks like.
//!
//! Each of the 16 sub-cells covers an 8x8 block of pixels. Every
//! non-decorative layer drawn on the tile is sampled over that block and the
//! highest alpha per pixel is kept. A 4-connected flood fill over the block
//! then finds the largest cluster of opaque pixels (alpha at or above the
//! threshold) and the sub-cell is solid only when that cluster is big enough.
//! Isolated specks of anti-aliasing or a stray outline pixel therefore never
//! block movement:
//!
//! ```text
//!  8x8 block              largest cluster = 6 >= 4, solid
//!  . . . . . . . .
//!  . # # . . . . .
//!  . # # # . . . #
//!  . . # . . . . .
//!  . . . . . . . .
//! ```
//!
//! When no non-decorative layer draws on a tile there is nothing to sample
//! and the tile falls back to the [TileGrid]: fully solid when blocked,
//! fully walkable otherwise.
//!

use crate::prelude::*;

/// Tuning of the silhouette scan
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScannerConfig {
	/// Minimum alpha for a pixel to count as opaque (128 is 50% opacity)
	pub alpha_threshold: u8,
	/// Minimum size of the largest opaque cluster for a sub-cell to be solid
	pub min_cluster_pixels: usize,
}

impl Default for ScannerConfig {
	fn default() -> Self {
		ScannerConfig {
			alpha_threshold: 128,
			min_cluster_pixels: 4,
		}
	}
}

/// Computes the sub-cell mask of a tile from its artwork
#[derive(Debug, Clone, Copy, Default)]
pub struct SilhouetteScanner {
	/// Thresholds used when scanning
	config: ScannerConfig,
}

impl SilhouetteScanner {
	/// Create a new instance of [SilhouetteScanner]
	pub fn new(config: ScannerConfig) -> Self {
		SilhouetteScanner { config }
	}
	/// Get the thresholds in use
	pub fn get_config(&self) -> &ScannerConfig {
		&self.config
	}
	/// Compute the mask of a single tile. Deterministic for the same artwork
	pub fn scan_tile<A: TileArtSource + ?Sized>(
		&self,
		tile: TileCoord,
		art: &A,
		grid: &TileGrid,
	) -> SubCellMask {
		let layers: Vec<LayerId> = art
			.layers_at(tile)
			.into_iter()
			.filter(|l| !l.decorative)
			.map(|l| l.id)
			.collect();
		if layers.is_empty() {
			return if grid.is_blocked(tile) {
				SubCellMask::FULL
			} else {
				SubCellMask::EMPTY
			};
		}
		let block = (art.tile_pixels() / SUB_GRID_RESOLUTION as u32) as usize;
		let mut alpha = vec![0u8; block * block];
		let mut mask = SubCellMask::EMPTY;
		for row in 0..SUB_GRID_RESOLUTION as u32 {
			for column in 0..SUB_GRID_RESOLUTION as u32 {
				// merge the layers into one alpha block keeping the most opaque pixel
				for y in 0..block {
					for x in 0..block {
						let px = column * block as u32 + x as u32;
						let py = row * block as u32 + y as u32;
						alpha[y * block + x] = layers
							.iter()
							.map(|layer| art.pixel_alpha_at(*layer, tile, px, py))
							.max()
							.unwrap_or(0);
					}
				}
				let cluster = largest_opaque_cluster(&alpha, block, self.config.alpha_threshold);
				if cluster >= self.config.min_cluster_pixels {
					mask.0 |= 1 << SubCellMask::index_of(column, row);
				}
			}
		}
		mask
	}
	/// Scan every tile of a region and write the results into the store as
	/// pixel derived masks. Tiles outside of the grid are skipped. Returns
	/// the number of tiles written
	pub fn scan_region<A: TileArtSource + ?Sized>(
		&self,
		region: TileRect,
		art: &A,
		grid: &TileGrid,
		store: &mut SubCellStore,
	) -> usize {
		let mut written = 0;
		for tile in region.tiles() {
			if !grid.contains(tile) {
				continue;
			}
			let mask = self.scan_tile(tile, art, grid);
			store.set(tile, mask, Provenance::PixelDerived);
			written += 1;
		}
		written
	}
}

/// Size of the largest 4-connected group of pixels at or above `threshold`
/// in a square `size` by `size` alpha block
fn largest_opaque_cluster(alpha: &[u8], size: usize, threshold: u8) -> usize {
	let mut visited = vec![false; alpha.len()];
	let mut largest = 0;
	let mut stack = Vec::new();
	for start in 0..alpha.len() {
		if visited[start] || alpha[start] < threshold {
			continue;
		}
		visited[start] = true;
		stack.push(start);
		let mut count = 0;
		while let Some(i) = stack.pop() {
			count += 1;
			let (x, y) = (i % size, i / size);
			let mut neighbours = Vec::with_capacity(4);
			if y > 0 {
				neighbours.push(i - size);
			}
			if x + 1 < size {
				neighbours.push(i + 1);
			}
			if y + 1 < size {
				neighbours.push(i + size);
			}
			if x > 0 {
				neighbours.push(i - 1);
			}
			for n in neighbours {
				if !visited[n] && alpha[n] >= threshold {
					visited[n] = true;
					stack.push(n);
				}
			}
		}
		largest = largest.max(count);
	}
	largest
}
