//! Compress the blocked tiles of a [TileGrid] into a small set of
//! non-overlapping axis-aligned rectangles. Used to spawn fewer, larger
//! static bodies and to visualise collision, it never changes what is
//! blocked.
//!
//! The scan is greedy: from each unvisited blocked tile (row-major) the
//! rectangle grows to the east while the next column is blocked and
//! unvisited, then grows to the south while the whole next row across that
//! width is blocked and unvisited.
//!
//! ```text
//!  _________________              _________________
//! |__|__|__|__|__|__|            |__|__|__|__|__|__|
//! |__|x_|x_|x_|__|__|    ==>     |__|A_|A_|A_|__|__|
//! |__|x_|x_|__|__|__|            |__|B_|B_|__|__|__|
//! |__|x_|x_|__|__|x_|            |__|B_|B_|__|__|C_|
//! ```
//!

use bevy::prelude::*;

use crate::prelude::*;

/// A rectangle of whole tiles, `(column, row)` of its top left tile plus its
/// width and height in tiles
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRect {
	/// Column of the top left tile
	pub column: u32,
	/// Row of the top left tile
	pub row: u32,
	/// Width in tiles
	pub width: u32,
	/// Height in tiles
	pub height: u32,
}

impl TileRect {
	/// Create a new instance of [TileRect]
	pub fn new(column: u32, row: u32, width: u32, height: u32) -> Self {
		TileRect {
			column,
			row,
			width,
			height,
		}
	}
	/// Whether the rectangle covers a tile
	pub fn contains(&self, tile: TileCoord) -> bool {
		tile.0 >= self.column
			&& tile.0 < self.column + self.width
			&& tile.1 >= self.row
			&& tile.1 < self.row + self.height
	}
	/// Number of tiles covered
	pub fn area(&self) -> u32 {
		self.width * self.height
	}
	/// Iterate over the covered tiles row-major
	pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
		(self.row..self.row + self.height)
			.flat_map(move |r| (self.column..self.column + self.width).map(move |c| TileCoord(c, r)))
	}
	/// The tile in the middle of the rectangle (rounding towards the top left)
	pub fn centre_tile(&self) -> TileCoord {
		TileCoord(
			self.column + self.width.saturating_sub(1) / 2,
			self.row + self.height.saturating_sub(1) / 2,
		)
	}
	/// Convert to a world space rectangle
	pub fn to_world(&self, dimensions: &MapDimensions) -> Rect {
		let size = dimensions.get_tile_size();
		let min = Vec2::new(self.column as f32, self.row as f32) * size;
		let max = Vec2::new(
			(self.column + self.width) as f32,
			(self.row + self.height) as f32,
		) * size;
		Rect::from_corners(min, max)
	}
}

/// Greedy scanline packing of the blocked tiles of a [TileGrid]
pub struct RectangleMerger;

impl RectangleMerger {
	/// Merge every blocked tile of the grid into rectangles. The union of the
	/// output is exactly the blocked set and no two rectangles overlap
	pub fn merge(grid: &TileGrid) -> Vec<TileRect> {
		let columns = grid.get_columns();
		let rows = grid.get_rows();
		let mut visited = vec![false; columns as usize * rows as usize];
		let index = |c: u32, r: u32| r as usize * columns as usize + c as usize;
		// a tile can join a rectangle if it's blocked and not already claimed
		let is_free_blocked =
			|visited: &[bool], c: u32, r: u32| grid.is_blocked(TileCoord(c, r)) && !visited[index(c, r)];
		let mut rects = Vec::new();
		for row in 0..rows {
			for column in 0..columns {
				if !is_free_blocked(&visited, column, row) {
					continue;
				}
				// grow east
				let mut width = 1;
				while column + width < columns && is_free_blocked(&visited, column + width, row) {
					width += 1;
				}
				// grow south while the whole next row across the width is usable
				let mut height = 1;
				'grow: while row + height < rows {
					for c in column..column + width {
						if !is_free_blocked(&visited, c, row + height) {
							break 'grow;
						}
					}
					height += 1;
				}
				for r in row..row + height {
					for c in column..column + width {
						visited[index(c, r)] = true;
					}
				}
				rects.push(TileRect::new(column, row, width, height));
			}
		}
		debug!(
			"Merged {} blocked tiles into {} rectangles",
			grid.blocked_count(),
			rects.len()
		);
		rects
	}
	/// Merge the blocked tiles and convert the output into world space
	/// rectangles ready to become static bodies
	pub fn merge_world(grid: &TileGrid, dimensions: &MapDimensions) -> Vec<Rect> {
		RectangleMerger::merge(grid)
			.iter()
			.map(|r| r.to_world(dimensions))
			.collect()
	}
}
