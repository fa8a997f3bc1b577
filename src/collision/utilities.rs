//! Useful structures and tools shared by the collision layers
//!
//! World space is the pixel space of the map: the origin sits at the top
//! left corner of tile `(0, 0)`, `x` grows to the right and `y` grows
//! downwards. A renderer using a different convention converts positions
//! before handing them over.
//!

use bevy::prelude::*;

use crate::prelude::*;

/// Side length of a tile in world units
pub const TILE_SIZE: f32 = 32.0;
/// Side length of a sub-cell in world units
pub const SUB_CELL_SIZE: f32 = 8.0;
/// Number of sub-cells along each axis of a tile
pub const SUB_GRID_RESOLUTION: usize = 4;
/// Number of pixels along each axis of a sub-cell when sampling artwork
pub const SUB_CELL_PIXELS: u32 = 8;

/// A tile position on the map measured as `(column, row)`
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Reflect)]
pub struct TileCoord(pub u32, pub u32);

impl TileCoord {
	/// Create a new instance of [TileCoord]
	pub fn new(column: u32, row: u32) -> Self {
		TileCoord(column, row)
	}
	/// Get the column of the tile
	pub fn get_column(&self) -> u32 {
		self.0
	}
	/// Get the row of the tile
	pub fn get_row(&self) -> u32 {
		self.1
	}
	/// Manhattan distance between two tiles
	pub fn manhattan(&self, other: &TileCoord) -> u32 {
		self.0.abs_diff(other.0) + self.1.abs_diff(other.1)
	}
}

impl std::fmt::Display for TileCoord {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{},{}", self.0, self.1)
	}
}

impl std::str::FromStr for TileCoord {
	type Err = CollisionError;
	/// Parse the `"x,y"` form used as keys in a persisted collision document
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (x, y) = s.split_once(',').ok_or_else(|| {
			CollisionError::Persistence(format!("Tile key `{}` is not of the form `x,y`", s))
		})?;
		let parse = |v: &str| {
			v.trim().parse::<u32>().map_err(|e| {
				CollisionError::Persistence(format!("Tile key `{}` has a bad component: {}", s, e))
			})
		};
		Ok(TileCoord(parse(x)?, parse(y)?))
	}
}

/// Orthogonal directions used when walking the tile grid. The ordering of
/// the variants is the order neighbours are visited in
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Ordinal {
	North,
	East,
	South,
	West,
}

impl Ordinal {
	/// Based on a tiles `(column, row)` position find its neighbours within the map limits (up to 4)
	pub fn get_orthogonal_neighbours(tile: TileCoord, columns: u32, rows: u32) -> Vec<TileCoord> {
		let mut neighbours = Vec::with_capacity(4);
		if tile.1 > 0 {
			neighbours.push(TileCoord(tile.0, tile.1 - 1)); // northern tile
		}
		if tile.0 + 1 < columns {
			neighbours.push(TileCoord(tile.0 + 1, tile.1)); // eastern tile
		}
		if tile.1 + 1 < rows {
			neighbours.push(TileCoord(tile.0, tile.1 + 1)); // southern tile
		}
		if tile.0 > 0 {
			neighbours.push(TileCoord(tile.0 - 1, tile.1)); // western tile
		}
		neighbours
	}
}

/// The number of tile `columns` and `rows` of the map along with the world
/// size of a tile and of a sub-cell
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
pub struct MapDimensions {
	/// Number of tiles along the `x` axis
	columns: u32,
	/// Number of tiles along the `y` axis
	rows: u32,
	/// World size of a tile
	tile_size: f32,
	/// World size of a sub-cell
	sub_cell_size: f32,
}

impl Default for MapDimensions {
	fn default() -> Self {
		MapDimensions {
			columns: 0,
			rows: 0,
			tile_size: TILE_SIZE,
			sub_cell_size: SUB_CELL_SIZE,
		}
	}
}

impl MapDimensions {
	/// Create a new instance of [MapDimensions] using the standard 32 unit
	/// tiles split into a 4x4 grid of 8 unit sub-cells
	pub fn new(columns: u32, rows: u32) -> Self {
		MapDimensions {
			columns,
			rows,
			..Default::default()
		}
	}
	/// Create dimensions with a custom tile and sub-cell size. The sub-cell
	/// size must split a tile into exactly a 4x4 grid
	pub fn with_sizes(
		columns: u32,
		rows: u32,
		tile_size: f32,
		sub_cell_size: f32,
	) -> Result<Self, CollisionError> {
		if tile_size <= 0.0 || sub_cell_size <= 0.0 {
			return Err(CollisionError::Configuration(format!(
				"Tile size `{}` and sub-cell size `{}` must be positive",
				tile_size, sub_cell_size
			)));
		}
		if (tile_size / sub_cell_size - SUB_GRID_RESOLUTION as f32).abs() > f32::EPSILON {
			return Err(CollisionError::Configuration(format!(
				"Tile size `{}` must be exactly {} sub-cells of size `{}`",
				tile_size, SUB_GRID_RESOLUTION, sub_cell_size
			)));
		}
		Ok(MapDimensions {
			columns,
			rows,
			tile_size,
			sub_cell_size,
		})
	}
	/// Number of tile columns
	pub fn get_columns(&self) -> u32 {
		self.columns
	}
	/// Number of tile rows
	pub fn get_rows(&self) -> u32 {
		self.rows
	}
	/// World size of a tile
	pub fn get_tile_size(&self) -> f32 {
		self.tile_size
	}
	/// World size of a sub-cell
	pub fn get_sub_cell_size(&self) -> f32 {
		self.sub_cell_size
	}
	/// Total number of tiles on the map
	pub fn get_tile_count(&self) -> usize {
		self.columns as usize * self.rows as usize
	}
	/// World size of the whole map
	pub fn get_world_size(&self) -> Vec2 {
		Vec2::new(
			self.columns as f32 * self.tile_size,
			self.rows as f32 * self.tile_size,
		)
	}
	/// Whether a world position lies inside the map extents
	pub fn contains_world(&self, position: Vec2) -> bool {
		let size = self.get_world_size();
		position.x >= 0.0 && position.y >= 0.0 && position.x < size.x && position.y < size.y
	}
	/// Whether a tile lies inside the map
	pub fn contains_tile(&self, tile: TileCoord) -> bool {
		tile.0 < self.columns && tile.1 < self.rows
	}
	/// From a world position find the tile it sits in
	pub fn get_tile_from_world(&self, position: Vec2) -> Result<TileCoord, CollisionError> {
		if !self.contains_world(position) {
			return Err(CollisionError::OutOfBounds(position));
		}
		let column = (position.x / self.tile_size).floor() as u32;
		let row = (position.y / self.tile_size).floor() as u32;
		Ok(TileCoord(column, row))
	}
	/// From a world position find the tile and the index of the sub-cell
	/// (`row * 4 + column` within the tile) it sits in
	pub fn get_sub_cell_from_world(
		&self,
		position: Vec2,
	) -> Result<(TileCoord, u8), CollisionError> {
		let tile = self.get_tile_from_world(position)?;
		let local_x = position.x - tile.0 as f32 * self.tile_size;
		let local_y = position.y - tile.1 as f32 * self.tile_size;
		let last = SUB_GRID_RESOLUTION as u32 - 1;
		let column = ((local_x / self.sub_cell_size).floor() as u32).min(last);
		let row = ((local_y / self.sub_cell_size).floor() as u32).min(last);
		Ok((tile, (row * SUB_GRID_RESOLUTION as u32 + column) as u8))
	}
	/// World position of the centre of a tile
	pub fn get_tile_centre(&self, tile: TileCoord) -> Vec2 {
		Vec2::new(
			(tile.0 as f32 + 0.5) * self.tile_size,
			(tile.1 as f32 + 0.5) * self.tile_size,
		)
	}
	/// World rectangle covered by a tile
	pub fn get_tile_rect(&self, tile: TileCoord) -> Rect {
		let min = Vec2::new(tile.0 as f32, tile.1 as f32) * self.tile_size;
		Rect::from_corners(min, min + Vec2::splat(self.tile_size))
	}
	/// Convert a world rectangle into the inclusive-exclusive tile bounds
	/// `(min, max)` it overlaps, clamped to the map. Returns [None] when the
	/// rectangle lies entirely outside of the map or has no area
	pub fn get_tile_bounds(&self, rect: Rect) -> Option<(TileCoord, TileCoord)> {
		if rect.is_empty() {
			return None;
		}
		let min_x = (rect.min.x / self.tile_size).floor().max(0.0) as u32;
		let min_y = (rect.min.y / self.tile_size).floor().max(0.0) as u32;
		let max_x = ((rect.max.x / self.tile_size).ceil().max(0.0) as u32).min(self.columns);
		let max_y = ((rect.max.y / self.tile_size).ceil().max(0.0) as u32).min(self.rows);
		if min_x >= max_x || min_y >= max_y {
			return None;
		}
		Some((TileCoord(min_x, min_y), TileCoord(max_x, max_y)))
	}
}
