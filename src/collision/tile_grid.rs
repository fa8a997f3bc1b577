//! The [TileGrid] holds the coarse per-tile occupancy of the map. It is built
//! once per scene load from a single authoritative source (see
//! [crate::prelude::CollisionSourceResolver]) and is read-only afterwards.
//!
//! A value of `x` marks a blocked tile:
//!
//! ```text
//!  _______________________
//! |__|__|__|__|__|__|__|__|
//! |__|x_|x_|__|__|__|__|__|
//! |__|x_|x_|__|__|x_|__|__|
//! |__|__|__|__|__|x_|__|__|
//! |__|__|__|__|__|x_|x_|__|
//! |__|__|__|__|__|__|__|__|
//! ```
//!

use std::sync::atomic::{AtomicU64, Ordering};

use bevy::prelude::*;

use crate::prelude::*;

/// Source of unique revision stamps so a replaced grid never shares a
/// stamp with the one it replaced
static NEXT_GRID_REVISION: AtomicU64 = AtomicU64::new(1);

/// Per-tile blocked flags stored row-major
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(try_from = "TileGridData"))]
#[derive(Component, Debug, Clone)]
pub struct TileGrid {
	/// Number of tile columns
	columns: u32,
	/// Number of tile rows
	rows: u32,
	/// `true` where a tile is blocked, indexed by `row * columns + column`
	blocked: Vec<bool>,
	/// Stamp identifying this grid, used to detect stale paths
	#[cfg_attr(feature = "serde", serde(skip))]
	revision: u64,
}

/// Take the next unique grid revision
fn next_revision() -> u64 {
	NEXT_GRID_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Serialized shape of a [TileGrid], checked by [TileGrid::from_flags]
/// before it becomes a grid
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct TileGridData {
	/// Number of tile columns
	columns: u32,
	/// Number of tile rows
	rows: u32,
	/// Row-major blocked flags
	blocked: Vec<bool>,
}

#[cfg(feature = "serde")]
impl TryFrom<TileGridData> for TileGrid {
	type Error = CollisionError;
	fn try_from(data: TileGridData) -> Result<Self, Self::Error> {
		TileGrid::from_flags(data.columns, data.rows, data.blocked)
	}
}

impl Default for TileGrid {
	fn default() -> Self {
		TileGrid::new(0, 0)
	}
}

impl TileGrid {
	/// Create a fully walkable grid
	pub fn new(columns: u32, rows: u32) -> Self {
		TileGrid {
			columns,
			rows,
			blocked: vec![false; columns as usize * rows as usize],
			revision: next_revision(),
		}
	}
	/// Create a grid from row-major blocked flags
	pub fn from_flags(columns: u32, rows: u32, blocked: Vec<bool>) -> Result<Self, CollisionError> {
		if blocked.len() != columns as usize * rows as usize {
			return Err(CollisionError::Configuration(format!(
				"Expected {} tile flags for a {}x{} grid, found {}",
				columns as usize * rows as usize,
				columns,
				rows,
				blocked.len()
			)));
		}
		Ok(TileGrid {
			columns,
			rows,
			blocked,
			revision: next_revision(),
		})
	}
	/// Create a grid from rows of text where `x` (or `#`) marks a blocked
	/// tile and anything else is open. Handy for authoring small maps
	pub fn from_ascii(rows: &[&str]) -> Result<Self, CollisionError> {
		let row_count = rows.len() as u32;
		let columns = rows.first().map(|r| r.chars().count()).unwrap_or(0) as u32;
		let mut blocked = Vec::with_capacity(columns as usize * row_count as usize);
		for (i, row) in rows.iter().enumerate() {
			if row.chars().count() as u32 != columns {
				return Err(CollisionError::Configuration(format!(
					"Row {} has {} tiles, expected {}",
					i,
					row.chars().count(),
					columns
				)));
			}
			blocked.extend(row.chars().map(|c| c == 'x' || c == '#'));
		}
		TileGrid::from_flags(columns, row_count, blocked)
	}
	/// Number of tile columns
	pub fn get_columns(&self) -> u32 {
		self.columns
	}
	/// Number of tile rows
	pub fn get_rows(&self) -> u32 {
		self.rows
	}
	/// Revision stamp of this grid
	pub fn get_revision(&self) -> u64 {
		self.revision
	}
	/// Whether a tile lies within the grid
	pub fn contains(&self, tile: TileCoord) -> bool {
		tile.0 < self.columns && tile.1 < self.rows
	}
	/// Index into the flag array
	fn index(&self, tile: TileCoord) -> usize {
		tile.1 as usize * self.columns as usize + tile.0 as usize
	}
	/// Whether a tile is blocked. Tiles outside of the grid are blocked
	pub fn is_blocked(&self, tile: TileCoord) -> bool {
		if !self.contains(tile) {
			return true;
		}
		self.blocked[self.index(tile)]
	}
	/// Set the blocked flag of a tile. Only used while a grid is being built
	pub(crate) fn set_blocked(&mut self, tile: TileCoord, blocked: bool) {
		if self.contains(tile) {
			let i = self.index(tile);
			self.blocked[i] = blocked;
		}
	}
	/// Iterate over every tile in row-major order with its blocked flag
	pub fn iter(&self) -> impl Iterator<Item = (TileCoord, bool)> + '_ {
		self.blocked.iter().enumerate().map(|(i, b)| {
			let column = (i % self.columns as usize) as u32;
			let row = (i / self.columns as usize) as u32;
			(TileCoord(column, row), *b)
		})
	}
	/// Number of blocked tiles
	pub fn blocked_count(&self) -> usize {
		self.blocked.iter().filter(|b| **b).count()
	}
	/// Read the blocked flags from a headerless CSV file where any non-zero
	/// value marks a blocked tile
	#[cfg(feature = "csv")]
	pub fn from_csv(path: &str) -> Result<Self, CollisionError> {
		let data = std::fs::File::open(path)
			.map_err(|e| CollisionError::Configuration(format!("Failed opening {}: {}", path, e)))?;
		let mut rdr = csv::ReaderBuilder::new()
			.has_headers(false)
			.flexible(true)
			.from_reader(data);
		let mut blocked = Vec::new();
		let mut columns = 0;
		let mut rows = 0;
		for record in rdr.records() {
			let record = record
				.map_err(|e| CollisionError::Configuration(format!("Bad CSV row: {}", e)))?;
			if rows == 0 {
				columns = record.len() as u32;
			} else if record.len() as u32 != columns {
				return Err(CollisionError::Configuration(format!(
					"CSV row {} has {} tiles, expected {}",
					rows,
					record.len(),
					columns
				)));
			}
			for value in record.iter() {
				let value: u32 = value.trim().parse().map_err(|_| {
					CollisionError::Configuration(format!("CSV expects integers, found `{}`", value))
				})?;
				blocked.push(value != 0);
			}
			rows += 1;
		}
		TileGrid::from_flags(columns, rows, blocked)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn ascii_grid() {
		let grid = TileGrid::from_ascii(&["..x", "x.."]).unwrap();
		assert!(grid.is_blocked(TileCoord(2, 0)));
		assert!(grid.is_blocked(TileCoord(0, 1)));
		assert!(!grid.is_blocked(TileCoord(1, 1)));
		assert_eq!(2, grid.blocked_count());
	}
	#[test]
	fn outside_is_blocked() {
		let grid = TileGrid::new(3, 3);
		assert!(grid.is_blocked(TileCoord(3, 0)));
		assert!(grid.is_blocked(TileCoord(0, 3)));
	}
	#[test]
	fn mismatched_flags() {
		assert!(TileGrid::from_flags(2, 2, vec![false; 3]).is_err());
		assert!(TileGrid::from_ascii(&["..", "..."]).is_err());
	}
	#[test]
	fn revisions_differ() {
		let a = TileGrid::new(2, 2);
		let b = TileGrid::new(2, 2);
		assert_ne!(a.get_revision(), b.get_revision());
	}
	#[test]
	fn iter_row_major() {
		let grid = TileGrid::from_ascii(&[".x", ".."]).unwrap();
		let result: Vec<(TileCoord, bool)> = grid.iter().collect();
		assert_eq!((TileCoord(1, 0), true), result[1]);
		assert_eq!((TileCoord(0, 1), false), result[2]);
	}
	#[test]
	#[cfg(feature = "csv")]
	fn grid_from_csv() {
		let path = env!("CARGO_MANIFEST_DIR").to_string() + "/assets/csv/tile_flags.csv";
		let grid = TileGrid::from_csv(&path).unwrap();
		assert_eq!(8, grid.get_columns());
		assert!(grid.blocked_count() > 0);
	}
	#[test]
	#[cfg(feature = "csv")]
	fn ragged_csv_rows() {
		let path = std::env::temp_dir()
			.join(format!("tile_guard_ragged_{}.csv", std::process::id()))
			.to_string_lossy()
			.to_string();
		// 6 values for a 3x2 grid but the rows are 4 and 2 wide
		std::fs::write(&path, "0,1,0,0\n1,0\n").unwrap();
		let result = TileGrid::from_csv(&path);
		assert!(matches!(result, Err(CollisionError::Configuration(_))));
		let _ = std::fs::remove_file(&path);
	}
	#[test]
	#[cfg(feature = "ron")]
	fn deserialize_checks_flag_count() {
		let short = "(columns: 2, rows: 2, blocked: [false, true, false])";
		assert!(ron::from_str::<TileGrid>(short).is_err());
		let grid: TileGrid = ron::from_str("(columns: 2, rows: 1, blocked: [false, true])").unwrap();
		assert!(grid.is_blocked(TileCoord(1, 0)));
		assert!(!grid.is_blocked(TileCoord(0, 0)));
	}
}
