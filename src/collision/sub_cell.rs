//! Fine grained collision inside a tile. Every tile can carry a 16-bit
//! [SubCellMask] splitting it into a 4x4 grid of 8 unit sub-cells, bit `i`
//! maps to cell `row * 4 + column` and a set bit marks the cell solid:
//!
//! ```text
//!  ___________
//! |0_|1_|2_|3_|
//! |4_|5_|6_|7_|
//! |8_|9_|10|11|
//! |12|13|14|15|
//! ```
//!
//! The [SubCellStore] is sparse, a tile without an entry defers to the
//! [TileGrid]. An entry of `0x0000` always makes its whole tile walkable even
//! when the grid blocks it, this is how an oversized authored boundary gets
//! carved back down to what the artwork actually shows.
//!

use std::collections::BTreeMap;

use bevy::prelude::*;

use crate::prelude::*;

/// A 16-bit solidity mask of the 4x4 sub-cells of a tile
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub struct SubCellMask(pub u16);

impl SubCellMask {
	/// Every sub-cell walkable
	pub const EMPTY: SubCellMask = SubCellMask(0x0000);
	/// Every sub-cell solid
	pub const FULL: SubCellMask = SubCellMask(0xFFFF);
	/// Number of sub-cells in a mask
	pub const CELL_COUNT: u8 = 16;
	/// Create a mask from raw bits
	pub fn new(bits: u16) -> Self {
		SubCellMask(bits)
	}
	/// Get the raw bits
	pub fn get(&self) -> u16 {
		self.0
	}
	/// Check a cell index is within `0..=15`
	fn check_index(index: u8) -> Result<(), CollisionError> {
		if index >= Self::CELL_COUNT {
			return Err(CollisionError::InvalidCellIndex(index));
		}
		Ok(())
	}
	/// Whether the sub-cell is walkable (its bit is clear)
	pub fn is_walkable(&self, index: u8) -> Result<bool, CollisionError> {
		Self::check_index(index)?;
		Ok(self.0 & (1 << index) == 0)
	}
	/// Whether the sub-cell is solid (its bit is set)
	pub fn is_solid(&self, index: u8) -> Result<bool, CollisionError> {
		Ok(!self.is_walkable(index)?)
	}
	/// Flip a single sub-cell
	pub fn toggled(&self, index: u8) -> Result<SubCellMask, CollisionError> {
		Self::check_index(index)?;
		Ok(SubCellMask(self.0 ^ (1 << index)))
	}
	/// Set or clear a single sub-cell
	pub fn with_cell(&self, index: u8, solid: bool) -> Result<SubCellMask, CollisionError> {
		Self::check_index(index)?;
		if solid {
			Ok(SubCellMask(self.0 | (1 << index)))
		} else {
			Ok(SubCellMask(self.0 & !(1 << index)))
		}
	}
	/// Number of solid sub-cells
	pub fn solid_count(&self) -> u32 {
		self.0.count_ones()
	}
	/// Whether no sub-cell is solid
	pub fn is_empty(&self) -> bool {
		self.0 == 0
	}
	/// Index of the sub-cell at `(column, row)` within the tile
	pub fn index_of(column: u32, row: u32) -> u8 {
		(row * SUB_GRID_RESOLUTION as u32 + column) as u8
	}
}

/// Where a mask came from, preserved so a persisted document is written back
/// in the same form it was read in
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provenance {
	/// A bare mask without any source information
	#[default]
	Plain,
	/// Painted by hand in the authoring tool
	Authored,
	/// Derived from the silhouette of the artwork
	PixelDerived,
}

/// A mask and its provenance
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubCellEntry {
	/// The solidity mask
	pub mask: SubCellMask,
	/// Where the mask came from
	pub provenance: Provenance,
}

/// Sparse store of [SubCellMask]s keyed by tile
#[derive(Component, Debug, Clone, Default)]
pub struct SubCellStore {
	/// Masks of every tile that has one
	entries: BTreeMap<TileCoord, SubCellEntry>,
	/// Bumped whenever an entry changes so caches can notice
	revision: u64,
}

impl SubCellStore {
	/// Create an empty store
	pub fn new() -> Self {
		SubCellStore::default()
	}
	/// Get the entries
	pub fn get_entries(&self) -> &BTreeMap<TileCoord, SubCellEntry> {
		&self.entries
	}
	/// Revision counter, changes whenever an entry changes
	pub fn get_revision(&self) -> u64 {
		self.revision
	}
	/// Number of tiles with an entry
	pub fn len(&self) -> usize {
		self.entries.len()
	}
	/// Whether no tile has an entry
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
	/// Get the mask of a tile, [None] when the tile defers to the [TileGrid]
	pub fn get(&self, tile: TileCoord) -> Option<SubCellMask> {
		self.entries.get(&tile).map(|e| e.mask)
	}
	/// Get the mask and provenance of a tile
	pub fn get_entry(&self, tile: TileCoord) -> Option<&SubCellEntry> {
		self.entries.get(&tile)
	}
	/// Write the mask of a tile. A whole mask is replaced at once, writing
	/// the same entry again leaves the revision alone
	pub fn set(&mut self, tile: TileCoord, mask: SubCellMask, provenance: Provenance) {
		let entry = SubCellEntry { mask, provenance };
		if self.entries.insert(tile, entry) != Some(entry) {
			self.revision = self.revision.wrapping_add(1);
		}
	}
	/// Flip one sub-cell of a tile, a tile without an entry starts from
	/// [SubCellMask::EMPTY]. Returns the new mask
	pub fn toggle_cell(
		&mut self,
		tile: TileCoord,
		cell_index: u8,
	) -> Result<SubCellMask, CollisionError> {
		let current = self.get(tile).unwrap_or(SubCellMask::EMPTY);
		let toggled = current.toggled(cell_index)?;
		self.set(tile, toggled, Provenance::Authored);
		Ok(toggled)
	}
	/// The tile and sub-cell index underneath a world position
	pub fn cell_index_at(
		&self,
		position: Vec2,
		dimensions: &MapDimensions,
	) -> Result<(TileCoord, u8), CollisionError> {
		dimensions.get_sub_cell_from_world(position)
	}
	/// Flip the sub-cell underneath a world position, as used by the
	/// authoring tool's paint brush
	pub fn toggle_cell_at_world(
		&mut self,
		position: Vec2,
		dimensions: &MapDimensions,
	) -> Result<(TileCoord, SubCellMask), CollisionError> {
		let (tile, cell_index) = self.cell_index_at(position, dimensions)?;
		let mask = self.toggle_cell(tile, cell_index)?;
		debug!("Toggled sub-cell {} of tile ({}) to {:#06x}", cell_index, tile, mask.get());
		Ok((tile, mask))
	}
	/// Write several masks at once, skipping any tile outside of the map.
	/// Returns how many were written
	pub fn batch_update(
		&mut self,
		updates: &[(TileCoord, SubCellMask)],
		provenance: Provenance,
		dimensions: &MapDimensions,
	) -> usize {
		let mut written = 0;
		for (tile, mask) in updates.iter() {
			if dimensions.contains_tile(*tile) {
				self.set(*tile, *mask, provenance);
				written += 1;
			} else {
				warn!("Ignoring sub-cell update for tile ({}) outside of the map", tile);
			}
		}
		written
	}
	/// Overlay the pixel derived entries of a cached store onto this one.
	/// Authored and plain entries in the cache never replace what is here.
	/// Returns the number of entries taken from the cache
	pub fn merge_pixel_derived(&mut self, cached: &SubCellStore) -> usize {
		let mut merged = 0;
		for (tile, entry) in cached.entries.iter() {
			if entry.provenance == Provenance::PixelDerived {
				self.set(*tile, entry.mask, entry.provenance);
				merged += 1;
			}
		}
		merged
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn centre_mask_cells() {
		//  ___________
		// |__|__|__|__|
		// |__|x_|x_|__|
		// |__|x_|x_|__|
		// |__|__|__|__|
		let mask = SubCellMask::new(0x0660);
		for index in [5, 6, 9, 10] {
			assert!(mask.is_solid(index).unwrap());
		}
		for index in [0, 1, 2, 3, 4, 7, 8, 11, 12, 13, 14, 15] {
			assert!(mask.is_walkable(index).unwrap());
		}
	}
	#[test]
	fn invalid_index() {
		let mask = SubCellMask::EMPTY;
		assert_eq!(Err(CollisionError::InvalidCellIndex(16)), mask.is_walkable(16));
		assert_eq!(Err(CollisionError::InvalidCellIndex(200)), mask.toggled(200));
	}
	#[test]
	fn toggle_absent_starts_empty() {
		let mut store = SubCellStore::new();
		let result = store.toggle_cell(TileCoord(2, 3), 0).unwrap();
		assert_eq!(SubCellMask(0x0001), result);
		let result = store.toggle_cell(TileCoord(2, 3), 0).unwrap();
		assert_eq!(SubCellMask::EMPTY, result);
		// an empty mask is kept rather than deleted
		assert_eq!(Some(SubCellMask::EMPTY), store.get(TileCoord(2, 3)));
	}
	#[test]
	fn toggle_at_world() {
		let dims = MapDimensions::new(4, 4);
		let mut store = SubCellStore::new();
		let (tile, mask) = store
			.toggle_cell_at_world(Vec2::new(32.0 + 31.0, 64.0 + 1.0), &dims)
			.unwrap();
		assert_eq!(TileCoord(1, 2), tile);
		assert_eq!(SubCellMask(0x0008), mask);
	}
	#[test]
	fn toggle_outside_map() {
		let dims = MapDimensions::new(4, 4);
		let mut store = SubCellStore::new();
		assert!(store.toggle_cell_at_world(Vec2::new(200.0, 1.0), &dims).is_err());
		assert!(store.is_empty());
	}
	#[test]
	fn revision_bumps_on_change() {
		let mut store = SubCellStore::new();
		let before = store.get_revision();
		store.set(TileCoord(0, 0), SubCellMask::FULL, Provenance::Plain);
		let written = store.get_revision();
		assert_ne!(before, written);
		// same entry again
		store.set(TileCoord(0, 0), SubCellMask::FULL, Provenance::Plain);
		assert_eq!(written, store.get_revision());
		// same mask, new provenance
		store.set(TileCoord(0, 0), SubCellMask::FULL, Provenance::Authored);
		assert_ne!(written, store.get_revision());
	}
	#[test]
	fn merge_only_pixel_derived() {
		let mut static_store = SubCellStore::new();
		static_store.set(TileCoord(0, 0), SubCellMask::FULL, Provenance::Plain);
		static_store.set(TileCoord(1, 0), SubCellMask::FULL, Provenance::Plain);
		let mut cached = SubCellStore::new();
		cached.set(TileCoord(0, 0), SubCellMask(0x0660), Provenance::PixelDerived);
		cached.set(TileCoord(1, 0), SubCellMask::EMPTY, Provenance::Authored);
		let merged = static_store.merge_pixel_derived(&cached);
		assert_eq!(1, merged);
		assert_eq!(Some(SubCellMask(0x0660)), static_store.get(TileCoord(0, 0)));
		assert_eq!(Some(SubCellMask::FULL), static_store.get(TileCoord(1, 0)));
	}
	#[test]
	fn batch_skips_outside() {
		let dims = MapDimensions::new(2, 2);
		let mut store = SubCellStore::new();
		let updates = [
			(TileCoord(0, 0), SubCellMask::FULL),
			(TileCoord(5, 0), SubCellMask::FULL),
		];
		let written = store.batch_update(&updates, Provenance::PixelDerived, &dims);
		assert_eq!(1, written);
	}
}
