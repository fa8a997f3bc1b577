//! The persisted form of a [SubCellStore].
//!
//! Masks are keyed by `"x,y"` tile strings. An entry is either a bare
//! integer or a record carrying whether the mask came from the alpha
//! threshold scan of the artwork:
//!
//! ```text
//! (
//!     columns: 8,
//!     rows: 6,
//!     tile_size: 32.0,
//!     sub_cell_size: 8.0,
//!     masks: {
//!         "1,1": 65535,
//!         "2,1": (mask: 1632, alpha_threshold_passed: true),
//!     },
//! )
//! ```
//!
//! Each entry is written back in the form it was read in so loading and
//! then saving without edits reproduces the same mask data. Masks of tiles
//! outside of the recorded map are dropped with a warning in both
//! directions.
//!

use std::collections::BTreeMap;

use bevy::prelude::*;

use crate::prelude::*;

/// One persisted mask
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(untagged)]
pub enum MaskEntry {
	/// A bare integer mask
	Plain(u16),
	/// A mask recording whether it was derived from the artwork
	Tagged {
		/// The solidity mask
		mask: u16,
		/// `true` when produced by the silhouette scan
		alpha_threshold_passed: bool,
	},
}

impl From<SubCellEntry> for MaskEntry {
	fn from(entry: SubCellEntry) -> Self {
		match entry.provenance {
			Provenance::Plain => MaskEntry::Plain(entry.mask.get()),
			Provenance::Authored => MaskEntry::Tagged {
				mask: entry.mask.get(),
				alpha_threshold_passed: false,
			},
			Provenance::PixelDerived => MaskEntry::Tagged {
				mask: entry.mask.get(),
				alpha_threshold_passed: true,
			},
		}
	}
}

impl From<MaskEntry> for SubCellEntry {
	fn from(entry: MaskEntry) -> Self {
		match entry {
			MaskEntry::Plain(mask) => SubCellEntry {
				mask: SubCellMask(mask),
				provenance: Provenance::Plain,
			},
			MaskEntry::Tagged {
				mask,
				alpha_threshold_passed,
			} => SubCellEntry {
				mask: SubCellMask(mask),
				provenance: if alpha_threshold_passed {
					Provenance::PixelDerived
				} else {
					Provenance::Authored
				},
			},
		}
	}
}

/// Serializable snapshot of the sub-cell masks of a map
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, PartialEq)]
pub struct CollisionDocument {
	/// Number of tile columns of the map the masks belong to
	pub columns: u32,
	/// Number of tile rows of the map the masks belong to
	pub rows: u32,
	/// World size of a tile
	pub tile_size: f32,
	/// World size of a sub-cell
	pub sub_cell_size: f32,
	/// Masks keyed by `"x,y"`
	pub masks: BTreeMap<String, MaskEntry>,
}

impl CollisionDocument {
	/// Snapshot a store. Entries for tiles outside of the map are skipped
	/// with a warning
	pub fn from_store(store: &SubCellStore, dimensions: &MapDimensions) -> Self {
		let masks = store
			.get_entries()
			.iter()
			.filter(|(tile, _)| {
				let inside = dimensions.contains_tile(**tile);
				if !inside {
					warn!("Not saving mask for tile ({}) outside of the map", tile);
				}
				inside
			})
			.map(|(tile, entry)| (tile.to_string(), MaskEntry::from(*entry)))
			.collect();
		CollisionDocument {
			columns: dimensions.get_columns(),
			rows: dimensions.get_rows(),
			tile_size: dimensions.get_tile_size(),
			sub_cell_size: dimensions.get_sub_cell_size(),
			masks,
		}
	}
	/// The map dimensions recorded in the document
	pub fn get_dimensions(&self) -> Result<MapDimensions, CollisionError> {
		MapDimensions::with_sizes(self.columns, self.rows, self.tile_size, self.sub_cell_size)
	}
	/// Rebuild a store from the document. Keys that don't parse or that lie
	/// outside of the recorded map are skipped with a warning
	pub fn to_store(&self) -> SubCellStore {
		let mut store = SubCellStore::new();
		for (key, entry) in self.masks.iter() {
			match key.parse::<TileCoord>() {
				Ok(tile) if tile.0 < self.columns && tile.1 < self.rows => {
					let entry = SubCellEntry::from(*entry);
					store.set(tile, entry.mask, entry.provenance);
				}
				Ok(tile) => warn!("Skipping mask for tile ({}) outside of the map", tile),
				Err(e) => warn!("Skipping mask entry: {}", e),
			}
		}
		store
	}
	/// Serialize into a `ron` string
	#[cfg(feature = "ron")]
	pub fn to_ron_string(&self) -> Result<String, CollisionError> {
		ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
			.map_err(|e| CollisionError::Persistence(format!("Failed serializing masks: {}", e)))
	}
	/// Deserialize from a `ron` string
	#[cfg(feature = "ron")]
	pub fn from_ron_str(data: &str) -> Result<Self, CollisionError> {
		ron::from_str(data)
			.map_err(|e| CollisionError::Persistence(format!("Failed deserializing masks: {}", e)))
	}
	/// From a `ron` file load the [CollisionDocument]
	#[cfg(feature = "ron")]
	pub fn from_ron(path: &str) -> Result<Self, CollisionError> {
		let file = std::fs::File::open(path)
			.map_err(|e| CollisionError::Persistence(format!("Failed opening {}: {}", path, e)))?;
		ron::de::from_reader(file).map_err(|e| {
			CollisionError::Persistence(format!("Failed deserializing {}: {}", path, e))
		})
	}
	/// Write the document to a `ron` file
	#[cfg(feature = "ron")]
	pub fn save_ron(&self, path: &str) -> Result<(), CollisionError> {
		let data = self.to_ron_string()?;
		std::fs::write(path, data)
			.map_err(|e| CollisionError::Persistence(format!("Failed writing {}: {}", path, e)))
	}
}
