//! Error types raised by collision and pathfinding operations
//!
//! None of these are fatal. Queries on the per-tick path fold them into the
//! conservative answer (blocked, roll back) and only authoring, loading and
//! saving hand them back to the caller.
//!

use bevy::prelude::*;

use crate::prelude::*;

/// Every failure the collision layers can report
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionError {
	/// No usable collision source or a malformed setting. The affected
	/// structure falls back to an empty, fully walkable default
	Configuration(String),
	/// A world position outside of the map extents, treated as blocked
	OutOfBounds(Vec2),
	/// A tile outside of the map
	TileOutOfBounds(TileCoord),
	/// A sub-cell index outside of `0..=15`
	InvalidCellIndex(u8),
	/// The planner exhausted the reachable graph without meeting the target
	PathNotFound {
		/// Tile the search started from
		source: TileCoord,
		/// Tile the search tried to reach
		target: TileCoord,
	},
	/// The nearest walkable search ran out of budget
	SpawnRecoveryExhausted {
		/// Tile the search started from
		origin: TileCoord,
		/// Number of tiles visited before giving up
		visited: usize,
	},
	/// Reading or writing the persisted collision document failed, the
	/// in-memory state remains authoritative
	Persistence(String),
}

impl std::fmt::Display for CollisionError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			CollisionError::Configuration(msg) => write!(f, "Collision configuration: {}", msg),
			CollisionError::OutOfBounds(pos) => {
				write!(f, "World position ({}, {}) is outside of the map", pos.x, pos.y)
			}
			CollisionError::TileOutOfBounds(tile) => {
				write!(f, "Tile ({}) is outside of the map", tile)
			}
			CollisionError::InvalidCellIndex(index) => {
				write!(f, "Sub-cell index {} is not within 0..=15", index)
			}
			CollisionError::PathNotFound { source, target } => {
				write!(f, "No path from tile ({}) to tile ({})", source, target)
			}
			CollisionError::SpawnRecoveryExhausted { origin, visited } => write!(
				f,
				"No walkable tile near ({}) after visiting {} tiles",
				origin, visited
			),
			CollisionError::Persistence(msg) => write!(f, "Collision persistence: {}", msg),
		}
	}
}

impl std::error::Error for CollisionError {}

#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn display_path_not_found() {
		let err = CollisionError::PathNotFound {
			source: TileCoord(1, 2),
			target: TileCoord(3, 4),
		};
		assert_eq!("No path from tile (1,2) to tile (3,4)", err.to_string());
	}
	#[test]
	fn display_cell_index() {
		let err = CollisionError::InvalidCellIndex(16);
		assert_eq!("Sub-cell index 16 is not within 0..=15", err.to_string());
	}
}
