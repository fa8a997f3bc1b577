//! Tuning of every collision layer gathered into one [Resource] that can be
//! written by hand or loaded from a `ron` file. Any field missing from the
//! file keeps its default.
//!
//! ```text
//! (
//!     guard: (sub_cells_add_blocking: false),
//!     planner: (nearest_walkable_budget: 2048),
//!     shrink: (chunk_size: 512),
//! )
//! ```
//!

use bevy::prelude::*;

use crate::prelude::*;

/// Stuck detection of agents following a path
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowerConfig {
	/// Distance to a waypoint's centre at which it counts as reached
	pub arrival_distance: f32,
	/// Seconds of walking with too little progress before an agent is stuck
	pub stuck_seconds: f32,
	/// Distance an agent must cover within `stuck_seconds` to not be stuck
	pub stuck_distance: f32,
	/// Distance from the walked segment after which the path is abandoned
	pub max_deviation: f32,
}

impl Default for FollowerConfig {
	fn default() -> Self {
		FollowerConfig {
			arrival_distance: 2.0,
			stuck_seconds: 0.5,
			stuck_distance: 2.0,
			max_deviation: TILE_SIZE,
		}
	}
}

/// Tuning of the guard, planner, scanner, shrink job and path followers
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Resource, Debug, Clone, Copy, PartialEq, Default)]
pub struct TileGuardSettings {
	/// Movement validation
	pub guard: GuardConfig,
	/// Path planning
	pub planner: PlannerConfig,
	/// Silhouette thresholds
	pub scanner: ScannerConfig,
	/// Shrink job chunking
	pub shrink: ShrinkOptions,
	/// Path following
	pub follower: FollowerConfig,
}

impl TileGuardSettings {
	/// From a `ron` file load the [TileGuardSettings]
	#[cfg(feature = "ron")]
	pub fn from_ron(path: &str) -> Result<Self, CollisionError> {
		let contents = std::fs::read_to_string(path).map_err(|e| {
			CollisionError::Configuration(format!("Failed to read {}: {}", path, e))
		})?;
		ron::from_str::<TileGuardSettings>(&contents).map_err(|e| {
			CollisionError::Configuration(format!("Failed to parse {}: {}", path, e))
		})
	}
	/// Load from a `ron` file, falling back to the defaults (and logging why)
	/// when the file can't be used
	#[cfg(feature = "ron")]
	pub fn from_ron_or_default(path: &str) -> Self {
		match TileGuardSettings::from_ron(path) {
			Ok(settings) => settings,
			Err(e) => {
				error!("{}", e);
				error!("Using default TileGuardSettings");
				TileGuardSettings::default()
			}
		}
	}
	/// A scanner using these thresholds
	pub fn scanner(&self) -> SilhouetteScanner {
		SilhouetteScanner::new(self.scanner)
	}
	/// A planner using these limits
	pub fn planner(&self) -> PathPlanner {
		PathPlanner::new(self.planner)
	}
}
