//! Bundles grouping the components a map entity and an agent entity need
//! for the plugin systems to pick them up
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Everything describing the collision of a single map
#[derive(Bundle)]
pub struct TileGuardBundle {
	/// Size of the map
	map_dimensions: MapDimensions,
	/// Coarse occupancy
	tile_grid: TileGrid,
	/// Fine occupancy
	sub_cell_store: SubCellStore,
	/// Always walkable areas
	override_zones: OverrideZones,
	/// Rendered layers the silhouettes are read from
	tile_art: TileArt,
}

impl TileGuardBundle {
	/// Create a new instance of [TileGuardBundle] by resolving the collision
	/// sources of a map. No sub-cell masks exist yet
	pub fn new(dimensions: MapDimensions, sources: &CollisionSources) -> Self {
		let resolved = CollisionSourceResolver::resolve(&dimensions, sources);
		TileGuardBundle {
			map_dimensions: dimensions,
			tile_grid: resolved.grid,
			sub_cell_store: SubCellStore::new(),
			override_zones: OverrideZones::default(),
			tile_art: TileArt::new(dimensions.get_tile_size() as u32),
		}
	}
	/// Create a new instance of [TileGuardBundle] from a prebuilt grid
	pub fn from_grid(dimensions: MapDimensions, grid: TileGrid) -> Self {
		TileGuardBundle {
			map_dimensions: dimensions,
			tile_grid: grid,
			sub_cell_store: SubCellStore::new(),
			override_zones: OverrideZones::default(),
			tile_art: TileArt::new(dimensions.get_tile_size() as u32),
		}
	}
	/// Create a new instance of [TileGuardBundle] where the map size and the
	/// sub-cell masks are read from a collision document on disk
	#[cfg(feature = "ron")]
	pub fn new_from_disk(sources: &CollisionSources, path: &str) -> Result<Self, CollisionError> {
		let document = CollisionDocument::from_ron(path)?;
		let dimensions = document.get_dimensions()?;
		let mut bundle = TileGuardBundle::new(dimensions, sources);
		bundle.sub_cell_store = document.to_store();
		info!(
			"Loaded {} sub-cell masks from {}",
			bundle.sub_cell_store.len(),
			path
		);
		Ok(bundle)
	}
	/// Use pixel derived masks cached from an earlier scan, anything
	/// authored by hand is kept
	pub fn with_cached_masks(mut self, cached: &SubCellStore) -> Self {
		self.sub_cell_store.merge_pixel_derived(cached);
		self
	}
	/// Use a prepared sub-cell store
	pub fn with_store(mut self, store: SubCellStore) -> Self {
		self.sub_cell_store = store;
		self
	}
	/// Use the artwork of the map
	pub fn with_art(mut self, art: TileArt) -> Self {
		self.tile_art = art;
		self
	}
	/// Use a set of override zones
	pub fn with_override_zones(mut self, zones: OverrideZones) -> Self {
		self.override_zones = zones;
		self
	}
	/// Get the map size
	pub fn get_dimensions(&self) -> &MapDimensions {
		&self.map_dimensions
	}
	/// Get the tile grid
	pub fn get_grid(&self) -> &TileGrid {
		&self.tile_grid
	}
	/// Get the sub-cell store
	pub fn get_store(&self) -> &SubCellStore {
		&self.sub_cell_store
	}
}

/// An agent moved by the game (a player, or anything steered by its
/// velocity) whose movement is checked every tick
#[derive(Bundle)]
pub struct GuardedAgentBundle {
	/// Position in map space
	position: MapPosition,
	/// Intended movement
	velocity: AgentVelocity,
	/// Footprint
	body: AgentBody,
	/// Last safe position
	guard: MovementGuard,
}

impl GuardedAgentBundle {
	/// Create a new instance of [GuardedAgentBundle] spawned at `spawn`
	pub fn new(spawn: Vec2, body: AgentBody) -> Self {
		GuardedAgentBundle {
			position: MapPosition(spawn),
			velocity: AgentVelocity::default(),
			body,
			guard: MovementGuard::new(spawn),
		}
	}
}

/// An agent walking planned paths by itself
#[derive(Bundle)]
pub struct PathingAgentBundle {
	/// Position in map space
	position: MapPosition,
	/// Footprint
	body: AgentBody,
	/// Last safe position
	guard: MovementGuard,
	/// Path being walked
	follower: PathFollower,
}

impl PathingAgentBundle {
	/// Create a new instance of [PathingAgentBundle] spawned at `spawn`
	/// walking at `speed` world units per second
	pub fn new(spawn: Vec2, body: AgentBody, speed: f32) -> Self {
		PathingAgentBundle {
			position: MapPosition(spawn),
			body,
			guard: MovementGuard::new(spawn),
			follower: PathFollower::new(speed),
		}
	}
}
