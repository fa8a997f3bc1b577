//! The two faces the collision data shows to the rest of a game.
//!
//! [CollisionMap] answers questions, it only borrows the data and is cheap
//! to build inside any system. [CollisionEditor] holds the sub-cell store
//! mutably and carries out authoring actions: painting single sub-cells,
//! rescanning tiles from the artwork and regenerating the whole map.
//!

use bevy::prelude::*;

use crate::prelude::*;

/// Read-only queries over the collision data of a map
pub struct CollisionMap<'a> {
	/// Map size
	dimensions: &'a MapDimensions,
	/// Coarse occupancy
	grid: &'a TileGrid,
	/// Fine occupancy
	store: &'a SubCellStore,
	/// Always walkable areas
	zones: &'a OverrideZones,
	/// Rendered layers
	art: Option<&'a dyn TileArtSource>,
	/// Tuning
	settings: TileGuardSettings,
}

impl<'a> CollisionMap<'a> {
	/// Create a new instance of [CollisionMap]
	pub fn new(
		dimensions: &'a MapDimensions,
		grid: &'a TileGrid,
		store: &'a SubCellStore,
		zones: &'a OverrideZones,
	) -> Self {
		CollisionMap {
			dimensions,
			grid,
			store,
			zones,
			art: None,
			settings: TileGuardSettings::default(),
		}
	}
	/// Let queries see the rendered layers
	pub fn with_art(mut self, art: &'a dyn TileArtSource) -> Self {
		self.art = Some(art);
		self
	}
	/// Use custom tuning
	pub fn with_settings(mut self, settings: TileGuardSettings) -> Self {
		self.settings = settings;
		self
	}
	/// The movement guard over this map
	pub fn guard(&self) -> TileGuard<'a> {
		let guard = TileGuard::new(self.dimensions, self.grid, self.store, self.zones)
			.with_config(self.settings.guard);
		match self.art {
			Some(art) => guard.with_art(art),
			None => guard,
		}
	}
	/// Whether a world position may be occupied
	pub fn is_walkable(&self, position: Vec2) -> bool {
		self.guard().is_walkable(position)
	}
	/// Plan a path between two world positions, stamped with the revision of
	/// the grid
	pub fn find_path(&self, from: Vec2, to: Vec2) -> Option<Path> {
		match self.settings.planner().find_path_world(self.dimensions, self.grid, from, to) {
			Ok(path) => Some(path),
			Err(e) => {
				debug!("{}", e);
				None
			}
		}
	}
	/// Plan a path between two tiles
	pub fn find_path_tiles(&self, source: TileCoord, target: TileCoord) -> Option<Path> {
		self.settings
			.planner()
			.find_path(self.grid, source, target)
	}
	/// The closest open tile to `tile`
	pub fn nearest_walkable(&self, tile: TileCoord) -> Option<TileCoord> {
		self.settings.planner().nearest_walkable(self.grid, tile)
	}
	/// The centre of the closest open tile to a world position, used to put
	/// an agent back on its feet after a spawn or a teleport
	pub fn nearest_walkable_world(&self, position: Vec2) -> Option<Vec2> {
		let size = self.dimensions.get_world_size();
		let clamped = position.clamp(Vec2::ZERO, (size - Vec2::splat(0.001)).max(Vec2::ZERO));
		let tile = self.dimensions.get_tile_from_world(clamped).ok()?;
		self.nearest_walkable(tile)
			.map(|t| self.dimensions.get_tile_centre(t))
	}
}

/// Authoring actions over the sub-cell store of a map
pub struct CollisionEditor<'a> {
	/// Map size
	dimensions: &'a MapDimensions,
	/// Coarse occupancy
	grid: &'a TileGrid,
	/// Fine occupancy being edited
	store: &'a mut SubCellStore,
	/// Tuning
	settings: TileGuardSettings,
}

impl<'a> CollisionEditor<'a> {
	/// Create a new instance of [CollisionEditor]
	pub fn new(
		dimensions: &'a MapDimensions,
		grid: &'a TileGrid,
		store: &'a mut SubCellStore,
	) -> Self {
		CollisionEditor {
			dimensions,
			grid,
			store,
			settings: TileGuardSettings::default(),
		}
	}
	/// Use custom tuning
	pub fn with_settings(mut self, settings: TileGuardSettings) -> Self {
		self.settings = settings;
		self
	}
	/// Flip the sub-cell under a world position
	pub fn toggle_cell(&mut self, position: Vec2) -> Result<(TileCoord, SubCellMask), CollisionError> {
		self.store.toggle_cell_at_world(position, self.dimensions)
	}
	/// Rescan a single tile from the artwork
	pub fn scan_tile<A: TileArtSource + ?Sized>(&mut self, tile: TileCoord, art: &A) -> Result<SubCellMask, CollisionError> {
		if !self.grid.contains(tile) {
			return Err(CollisionError::TileOutOfBounds(tile));
		}
		let mask = self.settings.scanner().scan_tile(tile, art, self.grid);
		self.store.set(tile, mask, Provenance::PixelDerived);
		Ok(mask)
	}
	/// Rescan a rectangle of tiles, returning how many were written
	pub fn scan_region<A: TileArtSource + ?Sized>(&mut self, region: TileRect, art: &A) -> usize {
		self.settings
			.scanner()
			.scan_region(region, art, self.grid, self.store)
	}
	/// Regenerate every mask of the map in one go
	pub fn run_global_shrink<A: TileArtSource + ?Sized>(&mut self, art: &A, options: ShrinkOptions) -> ShrinkStats {
		run_global_shrink(art, self.grid, self.store, self.settings.scanner(), options)
	}
}
