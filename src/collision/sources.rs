//! Build the [TileGrid] of a scene from whichever collision data the map
//! authors provided.
//!
//! There are three candidate sources, tried in strict priority and never
//! combined:
//!
//! 1. obstacle objects, rectangles or polygons placed on an object layer
//! 2. tile flag layers, a per-tile "this blocks" marker
//! 3. scenery layers, where each drawn sprite blocks only its "feet": a box
//!    half the sprite's width and 35% of its height, centred horizontally
//!    and resting on the sprite's bottom edge
//!
//! ```text
//!  sprite          feet
//!  ________
//! |        |
//! |        |
//! |  ____  |
//! |_|____|_|
//! ```
//!
//! With none of them the grid is fully walkable and a configuration warning
//! is raised. Problems found along the way are logged and handed back as
//! warnings, none of them stop the scene from loading.
//!

use std::collections::BTreeSet;

use bevy::prelude::*;

use crate::prelude::*;

/// Fraction of a sprite's width blocked by its feet
const FEET_WIDTH: f32 = 0.5;
/// Fraction of a sprite's height blocked by its feet
const FEET_HEIGHT: f32 = 0.35;

/// Geometry of an obstacle object
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum ObstacleShape {
	/// A world space rectangle
	Rect(Rect),
	/// A world space polygon, only its bounding box is used
	Polygon(Vec<Vec2>),
}

/// An obstacle object placed by the map author
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AuthoredObstacle {
	/// Name of the object, used in reports
	pub name: String,
	/// Its geometry
	pub shape: ObstacleShape,
}

impl AuthoredObstacle {
	/// A rectangular obstacle
	pub fn rect(name: &str, rect: Rect) -> Self {
		AuthoredObstacle {
			name: name.to_string(),
			shape: ObstacleShape::Rect(rect),
		}
	}
	/// A polygonal obstacle
	pub fn polygon(name: &str, points: Vec<Vec2>) -> Self {
		AuthoredObstacle {
			name: name.to_string(),
			shape: ObstacleShape::Polygon(points),
		}
	}
	/// World space bounding box, [None] for a polygon without points
	pub fn bounding_box(&self) -> Option<Rect> {
		match &self.shape {
			ObstacleShape::Rect(r) => Some(*r),
			ObstacleShape::Polygon(points) => {
				let first = points.first()?;
				Some(
					points
						.iter()
						.fold(Rect::from_corners(*first, *first), |acc, p| {
							acc.union_point(*p)
						}),
				)
			}
		}
	}
}

/// A per-tile blocking marker layer
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TileFlagLayer {
	/// Name of the layer
	pub name: String,
	/// Row-major flags, `true` blocks
	pub flags: Vec<bool>,
}

/// A layer of drawn scenery sprites
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SceneryLayer {
	/// Name of the layer
	pub name: String,
	/// World space bounds of every sprite
	pub sprites: Vec<Rect>,
}

impl SceneryLayer {
	/// Build a layer from row-major "is something drawn here" flags where
	/// each drawn tile is a one tile sprite
	pub fn from_drawn_tiles(name: &str, drawn: &[bool], dimensions: &MapDimensions) -> Self {
		let columns = dimensions.get_columns().max(1);
		let sprites = drawn
			.iter()
			.enumerate()
			.filter(|(_, d)| **d)
			.map(|(i, _)| {
				let tile = TileCoord(i as u32 % columns, i as u32 / columns);
				dimensions.get_tile_rect(tile)
			})
			.collect();
		SceneryLayer {
			name: name.to_string(),
			sprites,
		}
	}
}

/// Everything the map offers to derive collision from
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionSources {
	/// Obstacle objects
	pub obstacles: Vec<AuthoredObstacle>,
	/// Tile flag layers
	pub tile_flag_layers: Vec<TileFlagLayer>,
	/// Scenery layers
	pub scenery_layers: Vec<SceneryLayer>,
}

/// Which source a [TileGrid] was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionSource {
	/// Obstacle objects
	AuthoredObjects,
	/// Tile flag layers
	TileFlags,
	/// Feet of scenery sprites
	SceneryFootprints,
	/// Nothing usable, the grid is fully walkable
	None,
}

/// A tile only partly covered by an obstacle rectangle, which blocks the
/// whole tile and so leaves a gap between the drawn and the effective
/// boundary
#[derive(Debug, Clone, PartialEq)]
pub struct MicroGap {
	/// Name of the obstacle
	pub object: String,
	/// The partly covered tile
	pub tile: TileCoord,
	/// Fraction of the tile the obstacle actually covers
	pub coverage: f32,
}

/// The output of [CollisionSourceResolver::resolve]
#[derive(Debug, Clone)]
pub struct ResolvedCollision {
	/// Occupancy of every tile
	pub grid: TileGrid,
	/// Where it came from
	pub source: CollisionSource,
	/// World space static bodies, one per obstacle object
	pub static_bodies: Vec<Rect>,
	/// Tiles blocked by an obstacle that only partly covers them
	pub micro_gaps: Vec<MicroGap>,
	/// Non-fatal problems found
	pub warnings: Vec<CollisionError>,
}

/// Chooses the collision source of a scene and builds its [TileGrid]
pub struct CollisionSourceResolver;

impl CollisionSourceResolver {
	/// Build the grid from the highest priority source available
	pub fn resolve(dimensions: &MapDimensions, sources: &CollisionSources) -> ResolvedCollision {
		let mut resolved = ResolvedCollision {
			grid: TileGrid::new(dimensions.get_columns(), dimensions.get_rows()),
			source: CollisionSource::None,
			static_bodies: Vec::new(),
			micro_gaps: Vec::new(),
			warnings: Vec::new(),
		};
		if !sources.obstacles.is_empty() {
			resolved.source = CollisionSource::AuthoredObjects;
			Self::from_obstacles(dimensions, &sources.obstacles, &mut resolved);
		} else if !sources.tile_flag_layers.is_empty() {
			resolved.source = CollisionSource::TileFlags;
			Self::from_tile_flags(dimensions, &sources.tile_flag_layers, &mut resolved);
		} else if !sources.scenery_layers.is_empty() {
			resolved.source = CollisionSource::SceneryFootprints;
			Self::from_scenery(dimensions, &sources.scenery_layers, &mut resolved);
		} else {
			resolved.warnings.push(CollisionError::Configuration(
				"No obstacle objects, tile flags or scenery layers, every tile is walkable"
					.to_string(),
			));
		}
		for warning in resolved.warnings.iter() {
			warn!("{}", warning);
		}
		info!(
			"Collision built from {:?}: {} of {} tiles blocked",
			resolved.source,
			resolved.grid.blocked_count(),
			dimensions.get_tile_count()
		);
		resolved
	}
	/// Block every tile touched by an obstacle's bounding box
	fn from_obstacles(
		dimensions: &MapDimensions,
		obstacles: &[AuthoredObstacle],
		resolved: &mut ResolvedCollision,
	) {
		let tile_size = dimensions.get_tile_size();
		for obstacle in obstacles.iter() {
			let Some(bounds) = obstacle.bounding_box() else {
				resolved.warnings.push(CollisionError::Configuration(format!(
					"Obstacle `{}` has no points",
					obstacle.name
				)));
				continue;
			};
			resolved.static_bodies.push(bounds);
			if bounds.width() < tile_size || bounds.height() < tile_size {
				resolved.warnings.push(CollisionError::Configuration(format!(
					"Obstacle `{}` is smaller than a tile ({}x{}) and blocks whole tiles",
					obstacle.name,
					bounds.width(),
					bounds.height()
				)));
			}
			let Some((min, max)) = dimensions.get_tile_bounds(bounds) else {
				resolved.warnings.push(CollisionError::Configuration(format!(
					"Obstacle `{}` lies outside of the map",
					obstacle.name
				)));
				continue;
			};
			for row in min.1..max.1 {
				for column in min.0..max.0 {
					let tile = TileCoord(column, row);
					resolved.grid.set_blocked(tile, true);
					let tile_rect = dimensions.get_tile_rect(tile);
					let overlap = bounds.intersect(tile_rect);
					let coverage = if overlap.is_empty() {
						0.0
					} else {
						overlap.width() * overlap.height() / (tile_size * tile_size)
					};
					if coverage < 1.0 - f32::EPSILON {
						resolved.micro_gaps.push(MicroGap {
							object: obstacle.name.clone(),
							tile,
							coverage,
						});
					}
				}
			}
		}
		if !resolved.micro_gaps.is_empty() {
			debug!(
				"{} tiles are only partly covered by their obstacles",
				resolved.micro_gaps.len()
			);
		}
	}
	/// Block every tile flagged on any flag layer
	fn from_tile_flags(
		dimensions: &MapDimensions,
		layers: &[TileFlagLayer],
		resolved: &mut ResolvedCollision,
	) {
		let expected = dimensions.get_tile_count();
		let columns = dimensions.get_columns().max(1);
		for layer in layers.iter() {
			if layer.flags.len() != expected {
				resolved.warnings.push(CollisionError::Configuration(format!(
					"Tile flag layer `{}` has {} flags, expected {}",
					layer.name,
					layer.flags.len(),
					expected
				)));
			}
			for (i, blocked) in layer.flags.iter().enumerate().take(expected) {
				if *blocked {
					let tile = TileCoord(i as u32 % columns, i as u32 / columns);
					resolved.grid.set_blocked(tile, true);
				}
			}
		}
	}
	/// Block the tiles under the feet of every scenery sprite, skipping
	/// layers so dense they must be overlays
	fn from_scenery(
		dimensions: &MapDimensions,
		layers: &[SceneryLayer],
		resolved: &mut ResolvedCollision,
	) {
		let total = dimensions.get_tile_count().max(1) as f32;
		for layer in layers.iter() {
			let mut covered = BTreeSet::new();
			for sprite in layer.sprites.iter() {
				if let Some((min, max)) = dimensions.get_tile_bounds(*sprite) {
					for row in min.1..max.1 {
						for column in min.0..max.0 {
							covered.insert(TileCoord(column, row));
						}
					}
				}
			}
			let density = covered.len() as f32 / total;
			if is_decorative_layer_name(&layer.name) || density > OVERLAY_DENSITY {
				resolved.warnings.push(CollisionError::Configuration(format!(
					"Scenery layer `{}` covers {:.0}% of the map or is decorative, skipping it",
					layer.name,
					density * 100.0
				)));
				continue;
			}
			for sprite in layer.sprites.iter() {
				if let Some((min, max)) = dimensions.get_tile_bounds(feet_of(*sprite)) {
					for row in min.1..max.1 {
						for column in min.0..max.0 {
							resolved.grid.set_blocked(TileCoord(column, row), true);
						}
					}
				}
			}
		}
	}
}

/// The blocking footprint of a sprite
fn feet_of(sprite: Rect) -> Rect {
	let width = sprite.width() * FEET_WIDTH;
	let height = sprite.height() * FEET_HEIGHT;
	let centre_x = sprite.center().x;
	Rect::new(
		centre_x - width / 2.0,
		sprite.max.y - height,
		centre_x + width / 2.0,
		sprite.max.y,
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn objects_win_over_flags() {
		let dims = MapDimensions::new(4, 4);
		let sources = CollisionSources {
			obstacles: vec![AuthoredObstacle::rect("crate", Rect::new(32.0, 32.0, 64.0, 64.0))],
			tile_flag_layers: vec![TileFlagLayer {
				name: "collision".to_string(),
				flags: vec![true; 16],
			}],
			scenery_layers: vec![],
		};
		let resolved = CollisionSourceResolver::resolve(&dims, &sources);
		assert_eq!(CollisionSource::AuthoredObjects, resolved.source);
		assert_eq!(1, resolved.grid.blocked_count());
		assert!(resolved.grid.is_blocked(TileCoord(1, 1)));
		assert_eq!(vec![Rect::new(32.0, 32.0, 64.0, 64.0)], resolved.static_bodies);
		assert!(resolved.micro_gaps.is_empty());
	}
	#[test]
	fn polygon_uses_bounding_box() {
		let dims = MapDimensions::new(4, 4);
		let sources = CollisionSources {
			obstacles: vec![AuthoredObstacle::polygon(
				"rock",
				vec![Vec2::new(0.0, 0.0), Vec2::new(64.0, 0.0), Vec2::new(32.0, 32.0)],
			)],
			..Default::default()
		};
		let resolved = CollisionSourceResolver::resolve(&dims, &sources);
		assert_eq!(vec![Rect::new(0.0, 0.0, 64.0, 32.0)], resolved.static_bodies);
		assert!(resolved.grid.is_blocked(TileCoord(0, 0)));
		assert!(resolved.grid.is_blocked(TileCoord(1, 0)));
		assert_eq!(2, resolved.grid.blocked_count());
	}
	#[test]
	fn off_grid_rect_reports_micro_gaps() {
		//  ___________
		// |__|__|__|__|
		// |__|r_|r_|__|   rect 48..80 x 32..64 half covers (1,1) and (2,1)
		// |__|__|__|__|
		let dims = MapDimensions::new(4, 3);
		let sources = CollisionSources {
			obstacles: vec![AuthoredObstacle::rect("fence", Rect::new(48.0, 32.0, 80.0, 64.0))],
			..Default::default()
		};
		let resolved = CollisionSourceResolver::resolve(&dims, &sources);
		assert_eq!(2, resolved.grid.blocked_count());
		assert_eq!(2, resolved.micro_gaps.len());
		assert_eq!(TileCoord(1, 1), resolved.micro_gaps[0].tile);
		assert!((resolved.micro_gaps[0].coverage - 0.5).abs() < 1e-4);
	}
	#[test]
	fn flags_when_no_objects() {
		let dims = MapDimensions::new(2, 2);
		let sources = CollisionSources {
			tile_flag_layers: vec![TileFlagLayer {
				name: "collision".to_string(),
				flags: vec![false, true, false, false],
			}],
			..Default::default()
		};
		let resolved = CollisionSourceResolver::resolve(&dims, &sources);
		assert_eq!(CollisionSource::TileFlags, resolved.source);
		assert!(resolved.grid.is_blocked(TileCoord(1, 0)));
		assert_eq!(1, resolved.grid.blocked_count());
		assert!(resolved.static_bodies.is_empty());
	}
	#[test]
	fn scenery_feet() {
		// a tree two tiles wide and three tall standing on tiles (1..3, 1..4)
		let dims = MapDimensions::new(6, 6);
		let sources = CollisionSources {
			scenery_layers: vec![SceneryLayer {
				name: "trees".to_string(),
				sprites: vec![Rect::new(32.0, 32.0, 96.0, 128.0)],
			}],
			..Default::default()
		};
		let resolved = CollisionSourceResolver::resolve(&dims, &sources);
		assert_eq!(CollisionSource::SceneryFootprints, resolved.source);
		// feet are 32 wide from x 48..80 and 33.6 tall from y 94.4..128
		let mut blocked: Vec<TileCoord> = resolved
			.grid
			.iter()
			.filter(|(_, b)| *b)
			.map(|(t, _)| t)
			.collect();
		blocked.sort();
		let actual = vec![
			TileCoord(1, 2),
			TileCoord(1, 3),
			TileCoord(2, 2),
			TileCoord(2, 3),
		];
		assert_eq!(actual, blocked);
	}
	#[test]
	fn dense_scenery_is_skipped() {
		let dims = MapDimensions::new(2, 2);
		let sources = CollisionSources {
			scenery_layers: vec![SceneryLayer::from_drawn_tiles(
				"ground_detail",
				&[true, true, true, false],
				&dims,
			)],
			..Default::default()
		};
		let resolved = CollisionSourceResolver::resolve(&dims, &sources);
		assert_eq!(0, resolved.grid.blocked_count());
		assert_eq!(1, resolved.warnings.len());
	}
	#[test]
	fn nothing_to_build_from() {
		let dims = MapDimensions::new(3, 3);
		let resolved = CollisionSourceResolver::resolve(&dims, &CollisionSources::default());
		assert_eq!(CollisionSource::None, resolved.source);
		assert_eq!(0, resolved.grid.blocked_count());
		assert!(matches!(
			resolved.warnings.as_slice(),
			[CollisionError::Configuration(_)]
		));
	}
}
