//! Connectivity checks run over a freshly built [TileGrid], to catch
//! authoring mistakes before an agent gets stuck on them:
//!
//! - a spawn point on a blocked tile is moved to the nearest open one
//! - open areas that can't be reached from the spawn are listed as islands
//! - one tile wide corridors are listed as chokepoints
//! - named objects nobody can walk up to are listed
//!
//! ```text
//!  _________________
//! |S_|__|x_|__|__|__|
//! |__|__|x_|I_|I_|x_|     S spawn, I island, C chokepoint
//! |x_|C_|x_|x_|x_|x_|
//! |__|__|__|__|__|__|
//! ```
//!

use std::collections::VecDeque;

use bevy::prelude::*;

use crate::prelude::*;

/// A named rectangle of tiles, an interactable object such as a door or a
/// chest that agents must be able to walk up to
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTileRect {
	/// Name of the object
	pub name: String,
	/// Tiles it occupies
	pub rect: TileRect,
}

impl NamedTileRect {
	/// Create a new instance of [NamedTileRect]
	pub fn new(name: &str, rect: TileRect) -> Self {
		NamedTileRect {
			name: name.to_string(),
			rect,
		}
	}
}

/// A connected open area unreachable from the spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Island {
	/// First tile of the area in row-major order
	pub origin: TileCoord,
	/// Number of tiles in the area
	pub size: usize,
}

/// Findings of [MapValidator::validate]
#[derive(Debug, Clone, PartialEq)]
pub struct MapReport {
	/// Spawn after correction
	pub spawn: TileCoord,
	/// Whether the requested spawn was blocked and had to move
	pub spawn_relocated: bool,
	/// Open tiles on the map
	pub walkable: usize,
	/// Open tiles reachable from the spawn
	pub reachable: usize,
	/// Open areas cut off from the spawn
	pub islands: Vec<Island>,
	/// Reachable tiles with exactly two open neighbours on opposite sides
	pub chokepoints: Vec<TileCoord>,
	/// Names of objects whose centre tile can't be reached or stood beside
	pub unreachable_objects: Vec<String>,
}

impl MapReport {
	/// Whether every open tile and object can be reached
	pub fn is_fully_connected(&self) -> bool {
		self.islands.is_empty() && self.unreachable_objects.is_empty()
	}
}

/// Connectivity checks over a [TileGrid]
pub struct MapValidator;

impl MapValidator {
	/// Validate the grid from a requested spawn tile
	pub fn validate(
		grid: &TileGrid,
		spawn: TileCoord,
		objects: &[NamedTileRect],
		planner: &PathPlanner,
	) -> Result<MapReport, CollisionError> {
		let corrected = planner.nearest_walkable_checked(grid, spawn)?;
		let spawn_relocated = corrected != spawn;
		if spawn_relocated {
			warn!("Spawn ({}) is blocked, moved to ({})", spawn, corrected);
		}
		let columns = grid.get_columns();
		let rows = grid.get_rows();
		let index = |t: TileCoord| t.1 as usize * columns as usize + t.0 as usize;
		let mut region = vec![None; columns as usize * rows as usize];
		// label the spawn's region 0 and every other open area after it
		let spawn_size = flood(grid, corrected, 0, &mut region);
		let mut islands = Vec::new();
		let mut walkable = spawn_size;
		for (tile, blocked) in grid.iter() {
			if blocked || region[index(tile)].is_some() {
				continue;
			}
			let size = flood(grid, tile, islands.len() + 1, &mut region);
			walkable += size;
			islands.push(Island { origin: tile, size });
		}
		let is_open = |c: i64, r: i64| {
			c >= 0
				&& r >= 0 && c < columns as i64
				&& r < rows as i64
				&& !grid.is_blocked(TileCoord(c as u32, r as u32))
		};
		let mut chokepoints = Vec::new();
		for (tile, blocked) in grid.iter() {
			if blocked || region[index(tile)] != Some(0) {
				continue;
			}
			let (c, r) = (tile.0 as i64, tile.1 as i64);
			let north = is_open(c, r - 1);
			let east = is_open(c + 1, r);
			let south = is_open(c, r + 1);
			let west = is_open(c - 1, r);
			if (north && south && !east && !west) || (east && west && !north && !south) {
				chokepoints.push(tile);
			}
		}
		let mut unreachable_objects = Vec::new();
		for object in objects.iter() {
			// a blocked centre (a chest, a well) is reached by standing beside it
			let centre = object.rect.centre_tile();
			let reachable = grid.contains(centre)
				&& (region[index(centre)] == Some(0)
					|| Ordinal::get_orthogonal_neighbours(centre, columns, rows)
						.iter()
						.any(|n| region[index(*n)] == Some(0)));
			if !reachable {
				unreachable_objects.push(object.name.clone());
			}
		}
		let report = MapReport {
			spawn: corrected,
			spawn_relocated,
			walkable,
			reachable: spawn_size,
			islands,
			chokepoints,
			unreachable_objects,
		};
		info!(
			"Map validation: {}/{} open tiles reachable, {} islands, {} chokepoints, {} unreachable objects",
			report.reachable,
			report.walkable,
			report.islands.len(),
			report.chokepoints.len(),
			report.unreachable_objects.len()
		);
		Ok(report)
	}
}

/// Label every open tile 4-connected to `start` with `label`, returning how
/// many were labelled
fn flood(grid: &TileGrid, start: TileCoord, label: usize, region: &mut [Option<usize>]) -> usize {
	let columns = grid.get_columns();
	let rows = grid.get_rows();
	let index = |t: TileCoord| t.1 as usize * columns as usize + t.0 as usize;
	let mut queue = VecDeque::from([start]);
	region[index(start)] = Some(label);
	let mut count = 0;
	while let Some(tile) = queue.pop_front() {
		count += 1;
		for n in Ordinal::get_orthogonal_neighbours(tile, columns, rows) {
			if !grid.is_blocked(n) && region[index(n)].is_none() {
				region[index(n)] = Some(label);
				queue.push_back(n);
			}
		}
	}
	count
}
