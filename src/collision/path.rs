//! Tile level path planning for autonomous agents.
//!
//! [PathPlanner::find_path] runs A* over the [TileGrid] with 4-directional
//! movement and a Manhattan heuristic. When two open nodes score the same the
//! one queued first is expanded first, so identical inputs always give the
//! identical path.
//!
//! [PathPlanner::nearest_walkable] searches outward from a (usually blocked)
//! tile breadth first for the closest open tile, used to correct spawn
//! points and to recover agents pushed into walls. The search walks through
//! blocked tiles and visits neighbours north, east, south then west.
//!
//! Paths are planned on the coarse grid only, agents following them are still
//! checked at sub-cell precision by the [crate::prelude::TileGuard].
//!

use std::{
	cmp::Reverse,
	collections::{BinaryHeap, VecDeque},
};

use bevy::prelude::*;

use crate::prelude::*;

/// Tuning of the planner
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerConfig {
	/// Optional cap on the number of nodes A* may expand
	pub max_expansions: Option<usize>,
	/// Number of tiles the nearest walkable search may visit
	pub nearest_walkable_budget: usize,
}

impl Default for PlannerConfig {
	fn default() -> Self {
		PlannerConfig {
			max_expansions: None,
			nearest_walkable_budget: 1024,
		}
	}
}

/// An ordered series of tiles from a source to a target, stamped with the
/// revision of the grid it was planned on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
	/// Tiles from source to target inclusive
	tiles: Vec<TileCoord>,
	/// Revision of the [TileGrid] the path was planned on
	grid_revision: u64,
}

impl Path {
	/// Create a new instance of [Path]
	pub fn new(tiles: Vec<TileCoord>, grid_revision: u64) -> Self {
		Path {
			tiles,
			grid_revision,
		}
	}
	/// Get the tiles
	pub fn get_tiles(&self) -> &[TileCoord] {
		&self.tiles
	}
	/// Number of tiles
	pub fn len(&self) -> usize {
		self.tiles.len()
	}
	/// Whether the path has no tiles
	pub fn is_empty(&self) -> bool {
		self.tiles.is_empty()
	}
	/// Tile the path starts on
	pub fn source(&self) -> Option<TileCoord> {
		self.tiles.first().copied()
	}
	/// Tile the path ends on
	pub fn target(&self) -> Option<TileCoord> {
		self.tiles.last().copied()
	}
	/// Whether the grid changed since the path was planned. Sub-cell edits
	/// never stale a path, the planner only reads the grid
	pub fn is_stale(&self, grid: &TileGrid) -> bool {
		self.grid_revision != grid.get_revision()
	}
}

/// A* and nearest walkable searches over a [TileGrid]
#[derive(Debug, Clone, Copy, Default)]
pub struct PathPlanner {
	/// Search limits
	config: PlannerConfig,
}

impl PathPlanner {
	/// Create a new instance of [PathPlanner]
	pub fn new(config: PlannerConfig) -> Self {
		PathPlanner { config }
	}
	/// Plan a path between two tiles, [None] when either end is blocked or
	/// the target can't be reached
	pub fn find_path(&self, grid: &TileGrid, source: TileCoord, target: TileCoord) -> Option<Path> {
		if grid.is_blocked(source) || grid.is_blocked(target) {
			return None;
		}
		let columns = grid.get_columns() as usize;
		let index = |t: TileCoord| t.1 as usize * columns + t.0 as usize;
		let tile_count = columns * grid.get_rows() as usize;
		let mut g_score = vec![u32::MAX; tile_count];
		let mut came_from: Vec<Option<TileCoord>> = vec![None; tile_count];
		let mut closed = vec![false; tile_count];
		// ordered by (f score, insertion order) so ties resolve first come first served
		let mut open = BinaryHeap::new();
		let mut insertion: u64 = 0;
		g_score[index(source)] = 0;
		open.push(Reverse((source.manhattan(&target), insertion, source)));
		let mut expansions = 0;
		while let Some(Reverse((_, _, current))) = open.pop() {
			if current == target {
				let mut tiles = vec![current];
				let mut step = current;
				while let Some(previous) = came_from[index(step)] {
					tiles.push(previous);
					step = previous;
				}
				tiles.reverse();
				return Some(Path::new(tiles, grid.get_revision()));
			}
			if closed[index(current)] {
				continue;
			}
			closed[index(current)] = true;
			expansions += 1;
			if let Some(limit) = self.config.max_expansions {
				if expansions > limit {
					debug!(
						"Path search from ({}) to ({}) gave up after {} expansions",
						source, target, limit
					);
					return None;
				}
			}
			let g = g_score[index(current)];
			for n in Ordinal::get_orthogonal_neighbours(current, grid.get_columns(), grid.get_rows()) {
				if grid.is_blocked(n) || closed[index(n)] {
					continue;
				}
				let tentative = g + 1;
				if tentative < g_score[index(n)] {
					g_score[index(n)] = tentative;
					came_from[index(n)] = Some(current);
					insertion += 1;
					open.push(Reverse((tentative + n.manhattan(&target), insertion, n)));
				}
			}
		}
		None
	}
	/// As [PathPlanner::find_path] but reporting why no path exists
	pub fn find_path_checked(
		&self,
		grid: &TileGrid,
		source: TileCoord,
		target: TileCoord,
	) -> Result<Path, CollisionError> {
		if !grid.contains(source) {
			return Err(CollisionError::TileOutOfBounds(source));
		}
		if !grid.contains(target) {
			return Err(CollisionError::TileOutOfBounds(target));
		}
		self.find_path(grid, source, target)
			.ok_or(CollisionError::PathNotFound { source, target })
	}
	/// Plan between two world positions
	pub fn find_path_world(
		&self,
		dimensions: &MapDimensions,
		grid: &TileGrid,
		from: Vec2,
		to: Vec2,
	) -> Result<Path, CollisionError> {
		let source = dimensions.get_tile_from_world(from)?;
		let target = dimensions.get_tile_from_world(to)?;
		self.find_path_checked(grid, source, target)
	}
	/// The closest open tile to `origin` by breadth first search, `origin`
	/// itself when it is open. An origin outside of the grid is clamped onto
	/// it first. [None] once the search budget is spent
	pub fn nearest_walkable(&self, grid: &TileGrid, origin: TileCoord) -> Option<TileCoord> {
		self.nearest_walkable_checked(grid, origin).ok()
	}
	/// As [PathPlanner::nearest_walkable] but reporting an exhausted search
	pub fn nearest_walkable_checked(
		&self,
		grid: &TileGrid,
		origin: TileCoord,
	) -> Result<TileCoord, CollisionError> {
		let columns = grid.get_columns();
		let rows = grid.get_rows();
		if columns == 0 || rows == 0 {
			return Err(CollisionError::SpawnRecoveryExhausted { origin, visited: 0 });
		}
		let start = TileCoord(origin.0.min(columns - 1), origin.1.min(rows - 1));
		let budget = self.config.nearest_walkable_budget.max(1);
		let mut visited = vec![false; columns as usize * rows as usize];
		let index = |t: TileCoord| t.1 as usize * columns as usize + t.0 as usize;
		let mut queue = VecDeque::new();
		visited[index(start)] = true;
		queue.push_back(start);
		let mut count = 0;
		while let Some(tile) = queue.pop_front() {
			if !grid.is_blocked(tile) {
				return Ok(tile);
			}
			count += 1;
			if count >= budget {
				break;
			}
			for n in Ordinal::get_orthogonal_neighbours(tile, columns, rows) {
				if !visited[index(n)] {
					visited[index(n)] = true;
					queue.push_back(n);
				}
			}
		}
		debug!("No walkable tile found near ({}) within {} tiles", origin, count);
		Err(CollisionError::SpawnRecoveryExhausted {
			origin,
			visited: count,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn straight_line() {
		let grid = TileGrid::new(5, 1);
		let path = PathPlanner::default()
			.find_path(&grid, TileCoord(0, 0), TileCoord(4, 0))
			.unwrap();
		let actual: Vec<TileCoord> = (0..5).map(|c| TileCoord(c, 0)).collect();
		assert_eq!(actual, path.get_tiles());
	}
	#[test]
	fn around_a_wall() {
		//  ______________
		// |S_|__|x_|__|T_|
		// |__|__|x_|__|__|
		// |__|__|__|__|__|
		let grid = TileGrid::from_ascii(&["..x..", "..x..", "....."]).unwrap();
		let path = PathPlanner::default()
			.find_path(&grid, TileCoord(0, 0), TileCoord(4, 0))
			.unwrap();
		assert_eq!(Some(TileCoord(0, 0)), path.source());
		assert_eq!(Some(TileCoord(4, 0)), path.target());
		// shortest detour is 4 east plus 2 down and 2 up
		assert_eq!(9, path.len());
		assert!(path.get_tiles().iter().all(|t| !grid.is_blocked(*t)));
		for pair in path.get_tiles().windows(2) {
			assert_eq!(1, pair[0].manhattan(&pair[1]));
		}
	}
	#[test]
	fn enclosed_target() {
		//  ______________
		// |S_|__|x_|x_|x_|
		// |__|__|x_|T_|x_|
		// |__|__|x_|x_|x_|
		let grid = TileGrid::from_ascii(&["..xxx", "..x.x", "..xxx"]).unwrap();
		let planner = PathPlanner::default();
		assert_eq!(None, planner.find_path(&grid, TileCoord(0, 0), TileCoord(3, 1)));
		assert_eq!(
			Err(CollisionError::PathNotFound {
				source: TileCoord(0, 0),
				target: TileCoord(3, 1)
			}),
			planner.find_path_checked(&grid, TileCoord(0, 0), TileCoord(3, 1))
		);
	}
	#[test]
	fn blocked_target() {
		let grid = TileGrid::from_ascii(&["..x"]).unwrap();
		assert_eq!(None, PathPlanner::default().find_path(&grid, TileCoord(0, 0), TileCoord(2, 0)));
	}
	#[test]
	fn deterministic() {
		let grid = TileGrid::from_ascii(&[".....", ".x.x.", ".....", ".x.x.", "....."]).unwrap();
		let planner = PathPlanner::default();
		let first = planner.find_path(&grid, TileCoord(0, 0), TileCoord(4, 4)).unwrap();
		for _ in 0..10 {
			let again = planner.find_path(&grid, TileCoord(0, 0), TileCoord(4, 4)).unwrap();
			assert_eq!(first.get_tiles(), again.get_tiles());
		}
	}
	#[test]
	fn expansion_limit() {
		let grid = TileGrid::new(50, 50);
		let planner = PathPlanner::new(PlannerConfig {
			max_expansions: Some(10),
			..Default::default()
		});
		assert_eq!(None, planner.find_path(&grid, TileCoord(0, 0), TileCoord(49, 49)));
	}
	#[test]
	fn same_tile() {
		let grid = TileGrid::new(3, 3);
		let path = PathPlanner::default()
			.find_path(&grid, TileCoord(1, 1), TileCoord(1, 1))
			.unwrap();
		assert_eq!(vec![TileCoord(1, 1)], path.get_tiles());
	}
	#[test]
	fn nearest_walkable_below() {
		// everything is blocked apart from (5, 6), directly south of (5, 5)
		let mut rows = vec!["xxxxxxxx"; 10];
		rows[6] = "xxxxx.xx";
		let grid = TileGrid::from_ascii(&rows).unwrap();
		let result = PathPlanner::default().nearest_walkable(&grid, TileCoord(5, 5));
		assert_eq!(Some(TileCoord(5, 6)), result);
	}
	#[test]
	fn nearest_walkable_open_origin() {
		let grid = TileGrid::new(3, 3);
		let result = PathPlanner::default().nearest_walkable(&grid, TileCoord(1, 1));
		assert_eq!(Some(TileCoord(1, 1)), result);
	}
	#[test]
	fn nearest_walkable_tie_order() {
		//  ________
		// |._|x_|._|
		// |x_|o_|x_|
		// |._|x_|._|
		// every corner is two steps away, the north neighbour is searched
		// first and its east side before its west
		let grid = TileGrid::from_ascii(&[".x.", "xxx", ".x."]).unwrap();
		let result = PathPlanner::default().nearest_walkable(&grid, TileCoord(1, 1));
		assert_eq!(Some(TileCoord(2, 0)), result);
	}
	#[test]
	fn nearest_walkable_exhausted() {
		let grid = TileGrid::from_ascii(&["xxxxx", "xxxxx", "xxxxx"]).unwrap();
		let planner = PathPlanner::new(PlannerConfig {
			nearest_walkable_budget: 4,
			..Default::default()
		});
		assert_eq!(
			Err(CollisionError::SpawnRecoveryExhausted {
				origin: TileCoord(2, 1),
				visited: 4
			}),
			planner.nearest_walkable_checked(&grid, TileCoord(2, 1))
		);
	}
	#[test]
	fn only_a_new_grid_stales_a_path() {
		let grid = TileGrid::new(3, 1);
		let mut store = SubCellStore::new();
		let path = PathPlanner::default()
			.find_path(&grid, TileCoord(0, 0), TileCoord(2, 0))
			.unwrap();
		assert!(!path.is_stale(&grid));
		store.set(TileCoord(1, 0), SubCellMask::FULL, Provenance::Authored);
		assert!(!path.is_stale(&grid));
		let rebuilt = TileGrid::new(3, 1);
		assert!(path.is_stale(&rebuilt));
	}
}
