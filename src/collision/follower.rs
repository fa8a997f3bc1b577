//! Walks an autonomous agent along a [Path], one fixed tick at a time.
//!
//! Each tick the follower steps towards the centre of its next waypoint,
//! hands the step to the [TileGuard] and advances once the waypoint is
//! reached. It asks for a new path when:
//!
//! - the grid was replaced since the path was planned (sub-cell edits keep
//!   the path, the guard still checks every step against them)
//! - the agent has been pushed more than a tile away from the segment it is
//!   walking
//! - the agent stopped making progress (it is stuck against something the
//!   coarse grid doesn't know about)
//!

use bevy::prelude::*;

use crate::prelude::*;

/// Why a follower wants a new path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplanReason {
	/// The grid changed
	Stale,
	/// The agent is too far from its path
	OffPath,
	/// The agent hasn't moved far enough for a while
	Stuck,
}

/// What happened during one tick of following
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FollowStep {
	/// No path to follow
	Idle,
	/// Moved to the position
	Moved(Vec2),
	/// The step was rejected, the agent is back on the position
	Blocked(Vec2),
	/// Reached the end of the path at the position
	Arrived(Vec2),
	/// The path can't be trusted any more
	NeedsReplan(ReplanReason),
}

/// Path following state of an autonomous agent
#[derive(Component, Debug, Clone, PartialEq)]
pub struct PathFollower {
	/// Tile the agent is heading for
	destination: Option<TileCoord>,
	/// Path being walked
	path: Option<Path>,
	/// Index of the waypoint being walked to
	next: usize,
	/// World units per second
	speed: f32,
	/// Seconds walked since `anchor` was recorded
	stuck_timer: f32,
	/// Position progress is measured from
	anchor: Option<Vec2>,
}

impl PathFollower {
	/// Create a new instance of [PathFollower] moving at `speed` world units
	/// per second
	pub fn new(speed: f32) -> Self {
		PathFollower {
			destination: None,
			path: None,
			next: 0,
			speed,
			stuck_timer: 0.0,
			anchor: None,
		}
	}
	/// Get the speed
	pub fn get_speed(&self) -> f32 {
		self.speed
	}
	/// Get the destination tile
	pub fn get_destination(&self) -> Option<TileCoord> {
		self.destination
	}
	/// Get the path being walked
	pub fn get_path(&self) -> Option<&Path> {
		self.path.as_ref()
	}
	/// Get the index of the waypoint being walked to
	pub fn get_next_waypoint(&self) -> usize {
		self.next
	}
	/// Head for a new destination, the path is planned separately
	pub fn set_destination(&mut self, destination: TileCoord) {
		self.destination = Some(destination);
		self.path = None;
	}
	/// Start walking a freshly planned path
	pub fn set_path(&mut self, path: Path) {
		self.destination = path.target();
		self.path = Some(path);
		self.next = 0;
		self.stuck_timer = 0.0;
		self.anchor = None;
	}
	/// Drop the current path but remember the destination
	pub fn drop_path(&mut self) {
		self.path = None;
		self.next = 0;
		self.stuck_timer = 0.0;
		self.anchor = None;
	}
	/// Stop following altogether
	pub fn clear(&mut self) {
		self.drop_path();
		self.destination = None;
	}
	/// Whether a destination is set but there's no path to it
	pub fn needs_path(&self) -> bool {
		self.destination.is_some() && self.path.is_none()
	}
	/// Walk for `delta` seconds from `position`
	#[allow(clippy::too_many_arguments)]
	pub fn advance(
		&mut self,
		position: Vec2,
		delta: f32,
		dimensions: &MapDimensions,
		guard: &TileGuard,
		body: &AgentBody,
		movement: &mut MovementGuard,
		config: &FollowerConfig,
	) -> FollowStep {
		let Some(path) = self.path.as_ref() else {
			return FollowStep::Idle;
		};
		if path.is_stale(guard.get_grid()) {
			return FollowStep::NeedsReplan(ReplanReason::Stale);
		}
		let tiles = path.get_tiles();
		// already standing in the first tile, head straight for the second
		if self.next == 0
			&& tiles.len() > 1
			&& dimensions.get_tile_from_world(position).ok() == tiles.first().copied()
		{
			self.next = 1;
		}
		let Some(waypoint) = tiles.get(self.next) else {
			self.destination = None;
			self.drop_path();
			return FollowStep::Arrived(position);
		};
		let target = dimensions.get_tile_centre(*waypoint);
		let start = if self.next == 0 {
			target
		} else {
			dimensions.get_tile_centre(tiles[self.next - 1])
		};
		if distance_to_segment(position, start, target) > config.max_deviation {
			return FollowStep::NeedsReplan(ReplanReason::OffPath);
		}
		let offset = target - position;
		let reach = self.speed * delta;
		let attempted = if offset.length() <= reach {
			target
		} else {
			position + offset.normalize_or_zero() * reach
		};
		let outcome = guard.validate_move(body, movement, attempted);
		let resolved = outcome.resolved_position();
		if resolved.distance(target) <= config.arrival_distance {
			self.next += 1;
			if self.next >= tiles.len() {
				self.destination = None;
				self.drop_path();
				return FollowStep::Arrived(resolved);
			}
		}
		let anchor = *self.anchor.get_or_insert(position);
		self.stuck_timer += delta;
		if self.stuck_timer >= config.stuck_seconds {
			if resolved.distance(anchor) < config.stuck_distance {
				self.stuck_timer = 0.0;
				self.anchor = None;
				return FollowStep::NeedsReplan(ReplanReason::Stuck);
			}
			self.stuck_timer = 0.0;
			self.anchor = Some(resolved);
		}
		if outcome.is_accepted() {
			FollowStep::Moved(resolved)
		} else {
			FollowStep::Blocked(resolved)
		}
	}
}

/// Shortest distance from `point` to the segment `a` to `b`
fn distance_to_segment(point: Vec2, a: Vec2, b: Vec2) -> f32 {
	let ab = b - a;
	let length_squared = ab.length_squared();
	if length_squared == 0.0 {
		return point.distance(a);
	}
	let t = ((point - a).dot(ab) / length_squared).clamp(0.0, 1.0);
	point.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Plan across a 3x1 strip
	fn strip() -> (MapDimensions, TileGrid, SubCellStore, OverrideZones) {
		(
			MapDimensions::new(3, 1),
			TileGrid::new(3, 1),
			SubCellStore::new(),
			OverrideZones::default(),
		)
	}
	#[test]
	fn walks_to_the_end() {
		let (dims, grid, store, zones) = strip();
		let path = PathPlanner::default()
			.find_path(&grid, TileCoord(0, 0), TileCoord(2, 0))
			.unwrap();
		let guard = TileGuard::new(&dims, &grid, &store, &zones);
		let body = AgentBody::circle(4.0);
		let mut position = Vec2::new(10.0, 12.0);
		let mut movement = MovementGuard::new(position);
		let mut follower = PathFollower::new(64.0);
		follower.set_path(path);
		let config = FollowerConfig::default();
		let mut arrived = false;
		for _ in 0..100 {
			match follower.advance(position, 0.125, &dims, &guard, &body, &mut movement, &config) {
				FollowStep::Moved(p) | FollowStep::Blocked(p) => position = p,
				FollowStep::Arrived(p) => {
					position = p;
					arrived = true;
					break;
				}
				other => panic!("unexpected {:?}", other),
			}
		}
		assert!(arrived);
		assert_eq!(Vec2::new(80.0, 16.0), position);
		assert!(follower.get_path().is_none());
		assert!(!follower.needs_path());
		assert_eq!(
			FollowStep::Idle,
			follower.advance(position, 0.125, &dims, &guard, &body, &mut movement, &config)
		);
	}
	#[test]
	fn mask_edit_keeps_the_path() {
		let (dims, grid, mut store, zones) = strip();
		let path = PathPlanner::default()
			.find_path(&grid, TileCoord(0, 0), TileCoord(2, 0))
			.unwrap();
		let mut follower = PathFollower::new(64.0);
		follower.set_path(path);
		store.set(TileCoord(1, 0), SubCellMask(0x0660), Provenance::Authored);
		let guard = TileGuard::new(&dims, &grid, &store, &zones);
		let mut movement = MovementGuard::new(Vec2::new(16.0, 16.0));
		let result = follower.advance(
			Vec2::new(16.0, 16.0),
			0.125,
			&dims,
			&guard,
			&AgentBody::circle(4.0),
			&mut movement,
			&FollowerConfig::default(),
		);
		assert_eq!(FollowStep::Moved(Vec2::new(24.0, 16.0)), result);
		assert!(follower.get_path().is_some());
	}
	#[test]
	fn stale_after_grid_rebuild() {
		let (dims, grid, store, zones) = strip();
		let path = PathPlanner::default()
			.find_path(&grid, TileCoord(0, 0), TileCoord(2, 0))
			.unwrap();
		let mut follower = PathFollower::new(64.0);
		follower.set_path(path);
		let rebuilt = TileGrid::from_ascii(&[".x."]).unwrap();
		let guard = TileGuard::new(&dims, &rebuilt, &store, &zones);
		let mut movement = MovementGuard::new(Vec2::new(16.0, 16.0));
		let result = follower.advance(
			Vec2::new(16.0, 16.0),
			0.125,
			&dims,
			&guard,
			&AgentBody::circle(4.0),
			&mut movement,
			&FollowerConfig::default(),
		);
		assert_eq!(FollowStep::NeedsReplan(ReplanReason::Stale), result);
	}
	#[test]
	fn new_path_does_not_walk_back_to_the_first_centre() {
		let (dims, grid, store, zones) = strip();
		let path = PathPlanner::default()
			.find_path(&grid, TileCoord(0, 0), TileCoord(2, 0))
			.unwrap();
		let guard = TileGuard::new(&dims, &grid, &store, &zones);
		// near the east edge of the first tile
		let position = Vec2::new(28.0, 16.0);
		let mut movement = MovementGuard::new(position);
		let mut follower = PathFollower::new(64.0);
		follower.set_path(path);
		let result = follower.advance(
			position,
			0.125,
			&dims,
			&guard,
			&AgentBody::circle(4.0),
			&mut movement,
			&FollowerConfig::default(),
		);
		assert_eq!(FollowStep::Moved(Vec2::new(36.0, 16.0)), result);
		assert_eq!(1, follower.get_next_waypoint());
	}
	#[test]
	fn pushed_off_path() {
		let dims = MapDimensions::new(3, 3);
		let grid = TileGrid::new(3, 3);
		let store = SubCellStore::new();
		let zones = OverrideZones::default();
		let path = PathPlanner::default()
			.find_path(&grid, TileCoord(0, 0), TileCoord(2, 0))
			.unwrap();
		let mut follower = PathFollower::new(64.0);
		follower.set_path(path);
		let guard = TileGuard::new(&dims, &grid, &store, &zones);
		let far = Vec2::new(16.0, 80.0);
		let mut movement = MovementGuard::new(far);
		let result = follower.advance(
			far,
			0.125,
			&dims,
			&guard,
			&AgentBody::circle(4.0),
			&mut movement,
			&FollowerConfig::default(),
		);
		assert_eq!(FollowStep::NeedsReplan(ReplanReason::OffPath), result);
	}
	#[test]
	fn stuck_against_solid_sub_cells() {
		// the grid is open but every sub-cell of the middle tile is solid
		let (dims, grid, mut store, zones) = strip();
		store.set(TileCoord(1, 0), SubCellMask::FULL, Provenance::Authored);
		let path = PathPlanner::default()
			.find_path(&grid, TileCoord(0, 0), TileCoord(2, 0))
			.unwrap();
		let config = GuardConfig {
			sub_cells_add_blocking: true,
			..default()
		};
		let guard = TileGuard::new(&dims, &grid, &store, &zones).with_config(config);
		let body = AgentBody::circle(4.0);
		let mut position = Vec2::new(16.0, 16.0);
		let mut movement = MovementGuard::new(position);
		let mut follower = PathFollower::new(32.0);
		follower.set_path(path);
		let mut stuck = false;
		for _ in 0..40 {
			match follower.advance(
				position,
				0.125,
				&dims,
				&guard,
				&body,
				&mut movement,
				&FollowerConfig::default(),
			) {
				FollowStep::Moved(p) | FollowStep::Blocked(p) => position = p,
				FollowStep::NeedsReplan(ReplanReason::Stuck) => {
					stuck = true;
					break;
				}
				other => panic!("unexpected {:?}", other),
			}
		}
		assert!(stuck);
		assert!(position.x < 32.0);
	}
	#[test]
	fn segment_distance() {
		let a = Vec2::new(0.0, 0.0);
		let b = Vec2::new(10.0, 0.0);
		assert_eq!(3.0, distance_to_segment(Vec2::new(5.0, 3.0), a, b));
		assert_eq!(5.0, distance_to_segment(Vec2::new(13.0, 4.0), a, b));
		assert_eq!(2.0, distance_to_segment(Vec2::new(0.0, 2.0), a, a));
	}
}
