//! Logic for autonomous agents: turning destination requests into [Path]s,
//! walking them through the guard and replanning when a path goes stale or
//! an agent gets stuck
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Ask an agent with a [PathFollower] to walk to a world position
#[derive(Event)]
pub struct EventPathRequest {
	/// The agent
	entity: Entity,
	/// Map space destination
	target: Vec2,
}

impl EventPathRequest {
	/// Create a new instance of [EventPathRequest]
	pub fn new(entity: Entity, target: Vec2) -> Self {
		EventPathRequest { entity, target }
	}
	/// Get the agent
	pub fn get_entity(&self) -> Entity {
		self.entity
	}
	/// Get the destination
	pub fn get_target(&self) -> Vec2 {
		self.target
	}
}

/// Emitted when an agent's destination can't be reached, the agent stops
#[derive(Event, Debug, Clone, PartialEq)]
pub struct EventPathFailed {
	/// The agent
	pub entity: Entity,
	/// Why
	pub error: CollisionError,
}

/// Plan a path for an agent standing at `position`, stamped with the
/// revision of the grid
fn plan_from(
	dimensions: &MapDimensions,
	grid: &TileGrid,
	settings: &TileGuardSettings,
	position: Vec2,
	destination: TileCoord,
) -> Result<Path, CollisionError> {
	let mut source = dimensions.get_tile_from_world(position)?;
	if grid.is_blocked(source) {
		// pushed into a wall, start from the closest open tile instead
		source = settings
			.planner()
			.nearest_walkable_checked(grid, source)?;
	}
	settings
		.planner()
		.find_path_checked(grid, source, destination)
}

/// Read [EventPathRequest], set destinations and plan the first path
#[cfg(not(tarpaulin_include))]
pub fn process_path_requests(
	mut events: EventReader<EventPathRequest>,
	map_q: Query<(&MapDimensions, &TileGrid)>,
	mut agent_q: Query<(&MapPosition, &mut PathFollower)>,
	settings: Res<TileGuardSettings>,
	mut failed: EventWriter<EventPathFailed>,
) {
	if events.is_empty() {
		return;
	}
	let Ok((dimensions, grid)) = map_q.single() else {
		warn!("Path requested without exactly one collision map");
		events.clear();
		return;
	};
	for event in events.read() {
		let Ok((position, mut follower)) = agent_q.get_mut(event.get_entity()) else {
			warn!("Path requested for {:?} which has no PathFollower", event.get_entity());
			continue;
		};
		let planned = dimensions
			.get_tile_from_world(event.get_target())
			.and_then(|destination| {
				follower.set_destination(destination);
				plan_from(dimensions, grid, &settings, position.0, destination)
			});
		match planned {
			Ok(path) => {
				debug!(
					"{:?} heading for ({:?}) over {} tiles",
					event.get_entity(),
					path.target(),
					path.len()
				);
				follower.set_path(path);
			}
			Err(error) => {
				debug!("{:?}: {}", event.get_entity(), error);
				follower.clear();
				failed.write(EventPathFailed {
					entity: event.get_entity(),
					error,
				});
			}
		}
	}
}

/// Plan again for every agent that dropped its path but still has a
/// destination
#[cfg(not(tarpaulin_include))]
pub fn replan_paths(
	map_q: Query<(&MapDimensions, &TileGrid)>,
	mut agent_q: Query<(Entity, &MapPosition, &mut PathFollower)>,
	settings: Res<TileGuardSettings>,
	mut failed: EventWriter<EventPathFailed>,
) {
	let Ok((dimensions, grid)) = map_q.single() else {
		return;
	};
	for (entity, position, mut follower) in agent_q.iter_mut() {
		if !follower.needs_path() {
			continue;
		}
		let Some(destination) = follower.get_destination() else {
			continue;
		};
		match plan_from(dimensions, grid, &settings, position.0, destination) {
			Ok(path) => follower.set_path(path),
			Err(error) => {
				warn!("{:?} can no longer reach ({}): {}", entity, destination, error);
				follower.clear();
				failed.write(EventPathFailed { entity, error });
			}
		}
	}
}

/// Walk every agent with a path one fixed step along it
#[cfg(not(tarpaulin_include))]
pub fn follow_paths(
	map_q: Query<MapQueryData>,
	mut agent_q: Query<(
		Entity,
		&mut MapPosition,
		&AgentBody,
		&mut MovementGuard,
		&mut PathFollower,
	)>,
	settings: Res<TileGuardSettings>,
	time: Res<Time<Fixed>>,
) {
	let Ok(map_data) = map_q.single() else {
		return;
	};
	let dimensions = map_data.0;
	let map = collision_map(map_data, &settings);
	let guard = map.guard();
	let delta = time.timestep().as_secs_f32();
	for (entity, mut position, body, mut movement, mut follower) in agent_q.iter_mut() {
		let step = follower.advance(
			position.0,
			delta,
			dimensions,
			&guard,
			body,
			&mut movement,
			&settings.follower,
		);
		match step {
			FollowStep::Idle => {}
			FollowStep::Moved(p) | FollowStep::Blocked(p) => position.0 = p,
			FollowStep::Arrived(p) => {
				position.0 = p;
				debug!("{:?} arrived at {:?}", entity, p);
			}
			FollowStep::NeedsReplan(reason) => {
				debug!("{:?} replanning: {:?}", entity, reason);
				follower.drop_path();
			}
		}
	}
}
