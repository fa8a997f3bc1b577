//! Systems keeping agents out of walls: every tick the movement an agent
//! intends is run through the [TileGuard] and rolled back if it would leave
//! the agent standing somewhere blocked
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Position of an agent in map space, origin at the top-left corner of the
/// map with `y` growing downwards
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Reflect)]
pub struct MapPosition(pub Vec2);

/// Movement an agent intends to make in world units per second, consumed by
/// the guard each tick
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Reflect)]
pub struct AgentVelocity(pub Vec2);

/// Put an agent down at a new position, a blocked position is corrected to
/// the centre of the nearest open tile
#[derive(Event)]
pub struct EventRespawnAgent {
	/// The agent
	entity: Entity,
	/// Where it should appear
	position: Vec2,
}

impl EventRespawnAgent {
	/// Create a new instance of [EventRespawnAgent]
	pub fn new(entity: Entity, position: Vec2) -> Self {
		EventRespawnAgent { entity, position }
	}
	/// Get the agent
	pub fn get_entity(&self) -> Entity {
		self.entity
	}
	/// Get the requested position
	pub fn get_position(&self) -> Vec2 {
		self.position
	}
}

/// Emitted when the guard turns down a move
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct EventMoveRejected {
	/// The agent
	pub entity: Entity,
	/// Where the agent tried to go
	pub attempted: Vec2,
	/// First sample point that was blocked
	pub blocked_at: Vec2,
	/// Rule that blocked it
	pub rule: WalkRule,
}

/// Components of the map entity the guard reads
pub type MapQueryData<'a> = (
	&'a MapDimensions,
	&'a TileGrid,
	&'a SubCellStore,
	&'a OverrideZones,
	Option<&'a TileArt>,
);

/// Build the read-only view of the single map in the world
pub fn collision_map<'a>(
	(dimensions, grid, store, zones, art): (
		&'a MapDimensions,
		&'a TileGrid,
		&'a SubCellStore,
		&'a OverrideZones,
		Option<&'a TileArt>,
	),
	settings: &TileGuardSettings,
) -> CollisionMap<'a> {
	let map = CollisionMap::new(dimensions, grid, store, zones).with_settings(*settings);
	match art {
		Some(art) => map.with_art(art),
		None => map,
	}
}

/// Read [EventRespawnAgent] and move agents, forgetting their previous safe
/// position
#[cfg(not(tarpaulin_include))]
pub fn respawn_agents(
	mut events: EventReader<EventRespawnAgent>,
	map_q: Query<MapQueryData>,
	mut agent_q: Query<(
		&mut MapPosition,
		&mut MovementGuard,
		Option<&mut AgentVelocity>,
		Option<&mut PathFollower>,
	)>,
	settings: Res<TileGuardSettings>,
) {
	if events.is_empty() {
		return;
	}
	let Ok(map_data) = map_q.single() else {
		warn!("Respawn requested without exactly one collision map");
		events.clear();
		return;
	};
	let map = collision_map(map_data, &settings);
	for event in events.read() {
		let Ok((mut position, mut guard, velocity, follower)) = agent_q.get_mut(event.entity)
		else {
			warn!("Respawn requested for {:?} which is not an agent", event.entity);
			continue;
		};
		let spawn = if map.is_walkable(event.position) {
			event.position
		} else if let Some(corrected) = map.nearest_walkable_world(event.position) {
			debug!(
				"Spawn {:?} of {:?} is blocked, moved to {:?}",
				event.position, event.entity, corrected
			);
			corrected
		} else {
			error!(
				"No walkable tile near {:?}, {:?} stays where it is",
				event.position, event.entity
			);
			continue;
		};
		position.0 = spawn;
		guard.reset(spawn);
		if let Some(mut velocity) = velocity {
			velocity.0 = Vec2::ZERO;
		}
		if let Some(mut follower) = follower {
			follower.clear();
		}
	}
}

/// Apply the velocity of every steered agent for one fixed step, rejecting
/// moves the guard won't allow. A rejected agent is put back on its last
/// safe position and stops
#[cfg(not(tarpaulin_include))]
pub fn guard_agent_movement(
	map_q: Query<MapQueryData>,
	mut agent_q: Query<
		(
			Entity,
			&mut MapPosition,
			&mut AgentVelocity,
			&AgentBody,
			&mut MovementGuard,
		),
		Without<PathFollower>,
	>,
	settings: Res<TileGuardSettings>,
	time: Res<Time<Fixed>>,
	mut rejected: EventWriter<EventMoveRejected>,
) {
	let Ok(map_data) = map_q.single() else {
		return;
	};
	let map = collision_map(map_data, &settings);
	let guard = map.guard();
	let delta = time.timestep().as_secs_f32();
	for (entity, mut position, mut velocity, body, mut movement) in agent_q.iter_mut() {
		if velocity.0 == Vec2::ZERO {
			continue;
		}
		let attempted = position.0 + velocity.0 * delta;
		match guard.validate_move(body, &mut movement, attempted) {
			MoveOutcome::Accepted(p) => position.0 = p,
			MoveOutcome::Rejected {
				rollback,
				blocked_at,
				rule,
			} => {
				position.0 = rollback;
				velocity.0 = Vec2::ZERO;
				rejected.write(EventMoveRejected {
					entity,
					attempted,
					blocked_at,
					rule,
				});
			}
		}
	}
}
