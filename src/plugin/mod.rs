//! Defines the Bevy [Plugin] for TileGuard
//!
//! Every system runs in [FixedUpdate] in three ordered sets:
//!
//! 1. [GuardSet::Mutate] applies authoring events and steps a running
//!    boundary shrink, so the collision data only ever changes here, one
//!    whole tile mask at a time
//! 2. [GuardSet::Guard] validates the movement of every agent
//! 3. [GuardSet::Plan] plans and replans paths of autonomous agents
//!

use crate::prelude::*;
use bevy::prelude::*;

pub mod authoring_layer;
pub mod guard_layer;
pub mod path_layer;

/// Ordering of the plugin systems within a fixed tick
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum GuardSet {
	/// Collision data changes
	Mutate,
	/// Movement validation
	Guard,
	/// Path planning
	Plan,
}

/// Collision and pathfinding for 2d tile maps. Insert a [TileGuardSettings]
/// resource before adding the plugin to override the defaults
pub struct TileGuardPlugin;

impl Plugin for TileGuardPlugin {
	#[cfg(not(tarpaulin_include))]
	fn build(&self, app: &mut App) {
		app.register_type::<TileCoord>()
			.register_type::<SubCellMask>()
			.register_type::<MapDimensions>()
			.register_type::<MapPosition>()
			.register_type::<AgentVelocity>()
			.init_resource::<TileGuardSettings>()
			.add_event::<authoring_layer::EventToggleSubCell>()
			.add_event::<authoring_layer::EventScanRegion>()
			.add_event::<authoring_layer::EventRunGlobalShrink>()
			.add_event::<authoring_layer::EventShrinkProgress>()
			.add_event::<authoring_layer::EventShrinkFinished>()
			.add_event::<guard_layer::EventRespawnAgent>()
			.add_event::<guard_layer::EventMoveRejected>()
			.add_event::<path_layer::EventPathRequest>()
			.add_event::<path_layer::EventPathFailed>()
			.configure_sets(
				FixedUpdate,
				(GuardSet::Mutate, GuardSet::Guard, GuardSet::Plan).chain(),
			)
			.add_systems(
				FixedUpdate,
				(
					(
						authoring_layer::process_toggle_events,
						authoring_layer::process_scan_events,
						authoring_layer::start_global_shrink,
						authoring_layer::step_global_shrink,
						#[cfg(feature = "ron")]
						authoring_layer::autosave_collision,
					)
						.chain()
						.in_set(GuardSet::Mutate),
					(
						guard_layer::respawn_agents,
						guard_layer::guard_agent_movement,
						path_layer::follow_paths,
					)
						.chain()
						.in_set(GuardSet::Guard),
					(
						path_layer::process_path_requests,
						path_layer::replan_paths,
					)
						.chain()
						.in_set(GuardSet::Plan),
				),
			);
	}
}
