//! Drive the plugin systems tick by tick in a headless app
//!

use bevy::prelude::*;
use bevy_tile_guard_plugin::prelude::*;

/// A 6x3 map with a two tile wall in the middle
///
/// ```text
///  _________________
/// |__|__|__|__|__|__|
/// |__|__|x_|x_|__|__|
/// |__|__|__|__|__|__|
/// ```
fn setup() -> (App, Entity) {
	let mut app = App::new();
	app.add_plugins((MinimalPlugins, TileGuardPlugin));
	let dims = MapDimensions::new(6, 3);
	let grid = TileGrid::from_ascii(&["......", "..xx..", "......"]).unwrap();
	let mut art = TileArt::default();
	let walls = art.add_layer("walls", false);
	// only the left half of the first wall tile is drawn
	art.paint_rect(walls, TileCoord(2, 1), UVec2::ZERO, UVec2::new(16, 32), 255)
		.unwrap();
	art.fill_tile(walls, TileCoord(3, 1), 255).unwrap();
	let map = app
		.world_mut()
		.spawn(TileGuardBundle::from_grid(dims, grid).with_art(art))
		.id();
	(app, map)
}

/// Run the fixed schedule `ticks` times
fn tick(app: &mut App, ticks: usize) {
	for _ in 0..ticks {
		app.world_mut().run_schedule(FixedUpdate);
	}
}

#[test]
fn steered_agent_stops_at_wall() {
	let (mut app, _) = setup();
	let agent = app
		.world_mut()
		.spawn(GuardedAgentBundle::new(
			Vec2::new(16.0, 48.0),
			AgentBody::circle(6.0),
		))
		.id();
	app.world_mut()
		.get_mut::<AgentVelocity>(agent)
		.unwrap()
		.0 = Vec2::new(200.0, 0.0);
	tick(&mut app, 60);
	let position = app.world().get::<MapPosition>(agent).unwrap().0;
	assert!(position.x > 40.0, "moved {:?}", position);
	assert!(position.x + 6.0 < 64.0, "entered the wall {:?}", position);
	assert_eq!(
		Vec2::ZERO,
		app.world().get::<AgentVelocity>(agent).unwrap().0
	);
	let rejections = app.world().resource::<Events<EventMoveRejected>>();
	assert!(!rejections.is_empty());
}

#[test]
fn autonomous_agent_walks_around_wall() {
	let (mut app, _) = setup();
	let agent = app
		.world_mut()
		.spawn(PathingAgentBundle::new(
			Vec2::new(16.0, 48.0),
			AgentBody::circle(6.0),
			128.0,
		))
		.id();
	app.world_mut()
		.send_event(EventPathRequest::new(agent, Vec2::new(176.0, 48.0)));
	tick(&mut app, 1);
	let follower = app.world().get::<PathFollower>(agent).unwrap();
	assert_eq!(Some(TileCoord(5, 1)), follower.get_destination());
	// around the wall is 7 moves
	assert_eq!(8, follower.get_path().unwrap().len());
	tick(&mut app, 300);
	let position = app.world().get::<MapPosition>(agent).unwrap().0;
	assert_eq!(Vec2::new(176.0, 48.0), position);
	let follower = app.world().get::<PathFollower>(agent).unwrap();
	assert!(follower.get_destination().is_none());
}

#[test]
fn unreachable_destination_fails() {
	let (mut app, _) = setup();
	let agent = app
		.world_mut()
		.spawn(PathingAgentBundle::new(
			Vec2::new(16.0, 16.0),
			AgentBody::circle(6.0),
			128.0,
		))
		.id();
	app.world_mut()
		.send_event(EventPathRequest::new(agent, Vec2::new(80.0, 48.0)));
	tick(&mut app, 1);
	let failures = app.world().resource::<Events<EventPathFailed>>();
	let failure = failures.iter_current_update_events().next().unwrap();
	assert_eq!(agent, failure.entity);
	assert!(matches!(
		failure.error,
		CollisionError::PathNotFound { .. }
	));
	assert!(app
		.world()
		.get::<PathFollower>(agent)
		.unwrap()
		.get_destination()
		.is_none());
}

#[test]
fn respawn_into_wall_is_corrected() {
	let (mut app, _) = setup();
	let agent = app
		.world_mut()
		.spawn(GuardedAgentBundle::new(
			Vec2::new(16.0, 16.0),
			AgentBody::circle(6.0),
		))
		.id();
	app.world_mut()
		.send_event(EventRespawnAgent::new(agent, Vec2::new(80.0, 48.0)));
	tick(&mut app, 1);
	let spawn = Vec2::new(80.0, 16.0);
	assert_eq!(spawn, app.world().get::<MapPosition>(agent).unwrap().0);
	assert_eq!(
		spawn,
		app.world().get::<MovementGuard>(agent).unwrap().get_last_safe()
	);
}

#[test]
fn toggle_then_scan() {
	let (mut app, map) = setup();
	app.world_mut()
		.send_event(EventToggleSubCell::new(Vec2::new(72.0, 40.0)));
	tick(&mut app, 1);
	let store = app.world().get::<SubCellStore>(map).unwrap();
	assert_eq!(Some(SubCellMask(0x0020)), store.get(TileCoord(2, 1)));
	assert_eq!(
		Some(Provenance::Authored),
		store.get_entry(TileCoord(2, 1)).map(|e| e.provenance)
	);
	app.world_mut()
		.send_event(EventScanRegion::tile(TileCoord(2, 1)));
	tick(&mut app, 1);
	let store = app.world().get::<SubCellStore>(map).unwrap();
	assert_eq!(Some(SubCellMask(0x3333)), store.get(TileCoord(2, 1)));
}

#[test]
fn global_shrink_spreads_over_ticks() {
	let (mut app, map) = setup();
	app.world_mut()
		.send_event(EventRunGlobalShrink::new(ShrinkOptions {
			chunk_size: 4,
			progress_interval: 4,
		}));
	tick(&mut app, 2);
	assert!(app.world().get::<ShrinkTask>(map).is_some());
	tick(&mut app, 3);
	assert!(app.world().get::<ShrinkTask>(map).is_none());
	let progress = app.world().resource::<Events<EventShrinkProgress>>();
	let processed: Vec<usize> = progress
		.iter_current_update_events()
		.map(|e| e.0.processed)
		.collect();
	assert_eq!(vec![4, 8, 12, 16, 18], processed);
	let finished = app.world().resource::<Events<EventShrinkFinished>>();
	let stats = finished.iter_current_update_events().next().unwrap().0;
	assert_eq!(18, stats.total);
	// both wall tiles went from nothing to something
	assert_eq!(2, stats.expanded);
	assert_eq!(16, stats.unchanged);
	let store = app.world().get::<SubCellStore>(map).unwrap();
	assert_eq!(Some(SubCellMask(0x3333)), store.get(TileCoord(2, 1)));
	assert_eq!(Some(SubCellMask::FULL), store.get(TileCoord(3, 1)));
	assert_eq!(Some(SubCellMask::EMPTY), store.get(TileCoord(0, 0)));
}

#[test]
fn agent_keeps_walking_during_global_shrink() {
	let (mut app, map) = setup();
	let agent = app
		.world_mut()
		.spawn(PathingAgentBundle::new(
			Vec2::new(16.0, 16.0),
			AgentBody::circle(6.0),
			128.0,
		))
		.id();
	app.world_mut()
		.send_event(EventPathRequest::new(agent, Vec2::new(176.0, 16.0)));
	tick(&mut app, 1);
	app.world_mut()
		.send_event(EventRunGlobalShrink::new(ShrinkOptions {
			chunk_size: 4,
			progress_interval: 4,
		}));
	// the shrink writes a chunk of masks on each of these ticks
	tick(&mut app, 5);
	assert!(app.world().get::<ShrinkTask>(map).is_none());
	let position = app.world().get::<MapPosition>(agent).unwrap().0;
	// 2 units per tick at the default fixed timestep
	assert_eq!(Vec2::new(26.0, 16.0), position);
	let follower = app.world().get::<PathFollower>(agent).unwrap();
	assert!(follower.get_path().is_some());
	assert_eq!(Some(TileCoord(5, 0)), follower.get_destination());
}

#[test]
#[cfg(feature = "ron")]
fn edits_are_saved() {
	let (mut app, map) = setup();
	let path = std::env::temp_dir()
		.join(format!("tile_guard_autosave_{}.ron", std::process::id()))
		.to_string_lossy()
		.to_string();
	app.world_mut()
		.entity_mut(map)
		.insert(CollisionPersistence::new(&path));
	app.world_mut()
		.send_event(EventToggleSubCell::new(Vec2::new(4.0, 4.0)));
	tick(&mut app, 1);
	let document = CollisionDocument::from_ron(&path).unwrap();
	let store = document.to_store();
	assert_eq!(Some(SubCellMask(0x0001)), store.get(TileCoord(0, 0)));
	let _ = std::fs::remove_file(&path);
}
