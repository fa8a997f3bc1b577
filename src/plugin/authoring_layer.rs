//! Logic for handling edits to the [SubCellStore]: painting single
//! sub-cells, rescanning tiles from the artwork and running the boundary
//! shrink over the whole map a chunk per tick. Optionally every change is
//! written back to disk once things settle
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Flip the sub-cell under a world position
#[derive(Event)]
pub struct EventToggleSubCell {
	/// Map space position of the brush
	position: Vec2,
}

impl EventToggleSubCell {
	/// Create a new instance of [EventToggleSubCell]
	pub fn new(position: Vec2) -> Self {
		EventToggleSubCell { position }
	}
	/// Get the position
	pub fn get_position(&self) -> Vec2 {
		self.position
	}
}

/// Rescan a rectangle of tiles from the artwork
#[derive(Event)]
pub struct EventScanRegion {
	/// Tiles to rescan
	region: TileRect,
}

impl EventScanRegion {
	/// Create a new instance of [EventScanRegion]
	pub fn new(region: TileRect) -> Self {
		EventScanRegion { region }
	}
	/// Rescan a single tile
	pub fn tile(tile: TileCoord) -> Self {
		EventScanRegion {
			region: TileRect::new(tile.0, tile.1, 1, 1),
		}
	}
	/// Get the region
	pub fn get_region(&self) -> TileRect {
		self.region
	}
}

/// Regenerate every mask of the map from the artwork
#[derive(Event, Default)]
pub struct EventRunGlobalShrink {
	/// Chunking, the [TileGuardSettings] are used when [None]
	options: Option<ShrinkOptions>,
}

impl EventRunGlobalShrink {
	/// Create a new instance of [EventRunGlobalShrink] with custom chunking
	pub fn new(options: ShrinkOptions) -> Self {
		EventRunGlobalShrink {
			options: Some(options),
		}
	}
}

/// Progress of a running boundary shrink, sent after every chunk
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct EventShrinkProgress(pub ShrinkStats);

/// Summary of a completed boundary shrink
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct EventShrinkFinished(pub ShrinkStats);

/// A boundary shrink in progress on the map entity
#[derive(Component)]
pub struct ShrinkTask(pub BoundaryShrinkJob);

/// Write the sub-cell masks of the map to a `ron` document whenever they
/// change and no shrink is running
#[cfg(feature = "ron")]
#[derive(Component, Debug, Clone)]
pub struct CollisionPersistence {
	/// Document path
	path: String,
	/// Store revision last written
	saved_revision: Option<u64>,
}

#[cfg(feature = "ron")]
impl CollisionPersistence {
	/// Save to `path` on the next change
	pub fn new(path: &str) -> Self {
		CollisionPersistence {
			path: path.to_string(),
			saved_revision: None,
		}
	}
	/// Save to `path` once `store` differs from its current state, used
	/// when the store was just loaded from the same document
	pub fn tracking(path: &str, store: &SubCellStore) -> Self {
		CollisionPersistence {
			path: path.to_string(),
			saved_revision: Some(store.get_revision()),
		}
	}
	/// Get the document path
	pub fn get_path(&self) -> &str {
		&self.path
	}
}

/// Read [EventToggleSubCell] and flip sub-cells
#[cfg(not(tarpaulin_include))]
pub fn process_toggle_events(
	mut events: EventReader<EventToggleSubCell>,
	mut map_q: Query<(&MapDimensions, &TileGrid, &mut SubCellStore)>,
	settings: Res<TileGuardSettings>,
) {
	for event in events.read() {
		for (dimensions, grid, mut store) in map_q.iter_mut() {
			let mut editor =
				CollisionEditor::new(dimensions, grid, &mut store).with_settings(*settings);
			if let Err(e) = editor.toggle_cell(event.get_position()) {
				warn!("Cannot toggle sub-cell: {}", e);
			}
		}
	}
}

/// Read [EventScanRegion] and rescan tiles
#[cfg(not(tarpaulin_include))]
pub fn process_scan_events(
	mut events: EventReader<EventScanRegion>,
	mut map_q: Query<(&MapDimensions, &TileGrid, &mut SubCellStore, &TileArt)>,
	settings: Res<TileGuardSettings>,
) {
	for event in events.read() {
		for (dimensions, grid, mut store, art) in map_q.iter_mut() {
			let mut editor =
				CollisionEditor::new(dimensions, grid, &mut store).with_settings(*settings);
			let written = editor.scan_region(event.get_region(), art);
			debug!("Rescanned {} tiles of {:?}", written, event.get_region());
		}
	}
}

/// Read [EventRunGlobalShrink] and start a [ShrinkTask] on every map not
/// already running one
#[cfg(not(tarpaulin_include))]
pub fn start_global_shrink(
	mut commands: Commands,
	mut events: EventReader<EventRunGlobalShrink>,
	map_q: Query<Entity, (With<SubCellStore>, With<TileArt>, Without<ShrinkTask>)>,
	settings: Res<TileGuardSettings>,
) {
	// several requests in one tick start a single job
	let Some(event) = events.read().last() else {
		return;
	};
	let options = event.options.unwrap_or(settings.shrink);
	for entity in map_q.iter() {
		info!("Starting boundary shrink of {:?}", entity);
		let job = BoundaryShrinkJob::new(settings.scanner(), options);
		commands.entity(entity).insert(ShrinkTask(job));
	}
}

/// Process one chunk of every running [ShrinkTask], reporting progress and
/// removing the task once it has visited every tile
#[cfg(not(tarpaulin_include))]
pub fn step_global_shrink(
	mut commands: Commands,
	mut map_q: Query<(Entity, &TileGrid, &mut SubCellStore, &TileArt, &mut ShrinkTask)>,
	mut progress: EventWriter<EventShrinkProgress>,
	mut finished: EventWriter<EventShrinkFinished>,
) {
	for (entity, grid, mut store, art, mut task) in map_q.iter_mut() {
		match task.0.step(art, grid, &mut store) {
			ShrinkStep::Running(stats) => {
				progress.write(EventShrinkProgress(stats));
			}
			ShrinkStep::Finished(stats) => {
				progress.write(EventShrinkProgress(stats));
				finished.write(EventShrinkFinished(stats));
				commands.entity(entity).remove::<ShrinkTask>();
			}
		}
	}
}

/// Save the masks of maps with a [CollisionPersistence] after they change.
/// A failed save is logged and retried on the next change, the in-memory
/// masks stay authoritative
#[cfg(feature = "ron")]
#[cfg(not(tarpaulin_include))]
pub fn autosave_collision(
	mut map_q: Query<
		(&MapDimensions, &SubCellStore, &mut CollisionPersistence),
		Without<ShrinkTask>,
	>,
) {
	for (dimensions, store, mut persistence) in map_q.iter_mut() {
		if persistence.saved_revision == Some(store.get_revision()) {
			continue;
		}
		let document = CollisionDocument::from_store(store, dimensions);
		match document.save_ron(&persistence.path) {
			Ok(()) => {
				debug!("Saved {} sub-cell masks to {}", store.len(), persistence.path);
			}
			Err(e) => error!("{}", e),
		}
		// don't retry every tick, wait for the next edit
		persistence.saved_revision = Some(store.get_revision());
	}
}
