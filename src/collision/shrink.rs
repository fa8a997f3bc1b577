//! Regenerate the [SubCellStore] of a whole map from the artwork.
//!
//! Authored boundaries tend to be drawn generously, a whole tile blocked
//! where only its lower half shows a wall. The [BoundaryShrinkJob] walks
//! every tile in row-major order, scans its silhouette and writes the new
//! mask unconditionally, counting how many tiles shrank, grew or stayed the
//! same compared to what the store held before (a missing entry counts as
//! `0x0000`). Running it twice changes nothing the second time.
//!
//! The job is resumable: each [BoundaryShrinkJob::step] processes at most one
//! chunk of tiles and returns, so a scheduler can spread a large map across
//! many ticks. Once started it runs until every tile has been visited.
//!

use std::time::{Duration, Instant};

use bevy::prelude::*;

use crate::prelude::*;

/// Tuning of the shrink job
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShrinkOptions {
	/// Maximum number of tiles processed per step
	pub chunk_size: usize,
	/// Number of tiles between progress reports
	pub progress_interval: usize,
}

impl Default for ShrinkOptions {
	fn default() -> Self {
		ShrinkOptions {
			chunk_size: 256,
			progress_interval: 1024,
		}
	}
}

/// Running counts of a shrink job
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShrinkStats {
	/// Tiles visited so far
	pub processed: usize,
	/// Tiles on the map
	pub total: usize,
	/// Tiles whose new mask has fewer solid sub-cells
	pub shrunk: usize,
	/// Tiles whose new mask has more solid sub-cells
	pub expanded: usize,
	/// Tiles whose solid sub-cell count is the same
	pub unchanged: usize,
	/// Wall time since the first step
	pub elapsed: Duration,
}

impl ShrinkStats {
	/// Fraction of the map processed, `0.0..=1.0`
	pub fn progress(&self) -> f32 {
		if self.total == 0 {
			1.0
		} else {
			self.processed as f32 / self.total as f32
		}
	}
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShrinkStep {
	/// More tiles remain
	Running(ShrinkStats),
	/// Every tile has been visited
	Finished(ShrinkStats),
}

/// Callback receiving periodic progress
pub type ShrinkProgressCallback = Box<dyn FnMut(&ShrinkStats) + Send + Sync>;

/// A resumable map-wide silhouette rescan
pub struct BoundaryShrinkJob {
	/// Scanner producing the new masks
	scanner: SilhouetteScanner,
	/// Chunking and reporting
	options: ShrinkOptions,
	/// Row-major index of the next tile to process
	next: usize,
	/// Counts so far
	stats: ShrinkStats,
	/// When the first step ran
	started: Option<Instant>,
	/// `processed` at the last progress report
	last_report: usize,
	/// Optional progress listener
	on_progress: Option<ShrinkProgressCallback>,
}

impl BoundaryShrinkJob {
	/// Create a new instance of [BoundaryShrinkJob]
	pub fn new(scanner: SilhouetteScanner, options: ShrinkOptions) -> Self {
		BoundaryShrinkJob {
			scanner,
			options,
			next: 0,
			stats: ShrinkStats::default(),
			started: None,
			last_report: 0,
			on_progress: None,
		}
	}
	/// Attach a callback invoked every `progress_interval` tiles
	pub fn with_progress(mut self, callback: ShrinkProgressCallback) -> Self {
		self.on_progress = Some(callback);
		self
	}
	/// Counts so far
	pub fn get_stats(&self) -> &ShrinkStats {
		&self.stats
	}
	/// Whether every tile has been visited
	pub fn is_finished(&self) -> bool {
		self.started.is_some() && self.stats.processed >= self.stats.total
	}
	/// Process the next chunk of tiles
	pub fn step<A: TileArtSource + ?Sized>(
		&mut self,
		art: &A,
		grid: &TileGrid,
		store: &mut SubCellStore,
	) -> ShrinkStep {
		let started = *self.started.get_or_insert_with(Instant::now);
		let columns = grid.get_columns() as usize;
		self.stats.total = columns * grid.get_rows() as usize;
		let end = (self.next + self.options.chunk_size.max(1)).min(self.stats.total);
		for i in self.next..end {
			let tile = TileCoord((i % columns) as u32, (i / columns) as u32);
			let new_mask = self.scanner.scan_tile(tile, art, grid);
			let old_mask = store.get(tile).unwrap_or(SubCellMask::EMPTY);
			match new_mask.solid_count().cmp(&old_mask.solid_count()) {
				std::cmp::Ordering::Less => self.stats.shrunk += 1,
				std::cmp::Ordering::Greater => self.stats.expanded += 1,
				std::cmp::Ordering::Equal => self.stats.unchanged += 1,
			}
			store.set(tile, new_mask, Provenance::PixelDerived);
		}
		self.stats.processed = end;
		self.next = end;
		self.stats.elapsed = started.elapsed();
		let interval = self.options.progress_interval.max(1);
		if self.stats.processed - self.last_report >= interval || end >= self.stats.total {
			self.last_report = self.stats.processed;
			debug!(
				"Boundary shrink {}/{} tiles",
				self.stats.processed, self.stats.total
			);
			if let Some(callback) = self.on_progress.as_mut() {
				callback(&self.stats);
			}
		}
		if end >= self.stats.total {
			info!(
				"Boundary shrink finished in {:?}: {} shrunk, {} expanded, {} unchanged",
				self.stats.elapsed, self.stats.shrunk, self.stats.expanded, self.stats.unchanged
			);
			ShrinkStep::Finished(self.stats)
		} else {
			ShrinkStep::Running(self.stats)
		}
	}
	/// Step until every tile has been visited and return the summary
	pub fn run_to_completion<A: TileArtSource + ?Sized>(
		&mut self,
		art: &A,
		grid: &TileGrid,
		store: &mut SubCellStore,
	) -> ShrinkStats {
		loop {
			if let ShrinkStep::Finished(stats) = self.step(art, grid, store) {
				return stats;
			}
		}
	}
}

/// Rescan the whole map in one go, the offline form of the shrink job
pub fn run_global_shrink<A: TileArtSource + ?Sized>(
	art: &A,
	grid: &TileGrid,
	store: &mut SubCellStore,
	scanner: SilhouetteScanner,
	options: ShrinkOptions,
) -> ShrinkStats {
	BoundaryShrinkJob::new(scanner, options).run_to_completion(art, grid, store)
}
