//! The Tile Guard decides, once per tick, whether an agent may stand where
//! it is trying to move to.
//!
//! The attempted position is sampled over the agent's body on a grid spaced
//! one sub-cell apart. Every sample point runs through an ordered chain of
//! rules, the first rule with an opinion decides:
//!
//! 0. outside of the map, blocked
//! 1. inside an [OverrideZone], walkable
//! 2. the tile has a [SubCellMask] and the sub-cell is clear, walkable
//! 3. (optional) the tile has a [SubCellMask] and the sub-cell is solid, blocked
//! 4. the [TileGrid] leaves the tile open, walkable
//! 5. only decorative layers are drawn on the tile, walkable
//! 6. otherwise blocked
//!
//! A single blocked sample rejects the move and the agent is put back on its
//! last known safe position. An accepted move becomes the new safe position.
//!

use bevy::prelude::*;

use crate::prelude::*;

/// The footprint of an agent used for sampling
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
	/// A circle around the agent position
	Circle {
		/// Radius in world units
		radius: f32,
	},
	/// An axis-aligned box centred on the agent position
	Rect {
		/// Half the width and height in world units
		half_extents: Vec2,
	},
}

impl BodyShape {
	/// Half size of the bounding box of the shape
	pub fn extent(&self) -> Vec2 {
		match self {
			BodyShape::Circle { radius } => Vec2::splat(radius.max(0.0)),
			BodyShape::Rect { half_extents } => half_extents.max(Vec2::ZERO),
		}
	}
	/// Pull an offset from the centre back onto the shape
	pub fn clamp_offset(&self, offset: Vec2) -> Vec2 {
		match self {
			BodyShape::Circle { radius } => {
				let radius = radius.max(0.0);
				let length = offset.length();
				if length > radius && length > 0.0 {
					offset * (radius / length)
				} else {
					offset
				}
			}
			BodyShape::Rect { half_extents } => {
				let h = half_extents.max(Vec2::ZERO);
				offset.clamp(-h, h)
			}
		}
	}
}

/// The footprint of an agent
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct AgentBody(pub BodyShape);

impl AgentBody {
	/// A circular body
	pub fn circle(radius: f32) -> Self {
		AgentBody(BodyShape::Circle { radius })
	}
	/// A box body of the given full width and height
	pub fn rect(width: f32, height: f32) -> Self {
		AgentBody(BodyShape::Rect {
			half_extents: Vec2::new(width, height) / 2.0,
		})
	}
	/// World positions to sample for an agent standing at `position`. The
	/// centre comes first, followed by a grid of `spacing` reaching `margin`
	/// past the body with every point pulled back onto the body, so the edge
	/// of the body is always sampled
	pub fn sample_points(&self, position: Vec2, spacing: f32, margin: f32) -> Vec<Vec2> {
		let spacing = if spacing > 0.0 { spacing } else { SUB_CELL_SIZE };
		let reach = self.0.extent() + Vec2::splat(margin.max(0.0));
		let steps_x = (reach.x / spacing).ceil() as i32;
		let steps_y = (reach.y / spacing).ceil() as i32;
		let mut points = vec![position];
		for iy in -steps_y..=steps_y {
			for ix in -steps_x..=steps_x {
				let offset = self
					.0
					.clamp_offset(Vec2::new(ix as f32 * spacing, iy as f32 * spacing));
				let point = position + offset;
				if !points.iter().any(|p| p.distance_squared(point) < 1e-6) {
					points.push(point);
				}
			}
		}
		points
	}
}

/// A named region that is always walkable, used for doorways and other
/// hand-placed exceptions to the collision data
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideZone {
	/// Name of the zone
	pub name: String,
	/// World space area of the zone
	pub area: Rect,
}

impl OverrideZone {
	/// Create a new instance of [OverrideZone]
	pub fn new(name: &str, area: Rect) -> Self {
		OverrideZone {
			name: name.to_string(),
			area,
		}
	}
}

/// Every [OverrideZone] of the map, configured when the scene loads
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct OverrideZones(pub Vec<OverrideZone>);

impl OverrideZones {
	/// The first zone containing a world position
	pub fn find(&self, position: Vec2) -> Option<&OverrideZone> {
		self.0.iter().find(|z| z.area.contains(position))
	}
}

/// Tuning of the guard
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardConfig {
	/// Distance between sample points
	pub sample_spacing: f32,
	/// How far past the body the sample grid reaches before being clamped
	pub sample_margin: f32,
	/// When `true` a solid sub-cell blocks even where the [TileGrid] is open
	pub sub_cells_add_blocking: bool,
}

impl Default for GuardConfig {
	fn default() -> Self {
		GuardConfig {
			sample_spacing: SUB_CELL_SIZE,
			sample_margin: SUB_CELL_SIZE,
			sub_cells_add_blocking: false,
		}
	}
}

/// Outcome of evaluating a point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	/// The point may be occupied
	Walkable,
	/// The point may not be occupied
	Blocked,
}

/// The rule that decided a [Verdict]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkRule {
	/// Point outside of the map
	OutsideMap,
	/// Point inside an override zone
	OverrideZone,
	/// Sub-cell of the tile is clear
	ClearSubCell,
	/// Sub-cell of the tile is solid and sub-cells may add blocking
	SolidSubCell,
	/// The tile grid leaves the tile open
	OpenTile,
	/// Only decorative art is drawn on the tile
	DecorativeOnly,
	/// Nothing allowed the point
	Fallback,
}

/// A sample point resolved onto the map
#[derive(Debug, Clone, Copy)]
struct SamplePoint {
	/// World position
	position: Vec2,
	/// Tile and sub-cell index, [None] outside of the map
	cell: Option<(TileCoord, u8)>,
}

/// A single link of the rule chain
type GuardRule = fn(&TileGuard, &SamplePoint) -> Option<Verdict>;

/// The rule chain in precedence order
const RULES: [(WalkRule, GuardRule); 6] = [
	(WalkRule::OutsideMap, rule_outside_map),
	(WalkRule::OverrideZone, rule_override_zone),
	(WalkRule::ClearSubCell, rule_clear_sub_cell),
	(WalkRule::SolidSubCell, rule_solid_sub_cell),
	(WalkRule::OpenTile, rule_open_tile),
	(WalkRule::DecorativeOnly, rule_decorative_only),
];

/// Outside of the map is never walkable
fn rule_outside_map(_guard: &TileGuard, sample: &SamplePoint) -> Option<Verdict> {
	sample.cell.is_none().then_some(Verdict::Blocked)
}

/// Override zones trump all collision data
fn rule_override_zone(guard: &TileGuard, sample: &SamplePoint) -> Option<Verdict> {
	guard
		.zones
		.find(sample.position)
		.map(|_| Verdict::Walkable)
}

/// A clear sub-cell lets a point through regardless of the tile grid
fn rule_clear_sub_cell(guard: &TileGuard, sample: &SamplePoint) -> Option<Verdict> {
	let (tile, index) = sample.cell?;
	let mask = guard.store.get(tile)?;
	mask.is_walkable(index)
		.ok()
		.and_then(|walkable| walkable.then_some(Verdict::Walkable))
}

/// A solid sub-cell blocks, only when configured to
fn rule_solid_sub_cell(guard: &TileGuard, sample: &SamplePoint) -> Option<Verdict> {
	if !guard.config.sub_cells_add_blocking {
		return None;
	}
	let (tile, index) = sample.cell?;
	let mask = guard.store.get(tile)?;
	mask.is_solid(index)
		.ok()
		.and_then(|solid| solid.then_some(Verdict::Blocked))
}

/// Open tiles are walkable
fn rule_open_tile(guard: &TileGuard, sample: &SamplePoint) -> Option<Verdict> {
	let (tile, _) = sample.cell?;
	(!guard.grid.is_blocked(tile)).then_some(Verdict::Walkable)
}

/// A tile only covered by shadows or similar decoration is walkable
fn rule_decorative_only(guard: &TileGuard, sample: &SamplePoint) -> Option<Verdict> {
	let (tile, _) = sample.cell?;
	let art = guard.art?;
	let layers = art.layers_at(tile);
	(!layers.is_empty() && layers.iter().all(|l| l.decorative)).then_some(Verdict::Walkable)
}

/// Result of validating a move
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
	/// The agent may occupy the attempted position
	Accepted(Vec2),
	/// The agent must return to `rollback`
	Rejected {
		/// Last known safe position
		rollback: Vec2,
		/// First sample point that failed
		blocked_at: Vec2,
		/// Rule that blocked it
		rule: WalkRule,
	},
}

impl MoveOutcome {
	/// Position the agent ends the tick on
	pub fn resolved_position(&self) -> Vec2 {
		match self {
			MoveOutcome::Accepted(p) => *p,
			MoveOutcome::Rejected { rollback, .. } => *rollback,
		}
	}
	/// Whether the move was accepted
	pub fn is_accepted(&self) -> bool {
		matches!(self, MoveOutcome::Accepted(_))
	}
}

/// Per-agent movement state owned by the agent: the position it returns to
/// when a move is rejected
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct MovementGuard {
	/// Last position that passed validation
	last_safe: Vec2,
}

impl MovementGuard {
	/// Create a guard for an agent spawned at `spawn`
	pub fn new(spawn: Vec2) -> Self {
		MovementGuard { last_safe: spawn }
	}
	/// Last position that passed validation
	pub fn get_last_safe(&self) -> Vec2 {
		self.last_safe
	}
	/// Forget the previous safe position, used when an agent respawns
	pub fn reset(&mut self, spawn: Vec2) {
		self.last_safe = spawn;
	}
}

/// Read-only view over everything the walkability rules consult
pub struct TileGuard<'a> {
	/// Map size
	dimensions: &'a MapDimensions,
	/// Coarse occupancy
	grid: &'a TileGrid,
	/// Fine occupancy
	store: &'a SubCellStore,
	/// Always walkable areas
	zones: &'a OverrideZones,
	/// Rendered layers, used to recognise decoration
	art: Option<&'a dyn TileArtSource>,
	/// Sampling and rule tuning
	config: GuardConfig,
}

impl<'a> TileGuard<'a> {
	/// Create a new instance of [TileGuard]
	pub fn new(
		dimensions: &'a MapDimensions,
		grid: &'a TileGrid,
		store: &'a SubCellStore,
		zones: &'a OverrideZones,
	) -> Self {
		TileGuard {
			dimensions,
			grid,
			store,
			zones,
			art: None,
			config: GuardConfig::default(),
		}
	}
	/// Let the guard see the rendered layers
	pub fn with_art(mut self, art: &'a dyn TileArtSource) -> Self {
		self.art = Some(art);
		self
	}
	/// Use custom tuning
	pub fn with_config(mut self, config: GuardConfig) -> Self {
		self.config = config;
		self
	}
	/// Get the coarse occupancy
	pub fn get_grid(&self) -> &TileGrid {
		self.grid
	}
	/// Get the fine occupancy
	pub fn get_store(&self) -> &SubCellStore {
		self.store
	}
	/// Run a world position through the rule chain and report which rule
	/// decided
	pub fn classify(&self, position: Vec2) -> (Verdict, WalkRule) {
		let sample = SamplePoint {
			position,
			cell: self.dimensions.get_sub_cell_from_world(position).ok(),
		};
		for (rule, check) in RULES.iter() {
			if let Some(verdict) = check(self, &sample) {
				return (verdict, *rule);
			}
		}
		(Verdict::Blocked, WalkRule::Fallback)
	}
	/// Whether a single world position may be occupied
	pub fn is_walkable(&self, position: Vec2) -> bool {
		self.classify(position).0 == Verdict::Walkable
	}
	/// Whether a body may stand at a position, returning the first failing
	/// sample point and rule if not
	pub fn check_body(&self, body: &AgentBody, position: Vec2) -> Result<(), (Vec2, WalkRule)> {
		for point in body.sample_points(position, self.config.sample_spacing, self.config.sample_margin) {
			let (verdict, rule) = self.classify(point);
			if verdict == Verdict::Blocked {
				return Err((point, rule));
			}
		}
		Ok(())
	}
	/// Decide whether the agent may move to `attempted`. An accepted move
	/// becomes the agent's new safe position, a rejected one hands back the
	/// previous safe position
	pub fn validate_move(
		&self,
		body: &AgentBody,
		state: &mut MovementGuard,
		attempted: Vec2,
	) -> MoveOutcome {
		match self.check_body(body, attempted) {
			Ok(()) => {
				state.last_safe = attempted;
				MoveOutcome::Accepted(attempted)
			}
			Err((blocked_at, rule)) => MoveOutcome::Rejected {
				rollback: state.last_safe,
				blocked_at,
				rule,
			},
		}
	}
}
