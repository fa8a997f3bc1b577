//! Dual-resolution collision for 2D tile maps.
//!
//! A map is a grid of `32x32` tiles. Each tile is either open or blocked in a
//! [tile_grid::TileGrid] built from whatever collision the map author
//! provided. Tiles that sprites only partly cover can additionally carry a
//! `4x4` grid of `8x8` sub-cells, stored as a 16-bit mask, which is derived
//! from the alpha channel of the sprites drawn on them or painted by hand.
//!
//! ```text
//!  tile                 sub-cells of one tile
//!  ___________          _____________
//! |           |        |_0_|_1_|_2_|_3_|
//! |    /\     |        |_4_|_5_|_6_|_7_|
//! |   /__\    |        |_8_|_9_|10_|11_|
//! |___|__|____|        |12_|13_|14_|15_|
//! ```
//!
//! A set bit means the sub-cell is solid. Sub-cells can only open up a tile
//! the grid blocks, which lets an agent walk right up against the edge of a
//! tree trunk while the grid still treats the tile as a wall.
//!
//! Definitions:
//!
//! * Tile grid - coarse open/blocked flag per tile, used by the path planner
//! * Sub-cell mask - fine occupancy of a single tile, used by the movement guard
//! * Silhouette - the opaque pixels of the non-decorative layers drawn on a tile
//! * Override zone - a world rectangle where everything is walkable
//! * Boundary shrink - rescanning every tile so masks match the current art
//!

pub mod art;
#[cfg(feature = "serde")]
pub mod document;
pub mod error;
pub mod follower;
pub mod guard;
pub mod path;
pub mod rect_merge;
pub mod settings;
pub mod shrink;
pub mod silhouette;
pub mod sources;
pub mod sub_cell;
pub mod surface;
pub mod tile_grid;
pub mod utilities;
pub mod validation;
