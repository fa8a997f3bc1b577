//! This is a plugin for Bevy game engine providing dual-resolution collision
//! for 2D tile maps, tiles plus sprite derived sub-cells, and A* pathfinding
//! over them
//!

pub mod bundle;
pub mod collision;
pub mod plugin;

pub mod prelude;
