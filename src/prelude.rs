//! `use bevy_tile_guard_plugin::prelude::*;` to import common structures and methods
//!

#[cfg(feature = "serde")]
#[doc(hidden)]
pub use crate::collision::document::*;

#[doc(hidden)]
pub use crate::collision::{
	art::*, error::*, follower::*, guard::*, path::*, rect_merge::*, settings::*, shrink::*,
	silhouette::*, sources::*, sub_cell::*, surface::*, tile_grid::*, utilities::*, validation::*,
};

#[doc(hidden)]
pub use crate::{
	bundle::*,
	plugin::{authoring_layer::*, guard_layer::*, path_layer::*, *},
};
