//! Access to the alpha channel of the artwork drawn on each tile.
//!
//! The silhouette scanner and the decorative-layer rule of the guard only
//! need two things from whatever renders the map: which layers draw
//! something on a tile and the alpha of a pixel of that drawing. That is the
//! [TileArtSource] trait. [TileArt] is an in-memory implementation holding
//! one alpha sheet per layer, optionally sliced from PNG images.
//!

use std::collections::BTreeMap;

use bevy::prelude::*;

use crate::prelude::*;

/// Fragments of layer names marking a layer as purely decorative (drop
/// shadows, lighting sheets and the like)
const DECORATIVE_NAME_HINTS: [&str; 3] = ["shadow", "decor", "overlay"];
/// A layer drawing on more than this fraction of all tiles is a full map
/// overlay rather than scenery
pub const OVERLAY_DENSITY: f32 = 0.5;

/// Identifies a rendered layer
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub usize);

/// A layer drawing something on a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedLayer {
	/// The layer
	pub id: LayerId,
	/// Decorative layers never block movement and are skipped by the scanner
	pub decorative: bool,
}

/// Whether a layer name suggests it only carries decoration
pub fn is_decorative_layer_name(name: &str) -> bool {
	let lower = name.to_lowercase();
	DECORATIVE_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Read access to the rendered artwork of a map
pub trait TileArtSource {
	/// Side length in pixels of the artwork of one tile
	fn tile_pixels(&self) -> u32 {
		TILE_SIZE as u32
	}
	/// Every layer drawing something on the tile, bottom to top
	fn layers_at(&self, tile: TileCoord) -> Vec<RenderedLayer>;
	/// Alpha `0..=255` of a pixel of a layer's drawing on a tile, `(0, 0)` is
	/// the top left pixel. A layer not drawing on the tile is transparent
	fn pixel_alpha_at(&self, layer: LayerId, tile: TileCoord, local_x: u32, local_y: u32) -> u8;
}

/// The alpha sheet of one rendered layer
#[derive(Debug, Clone, Default)]
pub struct ArtLayer {
	/// Name of the layer as authored
	name: String,
	/// Whether the layer only carries decoration
	decorative: bool,
	/// Alpha values of every drawn tile, row-major `tile_pixels` squared
	tiles: BTreeMap<TileCoord, Vec<u8>>,
}

impl ArtLayer {
	/// Name of the layer
	pub fn get_name(&self) -> &str {
		&self.name
	}
	/// Whether the layer is decorative
	pub fn is_decorative(&self) -> bool {
		self.decorative
	}
	/// Number of tiles the layer draws on
	pub fn drawn_tile_count(&self) -> usize {
		self.tiles.len()
	}
}

/// In-memory alpha sheets of every rendered layer of a map
#[derive(Component, Debug, Clone)]
pub struct TileArt {
	/// Side length in pixels of the artwork of one tile
	tile_pixels: u32,
	/// Layers bottom to top
	layers: Vec<ArtLayer>,
}

impl Default for TileArt {
	fn default() -> Self {
		TileArt::new(TILE_SIZE as u32)
	}
}

impl TileArt {
	/// Create artwork without any layers
	pub fn new(tile_pixels: u32) -> Self {
		TileArt {
			tile_pixels,
			layers: Vec::new(),
		}
	}
	/// Get the layers
	pub fn get_layers(&self) -> &[ArtLayer] {
		&self.layers
	}
	/// Add an empty layer on top of the others. Layers whose name hints at
	/// decoration are flagged decorative regardless of `decorative`
	pub fn add_layer(&mut self, name: &str, decorative: bool) -> LayerId {
		let decorative = decorative || is_decorative_layer_name(name);
		self.layers.push(ArtLayer {
			name: name.to_string(),
			decorative,
			tiles: BTreeMap::new(),
		});
		LayerId(self.layers.len() - 1)
	}
	/// Get a layer mutably
	fn layer_mut(&mut self, layer: LayerId) -> Result<&mut ArtLayer, CollisionError> {
		self.layers
			.get_mut(layer.0)
			.ok_or_else(|| CollisionError::Configuration(format!("No art layer {}", layer.0)))
	}
	/// Set the full alpha sheet of a tile on a layer
	pub fn set_tile_alpha(
		&mut self,
		layer: LayerId,
		tile: TileCoord,
		alpha: Vec<u8>,
	) -> Result<(), CollisionError> {
		let expected = (self.tile_pixels * self.tile_pixels) as usize;
		if alpha.len() != expected {
			return Err(CollisionError::Configuration(format!(
				"Tile art needs {} alpha values, found {}",
				expected,
				alpha.len()
			)));
		}
		self.layer_mut(layer)?.tiles.insert(tile, alpha);
		Ok(())
	}
	/// Paint a pixel rectangle `[min, max)` of a tile with an alpha value,
	/// starting from a transparent sheet if the layer isn't drawn there yet
	pub fn paint_rect(
		&mut self,
		layer: LayerId,
		tile: TileCoord,
		min: UVec2,
		max: UVec2,
		alpha: u8,
	) -> Result<(), CollisionError> {
		let size = self.tile_pixels;
		let sheet = self
			.layer_mut(layer)?
			.tiles
			.entry(tile)
			.or_insert_with(|| vec![0; (size * size) as usize]);
		for y in min.y.min(size)..max.y.min(size) {
			for x in min.x.min(size)..max.x.min(size) {
				sheet[(y * size + x) as usize] = alpha;
			}
		}
		Ok(())
	}
	/// Paint the whole of a tile with an alpha value
	pub fn fill_tile(&mut self, layer: LayerId, tile: TileCoord, alpha: u8) -> Result<(), CollisionError> {
		let size = self.tile_pixels;
		self.paint_rect(layer, tile, UVec2::ZERO, UVec2::splat(size), alpha)
	}
	/// Flag every layer that draws on more than half of all tiles as a
	/// decorative overlay. Returns the layers that changed
	pub fn mark_dense_layers_decorative(&mut self, dimensions: &MapDimensions) -> Vec<LayerId> {
		let total = dimensions.get_tile_count().max(1) as f32;
		let mut marked = Vec::new();
		for (i, layer) in self.layers.iter_mut().enumerate() {
			let density = layer.tiles.len() as f32 / total;
			if !layer.decorative && density > OVERLAY_DENSITY {
				warn!(
					"Layer `{}` covers {:.0}% of the map, treating it as a decorative overlay",
					layer.name,
					density * 100.0
				);
				layer.decorative = true;
				marked.push(LayerId(i));
			}
		}
		marked
	}
	/// Slice a PNG image covering the whole map into per-tile alpha sheets
	/// and add it as a new layer. Fully transparent tiles are not recorded
	#[cfg(feature = "png")]
	pub fn add_layer_from_png(
		&mut self,
		name: &str,
		decorative: bool,
		path: &str,
		dimensions: &MapDimensions,
	) -> Result<LayerId, CollisionError> {
		use photon_rs::native::open_image;
		let img = open_image(path).map_err(|e| {
			CollisionError::Configuration(format!("Failed to open layer image {}: {}", path, e))
		})?;
		let img_width = img.get_width();
		let img_height = img.get_height();
		let size = self.tile_pixels;
		// ensure the image actually represents the whole map
		let required_width = dimensions.get_columns() * size;
		let required_height = dimensions.get_rows() * size;
		if img_width != required_width || img_height != required_height {
			return Err(CollisionError::Configuration(format!(
				"Layer image {} is {}x{} pixels, expected {}x{}",
				path, img_width, img_height, required_width, required_height
			)));
		}
		// raw pixels are arranged from the top left of the image and come in sets of 4, RGBA
		let raw_pixels = img.get_raw_pixels();
		let id = self.add_layer(name, decorative);
		for row in 0..dimensions.get_rows() {
			for column in 0..dimensions.get_columns() {
				let mut sheet = Vec::with_capacity((size * size) as usize);
				for y in 0..size {
					for x in 0..size {
						let px = column * size + x;
						let py = row * size + y;
						let i = ((py * img_width + px) * 4 + 3) as usize;
						sheet.push(raw_pixels.get(i).copied().unwrap_or(0));
					}
				}
				if sheet.iter().any(|a| *a > 0) {
					self.set_tile_alpha(id, TileCoord(column, row), sheet)?;
				}
			}
		}
		debug!(
			"Layer `{}` draws on {} tiles",
			name,
			self.layers[id.0].drawn_tile_count()
		);
		Ok(id)
	}
}

impl TileArtSource for TileArt {
	fn tile_pixels(&self) -> u32 {
		self.tile_pixels
	}
	fn layers_at(&self, tile: TileCoord) -> Vec<RenderedLayer> {
		self.layers
			.iter()
			.enumerate()
			.filter(|(_, layer)| layer.tiles.contains_key(&tile))
			.map(|(i, layer)| RenderedLayer {
				id: LayerId(i),
				decorative: layer.decorative,
			})
			.collect()
	}
	fn pixel_alpha_at(&self, layer: LayerId, tile: TileCoord, local_x: u32, local_y: u32) -> u8 {
		if local_x >= self.tile_pixels || local_y >= self.tile_pixels {
			return 0;
		}
		self.layers
			.get(layer.0)
			.and_then(|l| l.tiles.get(&tile))
			.map(|sheet| sheet[(local_y * self.tile_pixels + local_x) as usize])
			.unwrap_or(0)
	}
}
