pub mod configuration;
pub mod grid;
pub mod layer;
pub mod tile;

pub use configuration::{
    GridStyle, HexSettings, MapConfiguration, MapDefaults, MAX_GRID_EXTENT, MAX_HEX_RADIUS,
};
pub use grid::{GridModel, MoveOutcome, Rejection};
pub use layer::{Layer, LayerId, LayerKind, LayerStack, GRID_LAYER_ID, TILES_LAYER_ID};
pub use tile::{Appearance, PlacedTile, TileId};
