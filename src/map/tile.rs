use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::layer::LayerId;
use crate::geometry::CellCoord;

/// Opaque, stable tile identity. Client-generated for new tiles.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(pub String);

impl TileId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optional per-tile visual overrides. Rendering is up to the host.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub color: Option<String>,
    pub label: Option<String>,
    /// Degrees, clockwise.
    pub rotation: i32,
    pub scale: Option<f64>,
}

impl Appearance {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.label.is_none() && self.rotation == 0 && self.scale.is_none()
    }
}

/// A tile placed on the map. `id` is the identity; `cell` changes on move.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedTile {
    pub id: TileId,
    pub cell: CellCoord,
    pub tile_type: String,
    pub layer: LayerId,
    pub appearance: Option<Appearance>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PlacedTile {
    pub fn new(cell: CellCoord, tile_type: impl Into<String>, layer: LayerId) -> Self {
        Self {
            id: TileId::generate(),
            cell,
            tile_type: tile_type.into(),
            layer,
            appearance: None,
            updated_at: Some(Utc::now()),
        }
    }

    pub fn with_id(mut self, id: TileId) -> Self {
        self.id = id;
        self
    }
}
