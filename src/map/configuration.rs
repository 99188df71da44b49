use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::layer::{Layer, LayerId, TILES_LAYER_ID};
use super::tile::PlacedTile;
use crate::geometry::{CellCoord, Cube, GridLayout, GridType, HexOrientation, Square};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HexSettings {
    pub hex_size: f64,
    pub orientation: HexOrientation,
}

/// Grid layer visuals. Only the grid layer has configurable line styling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridStyle {
    pub line_width: f64,
    pub border_width: f64,
    pub line_color: Option<String>,
    pub border_color: Option<String>,
}

impl Default for GridStyle {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            border_width: 2.0,
            line_color: None,
            border_color: None,
        }
    }
}

/// Largest square map side, in cells. Stored or configured dimensions
/// beyond it are clamped.
pub const MAX_GRID_EXTENT: u32 = 512;
/// Largest hex radius (rings including the centre), matching
/// [`MAX_GRID_EXTENT`] across.
pub const MAX_HEX_RADIUS: u32 = MAX_GRID_EXTENT / 2;

/// Shape of a freshly created map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapDefaults {
    pub grid_type: GridType,
    /// Hex only: number of rings including the centre cell.
    pub radius: u32,
    /// Square only.
    pub columns: u32,
    /// Square only.
    pub rows: u32,
    pub cell_size: f64,
    pub orientation: HexOrientation,
}

impl Default for MapDefaults {
    fn default() -> Self {
        Self {
            grid_type: GridType::Hex,
            radius: 4,
            columns: 7,
            rows: 7,
            cell_size: 80.0,
            orientation: HexOrientation::Pointy,
        }
    }
}

impl MapDefaults {
    /// Hex extent across, in cells.
    pub fn hex_span(&self) -> u32 {
        self.radius.min(MAX_HEX_RADIUS).saturating_mul(2).saturating_sub(1)
    }
}

/// The persisted aggregate: grid shape, allowed cells, tiles and layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapConfiguration {
    pub grid_type: GridType,
    pub grid_columns: u32,
    pub grid_rows: u32,
    pub cell_size: f64,
    pub hex_settings: Option<HexSettings>,
    pub style: GridStyle,
    pub allowed_cells: Vec<CellCoord>,
    pub widgets: Vec<PlacedTile>,
    pub layers: Vec<Layer>,
    pub active_layer_id: LayerId,
    pub version: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for MapConfiguration {
    fn default() -> Self {
        Self::new(&MapDefaults::default())
    }
}

impl MapConfiguration {
    pub fn new(defaults: &MapDefaults) -> Self {
        let (columns, rows, hex_settings) = match defaults.grid_type {
            GridType::Hex => (
                defaults.hex_span(),
                defaults.hex_span(),
                Some(HexSettings {
                    hex_size: defaults.cell_size / 2.0,
                    orientation: defaults.orientation,
                }),
            ),
            GridType::Square => (defaults.columns, defaults.rows, None),
        };
        let mut config = Self {
            grid_type: defaults.grid_type,
            grid_columns: columns,
            grid_rows: rows,
            cell_size: defaults.cell_size,
            hex_settings,
            style: GridStyle::default(),
            allowed_cells: Vec::new(),
            widgets: Vec::new(),
            layers: vec![Layer::default_grid(), Layer::default_tiles()],
            active_layer_id: TILES_LAYER_ID.into(),
            version: 0,
            updated_at: None,
        };
        config.allowed_cells = config.default_cells();
        config
    }

    /// Hex rings including the centre, derived from the bounding extent.
    pub fn hex_radius(&self) -> u32 {
        self.grid_columns.max(self.grid_rows).div_ceil(2).min(MAX_HEX_RADIUS)
    }

    /// The full cell set implied by the grid dimensions.
    pub fn default_cells(&self) -> Vec<CellCoord> {
        match self.grid_type {
            GridType::Hex => {
                let radius = self.hex_radius();
                if radius == 0 {
                    return Vec::new();
                }
                let mut cells: Vec<CellCoord> =
                    Cube::ORIGIN.range(radius - 1).into_iter().map(CellCoord::Hex).collect();
                cells.sort();
                cells
            }
            GridType::Square => Square::rect(
                self.grid_columns.min(MAX_GRID_EXTENT),
                self.grid_rows.min(MAX_GRID_EXTENT),
            )
                .into_iter()
                .map(CellCoord::Square)
                .collect(),
        }
    }

    pub fn hex_settings_or_default(&self) -> HexSettings {
        self.hex_settings.unwrap_or(HexSettings {
            hex_size: self.cell_size / 2.0,
            orientation: HexOrientation::default(),
        })
    }

    pub fn layout(&self) -> GridLayout {
        match self.grid_type {
            GridType::Hex => {
                let hex = self.hex_settings_or_default();
                GridLayout::hex(hex.hex_size, hex.orientation)
            }
            GridType::Square => GridLayout::square(self.cell_size),
        }
    }
}
