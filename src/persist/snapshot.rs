//! Stored document shapes.
//!
//! [`normalize`] turns any stored snapshot, whatever generation of the
//! schema wrote it, into a complete [`MapConfiguration`]. It never fails:
//! unknown fields are ignored, missing ones take defaults, and the result
//! always satisfies the grid model invariants.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use super::capabilities::{ConfigColumn, StorageCapabilities, TileColumn};
use super::store::{ProjectKey, Row};
use crate::geometry::{CellCoord, Cube, GridType, HexOrientation, Square};
use crate::map::{
    Appearance, GridModel, GridStyle, HexSettings, Layer, LayerId, LayerKind, LayerStack,
    MapConfiguration, MapDefaults, PlacedTile, TileId, MAX_GRID_EXTENT,
};

type Object = Map<String, Value>;

/// First non-null value among the candidate field names.
fn field<'a>(obj: &'a Object, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|n| obj.get(*n))
        .find(|v| !v.is_null())
}

/// Some text columns hold JSON; decode them so callers see structure.
fn decode_text(value: &Value) -> Value {
    match value {
        Value::String(s) if s.trim_start().starts_with(['{', '[']) => {
            serde_json::from_str(s).unwrap_or(Value::Null)
        }
        other => other.clone(),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    let v: f64 = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn as_i32(value: &Value) -> Option<i32> {
    let v = as_f64(value)?.round();
    (v >= i32::MIN as f64 && v <= i32::MAX as f64).then_some(v as i32)
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// RFC 3339 text, Postgres-style text, or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z"))
            .map(|t| t.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_grid_type(value: &Value) -> Option<GridType> {
    let s = value.as_str()?.trim().to_ascii_lowercase();
    match s.as_str() {
        "hex" | "hexagon" | "hexagonal" | "hexagons" => Some(GridType::Hex),
        "square" | "squares" | "rect" | "grid" => Some(GridType::Square),
        _ => None,
    }
}

fn parse_orientation(value: &Value) -> Option<HexOrientation> {
    let s = value.as_str()?.to_ascii_lowercase();
    if s.starts_with("pointy") {
        Some(HexOrientation::Pointy)
    } else if s.starts_with("flat") {
        Some(HexOrientation::Flat)
    } else {
        None
    }
}

/// A coordinate in any stored form, interpreted in the map's grid type.
/// Hex cells always get `s = -q - r`.
fn parse_cell(value: &Value, grid_type: GridType) -> Option<CellCoord> {
    let (a, b, c) = match value {
        Value::Object(obj) => {
            if let (Some(q), Some(r)) = (field(obj, &["q"]), field(obj, &["r"])) {
                (as_i32(q)?, as_i32(r)?, field(obj, &["s"]).and_then(as_i32))
            } else if let (Some(x), Some(y)) = (field(obj, &["x", "col"]), field(obj, &["y", "row"])) {
                (as_i32(x)?, as_i32(y)?, None)
            } else {
                return None;
            }
        }
        Value::Array(items) => match items.as_slice() {
            [a, b] => (as_i32(a)?, as_i32(b)?, None),
            [a, b, c] => (as_i32(a)?, as_i32(b)?, as_i32(c)),
            _ => return None,
        },
        Value::String(s) => {
            let parts: Option<Vec<i32>> = s.split(',').map(|p| p.trim().parse().ok()).collect();
            match parts?.as_slice() {
                [a, b] => (*a, *b, None),
                [a, b, c] => (*a, *b, Some(*c)),
                _ => return None,
            }
        }
        _ => return None,
    };
    Some(match grid_type {
        GridType::Hex => {
            let cube = Cube::new(a, b);
            if c.is_some_and(|s| s != cube.s) {
                log::debug!("recomputing inconsistent s for hex ({a},{b})");
            }
            CellCoord::Hex(cube)
        }
        GridType::Square => CellCoord::Square(Square::new(a, b)),
    })
}

fn parse_appearance(value: &Value) -> Option<Appearance> {
    let value = decode_text(value);
    let obj = value.as_object()?;
    let appearance = Appearance {
        color: field(obj, &["color", "colour", "fill"]).and_then(as_string),
        label: field(obj, &["label", "text"]).and_then(as_string),
        rotation: field(obj, &["rotation", "rotate"]).and_then(as_i32).unwrap_or(0),
        scale: field(obj, &["scale"]).and_then(as_f64),
    };
    (!appearance.is_empty()).then_some(appearance)
}

fn parse_layer(value: &Value, index: usize) -> Option<Layer> {
    let obj = value.as_object()?;
    let id = field(obj, &["id", "layerId", "layer_id"])
        .and_then(as_string)
        .map(LayerId)
        .unwrap_or_else(LayerId::generate);
    let kind = field(obj, &["kind", "type", "layerType", "layer_type"])
        .and_then(|v| v.as_str())
        .and_then(LayerKind::parse)
        .unwrap_or(if id.as_str() == crate::map::GRID_LAYER_ID {
            LayerKind::Grid
        } else {
            LayerKind::Tiles
        });
    let name = field(obj, &["name", "label", "title"])
        .and_then(as_string)
        .unwrap_or_else(|| match kind {
            LayerKind::Grid => "Grid".to_string(),
            LayerKind::Tiles => "Tiles".to_string(),
            LayerKind::Image => "Image".to_string(),
            LayerKind::Background => "Background".to_string(),
        });
    let mut layer = Layer::new(id, name, kind, index as u32);
    if let Some(visible) = field(obj, &["visible", "isVisible", "is_visible"]).and_then(as_bool) {
        layer.visible = visible;
    }
    if let Some(order) = field(obj, &["order", "zIndex", "z_index"]).and_then(as_u64) {
        layer.order = order as u32;
    }
    Some(layer)
}

fn parse_tile(value: &Value, grid_type: GridType, fallback_layer: &LayerId) -> Option<PlacedTile> {
    let obj = value.as_object()?;
    let cell = match field(obj, &["coordinate", "coord", "coords", "position", "cell"]) {
        Some(nested) => parse_cell(nested, grid_type),
        None => parse_cell(value, grid_type),
    }?;
    let tile_type = field(obj, &["tileTypeId", "tile_type_id", "tileType", "tile_type", "type"])
        .and_then(as_string)?;
    let layer = field(obj, &["layerId", "layer_id", "layer"])
        .and_then(as_string)
        .map(LayerId)
        .unwrap_or_else(|| fallback_layer.clone());
    let id = field(obj, &["id", "widgetId", "widget_id", "tileId", "tile_id"])
        .and_then(as_string)
        .map(TileId)
        .unwrap_or_else(TileId::generate);
    Some(PlacedTile {
        id,
        cell,
        tile_type,
        layer,
        appearance: field(obj, &["appearance", "style"]).and_then(parse_appearance),
        updated_at: field(obj, &["updatedAt", "updated_at"]).and_then(parse_timestamp),
    })
}

/// Normalize with the stock defaults for a new map.
pub fn normalize(raw: &Value) -> MapConfiguration {
    normalize_with(raw, &MapDefaults::default())
}

/// Normalize any stored snapshot shape. Absent or non-object input yields
/// a fresh map built from `defaults`.
pub fn normalize_with(raw: &Value, defaults: &MapDefaults) -> MapConfiguration {
    let raw = decode_text(raw);
    let Some(root) = raw.as_object() else {
        return MapConfiguration::new(defaults);
    };
    // Early documents nested the grid description
    let grid = field(root, &["grid", "gridConfig", "grid_config"])
        .and_then(|g| g.as_object())
        .cloned()
        .unwrap_or_default();
    let lookup = |names: &[&str]| field(root, names).or_else(|| field(&grid, names)).cloned();

    let hex_obj = lookup(&["hexSettings", "hex_settings"])
        .map(|v| decode_text(&v))
        .and_then(|v| v.as_object().cloned());

    let grid_type = lookup(&["gridType", "grid_type", "type"])
        .and_then(|v| parse_grid_type(&v))
        .unwrap_or(if hex_obj.is_some() {
            GridType::Hex
        } else {
            defaults.grid_type
        });

    let mut config = MapConfiguration::new(&MapDefaults {
        grid_type,
        ..defaults.clone()
    });

    if let Some(size) = lookup(&["cellSize", "cell_size", "tileSize", "tile_size"])
        .and_then(|v| as_f64(&v))
        .filter(|s| *s > 0.0)
    {
        config.cell_size = size;
    }
    let radius = lookup(&["radius", "hexRadius", "hex_radius"]).and_then(|v| as_u64(&v));
    let columns = lookup(&["gridColumns", "grid_columns", "columns", "cols", "width"])
        .and_then(|v| as_u64(&v))
        .or_else(|| radius.map(|r| r.saturating_mul(2).saturating_sub(1)));
    let rows = lookup(&["gridRows", "grid_rows", "rows", "height"])
        .and_then(|v| as_u64(&v))
        .or_else(|| radius.map(|r| r.saturating_mul(2).saturating_sub(1)));
    let extent = |n: u64| {
        if n > u64::from(MAX_GRID_EXTENT) {
            log::warn!("clamping stored grid extent {n} to {MAX_GRID_EXTENT}");
        }
        n.min(u64::from(MAX_GRID_EXTENT)) as u32
    };
    if let Some(c) = columns {
        config.grid_columns = extent(c);
    }
    if let Some(r) = rows {
        config.grid_rows = extent(r);
    }

    config.hex_settings = match grid_type {
        GridType::Square => None,
        GridType::Hex => {
            let nested = |names: &[&str]| hex_obj.as_ref().and_then(|h| field(h, names)).cloned();
            let hex_size = nested(&["hexSize", "hex_size", "size"])
                .or_else(|| lookup(&["hexSize", "hex_size"]))
                .and_then(|v| as_f64(&v))
                .filter(|s| *s > 0.0)
                .unwrap_or(config.cell_size / 2.0);
            let orientation = nested(&["orientation", "hexOrientation", "hex_orientation"])
                .or_else(|| lookup(&["hexOrientation", "hex_orientation", "orientation"]))
                .and_then(|v| parse_orientation(&v))
                .unwrap_or(defaults.orientation);
            Some(HexSettings { hex_size, orientation })
        }
    };

    let style_obj = lookup(&["style", "gridStyle", "grid_style"])
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();
    let style_field = |flat: &[&str], nested: &[&str]| {
        lookup(flat).or_else(|| field(&style_obj, nested).cloned())
    };
    let mut style = GridStyle::default();
    if let Some(w) = style_field(&["gridLineWidth", "grid_line_width"], &["lineWidth", "line_width"])
        .and_then(|v| as_f64(&v))
    {
        style.line_width = w.max(0.0);
    }
    if let Some(w) =
        style_field(&["gridBorderWidth", "grid_border_width"], &["borderWidth", "border_width"])
            .and_then(|v| as_f64(&v))
    {
        style.border_width = w.max(0.0);
    }
    style.line_color = style_field(&["gridLineColor", "grid_line_color"], &["lineColor", "line_color"])
        .and_then(|v| as_string(&v));
    style.border_color =
        style_field(&["gridBorderColor", "grid_border_color"], &["borderColor", "border_color"])
            .and_then(|v| as_string(&v));
    config.style = style;

    // Cells: an explicit list wins, even an empty one
    match lookup(&["allowedCells", "allowed_cells", "cells"]).map(|v| decode_text(&v)) {
        Some(Value::Array(items)) => {
            let mut seen = HashSet::new();
            config.allowed_cells = items
                .iter()
                .filter_map(|c| parse_cell(c, grid_type))
                .filter(|c| seen.insert(*c))
                .collect();
        }
        _ => config.allowed_cells = config.default_cells(),
    }

    let raw_layers: Vec<Layer> = match lookup(&["layers"]).map(|v| decode_text(&v)) {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, l)| parse_layer(l, i))
            .collect(),
        _ => Vec::new(),
    };
    let stack = LayerStack::from_layers(raw_layers);
    let tiles_layer = stack
        .first_of_kind(LayerKind::Tiles)
        .map(|l| l.id.clone())
        .unwrap_or_else(|| stack.grid().id.clone());

    config.active_layer_id = lookup(&["activeLayerId", "active_layer_id"])
        .and_then(|v| as_string(&v))
        .map(LayerId)
        .filter(|id| stack.get(id).is_some())
        .unwrap_or_else(|| tiles_layer.clone());

    let raw_tiles = lookup(&["widgets", "tiles", "placedTiles", "placed_tiles"])
        .map(|v| decode_text(&v))
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();
    let mut allowed: HashSet<CellCoord> = config.allowed_cells.iter().copied().collect();
    config.widgets = raw_tiles
        .iter()
        .filter_map(|t| {
            let tile = parse_tile(t, grid_type, &tiles_layer);
            if tile.is_none() {
                log::warn!("skipping unreadable stored tile: {t}");
            }
            tile
        })
        .map(|mut tile| {
            if !stack.get(&tile.layer).is_some_and(|l| l.kind.holds_tiles()) {
                log::debug!("tile {} moved from layer {} to {tiles_layer}", tile.id, tile.layer);
                tile.layer = tiles_layer.clone();
            }
            // Keep user data: a stray tile extends the map rather than vanishing
            if allowed.insert(tile.cell) {
                config.allowed_cells.push(tile.cell);
            }
            tile
        })
        .collect();
    config.layers = stack.to_vec();

    config.version = lookup(&["version", "revision"])
        .and_then(|v| as_u64(&v))
        .unwrap_or(0);
    config.updated_at = lookup(&["updatedAt", "updated_at", "modifiedAt", "modified_at"])
        .and_then(|v| parse_timestamp(&v));

    // Duplicate occupancy is settled here: first tile wins
    GridModel::from_config(config).to_config()
}

/// The version a stored row or document carries, without normalizing it.
pub fn stored_version(raw: &Value) -> Option<u64> {
    raw.as_object()
        .and_then(|obj| field(obj, &["version", "revision"]))
        .and_then(as_u64)
}

fn cell_value(cell: CellCoord) -> Value {
    match cell {
        CellCoord::Hex(c) => json!({ "q": c.q, "r": c.r, "s": c.s }),
        CellCoord::Square(c) => json!({ "x": c.x, "y": c.y }),
    }
}

fn appearance_value(appearance: &Appearance) -> Value {
    let mut obj = Object::new();
    if let Some(color) = &appearance.color {
        obj.insert("color".into(), json!(color));
    }
    if let Some(label) = &appearance.label {
        obj.insert("label".into(), json!(label));
    }
    if appearance.rotation != 0 {
        obj.insert("rotation".into(), json!(appearance.rotation));
    }
    if let Some(scale) = appearance.scale {
        obj.insert("scale".into(), json!(scale));
    }
    Value::Object(obj)
}

fn layer_value(layer: &Layer) -> Value {
    json!({
        "id": layer.id.as_str(),
        "name": layer.name,
        "kind": layer.kind.as_str(),
        "visible": layer.visible,
        "order": layer.order,
    })
}

/// The canonical snapshot document, as written to the blob.
pub fn to_document(config: &MapConfiguration) -> Value {
    let widgets: Vec<Value> = config
        .widgets
        .iter()
        .map(|t| {
            let mut obj = json!({
                "id": t.id.as_str(),
                "coordinate": cell_value(t.cell),
                "tileTypeId": t.tile_type,
                "layerId": t.layer.as_str(),
            });
            if let Some(a) = &t.appearance {
                obj["appearance"] = appearance_value(a);
            }
            if let Some(at) = t.updated_at {
                obj["updatedAt"] = json!(at.to_rfc3339());
            }
            obj
        })
        .collect();

    let mut doc = json!({
        "gridType": config.grid_type.as_str(),
        "gridColumns": config.grid_columns,
        "gridRows": config.grid_rows,
        "cellSize": config.cell_size,
        "gridLineWidth": config.style.line_width,
        "gridBorderWidth": config.style.border_width,
        "allowedCells": config.allowed_cells.iter().map(|c| cell_value(*c)).collect::<Vec<_>>(),
        "widgets": widgets,
        "layers": config.layers.iter().map(layer_value).collect::<Vec<_>>(),
        "activeLayerId": config.active_layer_id.as_str(),
        "version": config.version,
    });
    if let Some(hex) = config.hex_settings {
        doc["hexSettings"] = json!({
            "hexSize": hex.hex_size,
            "orientation": hex.orientation.as_str(),
        });
    }
    if let Some(color) = &config.style.line_color {
        doc["gridLineColor"] = json!(color);
    }
    if let Some(color) = &config.style.border_color {
        doc["gridBorderColor"] = json!(color);
    }
    if let Some(at) = config.updated_at {
        doc["updatedAt"] = json!(at.to_rfc3339());
    }
    doc
}

/// The configuration row, restricted to the columns the store has.
pub fn config_row(config: &MapConfiguration, key: &ProjectKey, caps: &StorageCapabilities) -> Row {
    let mut row = Row::new();
    for column in ConfigColumn::ALL {
        if !caps.has_config(column) {
            continue;
        }
        let value = match column {
            ConfigColumn::ProjectId => json!(key.project_id),
            ConfigColumn::OwnerId => json!(key.owner_id),
            ConfigColumn::GridType => json!(config.grid_type.as_str()),
            ConfigColumn::GridColumns => json!(config.grid_columns),
            ConfigColumn::GridRows => json!(config.grid_rows),
            ConfigColumn::CellSize => json!(config.cell_size),
            ConfigColumn::AllowedCells => {
                Value::Array(config.allowed_cells.iter().map(|c| cell_value(*c)).collect())
            }
            ConfigColumn::Version => json!(config.version),
            ConfigColumn::UpdatedAt => config
                .updated_at
                .map(|t| json!(t.to_rfc3339()))
                .unwrap_or(Value::Null),
            ConfigColumn::HexSettings => match config.hex_settings {
                Some(hex) => json!({ "hex_size": hex.hex_size, "orientation": hex.orientation.as_str() }),
                None => Value::Null,
            },
            ConfigColumn::GridLineWidth => json!(config.style.line_width),
            ConfigColumn::GridBorderWidth => json!(config.style.border_width),
            ConfigColumn::GridLineColor => json!(config.style.line_color),
            ConfigColumn::GridBorderColor => json!(config.style.border_color),
            ConfigColumn::Layers => Value::Array(config.layers.iter().map(layer_value).collect()),
            ConfigColumn::ActiveLayerId => json!(config.active_layer_id.as_str()),
        };
        row.insert(column.name().to_string(), value);
    }
    row
}

/// One row per tile, restricted to the columns the store has.
pub fn tile_rows(config: &MapConfiguration, key: &ProjectKey, caps: &StorageCapabilities) -> Vec<Row> {
    config
        .widgets
        .iter()
        .map(|tile| {
            let (q, r, s) = match tile.cell {
                CellCoord::Hex(c) => (c.q, c.r, Some(c.s)),
                CellCoord::Square(c) => (c.x, c.y, None),
            };
            let mut row = Row::new();
            for column in TileColumn::ALL {
                if !caps.has_tile(column) {
                    continue;
                }
                let value = match column {
                    TileColumn::Id => json!(tile.id.as_str()),
                    TileColumn::ProjectId => json!(key.project_id),
                    TileColumn::OwnerId => json!(key.owner_id),
                    TileColumn::TileTypeId => json!(tile.tile_type),
                    TileColumn::Q => json!(q),
                    TileColumn::R => json!(r),
                    TileColumn::S => json!(s),
                    TileColumn::LayerId => json!(tile.layer.as_str()),
                    TileColumn::Appearance => {
                        tile.appearance.as_ref().map(appearance_value).unwrap_or(Value::Null)
                    }
                    TileColumn::UpdatedAt => {
                        tile.updated_at.map(|t| json!(t.to_rfc3339())).unwrap_or(Value::Null)
                    }
                };
                row.insert(column.name().to_string(), value);
            }
            row
        })
        .collect()
}

/// Join a configuration row and its tile rows into one raw document for
/// [`normalize`].
pub fn assemble_rows(config_row: &Row, tiles: &[Row]) -> Value {
    let mut doc = config_row.clone();
    doc.insert(
        "widgets".into(),
        Value::Array(tiles.iter().cloned().map(Value::Object).collect()),
    );
    Value::Object(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{GRID_LAYER_ID, TILES_LAYER_ID};

    fn assert_layers_valid(config: &MapConfiguration) {
        let grids = config.layers.iter().filter(|l| l.kind == LayerKind::Grid).count();
        assert_eq!(grids, 1);
        assert!(config.layers.iter().any(|l| l.kind == LayerKind::Tiles));
        assert!(config.layers.iter().any(|l| l.id == config.active_layer_id));
    }

    #[test]
    fn test_empty_snapshot() {
        for raw in [Value::Null, json!({}), json!("garbage"), json!(42)] {
            let config = normalize(&raw);
            assert_layers_valid(&config);
            assert_eq!(config.grid_type, GridType::Hex);
            assert_eq!(config.allowed_cells.len(), 37);
            assert_eq!(config.version, 0);
        }
    }

    #[test]
    fn test_oversized_dimensions_clamped() {
        let config = normalize(&json!({
            "gridType": "square",
            "gridColumns": 70000,
            "gridRows": 70000
        }));
        assert_eq!(config.grid_columns, MAX_GRID_EXTENT);
        assert_eq!(config.grid_rows, MAX_GRID_EXTENT);
        assert_eq!(config.allowed_cells.len(), (MAX_GRID_EXTENT * MAX_GRID_EXTENT) as usize);

        let config = normalize(&json!({ "gridType": "hex", "radius": u64::MAX }));
        assert_eq!(config.grid_columns, MAX_GRID_EXTENT);
        assert!(config.allowed_cells.contains(&Cube::ORIGIN.into()));
        assert_layers_valid(&config);
    }

    #[test]
    fn test_missing_layers_synthesized() {
        let config = normalize(&json!({
            "gridType": "hex",
            "gridColumns": 7,
            "gridRows": 7,
            "widgets": [{ "id": "a", "coordinate": { "q": 0, "r": 0, "s": 0 }, "tileTypeId": "stone" }]
        }));
        assert_layers_valid(&config);
        assert_eq!(config.layers[0].id.as_str(), GRID_LAYER_ID);
        assert_eq!(config.widgets[0].layer.as_str(), TILES_LAYER_ID);
    }

    #[test]
    fn test_missing_s_is_derived() {
        let config = normalize(&json!({
            "gridType": "hex",
            "widgets": [
                { "id": "a", "coordinate": { "q": 1, "r": -2 }, "tileTypeId": "stone" },
                { "id": "b", "q": -1, "r": 0, "s": 7, "tile_type_id": "water" }
            ]
        }));
        assert_eq!(config.widgets.len(), 2);
        for tile in &config.widgets {
            let c = tile.cell.as_hex().unwrap();
            assert_eq!(c.q + c.r + c.s, 0);
        }
        assert_eq!(config.widgets[0].cell, CellCoord::Hex(Cube::new(1, -2)));
    }

    #[test]
    fn test_legacy_nested_shape() {
        let config = normalize(&json!({
            "grid": { "type": "square", "columns": 4, "rows": 3, "cellSize": 50 },
            "tiles": [{ "position": [2, 1], "type": "wall" }],
            "updated_at": 1_700_000_000_000i64
        }));
        assert_eq!(config.grid_type, GridType::Square);
        assert_eq!(config.grid_columns, 4);
        assert_eq!(config.allowed_cells.len(), 12);
        assert_eq!(config.cell_size, 50.0);
        assert!(config.hex_settings.is_none());
        assert_eq!(config.widgets.len(), 1);
        assert_eq!(config.widgets[0].cell, CellCoord::Square(Square::new(2, 1)));
        assert!(!config.widgets[0].id.as_str().is_empty());
        assert_eq!(config.updated_at.unwrap().timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_top_level_hex_fields() {
        let config = normalize(&json!({
            "gridType": "hexagonal",
            "cellSize": 60,
            "hexOrientation": "flat-top",
            "version": "12"
        }));
        let hex = config.hex_settings.unwrap();
        assert_eq!(hex.orientation, HexOrientation::Flat);
        assert_eq!(hex.hex_size, 30.0);
        assert_eq!(config.version, 12);
    }

    #[test]
    fn test_stray_tile_extends_map() {
        let config = normalize(&json!({
            "gridType": "hex",
            "allowedCells": [{ "q": 0, "r": 0, "s": 0 }],
            "widgets": [{ "id": "far", "coordinate": "5,0,-5", "tileTypeId": "stone" }]
        }));
        assert_eq!(config.allowed_cells.len(), 2);
        assert!(config.allowed_cells.contains(&CellCoord::Hex(Cube::new(5, 0))));
        assert_eq!(config.widgets.len(), 1);
    }

    #[test]
    fn test_duplicate_occupancy_keeps_first() {
        let config = normalize(&json!({
            "widgets": [
                { "id": "a", "coordinate": { "q": 0, "r": 0 }, "tileTypeId": "stone" },
                { "id": "b", "coordinate": { "q": 0, "r": 0 }, "tileTypeId": "water" }
            ]
        }));
        assert_eq!(config.widgets.len(), 1);
        assert_eq!(config.widgets[0].id.as_str(), "a");
    }

    #[test]
    fn test_tiles_on_grid_layer_are_moved() {
        let config = normalize(&json!({
            "layers": [
                { "id": "g", "name": "Base", "kind": "grid" },
                { "id": "deco", "name": "Decor", "kind": "tiles" }
            ],
            "activeLayerId": "nope",
            "widgets": [
                { "id": "a", "coordinate": { "q": 0, "r": 0 }, "tileTypeId": "stone", "layerId": "g" },
                { "id": "b", "coordinate": { "q": 1, "r": 0 }, "tileTypeId": "stone", "layerId": "ghost" }
            ]
        }));
        assert_layers_valid(&config);
        assert_eq!(config.active_layer_id.as_str(), "deco");
        assert!(config.widgets.iter().all(|t| t.layer.as_str() == "deco"));
    }

    #[test]
    fn test_empty_cell_list_is_kept() {
        let config = normalize(&json!({ "gridType": "hex", "allowedCells": [] }));
        assert!(config.allowed_cells.is_empty());
    }

    #[test]
    fn test_json_text_columns() {
        let config = normalize(&json!({
            "grid_type": "hex",
            "allowed_cells": "[[0,0],[1,0]]",
            "layers": "[{\"id\":\"grid\",\"kind\":\"grid\"},{\"id\":\"tiles\",\"kind\":\"tiles\"}]"
        }));
        assert_eq!(config.allowed_cells.len(), 2);
        assert_eq!(config.layers.len(), 2);
    }

    #[test]
    fn test_document_roundtrip() {
        let mut model = GridModel::default();
        let id = model.place(Cube::new(1, -1).into(), "stone", &TILES_LAYER_ID.into()).unwrap();
        model.set_appearance(
            &id,
            Some(Appearance {
                color: Some("#aa0000".into()),
                rotation: 60,
                ..Default::default()
            }),
        );
        model.set_line_color(Some("#333".into()));
        let config = model.to_config();
        assert_eq!(normalize(&to_document(&config)), config);
    }

    #[test]
    fn test_rows_roundtrip() {
        let mut model = GridModel::default();
        model.place(Cube::new(0, 1).into(), "water", &TILES_LAYER_ID.into()).unwrap();
        let config = model.to_config();
        let key = ProjectKey::new("p", "u");
        let caps = StorageCapabilities::assume_all();
        let doc = assemble_rows(&config_row(&config, &key, &caps), &tile_rows(&config, &key, &caps));
        assert_eq!(normalize(&doc), config);
    }

    #[test]
    fn test_rows_respect_capabilities() {
        let config = MapConfiguration::default();
        let key = ProjectKey::new("p", "u");
        let mut caps = StorageCapabilities::assume_all();
        caps.learn(&crate::persist::StoreError::MissingColumn {
            table: crate::persist::CONFIG_TABLE.into(),
            column: "layers".into(),
        });
        let row = config_row(&config, &key, &caps);
        assert!(!row.contains_key("layers"));
        assert!(row.contains_key("version"));
    }
}
