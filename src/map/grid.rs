use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use slotmap::{new_key_type, SlotMap};

use super::configuration::{GridStyle, HexSettings, MapConfiguration, MapDefaults};
use super::layer::{Layer, LayerId, LayerKind, LayerStack};
use super::tile::{Appearance, PlacedTile, TileId};
use crate::geometry::{CellCoord, GridLayout, GridType};

new_key_type! {
    /// Arena handle for a placed tile. Internal; callers use `TileId`.
    struct TileKey;
}

/// Why an edit was refused. Refusals are no-ops surfaced as a status
/// message, never errors.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("cell {0} is already occupied")]
    Occupied(CellCoord),
    #[error("cell {0} is outside the map")]
    OutOfBounds(CellCoord),
    #[error("cell {0} does not match the grid type")]
    WrongCellKind(CellCoord),
    #[error("no tile with id {0}")]
    UnknownTile(TileId),
    #[error("no layer with id {0}")]
    UnknownLayer(LayerId),
    #[error("layer {0} cannot hold tiles")]
    NotTileLayer(LayerId),
    #[error("the grid layer cannot be removed")]
    GridLayerLocked,
    #[error("grid shape edits need the grid layer active")]
    GridLayerInactive,
    #[error("select a tile layer to paint tiles")]
    TileLayerInactive,
    #[error("the map did not load; retry loading before editing")]
    NotLoaded,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// The target held another tile; the two traded cells.
    Swapped(TileId),
    Unchanged,
}

/// Authoritative in-memory map. Every mutation is synchronous and bumps
/// `revision`, which the persistence layer watches.
///
/// Invariants: every tile sits on an allowed cell; at most one tile per
/// (layer, cell); exactly one grid layer.
pub struct GridModel {
    grid_type: GridType,
    grid_columns: u32,
    grid_rows: u32,
    cell_size: f64,
    hex_settings: Option<HexSettings>,
    style: GridStyle,
    allowed: HashSet<CellCoord>,
    /// Primary storage.
    tiles: SlotMap<TileKey, PlacedTile>,
    by_id: HashMap<TileId, TileKey>,
    /// Spatial index: "what's on this layer at this cell?"
    occupancy: HashMap<(LayerId, CellCoord), TileKey>,
    layers: LayerStack,
    active_layer: LayerId,
    selected: Option<TileId>,
    status: Option<Rejection>,
    version: u64,
    updated_at: Option<DateTime<Utc>>,
    revision: u64,
}

impl Default for GridModel {
    fn default() -> Self {
        Self::from_config(MapConfiguration::default())
    }
}

impl GridModel {
    /// Build from a configuration. Tiles that would break an invariant are
    /// dropped with a warning; normalised input never triggers this.
    pub fn from_config(config: MapConfiguration) -> Self {
        let layers = LayerStack::from_layers(config.layers);
        let active_layer = if layers.get(&config.active_layer_id).is_some() {
            config.active_layer_id
        } else {
            layers
                .first_of_kind(LayerKind::Tiles)
                .map(|l| l.id.clone())
                .unwrap_or_else(|| layers.grid().id.clone())
        };
        let mut model = Self {
            grid_type: config.grid_type,
            grid_columns: config.grid_columns,
            grid_rows: config.grid_rows,
            cell_size: config.cell_size,
            hex_settings: config.hex_settings,
            style: config.style,
            allowed: config.allowed_cells.into_iter().collect(),
            tiles: SlotMap::with_key(),
            by_id: HashMap::new(),
            occupancy: HashMap::new(),
            layers,
            active_layer,
            selected: None,
            status: None,
            version: config.version,
            updated_at: config.updated_at,
            revision: 0,
        };
        for tile in config.widgets {
            let id = tile.id.clone();
            if let Err(reason) = model.insert_tile(tile) {
                log::warn!("dropping tile {id} on load: {reason}");
            }
        }
        model.status = None;
        model
    }

    /// Snapshot as a persistable configuration. Cells and tiles are sorted
    /// so equal models produce equal documents.
    pub fn to_config(&self) -> MapConfiguration {
        let mut allowed_cells: Vec<CellCoord> = self.allowed.iter().copied().collect();
        allowed_cells.sort();
        let mut widgets: Vec<PlacedTile> = self.tiles.values().cloned().collect();
        widgets.sort_by(|a, b| a.id.cmp(&b.id));
        MapConfiguration {
            grid_type: self.grid_type,
            grid_columns: self.grid_columns,
            grid_rows: self.grid_rows,
            cell_size: self.cell_size,
            hex_settings: self.hex_settings,
            style: self.style.clone(),
            allowed_cells,
            widgets,
            layers: self.layers.to_vec(),
            active_layer_id: self.active_layer.clone(),
            version: self.version,
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn reject<T>(&mut self, reason: Rejection) -> Option<T> {
        log::debug!("edit rejected: {reason}");
        self.status = Some(reason);
        None
    }

    fn cell_kind_ok(&self, cell: CellCoord) -> bool {
        cell.is_hex() == (self.grid_type == GridType::Hex)
    }

    fn insert_tile(&mut self, tile: PlacedTile) -> Result<TileId, Rejection> {
        if !self.cell_kind_ok(tile.cell) {
            return Err(Rejection::WrongCellKind(tile.cell));
        }
        if !self.allowed.contains(&tile.cell) {
            return Err(Rejection::OutOfBounds(tile.cell));
        }
        match self.layers.get(&tile.layer) {
            None => return Err(Rejection::UnknownLayer(tile.layer.clone())),
            Some(layer) if !layer.kind.holds_tiles() => {
                return Err(Rejection::NotTileLayer(tile.layer.clone()))
            }
            Some(_) => {}
        }
        let slot = (tile.layer.clone(), tile.cell);
        if self.occupancy.contains_key(&slot) {
            return Err(Rejection::Occupied(tile.cell));
        }
        if self.by_id.contains_key(&tile.id) {
            return Err(Rejection::Occupied(tile.cell));
        }
        let id = tile.id.clone();
        let key = self.tiles.insert(tile);
        self.by_id.insert(id.clone(), key);
        self.occupancy.insert(slot, key);
        Ok(id)
    }

    // Queries

    pub fn grid_type(&self) -> GridType {
        self.grid_type
    }

    pub fn layout(&self) -> GridLayout {
        match self.grid_type {
            GridType::Hex => {
                let hex = self.hex_settings.unwrap_or(HexSettings {
                    hex_size: self.cell_size / 2.0,
                    orientation: Default::default(),
                });
                GridLayout::hex(hex.hex_size, hex.orientation)
            }
            GridType::Square => GridLayout::square(self.cell_size),
        }
    }

    pub fn style(&self) -> &GridStyle {
        &self.style
    }

    pub fn is_allowed(&self, cell: CellCoord) -> bool {
        self.allowed.contains(&cell)
    }

    pub fn allowed_cells(&self) -> impl Iterator<Item = &CellCoord> {
        self.allowed.iter()
    }

    pub fn allowed_count(&self) -> usize {
        self.allowed.len()
    }

    pub fn tile(&self, id: &TileId) -> Option<&PlacedTile> {
        self.by_id.get(id).and_then(|&k| self.tiles.get(k))
    }

    pub fn tile_at(&self, layer: &LayerId, cell: CellCoord) -> Option<&PlacedTile> {
        self.occupancy
            .get(&(layer.clone(), cell))
            .and_then(|&k| self.tiles.get(k))
    }

    pub fn tiles(&self) -> impl Iterator<Item = &PlacedTile> {
        self.tiles.values()
    }

    pub fn tiles_on<'a>(&'a self, layer: &'a LayerId) -> impl Iterator<Item = &'a PlacedTile> + 'a {
        self.tiles.values().filter(move |t| &t.layer == layer)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn selected(&self) -> Option<&TileId> {
        self.selected.as_ref()
    }

    pub fn status(&self) -> Option<&Rejection> {
        self.status.as_ref()
    }

    /// Record a refusal decided outside the model (e.g. by the tool gate).
    pub fn set_status(&mut self, reason: Rejection) {
        self.status = Some(reason);
    }

    pub fn take_status(&mut self) -> Option<Rejection> {
        self.status.take()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// In-memory change counter. Not persisted.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn active_layer(&self) -> &LayerId {
        &self.active_layer
    }

    pub fn active_layer_kind(&self) -> LayerKind {
        self.layers
            .get(&self.active_layer)
            .map(|l| l.kind)
            .unwrap_or(LayerKind::Grid)
    }

    // Tile edits

    /// Place a new tile. Refused if the cell is outside the map, already
    /// occupied on `layer`, or `layer` cannot hold tiles.
    pub fn place(&mut self, cell: CellCoord, tile_type: &str, layer: &LayerId) -> Option<TileId> {
        self.place_tile(PlacedTile::new(cell, tile_type, layer.clone()))
    }

    pub fn place_tile(&mut self, tile: PlacedTile) -> Option<TileId> {
        match self.insert_tile(tile) {
            Ok(id) => {
                self.touch();
                Some(id)
            }
            Err(reason) => self.reject(reason),
        }
    }

    /// Move a tile. If another tile on the same layer holds the target cell
    /// the two swap. Moving onto its own cell is a no-op.
    pub fn move_tile(&mut self, id: &TileId, cell: CellCoord) -> Option<MoveOutcome> {
        let Some(&key) = self.by_id.get(id) else {
            return self.reject(Rejection::UnknownTile(id.clone()));
        };
        let (from, layer) = {
            let tile = &self.tiles[key];
            (tile.cell, tile.layer.clone())
        };
        if from == cell {
            return Some(MoveOutcome::Unchanged);
        }
        if !self.cell_kind_ok(cell) {
            return self.reject(Rejection::WrongCellKind(cell));
        }
        if !self.allowed.contains(&cell) {
            return self.reject(Rejection::OutOfBounds(cell));
        }

        let now = Utc::now();
        let outcome = match self.occupancy.get(&(layer.clone(), cell)).copied() {
            Some(other_key) => {
                let other = &mut self.tiles[other_key];
                other.cell = from;
                other.updated_at = Some(now);
                let other_id = other.id.clone();
                self.occupancy.insert((layer.clone(), from), other_key);
                MoveOutcome::Swapped(other_id)
            }
            None => {
                self.occupancy.remove(&(layer.clone(), from));
                MoveOutcome::Moved
            }
        };
        let tile = &mut self.tiles[key];
        tile.cell = cell;
        tile.updated_at = Some(now);
        self.occupancy.insert((layer, cell), key);
        self.touch();
        Some(outcome)
    }

    /// Delete a tile. Clears the selection if it pointed at this tile.
    pub fn remove(&mut self, id: &TileId) -> Option<PlacedTile> {
        let Some(key) = self.by_id.remove(id) else {
            return self.reject(Rejection::UnknownTile(id.clone()));
        };
        let tile = self.tiles.remove(key)?;
        self.occupancy.remove(&(tile.layer.clone(), tile.cell));
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        self.touch();
        Some(tile)
    }

    pub fn set_appearance(&mut self, id: &TileId, appearance: Option<Appearance>) -> bool {
        let Some(&key) = self.by_id.get(id) else {
            self.status = Some(Rejection::UnknownTile(id.clone()));
            return false;
        };
        let tile = &mut self.tiles[key];
        tile.appearance = appearance.filter(|a| !a.is_empty());
        tile.updated_at = Some(Utc::now());
        self.touch();
        true
    }

    pub fn select(&mut self, id: &TileId) -> bool {
        if self.by_id.contains_key(id) {
            self.selected = Some(id.clone());
            true
        } else {
            false
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    // Grid shape edits

    /// Add a cell to the map. Idempotent: returns false if already present.
    pub fn expand(&mut self, cell: CellCoord) -> bool {
        if !self.cell_kind_ok(cell) {
            self.status = Some(Rejection::WrongCellKind(cell));
            return false;
        }
        if !self.allowed.insert(cell) {
            return false;
        }
        self.touch();
        true
    }

    /// Remove a cell from the map, deleting every tile on it (all layers).
    /// Returns the deleted tiles, or `None` if the cell was not part of the map.
    pub fn shrink(&mut self, cell: CellCoord) -> Option<Vec<PlacedTile>> {
        if !self.allowed.remove(&cell) {
            return None;
        }
        let doomed: Vec<TileId> = self
            .tiles
            .values()
            .filter(|t| t.cell == cell)
            .map(|t| t.id.clone())
            .collect();
        let removed = doomed.iter().filter_map(|id| self.remove(id)).collect();
        self.touch();
        Some(removed)
    }

    /// Regenerate the default cell set for `defaults`, clearing all tiles.
    /// Layers, styling and version survive.
    pub fn reset(&mut self, defaults: &MapDefaults) {
        let fresh = MapConfiguration::new(defaults);
        self.grid_type = fresh.grid_type;
        self.grid_columns = fresh.grid_columns;
        self.grid_rows = fresh.grid_rows;
        self.cell_size = fresh.cell_size;
        self.hex_settings = fresh.hex_settings;
        self.allowed = fresh.allowed_cells.into_iter().collect();
        self.tiles.clear();
        self.by_id.clear();
        self.occupancy.clear();
        self.selected = None;
        self.touch();
    }

    // Layers

    pub fn add_layer(&mut self, name: &str, kind: LayerKind) -> Option<LayerId> {
        let id = self.layers.add(name, kind);
        if id.is_some() {
            self.touch();
        }
        id
    }

    /// Remove a layer and every tile on it. The grid layer is refused.
    pub fn remove_layer(&mut self, id: &LayerId) -> Option<Layer> {
        match self.layers.get(id) {
            None => return self.reject(Rejection::UnknownLayer(id.clone())),
            Some(l) if l.kind == LayerKind::Grid => return self.reject(Rejection::GridLayerLocked),
            Some(_) => {}
        }
        let doomed: Vec<TileId> = self.tiles_on(id).map(|t| t.id.clone()).collect();
        for tile_id in &doomed {
            self.remove(tile_id);
        }
        let removed = self.layers.remove(id)?;
        if &self.active_layer == id {
            self.active_layer = self
                .layers
                .first_of_kind(LayerKind::Tiles)
                .unwrap_or_else(|| self.layers.grid())
                .id
                .clone();
        }
        self.touch();
        Some(removed)
    }

    pub fn rename_layer(&mut self, id: &LayerId, name: &str) -> bool {
        let ok = self.layers.rename(id, name);
        if ok {
            self.touch();
        }
        ok
    }

    pub fn set_layer_visible(&mut self, id: &LayerId, visible: bool) -> bool {
        let ok = self.layers.set_visible(id, visible);
        if ok {
            self.touch();
        }
        ok
    }

    pub fn raise_layer(&mut self, id: &LayerId) -> bool {
        let ok = self.layers.raise(id);
        if ok {
            self.touch();
        }
        ok
    }

    pub fn lower_layer(&mut self, id: &LayerId) -> bool {
        let ok = self.layers.lower(id);
        if ok {
            self.touch();
        }
        ok
    }

    pub fn set_active_layer(&mut self, id: &LayerId) -> bool {
        if self.layers.get(id).is_none() {
            self.status = Some(Rejection::UnknownLayer(id.clone()));
            return false;
        }
        if &self.active_layer != id {
            self.active_layer = id.clone();
            self.selected = None;
            self.touch();
        }
        true
    }

    // Grid styling

    pub fn set_line_width(&mut self, width: f64) {
        self.style.line_width = width.max(0.0);
        self.touch();
    }

    pub fn set_border_width(&mut self, width: f64) {
        self.style.border_width = width.max(0.0);
        self.touch();
    }

    pub fn set_line_color(&mut self, color: Option<String>) {
        self.style.line_color = color;
        self.touch();
    }

    pub fn set_border_color(&mut self, color: Option<String>) {
        self.style.border_color = color;
        self.touch();
    }

    /// Adopt the version and timestamp assigned by a successful save.
    /// Not an edit, so `revision` is untouched.
    pub fn mark_saved(&mut self, version: u64, updated_at: Option<DateTime<Utc>>) {
        self.version = self.version.max(version);
        self.updated_at = updated_at.or(self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Cube, Square};
    use crate::map::layer::{GRID_LAYER_ID, TILES_LAYER_ID};

    fn tiles_layer() -> LayerId {
        TILES_LAYER_ID.into()
    }

    fn hex(q: i32, r: i32) -> CellCoord {
        CellCoord::Hex(Cube::new(q, r))
    }

    #[test]
    fn test_place_and_query() {
        let mut grid = GridModel::default();
        let id = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        assert_eq!(grid.tile_count(), 1);
        let tile = grid.tile_at(&tiles_layer(), hex(0, 0)).unwrap();
        assert_eq!(tile.id, id);
        assert_eq!(tile.tile_type, "stone");
        assert_eq!(grid.revision(), 1);
    }

    #[test]
    fn test_place_occupied_rejected() {
        let mut grid = GridModel::default();
        grid.place(hex(1, 0), "stone", &tiles_layer()).unwrap();
        let before = grid.revision();
        assert!(grid.place(hex(1, 0), "water", &tiles_layer()).is_none());
        assert_eq!(grid.tile_count(), 1);
        assert_eq!(grid.revision(), before);
        assert_eq!(grid.status(), Some(&Rejection::Occupied(hex(1, 0))));
    }

    #[test]
    fn test_place_other_layer_not_blocked() {
        let mut grid = GridModel::default();
        let decor = grid.add_layer("Decor", LayerKind::Tiles).unwrap();
        grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        assert!(grid.place(hex(0, 0), "tree", &decor).is_some());
        assert_eq!(grid.tile_count(), 2);
    }

    #[test]
    fn test_place_out_of_bounds_rejected() {
        let mut grid = GridModel::default();
        assert!(grid.place(hex(10, 0), "stone", &tiles_layer()).is_none());
        assert_eq!(grid.status(), Some(&Rejection::OutOfBounds(hex(10, 0))));
        assert!(grid.place(Square::new(0, 0).into(), "stone", &tiles_layer()).is_none());
        assert_eq!(grid.tile_count(), 0);
    }

    #[test]
    fn test_place_on_grid_layer_rejected() {
        let mut grid = GridModel::default();
        assert!(grid.place(hex(0, 0), "stone", &GRID_LAYER_ID.into()).is_none());
        assert!(matches!(grid.status(), Some(Rejection::NotTileLayer(_))));
    }

    #[test]
    fn test_move_to_empty() {
        let mut grid = GridModel::default();
        let id = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        assert_eq!(grid.move_tile(&id, hex(1, -1)), Some(MoveOutcome::Moved));
        assert!(grid.tile_at(&tiles_layer(), hex(0, 0)).is_none());
        assert_eq!(grid.tile(&id).unwrap().cell, hex(1, -1));
    }

    #[test]
    fn test_move_swaps() {
        let mut grid = GridModel::default();
        let a = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        let b = grid.place(hex(1, 0), "water", &tiles_layer()).unwrap();
        assert_eq!(grid.move_tile(&a, hex(1, 0)), Some(MoveOutcome::Swapped(b.clone())));
        assert_eq!(grid.tile(&a).unwrap().cell, hex(1, 0));
        assert_eq!(grid.tile(&b).unwrap().cell, hex(0, 0));
        assert_eq!(grid.tile_count(), 2);
        assert_eq!(grid.tile_at(&tiles_layer(), hex(0, 0)).unwrap().id, b);
        assert_eq!(grid.tile_at(&tiles_layer(), hex(1, 0)).unwrap().id, a);
    }

    #[test]
    fn test_move_onto_self_is_noop() {
        let mut grid = GridModel::default();
        let id = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        let rev = grid.revision();
        assert_eq!(grid.move_tile(&id, hex(0, 0)), Some(MoveOutcome::Unchanged));
        assert_eq!(grid.revision(), rev);
    }

    #[test]
    fn test_move_out_of_bounds_keeps_tile() {
        let mut grid = GridModel::default();
        let id = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        assert!(grid.move_tile(&id, hex(9, 9)).is_none());
        assert_eq!(grid.tile(&id).unwrap().cell, hex(0, 0));
    }

    #[test]
    fn test_remove_clears_selection() {
        let mut grid = GridModel::default();
        let id = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        assert!(grid.select(&id));
        assert!(grid.remove(&id).is_some());
        assert!(grid.selected().is_none());
        assert!(grid.remove(&id).is_none());
    }

    #[test]
    fn test_expand_idempotent() {
        let mut grid = GridModel::default();
        let n = grid.allowed_count();
        assert!(grid.expand(hex(4, 0)));
        assert!(!grid.expand(hex(4, 0)));
        assert_eq!(grid.allowed_count(), n + 1);
    }

    #[test]
    fn test_shrink_cascades() {
        let mut grid = GridModel::default();
        let decor = grid.add_layer("Decor", LayerKind::Tiles).unwrap();
        let a = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        grid.place(hex(0, 0), "tree", &decor).unwrap();
        grid.place(hex(1, 0), "water", &tiles_layer()).unwrap();
        grid.select(&a);

        let removed = grid.shrink(hex(0, 0)).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!grid.is_allowed(hex(0, 0)));
        assert!(grid.tile(&a).is_none());
        assert!(grid.selected().is_none());
        assert_eq!(grid.tile_count(), 1);
        assert!(grid.shrink(hex(0, 0)).is_none());
    }

    #[test]
    fn test_remove_layer_cascades_and_falls_back() {
        let mut grid = GridModel::default();
        let decor = grid.add_layer("Decor", LayerKind::Tiles).unwrap();
        grid.place(hex(0, 0), "tree", &decor).unwrap();
        grid.set_active_layer(&decor);
        assert!(grid.remove_layer(&decor).is_some());
        assert_eq!(grid.tile_count(), 0);
        assert_eq!(grid.active_layer().as_str(), TILES_LAYER_ID);
        assert!(grid.remove_layer(&GRID_LAYER_ID.into()).is_none());
        assert_eq!(grid.status(), Some(&Rejection::GridLayerLocked));
    }

    #[test]
    fn test_config_roundtrip_preserves_tiles() {
        let mut grid = GridModel::default();
        grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        grid.place(hex(-1, 1), "grass", &tiles_layer()).unwrap();
        grid.expand(hex(4, -4));
        let config = grid.to_config();
        let back = GridModel::from_config(config.clone());
        assert_eq!(back.to_config(), config);
    }

    #[test]
    fn test_from_config_drops_invalid_tiles() {
        let mut config = MapConfiguration::default();
        config.widgets.push(PlacedTile::new(hex(0, 0), "a", tiles_layer()));
        config.widgets.push(PlacedTile::new(hex(0, 0), "b", tiles_layer()));
        config.widgets.push(PlacedTile::new(hex(20, 0), "c", tiles_layer()));
        let grid = GridModel::from_config(config);
        assert_eq!(grid.tile_count(), 1);
        assert!(grid.status().is_none());
    }

    #[test]
    fn test_reset_clears_tiles() {
        let mut grid = GridModel::default();
        grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        grid.shrink(hex(1, 0));
        grid.reset(&MapDefaults::default());
        assert_eq!(grid.tile_count(), 0);
        assert_eq!(grid.allowed_count(), 37);
    }

    #[test]
    fn test_mark_saved_keeps_revision() {
        let mut grid = GridModel::default();
        grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        let rev = grid.revision();
        grid.mark_saved(3, Some(Utc::now()));
        assert_eq!(grid.version(), 3);
        assert_eq!(grid.revision(), rev);
    }
}
