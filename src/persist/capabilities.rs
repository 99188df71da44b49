use std::collections::BTreeSet;

use super::store::{StoreError, TableSchema, CONFIG_TABLE, TILES_TABLE};

/// Columns of the configuration table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigColumn {
    ProjectId,
    OwnerId,
    GridType,
    GridColumns,
    GridRows,
    CellSize,
    AllowedCells,
    Version,
    UpdatedAt,
    HexSettings,
    GridLineWidth,
    GridBorderWidth,
    GridLineColor,
    GridBorderColor,
    Layers,
    ActiveLayerId,
}

impl ConfigColumn {
    pub const ALL: [ConfigColumn; 16] = [
        Self::ProjectId,
        Self::OwnerId,
        Self::GridType,
        Self::GridColumns,
        Self::GridRows,
        Self::CellSize,
        Self::AllowedCells,
        Self::Version,
        Self::UpdatedAt,
        Self::HexSettings,
        Self::GridLineWidth,
        Self::GridBorderWidth,
        Self::GridLineColor,
        Self::GridBorderColor,
        Self::Layers,
        Self::ActiveLayerId,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ProjectId => "project_id",
            Self::OwnerId => "owner_id",
            Self::GridType => "grid_type",
            Self::GridColumns => "grid_columns",
            Self::GridRows => "grid_rows",
            Self::CellSize => "cell_size",
            Self::AllowedCells => "allowed_cells",
            Self::Version => "version",
            Self::UpdatedAt => "updated_at",
            Self::HexSettings => "hex_settings",
            Self::GridLineWidth => "grid_line_width",
            Self::GridBorderWidth => "grid_border_width",
            Self::GridLineColor => "grid_line_color",
            Self::GridBorderColor => "grid_border_color",
            Self::Layers => "layers",
            Self::ActiveLayerId => "active_layer_id",
        }
    }

    /// Without these the row cannot describe a map.
    pub fn required(self) -> bool {
        matches!(
            self,
            Self::ProjectId
                | Self::OwnerId
                | Self::GridType
                | Self::GridColumns
                | Self::GridRows
                | Self::CellSize
                | Self::AllowedCells
                | Self::Version
        )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Columns of the tile table. Square cells store `x`/`y` in `q`/`r`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileColumn {
    Id,
    ProjectId,
    OwnerId,
    TileTypeId,
    Q,
    R,
    S,
    LayerId,
    Appearance,
    UpdatedAt,
}

impl TileColumn {
    pub const ALL: [TileColumn; 10] = [
        Self::Id,
        Self::ProjectId,
        Self::OwnerId,
        Self::TileTypeId,
        Self::Q,
        Self::R,
        Self::S,
        Self::LayerId,
        Self::Appearance,
        Self::UpdatedAt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::ProjectId => "project_id",
            Self::OwnerId => "owner_id",
            Self::TileTypeId => "tile_type_id",
            Self::Q => "q",
            Self::R => "r",
            Self::S => "s",
            Self::LayerId => "layer_id",
            Self::Appearance => "appearance",
            Self::UpdatedAt => "updated_at",
        }
    }

    pub fn required(self) -> bool {
        matches!(
            self,
            Self::Id | Self::ProjectId | Self::OwnerId | Self::TileTypeId | Self::Q | Self::R
        )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// What the backing store's normalized shape supports this session.
///
/// Starts optimistic, is narrowed by a probe, and narrowed further whenever
/// a read or write reports a missing table or column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageCapabilities {
    config_table: bool,
    tiles_table: bool,
    config_columns: BTreeSet<ConfigColumn>,
    tile_columns: BTreeSet<TileColumn>,
    probed: bool,
}

impl Default for StorageCapabilities {
    fn default() -> Self {
        Self::assume_all()
    }
}

impl StorageCapabilities {
    /// Everything available; used until the probe has run.
    pub fn assume_all() -> Self {
        Self {
            config_table: true,
            tiles_table: true,
            config_columns: ConfigColumn::ALL.into_iter().collect(),
            tile_columns: TileColumn::ALL.into_iter().collect(),
            probed: false,
        }
    }

    /// Only the snapshot blob is usable.
    pub fn blob_only() -> Self {
        Self {
            config_table: false,
            tiles_table: false,
            config_columns: BTreeSet::new(),
            tile_columns: BTreeSet::new(),
            probed: true,
        }
    }

    pub fn from_schema(schema: &TableSchema) -> Self {
        let config = schema.get(CONFIG_TABLE);
        let tiles = schema.get(TILES_TABLE);
        Self {
            config_table: config.is_some(),
            tiles_table: tiles.is_some(),
            config_columns: config
                .map(|cols| cols.iter().filter_map(|c| ConfigColumn::from_name(c)).collect())
                .unwrap_or_default(),
            tile_columns: tiles
                .map(|cols| cols.iter().filter_map(|c| TileColumn::from_name(c)).collect())
                .unwrap_or_default(),
            probed: true,
        }
    }

    pub fn is_probed(&self) -> bool {
        self.probed
    }

    /// Whether the normalized shape can hold a whole document.
    pub fn primary_available(&self) -> bool {
        self.config_table
            && self.tiles_table
            && ConfigColumn::ALL
                .into_iter()
                .filter(|c| c.required())
                .all(|c| self.config_columns.contains(&c))
            && TileColumn::ALL
                .into_iter()
                .filter(|c| c.required())
                .all(|c| self.tile_columns.contains(&c))
    }

    /// Whether optional columns are missing, so some fields only survive
    /// in the snapshot blob.
    pub fn is_partial(&self) -> bool {
        self.config_columns.len() < ConfigColumn::ALL.len()
            || self.tile_columns.len() < TileColumn::ALL.len()
    }

    pub fn has_config(&self, column: ConfigColumn) -> bool {
        self.config_table && self.config_columns.contains(&column)
    }

    pub fn has_tile(&self, column: TileColumn) -> bool {
        self.tiles_table && self.tile_columns.contains(&column)
    }

    /// Narrow the capabilities after a schema-missing failure. Returns true
    /// if anything changed, i.e. the failed operation is worth retrying.
    pub fn learn(&mut self, err: &StoreError) -> bool {
        match err {
            StoreError::MissingTable(table) => {
                let flag = match table.as_str() {
                    CONFIG_TABLE => &mut self.config_table,
                    TILES_TABLE => &mut self.tiles_table,
                    _ => return false,
                };
                let changed = *flag;
                *flag = false;
                if changed {
                    log::warn!("table {table} unavailable; falling back to snapshot storage");
                }
                changed
            }
            StoreError::MissingColumn { table, column } => {
                let changed = match table.as_str() {
                    CONFIG_TABLE => ConfigColumn::from_name(column)
                        .map(|c| self.config_columns.remove(&c))
                        .unwrap_or(false),
                    TILES_TABLE => TileColumn::from_name(column)
                        .map(|c| self.tile_columns.remove(&c))
                        .unwrap_or(false),
                    _ => false,
                };
                if changed {
                    log::warn!("column {table}.{column} unavailable; dropping it from writes");
                }
                changed
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_schema() -> TableSchema {
        let mut schema = TableSchema::new();
        schema.insert(
            CONFIG_TABLE.into(),
            ConfigColumn::ALL.iter().map(|c| c.name().to_string()).collect(),
        );
        schema.insert(
            TILES_TABLE.into(),
            TileColumn::ALL.iter().map(|c| c.name().to_string()).collect(),
        );
        schema
    }

    #[test]
    fn test_full_schema_is_primary() {
        let caps = StorageCapabilities::from_schema(&full_schema());
        assert!(caps.primary_available());
        assert!(!caps.is_partial());
        assert!(caps.is_probed());
    }

    #[test]
    fn test_missing_optional_column_keeps_primary() {
        let mut schema = full_schema();
        schema.get_mut(CONFIG_TABLE).unwrap().remove("layers");
        let caps = StorageCapabilities::from_schema(&schema);
        assert!(caps.primary_available());
        assert!(caps.is_partial());
        assert!(!caps.has_config(ConfigColumn::Layers));
    }

    #[test]
    fn test_missing_required_column_disables_primary() {
        let mut schema = full_schema();
        schema.get_mut(TILES_TABLE).unwrap().remove("tile_type_id");
        assert!(!StorageCapabilities::from_schema(&schema).primary_available());
    }

    #[test]
    fn test_learn_from_errors() {
        let mut caps = StorageCapabilities::assume_all();
        let err = StoreError::MissingColumn {
            table: TILES_TABLE.into(),
            column: "appearance".into(),
        };
        assert!(caps.learn(&err));
        assert!(!caps.learn(&err));
        assert!(!caps.has_tile(TileColumn::Appearance));
        assert!(caps.primary_available());

        assert!(caps.learn(&StoreError::MissingTable(CONFIG_TABLE.into())));
        assert!(!caps.primary_available());
        assert!(!caps.learn(&StoreError::Transport("offline".into())));
    }

    #[test]
    fn test_blob_only() {
        let caps = StorageCapabilities::blob_only();
        assert!(!caps.primary_available());
        assert!(!caps.has_config(ConfigColumn::Version));
    }
}
