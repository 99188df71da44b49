use chrono::{DateTime, Utc};
use serde_json::Value;

use super::capabilities::{ConfigColumn, StorageCapabilities, TileColumn};
use super::snapshot::{self, assemble_rows, config_row, normalize_with, tile_rows, to_document};
use super::store::{MapStore, ProjectKey, Row, StoreError};
use crate::map::{MapConfiguration, MapDefaults};

/// Where a loaded configuration came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadSource {
    /// Normalized rows.
    Primary,
    /// The snapshot blob.
    Snapshot,
    /// Nothing stored yet; built from defaults.
    Fresh,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Loaded {
    pub config: MapConfiguration,
    pub source: LoadSource,
    /// The snapshot was copied into the normalized shape during load.
    pub migrated: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Saved {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub wrote_primary: bool,
    pub wrote_snapshot: bool,
    /// Stored version that was ahead of the local base, if any.
    pub rebased_over: Option<u64>,
}

/// Loads and saves one project's map, hiding which storage shape is in use.
pub struct MapRepository<S: MapStore> {
    store: S,
    key: ProjectKey,
    caps: StorageCapabilities,
    defaults: MapDefaults,
    /// Highest version this session has read or written.
    last_known_version: u64,
}

/// Canonical document key for each optional configuration column.
fn config_doc_key(column: ConfigColumn) -> Option<&'static str> {
    match column {
        ConfigColumn::HexSettings => Some("hexSettings"),
        ConfigColumn::GridLineWidth => Some("gridLineWidth"),
        ConfigColumn::GridBorderWidth => Some("gridBorderWidth"),
        ConfigColumn::GridLineColor => Some("gridLineColor"),
        ConfigColumn::GridBorderColor => Some("gridBorderColor"),
        ConfigColumn::Layers => Some("layers"),
        ConfigColumn::ActiveLayerId => Some("activeLayerId"),
        ConfigColumn::UpdatedAt => Some("updatedAt"),
        _ => None,
    }
}

fn tile_doc_key(column: TileColumn) -> Option<&'static str> {
    match column {
        TileColumn::LayerId => Some("layerId"),
        TileColumn::Appearance => Some("appearance"),
        TileColumn::UpdatedAt => Some("updatedAt"),
        _ => None,
    }
}

impl<S: MapStore> MapRepository<S> {
    pub fn new(store: S, key: ProjectKey, defaults: MapDefaults) -> Self {
        Self {
            store,
            key,
            caps: StorageCapabilities::assume_all(),
            defaults,
            last_known_version: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn key(&self) -> &ProjectKey {
        &self.key
    }

    pub fn capabilities(&self) -> &StorageCapabilities {
        &self.caps
    }

    pub fn defaults(&self) -> &MapDefaults {
        &self.defaults
    }

    /// Probe the schema once per session. A failed probe leaves the
    /// optimistic assumption in place; real calls will narrow it.
    fn ensure_probed(&mut self) {
        if self.caps.is_probed() {
            return;
        }
        match self.store.probe() {
            Ok(schema) => {
                self.caps = StorageCapabilities::from_schema(&schema);
                if self.caps.primary_available() {
                    log::info!(
                        "normalized storage available{}",
                        if self.caps.is_partial() { " (partial)" } else { "" }
                    );
                } else {
                    log::warn!("normalized storage unavailable; using snapshot storage");
                }
            }
            Err(e) => log::warn!("schema probe failed: {e}"),
        }
    }

    // Loading

    /// Load the map. Prefers normalized rows, falls back to the snapshot
    /// (migrating it into rows when possible), and finally to a fresh map.
    pub fn load(&mut self) -> Result<Loaded, StoreError> {
        self.ensure_probed();

        if let Some(config) = self.read_primary()? {
            log::info!("loaded {} from rows at version {}", self.key, config.version);
            self.last_known_version = self.last_known_version.max(config.version);
            return Ok(Loaded {
                config,
                source: LoadSource::Primary,
                migrated: false,
            });
        }

        let Some(raw) = self.store.read_blob(&self.key)? else {
            log::info!("no stored map for {}; starting fresh", self.key);
            return Ok(Loaded {
                config: MapConfiguration::new(&self.defaults),
                source: LoadSource::Fresh,
                migrated: false,
            });
        };
        let config = normalize_with(&raw, &self.defaults);
        self.last_known_version = self.last_known_version.max(config.version);
        log::info!("loaded {} from snapshot at version {}", self.key, config.version);

        let migrated = match self.write_primary(&config) {
            Ok(wrote) => wrote,
            Err(e) => {
                // The snapshot is still authoritative; try again on the next save
                log::warn!("migrating {} to rows failed: {e}", self.key);
                false
            }
        };
        if migrated {
            log::info!("migrated {} snapshot into rows", self.key);
        }
        Ok(Loaded {
            config,
            source: LoadSource::Snapshot,
            migrated,
        })
    }

    /// Read normalized rows, narrowing capabilities on schema errors.
    fn read_primary(&mut self) -> Result<Option<MapConfiguration>, StoreError> {
        loop {
            if !self.caps.primary_available() {
                return Ok(None);
            }
            match self.try_read_primary() {
                Ok(config) => return Ok(config),
                Err(e) if e.is_schema_missing() => {
                    if !self.caps.learn(&e) {
                        log::warn!("unrecognised schema error on read: {e}");
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_read_primary(&self) -> Result<Option<MapConfiguration>, StoreError> {
        let Some(row) = self.store.read_config_row(&self.key)? else {
            return Ok(None);
        };
        let mut tiles = self.store.read_tile_rows(&self.key)?;
        let mut row = row;
        if self.caps.is_partial() {
            self.overlay_snapshot(&mut row, &mut tiles)?;
        }
        Ok(Some(normalize_with(&assemble_rows(&row, &tiles), &self.defaults)))
    }

    /// Fill fields whose columns are missing from the snapshot written
    /// alongside the rows, provided it is not older than the rows.
    fn overlay_snapshot(&self, row: &mut Row, tiles: &mut [Row]) -> Result<(), StoreError> {
        let Some(raw) = self.store.read_blob(&self.key)? else {
            return Ok(());
        };
        let row_version = snapshot::stored_version(&Value::Object(row.clone())).unwrap_or(0);
        if snapshot::stored_version(&raw).unwrap_or(0) < row_version {
            return Ok(());
        }
        let Value::Object(doc) = to_document(&normalize_with(&raw, &self.defaults)) else {
            return Ok(());
        };

        for column in ConfigColumn::ALL {
            if self.caps.has_config(column) {
                continue;
            }
            if let Some(value) = config_doc_key(column).and_then(|k| doc.get(k)) {
                row.insert(column.name().to_string(), value.clone());
            }
        }

        let widgets = doc.get("widgets").and_then(Value::as_array);
        for tile in tiles.iter_mut() {
            let id = tile.get("id").and_then(Value::as_str);
            let Some(source) = widgets.and_then(|ws| {
                ws.iter().find(|w| w.get("id").and_then(Value::as_str) == id)
            }) else {
                continue;
            };
            for column in TileColumn::ALL {
                if self.caps.has_tile(column) {
                    continue;
                }
                if let Some(value) = tile_doc_key(column).and_then(|k| source.get(k)) {
                    tile.insert(column.name().to_string(), value.clone());
                }
            }
        }
        Ok(())
    }

    // Saving

    /// Save a new version of the map. The version becomes one above the
    /// highest of the local base, anything this session has seen, and the
    /// stored copy; a stored copy ahead of the local base is overwritten.
    pub fn save(&mut self, config: &MapConfiguration) -> Result<Saved, StoreError> {
        self.ensure_probed();

        let base = config.version.max(self.last_known_version);
        let stored = self.stored_version()?;
        let rebased_over = stored.filter(|v| *v > base);
        if let Some(v) = rebased_over {
            log::warn!(
                "{} changed in storage (version {v} > local {base}); local edits win",
                self.key
            );
        }

        let mut next = config.clone();
        next.version = base.max(stored.unwrap_or(0)) + 1;
        let now = Utc::now();
        next.updated_at = Some(now);

        let wrote_primary = self.write_primary(&next)?;
        if wrote_primary {
            // Stored now even if the snapshot write below fails; a retry
            // must not mistake this version for someone else's
            self.last_known_version = next.version;
        }
        let wrote_snapshot = !wrote_primary || self.caps.is_partial();
        if wrote_snapshot {
            self.store.write_blob(&self.key, to_document(&next))?;
        }

        self.last_known_version = next.version;
        log::debug!(
            "saved {} at version {} (rows: {wrote_primary}, snapshot: {wrote_snapshot})",
            self.key,
            next.version
        );
        Ok(Saved {
            version: next.version,
            updated_at: now,
            wrote_primary,
            wrote_snapshot,
            rebased_over,
        })
    }

    /// Version of whatever copy is currently authoritative in storage.
    fn stored_version(&mut self) -> Result<Option<u64>, StoreError> {
        loop {
            if !self.caps.primary_available() {
                break;
            }
            match self.store.read_config_row(&self.key) {
                Ok(Some(row)) => return Ok(snapshot::stored_version(&Value::Object(row))),
                Ok(None) => break,
                Err(e) if e.is_schema_missing() => {
                    if !self.caps.learn(&e) {
                        break;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(self
            .store
            .read_blob(&self.key)?
            .as_ref()
            .and_then(snapshot::stored_version))
    }

    /// Write normalized rows, dropping columns the store turns out not to
    /// have and retrying. Returns false if the normalized shape is unusable.
    fn write_primary(&mut self, config: &MapConfiguration) -> Result<bool, StoreError> {
        loop {
            if !self.caps.primary_available() {
                return Ok(false);
            }
            // Tiles first: the config row carries the version, so it only
            // moves once the tiles it describes are in place
            let result = self
                .store
                .replace_tile_rows(&self.key, tile_rows(config, &self.key, &self.caps))
                .and_then(|()| {
                    self.store
                        .upsert_config_row(&self.key, config_row(config, &self.key, &self.caps))
                });
            match result {
                Ok(()) => return Ok(true),
                Err(e) if e.is_schema_missing() => {
                    if !self.caps.learn(&e) {
                        log::warn!("unrecognised schema error on write: {e}");
                        return Ok(false);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
