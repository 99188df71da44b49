use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::memory::full_schema;
use super::store::{check_row, path_component, MapStore, ProjectKey, Row, StoreError, TableSchema, CONFIG_TABLE, TILES_TABLE};

const CONFIG_FILE: &str = "configuration.json";
const TILES_FILE: &str = "tiles.json";
const BLOB_FILE: &str = "project.json";

/// JSON files on disk, one directory per project:
/// `<root>/<owner>/<project>/{configuration,tiles,project}.json`.
///
/// Always offers the full normalized schema.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
    schema: TableSchema,
}

/// Default storage root under the platform data directory.
pub fn default_root() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "hexboard").map(|dirs| dirs.data_dir().join("maps"))
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            schema: full_schema(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, key: &ProjectKey) -> PathBuf {
        self.root
            .join(path_component(&key.owner_id))
            .join(path_component(&key.project_id))
    }

    fn read_json(&self, path: &Path) -> Result<Option<Value>, StoreError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(StoreError::PermissionDenied(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temporary file so a crash never leaves half a document.
    fn write_json(&self, path: &Path, value: &Value) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        fs::rename(&tmp, path)?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}

impl MapStore for FileStore {
    fn probe(&self) -> Result<TableSchema, StoreError> {
        Ok(self.schema.clone())
    }

    fn read_config_row(&self, key: &ProjectKey) -> Result<Option<Row>, StoreError> {
        match self.read_json(&self.project_dir(key).join(CONFIG_FILE))? {
            Some(Value::Object(row)) => Ok(Some(row)),
            Some(_) => {
                log::warn!("ignoring non-object configuration row for {key}");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn read_tile_rows(&self, key: &ProjectKey) -> Result<Vec<Row>, StoreError> {
        match self.read_json(&self.project_dir(key).join(TILES_FILE))? {
            Some(Value::Array(items)) => Ok(items
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(row) => Some(row),
                    _ => None,
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    fn upsert_config_row(&mut self, key: &ProjectKey, row: Row) -> Result<(), StoreError> {
        check_row(&self.schema, CONFIG_TABLE, &row)?;
        self.write_json(&self.project_dir(key).join(CONFIG_FILE), &Value::Object(row))
    }

    fn replace_tile_rows(&mut self, key: &ProjectKey, rows: Vec<Row>) -> Result<(), StoreError> {
        for row in &rows {
            check_row(&self.schema, TILES_TABLE, row)?;
        }
        let value = Value::Array(rows.into_iter().map(Value::Object).collect());
        self.write_json(&self.project_dir(key).join(TILES_FILE), &value)
    }

    fn read_blob(&self, key: &ProjectKey) -> Result<Option<Value>, StoreError> {
        self.read_json(&self.project_dir(key).join(BLOB_FILE))
    }

    fn write_blob(&mut self, key: &ProjectKey, blob: Value) -> Result<(), StoreError> {
        self.write_json(&self.project_dir(key).join(BLOB_FILE), &blob)
    }
}
