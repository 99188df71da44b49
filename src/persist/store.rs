use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::{Map, Value};

/// One table row as stored: column name to JSON value.
pub type Row = Map<String, Value>;

/// Tables and the columns they carry, as reported by a schema probe.
pub type TableSchema = BTreeMap<String, BTreeSet<String>>;

pub const CONFIG_TABLE: &str = "map_configurations";
pub const TILES_TABLE: &str = "map_tiles";

/// Identifies one map document: project plus owning user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectKey {
    pub project_id: String,
    pub owner_id: String,
}

impl ProjectKey {
    pub fn new(project_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            owner_id: owner_id.into(),
        }
    }
}

/// Reversible file-name form of one key component.
///
/// Lowercase ASCII letters, digits and `-` pass through; every other byte
/// becomes `_XX` (uppercase hex). Distinct ids never share a name, even on
/// case-insensitive file systems, and `.`/`/` cannot escape the root. The
/// empty string maps to a lone `_`, which no other input produces.
pub(crate) fn path_component(id: &str) -> String {
    if id.is_empty() {
        return "_".to_string();
    }
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("_{byte:02X}"));
        }
    }
    out
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.project_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("table {0} does not exist")]
    MissingTable(String),
    #[error("column {column} does not exist on {table}")]
    MissingColumn { table: String, column: String },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store unreachable: {0}")]
    Transport(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed stored document: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// "Table/column missing" failures downgrade the storage shape; every
    /// other failure goes back to the caller.
    pub fn is_schema_missing(&self) -> bool {
        matches!(self, Self::MissingTable(_) | Self::MissingColumn { .. })
    }
}

/// Client boundary of the backing store.
///
/// Two shapes hold the same document: normalized rows (one configuration
/// row plus one row per tile, keyed by project and owner) and a single
/// snapshot blob on the project record. Row writes must fail with
/// [`StoreError::MissingColumn`] / [`StoreError::MissingTable`] when the
/// schema lacks what the row names.
pub trait MapStore {
    /// Report the tables and columns the normalized shape has.
    fn probe(&self) -> Result<TableSchema, StoreError>;

    fn read_config_row(&self, key: &ProjectKey) -> Result<Option<Row>, StoreError>;

    fn read_tile_rows(&self, key: &ProjectKey) -> Result<Vec<Row>, StoreError>;

    fn upsert_config_row(&mut self, key: &ProjectKey, row: Row) -> Result<(), StoreError>;

    /// Replace every tile row of the project with `rows`.
    fn replace_tile_rows(&mut self, key: &ProjectKey, rows: Vec<Row>) -> Result<(), StoreError>;

    fn read_blob(&self, key: &ProjectKey) -> Result<Option<Value>, StoreError>;

    fn write_blob(&mut self, key: &ProjectKey, blob: Value) -> Result<(), StoreError>;
}

/// Check `row` against `schema`, failing on the first unknown column.
pub(crate) fn check_row(schema: &TableSchema, table: &str, row: &Row) -> Result<(), StoreError> {
    let Some(columns) = schema.get(table) else {
        return Err(StoreError::MissingTable(table.to_string()));
    };
    match row.keys().find(|c| !columns.contains(c.as_str())) {
        Some(column) => Err(StoreError::MissingColumn {
            table: table.to_string(),
            column: column.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_missing_classification() {
        assert!(StoreError::MissingTable("t".into()).is_schema_missing());
        assert!(StoreError::MissingColumn {
            table: "t".into(),
            column: "c".into()
        }
        .is_schema_missing());
        assert!(!StoreError::Transport("offline".into()).is_schema_missing());
        assert!(!StoreError::PermissionDenied("nope".into()).is_schema_missing());
    }

    #[test]
    fn test_path_component_is_reversible_form() {
        assert_eq!(path_component("map-1"), "map-1");
        assert_eq!(path_component("map.1"), "map_2E1");
        assert_eq!(path_component("map_1"), "map_5F1");
        assert_eq!(path_component("Map"), "_4Dap");
        assert_eq!(path_component(""), "_");
        assert_ne!(path_component("é"), path_component("e"));
    }

    #[test]
    fn test_check_row() {
        let mut schema = TableSchema::new();
        schema.insert("t".into(), ["a".to_string(), "b".to_string()].into_iter().collect());
        let Value::Object(good) = json!({"a": 1}) else { unreachable!() };
        let Value::Object(bad) = json!({"a": 1, "c": 2}) else { unreachable!() };
        assert!(check_row(&schema, "t", &good).is_ok());
        assert!(matches!(
            check_row(&schema, "t", &bad),
            Err(StoreError::MissingColumn { column, .. }) if column == "c"
        ));
        assert!(matches!(check_row(&schema, "u", &good), Err(StoreError::MissingTable(_))));
    }

    #[test]
    fn test_project_key_display() {
        assert_eq!(ProjectKey::new("p1", "u1").to_string(), "u1/p1");
    }
}
