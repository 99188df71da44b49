use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use serde_json::Value;

use super::capabilities::{ConfigColumn, TileColumn};
use super::store::{check_row, MapStore, ProjectKey, Row, StoreError, TableSchema, CONFIG_TABLE, TILES_TABLE};

/// Which store call a queued failure applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Probe,
    ReadConfig,
    ReadTiles,
    UpsertConfig,
    ReplaceTiles,
    ReadBlob,
    WriteBlob,
}

/// In-process store. The normalized schema can be narrowed to imitate older
/// deployments, and failures can be queued per operation.
#[derive(Debug)]
pub struct MemoryStore {
    schema: TableSchema,
    /// What a probe reports. Normally equal to `schema`; a stale report
    /// exercises the per-column rediscovery path.
    reported: Option<TableSchema>,
    config_rows: HashMap<ProjectKey, Row>,
    tile_rows: HashMap<ProjectKey, Vec<Row>>,
    blobs: HashMap<ProjectKey, Value>,
    failures: RefCell<HashMap<StoreOp, VecDeque<StoreError>>>,
    calls: RefCell<Vec<StoreOp>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A store with the complete normalized schema.
    pub fn new() -> Self {
        Self::with_schema(full_schema())
    }

    /// A store with only the snapshot blob.
    pub fn blob_only() -> Self {
        Self::with_schema(TableSchema::new())
    }

    pub fn with_schema(schema: TableSchema) -> Self {
        Self {
            schema,
            reported: None,
            config_rows: HashMap::new(),
            tile_rows: HashMap::new(),
            blobs: HashMap::new(),
            failures: RefCell::default(),
            calls: RefCell::default(),
        }
    }

    /// Drop a column from the live schema without telling the probe.
    pub fn drop_column_silently(&mut self, table: &str, column: &str) {
        if self.reported.is_none() {
            self.reported = Some(self.schema.clone());
        }
        if let Some(cols) = self.schema.get_mut(table) {
            cols.remove(column);
        }
    }

    pub fn fail_next(&self, op: StoreOp, err: StoreError) {
        self.failures.borrow_mut().entry(op).or_default().push_back(err);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<StoreOp> {
        self.calls.borrow().clone()
    }

    pub fn count_calls(&self, op: StoreOp) -> usize {
        self.calls.borrow().iter().filter(|c| **c == op).count()
    }

    pub fn config_row(&self, key: &ProjectKey) -> Option<&Row> {
        self.config_rows.get(key)
    }

    pub fn tile_row_count(&self, key: &ProjectKey) -> usize {
        self.tile_rows.get(key).map(Vec::len).unwrap_or(0)
    }

    pub fn blob(&self, key: &ProjectKey) -> Option<&Value> {
        self.blobs.get(key)
    }

    /// Seed a stored snapshot directly, as an older client would have left it.
    pub fn put_blob(&mut self, key: &ProjectKey, blob: Value) {
        self.blobs.insert(key.clone(), blob);
    }

    fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        self.calls.borrow_mut().push(op);
        let queued = self.failures.borrow_mut().get_mut(&op).and_then(VecDeque::pop_front);
        match queued {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn require_table(&self, table: &str) -> Result<(), StoreError> {
        if self.schema.contains_key(table) {
            Ok(())
        } else {
            Err(StoreError::MissingTable(table.to_string()))
        }
    }
}

/// Every table and column the normalized shape can use.
pub fn full_schema() -> TableSchema {
    let mut schema = TableSchema::new();
    schema.insert(
        CONFIG_TABLE.to_string(),
        ConfigColumn::ALL.iter().map(|c| c.name().to_string()).collect(),
    );
    schema.insert(
        TILES_TABLE.to_string(),
        TileColumn::ALL.iter().map(|c| c.name().to_string()).collect(),
    );
    schema
}

impl MapStore for MemoryStore {
    fn probe(&self) -> Result<TableSchema, StoreError> {
        self.enter(StoreOp::Probe)?;
        Ok(self.reported.clone().unwrap_or_else(|| self.schema.clone()))
    }

    fn read_config_row(&self, key: &ProjectKey) -> Result<Option<Row>, StoreError> {
        self.enter(StoreOp::ReadConfig)?;
        self.require_table(CONFIG_TABLE)?;
        Ok(self.config_rows.get(key).cloned())
    }

    fn read_tile_rows(&self, key: &ProjectKey) -> Result<Vec<Row>, StoreError> {
        self.enter(StoreOp::ReadTiles)?;
        self.require_table(TILES_TABLE)?;
        Ok(self.tile_rows.get(key).cloned().unwrap_or_default())
    }

    fn upsert_config_row(&mut self, key: &ProjectKey, row: Row) -> Result<(), StoreError> {
        self.enter(StoreOp::UpsertConfig)?;
        check_row(&self.schema, CONFIG_TABLE, &row)?;
        self.config_rows.insert(key.clone(), row);
        Ok(())
    }

    fn replace_tile_rows(&mut self, key: &ProjectKey, rows: Vec<Row>) -> Result<(), StoreError> {
        self.enter(StoreOp::ReplaceTiles)?;
        for row in &rows {
            check_row(&self.schema, TILES_TABLE, row)?;
        }
        self.tile_rows.insert(key.clone(), rows);
        Ok(())
    }

    fn read_blob(&self, key: &ProjectKey) -> Result<Option<Value>, StoreError> {
        self.enter(StoreOp::ReadBlob)?;
        Ok(self.blobs.get(key).cloned())
    }

    fn write_blob(&mut self, key: &ProjectKey, blob: Value) -> Result<(), StoreError> {
        self.enter(StoreOp::WriteBlob)?;
        self.blobs.insert(key.clone(), blob);
        Ok(())
    }
}
