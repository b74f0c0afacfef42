//! In-process record table.
//!
//! [`MemoryTable`] mirrors the PostgreSQL table semantics closely enough to
//! run the record operations, schema initializer and migration without a
//! database: a table that was never created (or was dropped) rejects every
//! statement, and creating an existing table reports a schema race.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::RecordTable;
use super::models::Record;
use crate::error::{StorageError, StorageResult};

/// Record table held in memory.
///
/// `None` means the table does not exist.
#[derive(Debug)]
pub struct MemoryTable {
    name: String,
    rows: RwLock<Option<BTreeMap<String, Value>>>,
}

impl MemoryTable {
    /// Creates a handle to a table that does not exist yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(None),
        }
    }

    /// Creates an existing table holding `records`. Later duplicates of an
    /// id replace earlier ones.
    #[must_use]
    pub fn with_records(name: impl Into<String>, records: impl IntoIterator<Item = Record>) -> Self {
        let rows = records
            .into_iter()
            .map(Record::into_pair)
            .collect::<BTreeMap<_, _>>();
        Self {
            name: name.into(),
            rows: RwLock::new(Some(rows)),
        }
    }

    fn missing(&self) -> StorageError {
        StorageError::Connectivity(format!("relation \"{}\" does not exist", self.name))
    }
}

#[async_trait]
impl RecordTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn table_exists(&self) -> StorageResult<bool> {
        Ok(self.rows.read().await.is_some())
    }

    async fn create_table(&self) -> StorageResult<()> {
        let mut rows = self.rows.write().await;
        if rows.is_some() {
            return Err(StorageError::SchemaRace(self.name.clone()));
        }
        *rows = Some(BTreeMap::new());
        Ok(())
    }

    async fn drop_table(&self) -> StorageResult<()> {
        self.rows.write().await.take().map(|_| ()).ok_or_else(|| self.missing())
    }

    async fn select_all(&self) -> StorageResult<Vec<Record>> {
        let rows = self.rows.read().await;
        let map = rows.as_ref().ok_or_else(|| self.missing())?;
        Ok(map
            .iter()
            .map(|(id, data)| Record::new(id.clone(), data.clone()))
            .collect())
    }

    async fn select_one(&self, id: &str) -> StorageResult<Option<Value>> {
        let rows = self.rows.read().await;
        let map = rows.as_ref().ok_or_else(|| self.missing())?;
        Ok(map.get(id).cloned())
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        let rows = self.rows.read().await;
        let map = rows.as_ref().ok_or_else(|| self.missing())?;
        Ok(map.contains_key(id))
    }

    async fn insert_if_absent(&self, id: &str, data: &Value) -> StorageResult<bool> {
        let mut rows = self.rows.write().await;
        let map = rows.as_mut().ok_or_else(|| self.missing())?;
        if map.contains_key(id) {
            return Ok(false);
        }
        map.insert(id.to_string(), data.clone());
        Ok(true)
    }

    async fn delete(&self, id: &str) -> StorageResult<u64> {
        let mut rows = self.rows.write().await;
        let map = rows.as_mut().ok_or_else(|| self.missing())?;
        Ok(u64::from(map.remove(id).is_some()))
    }

    async fn count(&self) -> StorageResult<u64> {
        let rows = self.rows.read().await;
        let map = rows.as_ref().ok_or_else(|| self.missing())?;
        Ok(u64::try_from(map.len()).unwrap_or(u64::MAX))
    }
}
