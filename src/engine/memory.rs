//! Non-persistent engine.
//!
//! [`MemoryEngine`] implements the full [`StorageEngine`] contract over a
//! [`MemoryTable`]. It is the natural predecessor to migrate from when a
//! host starts out without a database, and a stand-in engine for tests.

use async_trait::async_trait;
use serde_json::Value;

use super::{RecordSource, StorageEngine, StorageType};
use crate::error::StorageResult;
use crate::persistence::{MemoryTable, Record};
use crate::records::Records;

/// In-memory storage engine.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    records: Records<MemoryTable>,
}

impl MemoryEngine {
    /// Engine display name.
    pub const NAME: &'static str = "Memory";

    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::with_records([])
    }

    /// Creates an engine pre-loaded with `records`.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            records: Records::new(MemoryTable::with_records("memory", records)),
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordSource for MemoryEngine {
    async fn get_all(&self) -> StorageResult<Vec<Record>> {
        self.records.get_all().await
    }
}

#[async_trait]
impl StorageEngine for MemoryEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn engine_type(&self) -> StorageType {
        StorageType::Memory
    }

    async fn get(&self, id: &str) -> StorageResult<Value> {
        self.records.get(id).await
    }

    async fn put(&self, id: &str, data: Value) -> StorageResult<()> {
        self.records.put(id, &data).await
    }

    async fn del(&self, id: &str) -> StorageResult<()> {
        self.records.delete(id).await.map(|_| ())
    }

    async fn has(&self, id: &str) -> StorageResult<bool> {
        self.records.has(id).await
    }

    async fn size(&self) -> u64 {
        self.records.size().await
    }
}
