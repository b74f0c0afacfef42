//! Record tables with scripted failures, shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use super::{MemoryTable, Record, RecordTable};
use crate::error::{StorageError, StorageResult};

fn down() -> StorageError {
    StorageError::Connectivity("connection refused".to_string())
}

/// Every statement fails.
#[derive(Debug)]
pub(crate) struct FailingTable;

#[async_trait]
impl RecordTable for FailingTable {
    fn name(&self) -> &str {
        "failing"
    }
    async fn table_exists(&self) -> StorageResult<bool> {
        Err(down())
    }
    async fn create_table(&self) -> StorageResult<()> {
        Err(down())
    }
    async fn drop_table(&self) -> StorageResult<()> {
        Err(down())
    }
    async fn select_all(&self) -> StorageResult<Vec<Record>> {
        Err(down())
    }
    async fn select_one(&self, _id: &str) -> StorageResult<Option<Value>> {
        Err(down())
    }
    async fn exists(&self, _id: &str) -> StorageResult<bool> {
        Err(down())
    }
    async fn insert_if_absent(&self, _id: &str, _data: &Value) -> StorageResult<bool> {
        Err(down())
    }
    async fn delete(&self, _id: &str) -> StorageResult<u64> {
        Err(down())
    }
    async fn count(&self) -> StorageResult<u64> {
        Err(down())
    }
}

/// Reports every id as absent but refuses every insert, like a table
/// where another writer always wins the race.
#[derive(Debug)]
pub(crate) struct RacingTable;

#[async_trait]
impl RecordTable for RacingTable {
    fn name(&self) -> &str {
        "racing"
    }
    async fn table_exists(&self) -> StorageResult<bool> {
        Ok(true)
    }
    async fn create_table(&self) -> StorageResult<()> {
        Ok(())
    }
    async fn drop_table(&self) -> StorageResult<()> {
        Ok(())
    }
    async fn select_all(&self) -> StorageResult<Vec<Record>> {
        Ok(Vec::new())
    }
    async fn select_one(&self, _id: &str) -> StorageResult<Option<Value>> {
        Ok(None)
    }
    async fn exists(&self, _id: &str) -> StorageResult<bool> {
        Ok(false)
    }
    async fn insert_if_absent(&self, _id: &str, _data: &Value) -> StorageResult<bool> {
        Ok(false)
    }
    async fn delete(&self, _id: &str) -> StorageResult<u64> {
        Ok(0)
    }
    async fn count(&self) -> StorageResult<u64> {
        Ok(0)
    }
}

/// A [`MemoryTable`] that misreports its own existence and then fails the
/// insert of one poisoned id. Used for the create race and partial
/// migration failures.
#[derive(Debug)]
pub(crate) struct ScriptedTable {
    pub(crate) inner: MemoryTable,
    pub(crate) report_missing: bool,
    pub(crate) poisoned_id: Option<&'static str>,
}

impl ScriptedTable {
    /// An existing table the catalog lookup claims is absent.
    pub(crate) fn hidden() -> Self {
        Self {
            inner: MemoryTable::with_records("scripted", []),
            report_missing: true,
            poisoned_id: None,
        }
    }

    /// An empty table that cannot store `id`.
    pub(crate) fn poisoned(id: &'static str) -> Self {
        Self {
            inner: MemoryTable::with_records("scripted", []),
            report_missing: false,
            poisoned_id: Some(id),
        }
    }
}

#[async_trait]
impl RecordTable for ScriptedTable {
    fn name(&self) -> &str {
        self.inner.name()
    }
    async fn table_exists(&self) -> StorageResult<bool> {
        if self.report_missing {
            return Ok(false);
        }
        self.inner.table_exists().await
    }
    async fn create_table(&self) -> StorageResult<()> {
        self.inner.create_table().await
    }
    async fn drop_table(&self) -> StorageResult<()> {
        self.inner.drop_table().await
    }
    async fn select_all(&self) -> StorageResult<Vec<Record>> {
        self.inner.select_all().await
    }
    async fn select_one(&self, id: &str) -> StorageResult<Option<Value>> {
        self.inner.select_one(id).await
    }
    async fn exists(&self, id: &str) -> StorageResult<bool> {
        self.inner.exists(id).await
    }
    async fn insert_if_absent(&self, id: &str, data: &Value) -> StorageResult<bool> {
        if self.poisoned_id == Some(id) {
            return Err(down());
        }
        self.inner.insert_if_absent(id, data).await
    }
    async fn delete(&self, id: &str) -> StorageResult<u64> {
        self.inner.delete(id).await
    }
    async fn count(&self) -> StorageResult<u64> {
        self.inner.count().await
    }
}

/// A [`MemoryTable`] with a small concurrency limit that records how many
/// statements were running at once. Each statement yields once so
/// concurrent callers actually overlap.
#[derive(Debug)]
pub(crate) struct CountingTable {
    inner: MemoryTable,
    limit: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingTable {
    /// An empty table allowing `limit` concurrent operations.
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            inner: MemoryTable::with_records("counting", []),
            limit,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Highest number of statements seen running at once.
    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn tracked<R>(&self, op: impl Future<Output = R>) -> R {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let result = op.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl RecordTable for CountingTable {
    fn name(&self) -> &str {
        self.inner.name()
    }
    fn concurrency_limit(&self) -> usize {
        self.limit
    }
    async fn table_exists(&self) -> StorageResult<bool> {
        self.inner.table_exists().await
    }
    async fn create_table(&self) -> StorageResult<()> {
        self.inner.create_table().await
    }
    async fn drop_table(&self) -> StorageResult<()> {
        self.inner.drop_table().await
    }
    async fn select_all(&self) -> StorageResult<Vec<Record>> {
        self.inner.select_all().await
    }
    async fn select_one(&self, id: &str) -> StorageResult<Option<Value>> {
        self.tracked(self.inner.select_one(id)).await
    }
    async fn exists(&self, id: &str) -> StorageResult<bool> {
        self.tracked(self.inner.exists(id)).await
    }
    async fn insert_if_absent(&self, id: &str, data: &Value) -> StorageResult<bool> {
        self.tracked(self.inner.insert_if_absent(id, data)).await
    }
    async fn delete(&self, id: &str) -> StorageResult<u64> {
        self.tracked(self.inner.delete(id)).await
    }
    async fn count(&self) -> StorageResult<u64> {
        self.inner.count().await
    }
}
