//! Record operations over any [`RecordTable`].
//!
//! [`Records`] is a cheap, cloneable handle (`Arc` inside) around a table.
//! Every engine operation is implemented here once and reused by the
//! PostgreSQL engine, the in-memory engine and the migration runner.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{StorageError, StorageResult};
use crate::persistence::{Record, RecordTable};

/// Whole-record get/put/delete/has/size against one table.
#[derive(Debug)]
pub struct Records<T> {
    table: Arc<T>,
}

impl<T> Clone for Records<T> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<T: RecordTable> Records<T> {
    /// Wraps `table`.
    #[must_use]
    pub fn new(table: T) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    /// Returns the underlying table.
    #[must_use]
    pub fn table(&self) -> &T {
        &self.table
    }

    /// Returns the data stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::KeyNotFound`] if no record matches, or
    /// [`StorageError::Connectivity`] if the query fails.
    pub async fn get(&self, id: &str) -> StorageResult<Value> {
        self.table
            .select_one(id)
            .await?
            .ok_or_else(|| StorageError::KeyNotFound(id.to_string()))
    }

    /// Returns every record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connectivity`] if the query fails.
    pub async fn get_all(&self) -> StorageResult<Vec<Record>> {
        self.table.select_all().await
    }

    /// Inserts `(id, data)`.
    ///
    /// The existence check is a fast path only: the insert itself is
    /// conditional, so a concurrent put of the same id still ends in
    /// [`StorageError::KeyAlreadyExists`] instead of overwriting.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::KeyAlreadyExists`] if `id` is taken, or
    /// [`StorageError::Connectivity`] if a query fails.
    pub async fn put(&self, id: &str, data: &Value) -> StorageResult<()> {
        if self.has(id).await? {
            return Err(StorageError::KeyAlreadyExists(id.to_string()));
        }
        if !self.table.insert_if_absent(id, data).await? {
            tracing::debug!(table = self.table.name(), id, "lost insert race");
            return Err(StorageError::KeyAlreadyExists(id.to_string()));
        }
        Ok(())
    }

    /// Deletes `id`. Returns whether a record was removed; deleting an
    /// absent id is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connectivity`] if the query fails.
    pub async fn delete(&self, id: &str) -> StorageResult<bool> {
        let removed = self.table.delete(id).await?;
        if removed == 0 {
            tracing::debug!(table = self.table.name(), id, "delete of absent key");
        }
        Ok(removed > 0)
    }

    /// Returns whether `id` is stored.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connectivity`] if the query fails.
    pub async fn has(&self, id: &str) -> StorageResult<bool> {
        self.table.exists(id).await
    }

    /// Counts the stored records. Any failure is logged and reported as
    /// `0`, so zero means "empty or unknown".
    pub async fn size(&self) -> u64 {
        match self.table.count().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(table = self.table.name(), error = %e, "size query failed");
                0
            }
        }
    }
}
