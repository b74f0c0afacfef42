//! Persistence layer: the single-statement table primitives.
//!
//! [`RecordTable`] is the seam between the record operations and the
//! backing store. Every method maps to exactly one statement against the
//! records table. The concrete implementation for PostgreSQL uses
//! `sqlx::PgPool`; [`MemoryTable`] keeps rows in process.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageResult;

pub mod memory;
pub mod models;
pub mod postgres;

#[cfg(test)]
pub(crate) mod test_tables;

pub use memory::MemoryTable;
pub use models::Record;
pub use postgres::PgRecordTable;

/// Concurrent statements a table without a connection bound accepts.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// The table primitives the record operations are built from.
///
/// Implementations never interpret `data`; it is stored and returned as-is.
#[async_trait]
pub trait RecordTable: Send + Sync + fmt::Debug {
    /// Name of the backing table.
    fn name(&self) -> &str;

    /// Upper bound on record operations worth running at once. Bulk work
    /// such as a migration keeps at most this many in flight.
    fn concurrency_limit(&self) -> usize {
        DEFAULT_CONCURRENCY
    }

    /// Returns whether the table exists in the catalog.
    async fn table_exists(&self) -> StorageResult<bool>;

    /// Creates the two-column table.
    ///
    /// Fails with [`crate::error::StorageError::SchemaRace`] when the table
    /// turned out to exist already.
    async fn create_table(&self) -> StorageResult<()>;

    /// Drops the table and every record in it.
    async fn drop_table(&self) -> StorageResult<()>;

    /// Returns every record.
    async fn select_all(&self) -> StorageResult<Vec<Record>>;

    /// Returns the data stored under `id`, if any.
    async fn select_one(&self, id: &str) -> StorageResult<Option<Value>>;

    /// Returns whether a record with `id` exists.
    async fn exists(&self, id: &str) -> StorageResult<bool>;

    /// Inserts `(id, data)` unless `id` is already taken. Returns `true`
    /// when a row was written.
    async fn insert_if_absent(&self, id: &str, data: &Value) -> StorageResult<bool>;

    /// Deletes the record with `id`. Returns the number of rows removed.
    async fn delete(&self, id: &str) -> StorageResult<u64>;

    /// Counts the records.
    async fn count(&self) -> StorageResult<u64>;
}
