//! Host storage-engine contract and its implementations.
//!
//! A host application talks to storage through [`StorageEngine`]: a named
//! engine exposing the capability group {GET, PUT, DEL, HAS} plus a size
//! accessor. A predecessor engine only needs to be a [`RecordSource`] to
//! be migrated from.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageResult;
use crate::persistence::Record;

pub mod memory;
pub mod postgres;

pub use memory::MemoryEngine;
pub use postgres::{PsqlStorageEngine, spawn_engine};

/// Version reported by the engines in this crate.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name the engines register under.
pub const ENGINE_PACKAGE: &str = env!("CARGO_PKG_NAME");

/// Backing medium of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Database server.
    Db,
    /// Local file.
    File,
    /// Process memory.
    Memory,
}

/// One capability in an engine's function group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageFunctionType {
    /// Read a record.
    Get,
    /// Insert a record.
    Put,
    /// Delete a record.
    Del,
    /// Test for a record.
    Has,
}

impl StorageFunctionType {
    /// The full capability group.
    pub const ALL: [Self; 4] = [Self::Get, Self::Put, Self::Del, Self::Has];
}

impl fmt::Display for StorageFunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Del => "DEL",
            Self::Has => "HAS",
        })
    }
}

/// Anything that can hand over all of its records. This is the only
/// capability the migration needs from a predecessor engine.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Returns every stored `(id, data)` pair.
    async fn get_all(&self) -> StorageResult<Vec<Record>>;
}

/// The storage-engine contract a host application consumes.
#[async_trait]
pub trait StorageEngine: RecordSource + fmt::Debug {
    /// Display name of the engine.
    fn name(&self) -> &str;

    /// Backing medium.
    fn engine_type(&self) -> StorageType;

    /// Package the engine ships in.
    fn package(&self) -> &str {
        ENGINE_PACKAGE
    }

    /// Engine version.
    fn version(&self) -> &str {
        ENGINE_VERSION
    }

    /// Capability group the engine implements.
    fn functions(&self) -> &'static [StorageFunctionType] {
        &StorageFunctionType::ALL
    }

    /// Returns the data stored under `id`.
    ///
    /// Fails with [`crate::error::StorageError::KeyNotFound`] if absent.
    async fn get(&self, id: &str) -> StorageResult<Value>;

    /// Stores `data` under a new `id`.
    ///
    /// Fails with [`crate::error::StorageError::KeyAlreadyExists`] if `id`
    /// is taken; the stored data is left untouched.
    async fn put(&self, id: &str, data: Value) -> StorageResult<()>;

    /// Removes `id`. Removing an absent id succeeds.
    async fn del(&self, id: &str) -> StorageResult<()>;

    /// Returns whether `id` is stored.
    async fn has(&self, id: &str) -> StorageResult<bool>;

    /// Number of stored records; `0` also stands for "unknown".
    async fn size(&self) -> u64;
}
