//! # psql-storage-engine
//!
//! PostgreSQL key-value storage engine for hosts that talk to storage
//! through a fixed engine contract (GET/PUT/DEL/HAS plus size).
//!
//! Records are `(id, data)` pairs kept in a two-column table
//! (`id text PRIMARY KEY, data jsonb NOT NULL`). Puts never overwrite,
//! deletes of absent ids are no-ops, and a freshly created table is seeded
//! once from the engine the host used before.
//!
//! ## Architecture
//!
//! ```text
//! Host application
//!     │
//!     ├── StorageEngine contract (engine/)
//!     │     ├── PsqlStorageEngine
//!     │     └── MemoryEngine
//!     │
//!     ├── Schema bootstrap (schema) ── Migration (migration)
//!     ├── Record operations (records)
//!     │
//!     ├── RecordTable (persistence/)
//!     │     ├── PgRecordTable ── PgPool (pool)
//!     │     └── MemoryTable
//!     │
//!     └── PostgreSQL
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod migration;
pub mod persistence;
pub mod pool;
pub mod records;
pub mod schema;

pub use config::EngineConfig;
pub use engine::{MemoryEngine, PsqlStorageEngine, RecordSource, StorageEngine};
pub use error::{StorageError, StorageResult};
pub use persistence::Record;
pub use schema::InitStatus;
