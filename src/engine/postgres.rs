//! PostgreSQL storage engine.
//!
//! [`PsqlStorageEngine`] wires an [`EngineConfig`] to a connection pool and
//! exposes the [`StorageEngine`] contract on top of it. Nothing touches the
//! database until [`PsqlStorageEngine::init`] runs; re-running `init`
//! replaces the pool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{RecordSource, StorageEngine, StorageType};
use crate::config::EngineConfig;
use crate::error::{StorageError, StorageResult};
use crate::migration::MigrationReport;
use crate::persistence::{PgRecordTable, Record, RecordTable};
use crate::pool::acquire_pool;
use crate::records::Records;
use crate::schema::{InitStatus, ensure_table};

/// Storage engine backed by a PostgreSQL table.
#[derive(Debug)]
pub struct PsqlStorageEngine {
    config: EngineConfig,
    records: RwLock<Option<Records<PgRecordTable>>>,
}

impl PsqlStorageEngine {
    /// Engine display name.
    pub const NAME: &'static str = "PostgreSQL";

    /// Creates an engine from user overrides merged over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] or
    /// [`StorageError::InvalidConfig`] if the merged configuration is
    /// unusable.
    pub fn new(overrides: &Value) -> StorageResult<Self> {
        Self::with_config(EngineConfig::from_overrides(overrides)?)
    }

    /// Creates an engine from a complete configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if `config` fails validation.
    pub fn with_config(config: EngineConfig) -> StorageResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            records: RwLock::new(None),
        })
    }

    /// Returns the merged configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates the pool, makes sure the table exists and, if the table had
    /// to be created, migrates every record from `prior` into it.
    ///
    /// # Errors
    ///
    /// Returns a connectivity, schema or migration error; the engine keeps
    /// the new pool either way so a later `init` can retry.
    pub async fn init(&self, prior: Option<&dyn RecordSource>) -> StorageResult<InitStatus> {
        let pool = acquire_pool(&self.config)?;
        let records = Records::new(PgRecordTable::new(pool, &self.config.table)?);

        let replaced = self.records.write().await.replace(records.clone());
        if let Some(old) = replaced {
            old.table().pool().close().await;
            tracing::debug!(table = %self.config.table, "replaced connection pool closed");
        }

        let status = ensure_table(&records, prior).await?;
        tracing::info!(table = %self.config.table, %status, "engine initialized");
        Ok(status)
    }

    /// Imports `data` into the table, skipping ids that already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotInitialized`] before `init`, or the first
    /// hard error of the run.
    pub async fn migrate(&self, data: Vec<Record>) -> StorageResult<MigrationReport> {
        self.records().await?.migrate(data).await
    }

    /// Drops the table with every record in it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotInitialized`] before `init`, or
    /// [`StorageError::Connectivity`] if the statement fails.
    pub async fn drop_table(&self) -> StorageResult<()> {
        let records = self.records().await?;
        records.table().drop_table().await?;
        tracing::warn!(table = %self.config.table, "table dropped");
        Ok(())
    }

    /// Closes the pool. Later operations fail with
    /// [`StorageError::NotInitialized`] until `init` runs again.
    pub async fn close(&self) {
        let records = self.records.write().await.take();
        if let Some(records) = records {
            records.table().pool().close().await;
            tracing::debug!(table = %self.config.table, "connection pool closed");
        }
    }

    /// Removes `id`, reporting whether a record was actually deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotInitialized`] before `init`, or
    /// [`StorageError::Connectivity`] if the statement fails.
    pub async fn delete(&self, id: &str) -> StorageResult<bool> {
        self.records().await?.delete(id).await
    }

    async fn records(&self) -> StorageResult<Records<PgRecordTable>> {
        self.records
            .read()
            .await
            .clone()
            .ok_or(StorageError::NotInitialized)
    }
}

#[async_trait]
impl RecordSource for PsqlStorageEngine {
    async fn get_all(&self) -> StorageResult<Vec<Record>> {
        self.records().await?.get_all().await
    }
}

#[async_trait]
impl StorageEngine for PsqlStorageEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn engine_type(&self) -> StorageType {
        StorageType::Db
    }

    async fn get(&self, id: &str) -> StorageResult<Value> {
        self.records().await?.get(id).await
    }

    async fn put(&self, id: &str, data: Value) -> StorageResult<()> {
        self.records().await?.put(id, &data).await
    }

    async fn del(&self, id: &str) -> StorageResult<()> {
        self.delete(id).await.map(|_| ())
    }

    async fn has(&self, id: &str) -> StorageResult<bool> {
        self.records().await?.has(id).await
    }

    async fn size(&self) -> u64 {
        match self.records().await {
            Ok(records) => records.size().await,
            Err(e) => {
                tracing::warn!(error = %e, "size requested before init");
                0
            }
        }
    }
}

/// Builds an engine and starts its `init` in the background, the way a
/// host registers an engine: the handle is usable immediately and the
/// initialization outcome is logged.
///
/// # Errors
///
/// Returns [`StorageError::InvalidConfig`] if `config` fails validation.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn spawn_engine(
    config: EngineConfig,
    prior: Option<Arc<dyn RecordSource>>,
) -> StorageResult<Arc<PsqlStorageEngine>> {
    let engine = Arc::new(PsqlStorageEngine::with_config(config)?);

    tracing::info!(
        package = engine.package(),
        version = engine.version(),
        table = %engine.config.table,
        "registering storage engine"
    );

    let background = Arc::clone(&engine);
    tokio::spawn(async move {
        match background.init(prior.as_deref()).await {
            Ok(status) => tracing::info!(%status, "storage engine ready"),
            Err(e) => tracing::error!(error = %e, "storage engine init failed"),
        }
    });

    Ok(engine)
}
