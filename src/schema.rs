//! Table bootstrap.
//!
//! [`ensure_table`] makes sure the records table exists. A table that had
//! to be created is seeded from the predecessor engine, if one was given.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::RecordSource;
use crate::error::{StorageError, StorageResult};
use crate::migration::MigrationReport;
use crate::persistence::RecordTable;
use crate::records::Records;

/// What [`ensure_table`] found or did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InitStatus {
    /// The table was already there; nothing was done.
    Exists {
        /// Table name.
        table: String,
    },
    /// The table was created (by us or a concurrent initializer).
    Created {
        /// Table name.
        table: String,
        /// Migration run after creation, if a predecessor was supplied.
        migration: Option<MigrationReport>,
    },
}

impl InitStatus {
    /// Returns `true` if the table was created during this run.
    #[must_use]
    pub const fn created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }

    /// Records migrated during this run.
    #[must_use]
    pub fn migrated(&self) -> usize {
        match self {
            Self::Created {
                migration: Some(report),
                ..
            } => report.attempted,
            _ => 0,
        }
    }
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists { table } => write!(f, "Table {table} exists"),
            Self::Created {
                table,
                migration: None,
            } => write!(f, "Table {table} created"),
            Self::Created {
                table,
                migration: Some(report),
            } => write!(f, "Table {table} created, {report}"),
        }
    }
}

/// Creates the records table if it is missing and migrates `prior` into a
/// freshly created table.
///
/// A create that loses to a concurrent initializer counts as created.
///
/// # Errors
///
/// Returns any catalog, create or migration failure other than the
/// creation race.
pub async fn ensure_table<T: RecordTable>(
    records: &Records<T>,
    prior: Option<&dyn RecordSource>,
) -> StorageResult<InitStatus> {
    let table = records.table().name().to_string();

    if records.table().table_exists().await? {
        tracing::debug!(%table, "table exists");
        return Ok(InitStatus::Exists { table });
    }

    match records.table().create_table().await {
        Ok(()) => tracing::info!(%table, "table created"),
        Err(StorageError::SchemaRace(_)) => {
            tracing::info!(%table, "table created concurrently");
        }
        Err(e) => return Err(e),
    }

    let migration = match prior {
        Some(source) => {
            let data = source.get_all().await?;
            Some(records.migrate(data).await?)
        }
        None => None,
    };

    Ok(InitStatus::Created { table, migration })
}
