//! One-time import of records from a predecessor engine.
//!
//! Records are dispatched concurrently, at most
//! [`RecordTable::concurrency_limit`] at a time so a large import never
//! queues more work than the pool can serve. An id that is already stored
//! is skipped, anything else is inserted. The migration completes once
//! every attempt has settled and fails with the first hard error, if any.

use std::fmt;
use std::pin::pin;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};
use crate::persistence::{Record, RecordTable};
use crate::records::Records;

/// Outcome counts of one migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Records handed to the migration.
    pub attempted: usize,
    /// Records written.
    pub inserted: usize,
    /// Records skipped because the id was already stored.
    pub skipped: usize,
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} entries migrated", self.attempted)
    }
}

enum Outcome {
    Inserted,
    Skipped,
}

impl<T: RecordTable> Records<T> {
    /// Imports `data`, skipping ids that are already stored.
    ///
    /// # Errors
    ///
    /// Returns the first error other than a key-exists skip; the remaining
    /// attempts still run to completion before it is returned.
    pub async fn migrate(&self, data: Vec<Record>) -> StorageResult<MigrationReport> {
        let attempted = data.len();
        let limit = self.table().concurrency_limit().max(1);
        let mut results = pin!(
            stream::iter(data)
                .map(|record| self.migrate_one(record))
                .buffer_unordered(limit)
        );

        let mut report = MigrationReport {
            attempted,
            ..MigrationReport::default()
        };
        let mut first_error = None;
        while let Some(result) = results.next().await {
            match result {
                Ok(Outcome::Inserted) => report.inserted += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            tracing::error!(table = self.table().name(), error = %e, "migration failed");
            return Err(e);
        }

        tracing::info!(
            table = self.table().name(),
            attempted = report.attempted,
            inserted = report.inserted,
            skipped = report.skipped,
            "migration complete"
        );
        Ok(report)
    }

    async fn migrate_one(&self, record: Record) -> StorageResult<Outcome> {
        if self.has(&record.id).await? {
            return Ok(Outcome::Skipped);
        }
        match self.put(&record.id, &record.data).await {
            Ok(()) => Ok(Outcome::Inserted),
            Err(StorageError::KeyAlreadyExists(_)) => Ok(Outcome::Skipped),
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "record migration failed");
                Err(e)
            }
        }
    }
}
