//! Database model for resource records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A resource record row: `id text PRIMARY KEY, data jsonb NOT NULL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique record key.
    pub id: String,
    /// Opaque JSONB payload.
    pub data: Value,
}

impl Record {
    /// Creates a record from its key and payload.
    #[must_use]
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Splits the record into its `(id, data)` pair.
    #[must_use]
    pub fn into_pair(self) -> (String, Value) {
        (self.id, self.data)
    }
}

impl From<(String, Value)> for Record {
    fn from((id, data): (String, Value)) -> Self {
        Self { id, data }
    }
}
