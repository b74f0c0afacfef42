//! Storage engine error types.
//!
//! [`StorageError`] is the central error type for the engine. The two
//! blocking variants, [`StorageError::KeyNotFound`] and
//! [`StorageError::KeyAlreadyExists`], are the conditions a host engine
//! layer makes per-key decisions on. Everything else is fatal to the
//! operation that produced it.

/// Result alias used by every storage operation.
pub type StorageResult<T> = Result<T, StorageError>;

/// Engine-side error enum.
///
/// # Error Codes
///
/// | Code | Variant            | Host name          |
/// |------|--------------------|--------------------|
/// | 2001 | `KeyNotFound`      | `KeyNotFoundError` |
/// | 2002 | `KeyAlreadyExists` | `KeyFoundError`    |
/// | 1001 | `InvalidConfig`    | `ConfigError`      |
/// | 1002 | `NotInitialized`   | `NotInitialized`   |
/// | 3001 | `Connectivity`     | `ConnectivityError`|
/// | 3002 | `SchemaRace`       | `SchemaRace`       |
/// | 3003 | `Serialization`    | `SerializationError` |
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No record with the given id exists.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A record with the given id already exists.
    #[error("key already exists: {0}")]
    KeyAlreadyExists(String),

    /// Pool creation or a query failed (network, auth, database).
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// `CREATE TABLE` lost a race against a concurrent initializer.
    #[error("table {0} was created concurrently")]
    SchemaRace(String),

    /// The engine configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation ran before `init` created the pool.
    #[error("engine not initialized; call init first")]
    NotInitialized,

    /// A configuration document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidConfig(_) => 1001,
            Self::NotInitialized => 1002,
            Self::KeyNotFound(_) => 2001,
            Self::KeyAlreadyExists(_) => 2002,
            Self::Connectivity(_) => 3001,
            Self::SchemaRace(_) => 3002,
            Self::Serialization(_) => 3003,
        }
    }

    /// Returns the error name the host engine layer knows this kind by.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::KeyNotFound(_) => "KeyNotFoundError",
            Self::KeyAlreadyExists(_) => "KeyFoundError",
            Self::Connectivity(_) => "ConnectivityError",
            Self::SchemaRace(_) => "SchemaRace",
            Self::InvalidConfig(_) => "ConfigError",
            Self::NotInitialized => "NotInitialized",
            Self::Serialization(_) => "SerializationError",
        }
    }

    /// Returns `true` for the per-key conditions a caller is expected to
    /// handle (`KeyNotFound`, `KeyAlreadyExists`).
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        matches!(self, Self::KeyNotFound(_) | Self::KeyAlreadyExists(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::Connectivity(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_kinds() {
        assert!(StorageError::KeyNotFound("a".into()).is_blocking());
        assert!(StorageError::KeyAlreadyExists("a".into()).is_blocking());
        assert!(!StorageError::Connectivity("down".into()).is_blocking());
        assert!(!StorageError::NotInitialized.is_blocking());
    }

    #[test]
    fn host_names_match_engine_contract() {
        assert_eq!(
            StorageError::KeyNotFound("a".into()).kind_name(),
            "KeyNotFoundError"
        );
        assert_eq!(
            StorageError::KeyAlreadyExists("a".into()).kind_name(),
            "KeyFoundError"
        );
    }

    #[test]
    fn codes_are_distinct() {
        let errors = [
            StorageError::KeyNotFound(String::new()),
            StorageError::KeyAlreadyExists(String::new()),
            StorageError::Connectivity(String::new()),
            StorageError::SchemaRace(String::new()),
            StorageError::InvalidConfig(String::new()),
            StorageError::NotInitialized,
            StorageError::Serialization(String::new()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(StorageError::error_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn display_includes_key() {
        let err = StorageError::KeyNotFound("abc".into());
        assert_eq!(err.to_string(), "key not found: abc");
    }
}
