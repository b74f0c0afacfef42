//! Engine configuration: defaults, overrides and environment loading.
//!
//! An [`EngineConfig`] is built by deep-merging user overrides over
//! [`EngineConfig::default`]: objects merge key-by-key, everything else
//! (scalars and arrays) replaces the default wholesale. Configuration can
//! also come from environment variables (or a `.env` file via `dotenvy`)
//! and from an `auth.psql.json` credentials file.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StorageError, StorageResult};

/// Longest identifier PostgreSQL keeps without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Top-level engine configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database server host name.
    pub host: String,
    /// Database server port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Login role.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Table holding the resource records.
    pub table: String,
    /// TLS settings; `None` connects without TLS.
    pub ssl: Option<TlsConfig>,
    /// Pool timeouts.
    pub timeouts: PoolTimeouts,
    /// Upper bound on open connections in the pool.
    pub max_connections: u32,
}

/// TLS settings for the database connection.
///
/// Verification is on unless `rejectUnauthorized` is explicitly `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TlsConfig {
    /// Verify the server certificate and host name.
    pub reject_unauthorized: bool,
    /// PEM content of the CA certificate to trust.
    pub ca: Option<String>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            reject_unauthorized: true,
            ca: None,
        }
    }
}

/// Connection pool timeouts, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolTimeouts {
    /// How long an idle connection may stay in the pool.
    pub idle: u64,
    /// How long to wait for a connection before failing.
    pub connect: u64,
}

impl PoolTimeouts {
    /// Idle timeout as a [`Duration`].
    #[must_use]
    pub const fn idle(&self) -> Duration {
        Duration::from_millis(self.idle)
    }

    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_millis(self.connect)
    }
}

impl Default for PoolTimeouts {
    fn default() -> Self {
        Self {
            idle: 30_000,
            connect: 5_000,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 12345,
            database: "dbname".to_string(),
            username: "dbuser".to_string(),
            password: "dbpass".to_string(),
            table: "ass".to_string(),
            ssl: None,
            timeouts: PoolTimeouts::default(),
            max_connections: 10,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("table", &self.table)
            .field("ssl", &self.ssl.as_ref().map(|s| s.reject_unauthorized))
            .field("timeouts", &self.timeouts)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl EngineConfig {
    /// Merges `overrides` over the defaults and validates the result.
    ///
    /// Engine keys are snake_case (`max_connections`, `timeouts.connect`).
    /// The `ssl` block keeps the camelCase keys of the node-postgres TLS
    /// options (`rejectUnauthorized`, `ca`), so existing `ssl` settings
    /// carry over unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the merged document does
    /// not describe an `EngineConfig`, or [`StorageError::InvalidConfig`]
    /// if it fails [`EngineConfig::validate`].
    pub fn from_overrides(overrides: &Value) -> StorageResult<Self> {
        let mut merged = serde_json::to_value(Self::default())?;
        merge_no_array(&mut merged, overrides);
        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    /// Unset or unparsable numeric variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if `PSQL_SSL_CA_PATH` is set
    /// but unreadable, or the resulting configuration is invalid.
    pub fn from_env() -> StorageResult<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let mut config = Self {
            host: env_string("PSQL_HOST", defaults.host),
            port: parse_env("PSQL_PORT", defaults.port),
            database: env_string("PSQL_DATABASE", defaults.database),
            username: env_string("PSQL_USERNAME", defaults.username),
            password: env_string("PSQL_PASSWORD", defaults.password),
            table: env_string("PSQL_TABLE", defaults.table),
            ssl: None,
            timeouts: PoolTimeouts {
                idle: parse_env("PSQL_IDLE_TIMEOUT_MS", defaults.timeouts.idle),
                connect: parse_env("PSQL_CONNECT_TIMEOUT_MS", defaults.timeouts.connect),
            },
            max_connections: parse_env("PSQL_MAX_CONNECTIONS", defaults.max_connections),
        };

        if let Ok(ca_path) = std::env::var("PSQL_SSL_CA_PATH") {
            config.ssl = Some(TlsConfig {
                reject_unauthorized: parse_env_bool("PSQL_SSL_REJECT_UNAUTHORIZED", true),
                ca: Some(read_ca(Path::new(&ca_path))?),
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads an `auth.psql.json` credentials file.
    ///
    /// The file carries `host`, `port`, `username`, `password`, `database`
    /// and optionally `table` and `sslPath`. When `sslPath` is present the
    /// certificate it points to is trusted with full verification.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] if a file cannot be read,
    /// [`StorageError::Serialization`] if it is not valid JSON.
    pub fn from_auth_file(path: &Path) -> StorageResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StorageError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut overrides: Value = serde_json::from_str(&raw)?;

        if let Some(obj) = overrides.as_object_mut()
            && let Some(ssl_path) = obj.remove("sslPath")
            && let Some(ssl_path) = ssl_path.as_str()
        {
            let ca = read_ca(Path::new(ssl_path))?;
            obj.insert(
                "ssl".to_string(),
                serde_json::json!({ "rejectUnauthorized": true, "ca": ca }),
            );
        }

        Self::from_overrides(&overrides)
    }

    /// Checks the configuration for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] when the table name is not a
    /// plain lower-case identifier, or a timeout or pool size is zero.
    pub fn validate(&self) -> StorageResult<()> {
        validate_table_name(&self.table)?;
        if self.timeouts.connect == 0 || self.timeouts.idle == 0 {
            return Err(StorageError::InvalidConfig(
                "pool timeouts must be positive".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(StorageError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Recursively deep-merge `overlay` into `base`.
///
/// - Objects merge recursively per key.
/// - Scalars and arrays from the overlay **replace** the base value.
pub fn merge_no_array(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                if let Some(base_val) = base_map.get_mut(key) {
                    merge_no_array(base_val, overlay_val);
                } else {
                    base_map.insert(key.clone(), overlay_val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Accepts `[a-z_][a-z0-9_]*` up to 63 bytes. The table name is spliced
/// into SQL text, so nothing else gets through.
///
/// # Errors
///
/// Returns [`StorageError::InvalidConfig`] for any other name.
pub fn validate_table_name(name: &str) -> StorageResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid_start && valid_rest && name.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(StorageError::InvalidConfig(format!(
            "table name {name:?} must match [a-z_][a-z0-9_]* (max {MAX_IDENTIFIER_LEN} bytes)"
        )))
    }
}

fn read_ca(path: &Path) -> StorageResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        StorageError::InvalidConfig(format!("cannot read CA {}: {e}", path.display()))
    })
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key)
        .ok()
        .map(|v| v.to_ascii_lowercase())
        .as_deref()
    {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_overrides_yield_defaults() {
        let Ok(config) = EngineConfig::from_overrides(&json!({})) else {
            panic!("defaults must be valid");
        };
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.timeouts.idle(), Duration::from_secs(30));
        assert_eq!(config.timeouts.connect(), Duration::from_secs(5));
    }

    #[test]
    fn overrides_replace_scalars_and_keep_the_rest() {
        let Ok(config) = EngineConfig::from_overrides(&json!({
            "host": "db.internal",
            "port": 5432,
            "timeouts": { "connect": 1000 }
        })) else {
            panic!("valid overrides");
        };
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 5432);
        assert_eq!(config.timeouts.connect, 1000);
        assert_eq!(config.timeouts.idle, 30_000);
        assert_eq!(config.table, "ass");
    }

    #[test]
    fn nested_ssl_block_is_accepted() {
        let Ok(config) = EngineConfig::from_overrides(&json!({
            "ssl": { "rejectUnauthorized": true, "ca": "-----BEGIN CERTIFICATE-----" }
        })) else {
            panic!("valid ssl overrides");
        };
        let Some(ssl) = config.ssl else {
            panic!("ssl block missing");
        };
        assert!(ssl.reject_unauthorized);
        assert!(ssl.ca.is_some());
    }

    #[test]
    fn engine_keys_are_snake_case_and_ssl_keys_camel_case() {
        let Ok(config) = EngineConfig::from_overrides(&json!({
            "max_connections": 3,
            "ssl": { "rejectUnauthorized": false }
        })) else {
            panic!("valid overrides");
        };
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.ssl.map(|s| s.reject_unauthorized), Some(false));

        let Ok(value) = serde_json::to_value(TlsConfig::default()) else {
            panic!("tls config serializes");
        };
        assert_eq!(value, json!({ "rejectUnauthorized": true, "ca": null }));
    }

    #[test]
    fn ca_only_ssl_block_verifies_by_default() {
        let Ok(config) = EngineConfig::from_overrides(&json!({ "ssl": { "ca": "PEM" } })) else {
            panic!("valid ssl overrides");
        };
        let Some(ssl) = config.ssl else {
            panic!("ssl block missing");
        };
        assert!(ssl.reject_unauthorized);
        assert_eq!(ssl.ca.as_deref(), Some("PEM"));
    }

    #[test]
    fn empty_ssl_block_verifies_by_default() {
        let Ok(config) = EngineConfig::from_overrides(&json!({ "ssl": {} })) else {
            panic!("valid ssl overrides");
        };
        assert_eq!(config.ssl, Some(TlsConfig::default()));
        assert!(TlsConfig::default().reject_unauthorized);
    }

    #[test]
    fn verification_can_be_switched_off_explicitly() {
        let Ok(config) =
            EngineConfig::from_overrides(&json!({ "ssl": { "rejectUnauthorized": false } }))
        else {
            panic!("valid ssl overrides");
        };
        assert_eq!(config.ssl.map(|s| s.reject_unauthorized), Some(false));
    }

    #[test]
    fn merge_objects_recursively() {
        let mut base = json!({ "a": { "x": 1, "y": 2 }, "b": 1 });
        merge_no_array(&mut base, &json!({ "a": { "y": 3 } }));
        assert_eq!(base, json!({ "a": { "x": 1, "y": 3 }, "b": 1 }));
    }

    #[test]
    fn merge_replaces_arrays() {
        let mut base = json!({ "list": [1, 2, 3] });
        merge_no_array(&mut base, &json!({ "list": [9] }));
        assert_eq!(base, json!({ "list": [9] }));
    }

    #[test]
    fn merge_adds_new_keys() {
        let mut base = json!({ "a": 1 });
        merge_no_array(&mut base, &json!({ "b": { "c": true } }));
        assert_eq!(base, json!({ "a": 1, "b": { "c": true } }));
    }

    #[test]
    fn table_name_validation() {
        assert!(validate_table_name("ass").is_ok());
        assert!(validate_table_name("_records_2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1abc").is_err());
        assert!(validate_table_name("Upper").is_err());
        assert!(validate_table_name("x; DROP TABLE y").is_err());
        assert!(validate_table_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn invalid_table_override_is_rejected() {
        let result = EngineConfig::from_overrides(&json!({ "table": "bad-name" }));
        assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
    }

    #[test]
    fn wrong_type_is_serialization_error() {
        let result = EngineConfig::from_overrides(&json!({ "port": "not a port" }));
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = EngineConfig::from_overrides(&json!({ "timeouts": { "idle": 0 } }));
        assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", EngineConfig::default());
        assert!(!rendered.contains("dbpass"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn missing_auth_file_is_invalid_config() {
        let result = EngineConfig::from_auth_file(Path::new("/nonexistent/auth.psql.json"));
        assert!(matches!(result, Err(StorageError::InvalidConfig(_))));
    }
}
