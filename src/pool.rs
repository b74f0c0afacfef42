//! Connection pool construction.
//!
//! [`acquire_pool`] turns an [`EngineConfig`] into a lazily connecting
//! `sqlx::PgPool`. No connection is opened until the first query; the
//! connect timeout bounds how long that first query waits on an
//! unreachable server.

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use crate::config::{EngineConfig, TlsConfig};
use crate::error::StorageResult;

/// Builds the connection pool for `config`.
///
/// # Errors
///
/// Returns [`crate::error::StorageError::InvalidConfig`] if the
/// configuration fails validation.
pub fn acquire_pool(config: &EngineConfig) -> StorageResult<PgPool> {
    config.validate()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .idle_timeout(config.timeouts.idle())
        .acquire_timeout(config.timeouts.connect())
        .connect_lazy_with(connect_options(config));

    tracing::debug!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        tls = config.ssl.is_some(),
        "connection pool created"
    );
    Ok(pool)
}

/// Maps the engine configuration onto `PgConnectOptions`.
fn connect_options(config: &EngineConfig) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(&config.username)
        .password(&config.password);

    match &config.ssl {
        None => options.ssl_mode(PgSslMode::Disable),
        Some(tls) => {
            let options = options.ssl_mode(ssl_mode(tls));
            match &tls.ca {
                Some(ca) => options.ssl_root_cert_from_pem(ca.as_bytes().to_vec()),
                None => options,
            }
        }
    }
}

/// Full verification when requested; a supplied CA is still checked
/// against when host name verification is off.
const fn ssl_mode(tls: &TlsConfig) -> PgSslMode {
    match (tls.reject_unauthorized, tls.ca.is_some()) {
        (true, _) => PgSslMode::VerifyFull,
        (false, true) => PgSslMode::VerifyCa,
        (false, false) => PgSslMode::Require,
    }
}
