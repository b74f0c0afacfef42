//! psql-engine command entry point.
//!
//! Loads the engine configuration (from `PSQL_AUTH_FILE` when set,
//! otherwise from `PSQL_*` environment variables) and runs one command:
//!
//! - `init` (default): create the table if needed and report its status.
//! - `size`: print the number of stored records.
//! - `drop`: drop the table.

use std::path::Path;

use anyhow::{Context, bail};
use tracing_subscriber::EnvFilter;

use psql_storage_engine::{EngineConfig, PsqlStorageEngine, StorageEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = match std::env::var("PSQL_AUTH_FILE") {
        Ok(path) => EngineConfig::from_auth_file(Path::new(&path))
            .with_context(|| format!("loading {path}"))?,
        Err(_) => EngineConfig::from_env().context("loading configuration from environment")?,
    };
    tracing::info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        table = %config.table,
        "starting psql-engine"
    );

    let command = std::env::args().nth(1).unwrap_or_else(|| "init".to_string());
    if !matches!(command.as_str(), "init" | "size" | "drop") {
        bail!("unknown command {command:?}; expected init, size or drop");
    }

    let engine = PsqlStorageEngine::with_config(config)?;
    let status = engine.init(None).await.context("initializing engine")?;

    match command.as_str() {
        "size" => println!("{}", engine.size().await),
        "drop" => {
            engine.drop_table().await.context("dropping table")?;
            println!("Table {} dropped", engine.config().table);
        }
        _ => println!("{status}"),
    }

    engine.close().await;
    Ok(())
}
