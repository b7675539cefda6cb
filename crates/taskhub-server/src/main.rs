//! TaskHub Server: bootstrap entry point.
//!
//! Loads configuration, initialises logging, connects to SurrealDB,
//! applies pending migrations and seeds demo data into an empty store.

mod config;
mod error;
mod seed;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::error::ServerError;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = ServerConfig::load()?;

    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::try_new(directives)?,
        Err(_) => EnvFilter::try_new(&config.log_filter)?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    info!("Starting TaskHub server...");

    let manager = taskhub_db::DbManager::connect(&config.db).await?;
    taskhub_db::run_migrations(manager.client()).await?;

    if config.seed_demo_data {
        seed::seed_demo_data(manager.client(), &config.policy).await?;
    }

    info!("TaskHub server ready.");
    Ok(())
}
