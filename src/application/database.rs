use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;

use crate::config::Config;
use crate::error::{MigrationError, Result};

pub type DbConn = DatabaseConnection;

/// Open the single connection the migration runs on
pub async fn connect(config: &Config) -> Result<DbConn> {
    connect_with_url(&config.database.database_url).await
}

/// Open a connection to a specific URL.
///
/// Steps are executed one at a time on one session, so the pool is pinned
/// to a single connection.
pub async fn connect_with_url(database_url: &str) -> Result<DbConn> {
    tracing::info!("Connecting to database...");

    let mut opts = ConnectOptions::new(database_url);
    opts.max_connections(1)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    Database::connect(opts)
        .await
        .map_err(|e| MigrationError::Config(format!("Failed to connect to database: {}", e)))
}
