//! Database module
pub mod record;
pub mod repo;

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(8)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    let connection = Database::connect(opt)
        .await
        .with_context(|| format!("Failed to connect to database {}", database_url))?;
    info!("Connected to database: {}", database_url);

    Ok(connection)
}

/// Create the parent directory of a file-backed SQLite database url
pub fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let path = rest
        .trim_start_matches("//")
        .split('?')
        .next()
        .unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(parent) = sqlite_parent(path) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
    }
    Ok(())
}

fn sqlite_parent(path: &str) -> Option<&Path> {
    Path::new(path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
}
