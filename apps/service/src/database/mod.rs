/// Storage layer
///
/// Check history and durable target definitions live in one libsql
/// database. The rest of the service only sees the `HistoryStore` trait.

pub mod migrations;
pub mod models;
pub mod repository;

pub use models::{LogRow, TargetDefinition};
pub use repository::{HistoryStore, LibsqlStore};

use anyhow::Result;
use tracing::info;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

/// Write the configured targets into an empty store.
///
/// Existing definitions, including deleted ones, are never overwritten.
/// Returns how many targets were written.
pub async fn seed_targets(store: &dyn HistoryStore, targets: &[TargetDefinition]) -> Result<usize> {
    if targets.is_empty() {
        return Ok(0);
    }
    let existing = store.count_targets().await?;
    if existing > 0 {
        info!("Target store already holds {} definitions, skipping config seed", existing);
        return Ok(0);
    }
    for target in targets {
        store.upsert_target(target).await?;
    }
    info!("Seeded {} targets from configuration", targets.len());
    Ok(targets.len())
}
