use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params;

use super::models::{
    LogRow, TargetDefinition, millis_to_timestamp, status_from_str, status_to_str,
    timestamp_to_millis,
};
use crate::monitoring::types::CheckReason;
use crate::pool::LibsqlPool;

/// Check history and target definitions
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Record one check result
    async fn append(
        &self,
        target: &str,
        address: &str,
        port: u16,
        up: bool,
        reason: CheckReason,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Newest `limit` rows for `target` at or after `cutoff`, oldest first
    async fn read_since(
        &self,
        target: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LogRow>>;

    /// Enabled target definitions ordered by name
    async fn list_targets(&self) -> Result<Vec<TargetDefinition>>;

    /// Insert or update a definition, re-enabling it if it was deleted
    async fn upsert_target(&self, target: &TargetDefinition) -> Result<()>;

    /// Disable a definition; history rows are kept
    async fn delete_target(&self, name: &str) -> Result<()>;

    /// Number of definition rows, enabled or not
    async fn count_targets(&self) -> Result<usize>;

    /// Drop check rows older than `cutoff`, returning how many went away
    async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// libsql-backed store
pub struct LibsqlStore {
    pool: LibsqlPool,
}

impl LibsqlStore {
    pub fn new(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl HistoryStore for LibsqlStore {
    async fn append(
        &self,
        target: &str,
        address: &str,
        port: u16,
        up: bool,
        reason: CheckReason,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO check_logs (checked_at, target, address, port, status, reason) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                timestamp_to_millis(at),
                target.to_string(),
                address.to_string(),
                port as i64,
                status_to_str(up),
                reason.as_str()
            ],
        )
        .await?;
        Ok(())
    }

    async fn read_since(
        &self,
        target: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LogRow>> {
        let conn = self.get_conn().await?;
        let stmt = conn
            .prepare("SELECT checked_at, status, address, port, reason FROM check_logs WHERE target = ? AND checked_at >= ? ORDER BY checked_at DESC, id DESC LIMIT ?")
            .await?;

        let mut rows = stmt
            .query(params![target.to_string(), timestamp_to_millis(cutoff), limit as i64])
            .await?;
        let mut results = Vec::new();

        while let Some(row) = rows.next().await? {
            let checked_at: i64 = row.get(0)?;
            let status: String = row.get(1)?;
            let reason: String = row.get(4)?;

            results.push(LogRow {
                checked_at: millis_to_timestamp(checked_at),
                status: status_from_str(&status),
                address: row.get(2)?,
                port: row.get::<i64>(3)? as u16,
                reason: reason.to_ascii_uppercase(),
            });
        }

        results.reverse();
        Ok(results)
    }

    async fn list_targets(&self) -> Result<Vec<TargetDefinition>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT name, address, port, enabled FROM targets WHERE enabled = 1 ORDER BY name ASC",
                (),
            )
            .await?;

        let mut targets = Vec::new();
        while let Some(row) = rows.next().await? {
            targets.push(TargetDefinition {
                name: row.get(0)?,
                address: row.get(1)?,
                port: row.get::<i64>(2)? as u16,
                enabled: row.get::<i64>(3)? != 0,
            });
        }

        Ok(targets)
    }

    async fn upsert_target(&self, target: &TargetDefinition) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO targets (name, address, port, enabled, updated_at) VALUES (?, ?, ?, 1, ?)
             ON CONFLICT(name) DO UPDATE SET
                address = excluded.address,
                port = excluded.port,
                enabled = 1,
                updated_at = excluded.updated_at",
            params![
                target.name.clone(),
                target.address.clone(),
                target.port as i64,
                timestamp_to_millis(Utc::now())
            ],
        )
        .await?;
        Ok(())
    }

    async fn delete_target(&self, name: &str) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "UPDATE targets SET enabled = 0, updated_at = ? WHERE name = ?",
            params![timestamp_to_millis(Utc::now()), name.to_string()],
        )
        .await?;
        Ok(())
    }

    async fn count_targets(&self) -> Result<usize> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT COUNT(*) FROM targets", ()).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as usize),
            None => Ok(0),
        }
    }

    async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM check_logs WHERE checked_at < ?",
                params![timestamp_to_millis(cutoff)],
            )
            .await?;
        Ok(deleted)
    }
}
