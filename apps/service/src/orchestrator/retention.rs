//! Automatic retention of check history.
//!
//! Rows older than the configured number of days are deleted once at
//! startup and then every hour by a background task.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::database::HistoryStore;
use crate::validation::MAX_RETENTION_DAYS;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Retention policy for check rows
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Days to keep check rows; 0 disables cleanup
    pub log_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { log_days: 5 }
    }
}

impl RetentionPolicy {
    /// Retention horizon, capped so the cutoff stays representable
    fn retention(&self) -> chrono::Duration {
        let days = self.log_days.clamp(0, MAX_RETENTION_DAYS);
        if days != self.log_days {
            warn!("Retention of {}d out of range, using {}d", self.log_days, days);
        }
        chrono::Duration::try_days(days).unwrap_or(chrono::Duration::MAX)
    }
}

/// Cleanup manager for expired check rows
pub struct RetentionCleanup {
    store: Arc<dyn HistoryStore>,
    policy: RetentionPolicy,
}

impl RetentionCleanup {
    pub fn new(store: Arc<dyn HistoryStore>, policy: RetentionPolicy) -> Self {
        Self { store, policy }
    }

    /// Delete rows past the retention horizon, returning how many went away
    pub async fn cleanup_expired(&self) -> Result<u64> {
        if self.policy.log_days <= 0 {
            debug!("Retention disabled, skipping cleanup");
            return Ok(0);
        }

        let Some(cutoff) = Utc::now().checked_sub_signed(self.policy.retention()) else {
            debug!("Retention horizon out of range, skipping cleanup");
            return Ok(0);
        };
        let deleted = self.store.delete_logs_before(cutoff).await?;
        info!("Retention cleanup completed: {} check rows deleted", deleted);
        Ok(deleted)
    }

    /// Start background cleanup task (runs now, then every hour)
    pub fn start_periodic_cleanup(self, token: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = self.cleanup_expired().await {
                            warn!("Periodic retention cleanup failed: {}", e);
                        }
                    }
                }
            }

            debug!("Retention cleanup task stopped");
        })
    }
}
