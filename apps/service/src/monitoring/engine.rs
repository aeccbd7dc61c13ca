use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::checker::Checker;
use super::registry::TargetRegistry;
use super::types::{AlertEvent, Snapshot, TargetIdentity};
use crate::database::{HistoryStore, LogRow};
use crate::error::EngineError;
use crate::validation::{validate_target, validate_target_name};

/// Upper bound on concurrent probes regardless of configuration
pub const MAX_PARALLEL_CHECKS_HARD_LIMIT: usize = 256;

const DEFAULT_LOG_DAYS: u32 = 7;
const MAX_LOG_DAYS: u32 = 365;
const DEFAULT_LOG_LIMIT: usize = 200;

/// Receives the event batch of each check cycle
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn on_events(&self, events: Vec<AlertEvent>);
}

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub interval: Duration,
    /// 0 means one worker per target
    pub max_parallel: usize,
    pub logs_limit_ceiling: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_parallel: 0,
            logs_limit_ceiling: 50_000,
        }
    }
}

/// Owns current reachability and runs check cycles.
///
/// Cloning is cheap and every clone shares the same registry.
#[derive(Clone)]
pub struct MonitorEngine {
    store: Arc<dyn HistoryStore>,
    checker: Arc<dyn Checker>,
    settings: EngineSettings,
    registry: Arc<RwLock<TargetRegistry>>,
}

impl MonitorEngine {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        checker: Arc<dyn Checker>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            checker,
            settings,
            registry: Arc::new(RwLock::new(TargetRegistry::new())),
        }
    }

    /// Run one cycle now, then one per interval until `token` is cancelled.
    ///
    /// Cycles never overlap: a slow cycle delays the next tick.
    pub async fn run(&self, token: CancellationToken, sink: Arc<dyn EventSink>) {
        info!(
            "Monitor engine started (interval {:?}, max parallel {})",
            self.settings.interval, self.settings.max_parallel
        );

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        self.run_cycle(&token, sink.as_ref()).await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.run_cycle(&token, sink.as_ref()).await,
            }
        }

        info!("Monitor engine stopped");
    }

    /// One full pass: sync, probe every target, emit the batch once
    pub async fn run_cycle(&self, token: &CancellationToken, sink: &dyn EventSink) {
        self.sync_targets().await;

        let targets = self.registry.read().await.identities();
        let workers = effective_workers(self.settings.max_parallel, targets.len());
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        for target in targets {
            if token.is_cancelled() {
                debug!("Cancellation observed, not launching remaining probes");
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let engine = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let up = match engine.checker.check(&target.address, target.port).await {
                    Ok(latency) => {
                        debug!(target = %target.name, ?latency, "probe succeeded");
                        true
                    }
                    Err(e) => {
                        debug!(target = %target.name, error = %e, "probe failed");
                        false
                    }
                };
                engine.apply_status(&target, up).await
            });
        }

        let mut events = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "probe task failed"),
            }
        }

        debug!(workers, events = events.len(), "check cycle finished");
        sink.on_events(events).await;
    }

    /// Apply one probe outcome under the registry lock, then record it
    async fn apply_status(&self, target: &TargetIdentity, up: bool) -> Option<AlertEvent> {
        let now = Utc::now();
        let transition = {
            let mut registry = self.registry.write().await;
            registry.apply(target, up, now)
        };

        let Some(transition) = transition else {
            debug!(target = %target.name, "target changed during probe, result discarded");
            return None;
        };

        if let Err(e) = self
            .store
            .append(&target.name, &target.address, target.port, up, transition.reason, now)
            .await
        {
            warn!(target = %target.name, reason = %transition.reason, error = %e, "failed to append check row");
        }

        transition.event
    }

    /// Reload the registry from the target store, keeping it on failure
    pub async fn sync_targets(&self) {
        let definitions = match self.store.list_targets().await {
            Ok(definitions) => definitions,
            Err(e) => {
                warn!(error = %e, "failed to load targets from store, keeping last known set");
                return;
            }
        };

        self.registry.write().await.replace(&definitions);
    }

    /// Consistent copy of current state
    pub async fn snapshot(&self) -> Snapshot {
        self.registry.read().await.snapshot(Utc::now())
    }

    /// Recent check rows for a registered target.
    ///
    /// `found` is false when no such target is registered.
    pub async fn logs(&self, target: &str, days: u32, limit: usize) -> (Vec<LogRow>, bool) {
        let days = match days {
            0 => DEFAULT_LOG_DAYS,
            d => d.min(MAX_LOG_DAYS),
        };
        let limit = match limit {
            0 => DEFAULT_LOG_LIMIT,
            l => l,
        }
        .min(self.settings.logs_limit_ceiling.max(1));

        let name = match self.registry.read().await.get(target) {
            Some(state) => state.name.clone(),
            None => return (Vec::new(), false),
        };

        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        match self.store.read_since(&name, cutoff, limit).await {
            Ok(rows) => (rows, true),
            Err(e) => {
                warn!(target = %name, error = %e, "failed to read check rows");
                (Vec::new(), true)
            }
        }
    }

    /// Create or update a target, then resync so the next cycle sees it
    pub async fn upsert_target(&self, name: &str, address: &str, port: i64) -> Result<(), EngineError> {
        let definition = validate_target(name, address, port)?;
        self.store.upsert_target(&definition).await?;
        info!(target = %definition.name, address = %definition.address, port = definition.port, "target upserted");
        self.sync_targets().await;
        Ok(())
    }

    /// Disable a target, then resync
    pub async fn delete_target(&self, name: &str) -> Result<(), EngineError> {
        let name = validate_target_name(name)?;
        self.store.delete_target(&name).await?;
        info!(target = %name, "target deleted");
        self.sync_targets().await;
        Ok(())
    }
}

/// Number of probes allowed in flight for a cycle over `target_count` targets
pub fn effective_workers(max_parallel: usize, target_count: usize) -> usize {
    let requested = if max_parallel == 0 { target_count } else { max_parallel };
    let ceiling = target_count.min(MAX_PARALLEL_CHECKS_HARD_LIMIT).max(1);
    requested.clamp(1, ceiling)
}
