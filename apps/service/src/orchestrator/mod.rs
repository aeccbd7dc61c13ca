/// Orchestrator module - coordinates all components
///
/// The orchestrator is the core coordinator that:
/// - Prepares the database and seeds targets from configuration
/// - Wires the monitor engine to the alert consolidator
/// - Runs retention cleanup and the chat command loop in the background
///
/// Everything stops when the shared cancellation token fires.
pub mod retention;


pub use retention::{RetentionCleanup, RetentionPolicy};

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alerts::AlertConsolidator;
use crate::commands::CommandHandler;
use crate::config::Config;
use crate::database::{HistoryStore, LibsqlStore, initialize_database, seed_targets};
use crate::monitoring::{EngineSettings, MonitorEngine, TcpChecker};
use crate::notify::telegram::Update;
use crate::notify::{TelegramClient, Transport};
use crate::pool::LibsqlPool;

const UPDATES_POLL_TIMEOUT: Duration = Duration::from_secs(30);
const UPDATES_RETRY_DELAY: Duration = Duration::from_secs(5);

const STARTED_MESSAGE: &str = "<b>INFO</b>\nport tracker started";
const STOPPED_MESSAGE: &str = "<b>INFO</b>\nport tracker stopped";

/// Main orchestrator for the portwatch service
pub struct Orchestrator {
    config: Arc<Config>,
    store: Arc<dyn HistoryStore>,
    engine: MonitorEngine,
    telegram: Option<Arc<TelegramClient>>,
    consolidator: Arc<AlertConsolidator>,
    task_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl Orchestrator {
    /// Create and run an orchestrator until `token` is cancelled
    pub async fn start(config: Config, pool: LibsqlPool, token: CancellationToken) -> Result<()> {
        let mut orchestrator = Self::new(config, pool).await?;
        orchestrator.run(token).await
    }

    /// Create a new orchestrator instance
    async fn new(config: Config, pool: LibsqlPool) -> Result<Self> {
        let config = Arc::new(config);

        // Get database connection for initialization
        {
            let conn = pool.get().await?;
            info!("Initializing database schema...");
            initialize_database(&conn).await?;
        }

        let store: Arc<dyn HistoryStore> = Arc::new(LibsqlStore::new(pool));
        seed_targets(store.as_ref(), &config.seed_targets()?).await?;

        let checker = Arc::new(TcpChecker::new(config.monitoring.connect_timeout()));
        let settings = EngineSettings {
            interval: config.monitoring.interval(),
            max_parallel: config.monitoring.max_parallel_checks,
            logs_limit_ceiling: config.monitoring.logs_limit_ceiling,
        };
        let engine = MonitorEngine::new(store.clone(), checker, settings);

        let telegram = if config.bot_enabled() {
            let client = TelegramClient::new(
                &config.bot.api_base_url,
                &config.bot.token,
                config.bot.chat_id,
            )?;
            Some(Arc::new(client))
        } else {
            info!("Bot token not set - alerts and commands are disabled");
            None
        };

        let transport = telegram.clone().map(|client| client as Arc<dyn Transport>);
        let consolidator = Arc::new(AlertConsolidator::new(
            transport,
            config.monitoring.fast_recovery_window(),
        ));

        Ok(Self {
            config,
            store,
            engine,
            telegram,
            consolidator,
            task_handles: Vec::new(),
        })
    }

    /// Run the orchestrator
    async fn run(&mut self, token: CancellationToken) -> Result<()> {
        info!("Starting portwatch orchestrator...");

        let policy = RetentionPolicy { log_days: self.config.storage.retention_days };
        info!("Retention policy: check rows kept {}d", policy.log_days);
        let retention = RetentionCleanup::new(self.store.clone(), policy);
        self.task_handles.push(retention.start_periodic_cleanup(token.clone()));

        if let Some(client) = &self.telegram {
            if self.config.bot.commands_enabled {
                let handler = CommandHandler::new(
                    Arc::new(self.engine.clone()),
                    client.clone(),
                    self.config.bot.chat_id,
                );
                self.task_handles.push(tokio::spawn(poll_commands(
                    client.clone(),
                    handler,
                    token.clone(),
                )));
            }
        }

        self.send_status(STARTED_MESSAGE).await;

        self.engine.run(token.clone(), self.consolidator.clone()).await;

        self.send_status(STOPPED_MESSAGE).await;

        for handle in self.task_handles.drain(..) {
            if let Err(e) = handle.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }

        info!("Orchestrator stopped");
        Ok(())
    }

    async fn send_status(&self, message: &str) {
        let Some(client) = &self.telegram else {
            return;
        };
        if let Err(e) = client.send_plain(message).await {
            warn!(error = %e, "failed to send status message");
        }
    }
}

/// Long-poll for chat updates and hand text messages to `handler`
async fn poll_commands(client: Arc<TelegramClient>, handler: CommandHandler, token: CancellationToken) {
    info!("Command listener started");
    let mut offset = 0;

    loop {
        let updates = tokio::select! {
            _ = token.cancelled() => break,
            result = client.get_updates(offset, UPDATES_POLL_TIMEOUT) => result,
        };

        match updates {
            Ok(updates) => offset = handle_updates(&handler, updates, offset).await,
            Err(e) => {
                warn!(error = %e, "failed to fetch updates");
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(UPDATES_RETRY_DELAY) => {}
                }
            }
        }
    }

    info!("Command listener stopped");
}

/// Dispatch a batch of updates, returning the next offset to poll from
async fn handle_updates(handler: &CommandHandler, updates: Vec<Update>, mut offset: i64) -> i64 {
    for update in updates {
        offset = offset.max(update.update_id + 1);
        let Some(message) = update.message else {
            continue;
        };
        let Some(text) = message.text.as_deref().filter(|t| !t.is_empty()) else {
            continue;
        };
        debug!(chat_id = message.chat.id, "handling chat message");
        handler.handle(message.chat.id, text).await;
    }
    offset
}
