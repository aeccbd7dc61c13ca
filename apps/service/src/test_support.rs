//! Shared fakes and fixtures for unit tests

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

use crate::database::{HistoryStore, LibsqlStore, LogRow, TargetDefinition, initialize_database};
use crate::monitoring::checker::Checker;
use crate::monitoring::engine::EventSink;
use crate::monitoring::types::{AlertEvent, CheckReason, MonitorStatus};
use crate::notify::{MessageId, Transport, TransportError};
use crate::pool::open_pool;

/// Helper to create a store on a fresh schema.
///
/// The database file lives as long as the returned `TempDir`.
pub async fn create_test_store() -> Result<(LibsqlStore, TempDir)> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("test.db");
    let db_path_str = db_path.to_string_lossy().to_string();

    let pool = open_pool(&db_path_str, Duration::from_secs(5), 2).await?;
    {
        let conn = pool.get().await?;
        initialize_database(&conn).await?;
    }

    Ok((LibsqlStore::new(pool), temp_dir))
}

/// Transport that records everything it is asked to deliver
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<String>>,
    pub sent_with_id: Mutex<Vec<(MessageId, String)>>,
    pub edits: Mutex<Vec<(MessageId, String)>>,
    pub replies: Mutex<Vec<(i64, String)>>,
    pub fail_sends: AtomicBool,
    pub fail_edits: AtomicBool,
    /// Make `send_with_id` behave as if the text had to be split
    pub withhold_ids: AtomicBool,
    next_id: AtomicI64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_with_id(&self) -> Vec<(MessageId, String)> {
        self.sent_with_id.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<(MessageId, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<(i64, String)> {
        self.replies.lock().unwrap().clone()
    }

    /// Every text delivered as a new message, in no particular order
    pub fn all_new_messages(&self) -> Vec<String> {
        let mut all = self.sent();
        all.extend(self.sent_with_id().into_iter().map(|(_, text)| text));
        all
    }

    fn rejected() -> TransportError {
        TransportError::Api { code: 500, description: "rejected by test transport".into() }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_plain(&self, text: &str) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn send_with_id(&self, text: &str) -> Result<Option<MessageId>, TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        if self.withhold_ids.load(Ordering::SeqCst) {
            self.sent.lock().unwrap().push(text.to_string());
            return Ok(None);
        }
        let id = 100 + self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent_with_id.lock().unwrap().push((id, text.to_string()));
        Ok(Some(id))
    }

    async fn edit(&self, message_id: MessageId, text: &str) -> Result<(), TransportError> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        self.edits.lock().unwrap().push((message_id, text.to_string()));
        Ok(())
    }

    async fn send_to(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        self.replies.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

/// Checker answering from a fixed table keyed by address
#[derive(Default)]
pub struct ScriptedChecker {
    up: Mutex<HashSet<String>>,
    calls: AtomicI64,
}

impl ScriptedChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, address: &str, up: bool) {
        let mut table = self.up.lock().unwrap();
        if up {
            table.insert(address.to_string());
        } else {
            table.remove(address);
        }
    }

    pub fn calls(&self) -> i64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Checker for ScriptedChecker {
    async fn check(&self, address: &str, _port: u16) -> Result<Duration> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.up.lock().unwrap().contains(address) {
            Ok(Duration::from_millis(1))
        } else {
            Err(anyhow!("connection refused"))
        }
    }
}

/// A row as appended through `HistoryStore::append`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendedRow {
    pub target: String,
    pub address: String,
    pub port: u16,
    pub up: bool,
    pub reason: CheckReason,
    pub at: DateTime<Utc>,
}

/// In-memory store with switchable failures
#[derive(Default)]
pub struct MemoryStore {
    pub rows: Mutex<Vec<AppendedRow>>,
    pub targets: Mutex<HashMap<String, TargetDefinition>>,
    pub fail_appends: AtomicBool,
    pub fail_lists: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets(targets: &[(&str, &str, u16)]) -> Self {
        let store = Self::new();
        {
            let mut map = store.targets.lock().unwrap();
            for (name, address, port) in targets {
                map.insert(name.to_string(), TargetDefinition::new(*name, *address, *port));
            }
        }
        store
    }

    pub fn rows(&self) -> Vec<AppendedRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn rows_for(&self, target: &str) -> Vec<AppendedRow> {
        self.rows().into_iter().filter(|r| r.target == target).collect()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(
        &self,
        target: &str,
        address: &str,
        port: u16,
        up: bool,
        reason: CheckReason,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(anyhow!("disk full"));
        }
        self.rows.lock().unwrap().push(AppendedRow {
            target: target.to_string(),
            address: address.to_string(),
            port,
            up,
            reason,
            at,
        });
        Ok(())
    }

    async fn read_since(
        &self,
        target: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LogRow>> {
        let mut rows: Vec<LogRow> = self
            .rows()
            .into_iter()
            .filter(|r| r.target == target && r.at >= cutoff)
            .map(|r| LogRow {
                checked_at: r.at,
                status: MonitorStatus::from_probe(r.up),
                address: r.address,
                port: r.port,
                reason: r.reason.as_str().to_string(),
            })
            .collect();
        if rows.len() > limit {
            rows.drain(..rows.len() - limit);
        }
        Ok(rows)
    }

    async fn list_targets(&self) -> Result<Vec<TargetDefinition>> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(anyhow!("database is locked"));
        }
        let mut targets: Vec<_> =
            self.targets.lock().unwrap().values().filter(|t| t.enabled).cloned().collect();
        targets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(targets)
    }

    async fn upsert_target(&self, target: &TargetDefinition) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("database is read-only"));
        }
        let mut definition = target.clone();
        definition.enabled = true;
        self.targets.lock().unwrap().insert(target.name.clone(), definition);
        Ok(())
    }

    async fn delete_target(&self, name: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("database is read-only"));
        }
        if let Some(target) = self.targets.lock().unwrap().get_mut(name) {
            target.enabled = false;
        }
        Ok(())
    }

    async fn count_targets(&self) -> Result<usize> {
        Ok(self.targets.lock().unwrap().len())
    }

    async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.at >= cutoff);
        Ok((before - rows.len()) as u64)
    }
}

/// Sink keeping every batch it receives
#[derive(Default)]
pub struct CollectingSink {
    pub batches: Mutex<Vec<Vec<AlertEvent>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<AlertEvent>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn on_events(&self, events: Vec<AlertEvent>) {
        self.batches.lock().unwrap().push(events);
    }
}
