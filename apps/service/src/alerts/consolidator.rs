use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::format::{format_alert_group, format_grouped_recovery_edit, format_recovered_edit};
use crate::monitoring::engine::EventSink;
use crate::monitoring::types::{AlertEvent, AlertKind, AlertReason};
use crate::notify::{MessageId, Transport};

pub const DEFAULT_FAST_RECOVERY_WINDOW: Duration = Duration::from_secs(30);

/// A sent single-target DOWN message that can still be edited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDownAlert {
    pub message_id: MessageId,
    pub down_at: DateTime<Utc>,
    pub reason: AlertReason,
    pub address: String,
    pub port: u16,
}

/// A sent multi-target DOWN message that can still be edited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDownGroup {
    pub message_id: MessageId,
    pub reason: AlertReason,
    pub down_at: DateTime<Utc>,
    pub targets: HashMap<String, AlertEvent>,
}

impl PendingDownGroup {
    /// Same target set, every recovery inside the window
    fn matches(&self, recoveries: &[AlertEvent], window: chrono::Duration) -> bool {
        self.targets.len() == recoveries.len()
            && recoveries.iter().all(|ev| {
                self.targets.contains_key(&ev.target) && ev.occurred - self.down_at <= window
            })
    }
}

#[derive(Debug, Default)]
struct PendingState {
    singles: HashMap<String, PendingDownAlert>,
    groups: HashMap<AlertReason, Vec<PendingDownGroup>>,
}

impl PendingState {
    /// Drop groups that can no longer match once `downs` have been observed.
    ///
    /// A group older than the window at `now` is past its edit horizon, and a
    /// group sharing a member with a fresh DOWN has already seen that member
    /// recover outside an exact-set match.
    fn forget_superseded_groups(
        &mut self,
        downs: &[AlertEvent],
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) {
        for pending in self.groups.values_mut() {
            pending.retain(|group| {
                now - group.down_at <= window
                    && !downs.iter().any(|ev| group.targets.contains_key(&ev.target))
            });
        }
        self.groups.retain(|_, pending| !pending.is_empty());
    }
}

/// Turns per-cycle event batches into as few chat messages as possible.
///
/// Quick DOWN -> RECOVERED flips edit the original DOWN message instead of
/// sending a second one.
pub struct AlertConsolidator {
    transport: Option<Arc<dyn Transport>>,
    window: chrono::Duration,
    state: Mutex<PendingState>,
}

impl AlertConsolidator {
    pub fn new(transport: Option<Arc<dyn Transport>>, window: Duration) -> Self {
        let window = chrono::Duration::from_std(window)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_FAST_RECOVERY_WINDOW.as_secs() as i64));
        Self { transport, window, state: Mutex::new(PendingState::default()) }
    }

    /// Deliver one cycle's events
    pub async fn send_batch(&self, events: Vec<AlertEvent>) {
        let Some(transport) = self.transport.as_deref() else {
            return;
        };
        if events.is_empty() {
            return;
        }

        let mut state = self.state.lock().await;

        let events = self.apply_fast_recovery_edits(transport, &mut state, events).await;
        if events.is_empty() {
            return;
        }

        // Kind orders DOWN first, reason breaks ties
        let mut groups: BTreeMap<(AlertKind, AlertReason), Vec<AlertEvent>> = BTreeMap::new();
        for event in events {
            groups.entry((event.kind, event.reason)).or_default().push(event);
        }

        for ((kind, reason), mut group) in groups {
            group.sort_by(|a, b| a.target.cmp(&b.target));
            let message = format_alert_group(&group);
            Self::dispatch_group(transport, &mut state, self.window, kind, reason, group, &message)
                .await;
        }
    }

    async fn dispatch_group(
        transport: &dyn Transport,
        state: &mut PendingState,
        window: chrono::Duration,
        kind: AlertKind,
        reason: AlertReason,
        group: Vec<AlertEvent>,
        message: &str,
    ) {
        let key = format!("{kind}|{reason}");
        let count = group.len();

        if kind != AlertKind::Down || reason != AlertReason::StateChange {
            if let Err(e) = transport.send_plain(message).await {
                warn!(key = %key, count, error = %e, "failed to send grouped alert");
            }
            return;
        }

        let now = group.iter().map(|ev| ev.occurred).max().unwrap_or_else(Utc::now);
        state.forget_superseded_groups(&group, now, window);

        let message_id = match transport.send_with_id(message).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!(key = %key, count, "alert sent without an editable message id");
                return;
            }
            Err(e) => {
                warn!(key = %key, count, error = %e, "failed to send grouped alert");
                return;
            }
        };

        if let [event] = group.as_slice() {
            state.singles.insert(
                event.target.clone(),
                PendingDownAlert {
                    message_id,
                    down_at: event.occurred,
                    reason: event.reason,
                    address: event.address.clone(),
                    port: event.port,
                },
            );
            return;
        }

        let down_at = group[0].occurred;
        let targets = group.into_iter().map(|ev| (ev.target.clone(), ev)).collect();
        state
            .groups
            .entry(reason)
            .or_default()
            .push(PendingDownGroup { message_id, reason, down_at, targets });
    }

    /// Resolve recoveries by editing pending DOWN messages.
    ///
    /// Returns the events that still need a regular send.
    async fn apply_fast_recovery_edits(
        &self,
        transport: &dyn Transport,
        state: &mut PendingState,
        events: Vec<AlertEvent>,
    ) -> Vec<AlertEvent> {
        let mut remaining = Vec::with_capacity(events.len());
        let mut grouped_recoveries: BTreeMap<AlertReason, Vec<AlertEvent>> = BTreeMap::new();

        for event in events {
            if event.kind != AlertKind::Recovered || event.reason != AlertReason::StateChange {
                remaining.push(event);
                continue;
            }

            // A lookup always consumes the record
            let Some(pending) = state.singles.remove(&event.target) else {
                grouped_recoveries.entry(event.reason).or_default().push(event);
                continue;
            };

            if event.occurred - pending.down_at > self.window {
                debug!(target = %event.target, "pending down alert is stale");
                grouped_recoveries.entry(event.reason).or_default().push(event);
                continue;
            }

            let text = format_recovered_edit(&event, &pending);
            if let Err(e) = transport.edit(pending.message_id, &text).await {
                warn!(target = %event.target, error = %e, "failed to edit down alert message");
                grouped_recoveries.entry(event.reason).or_default().push(event);
            }
        }

        for (reason, recoveries) in grouped_recoveries {
            let pending_list = state.groups.entry(reason).or_default();
            let Some(idx) = pending_list.iter().position(|p| p.matches(&recoveries, self.window))
            else {
                remaining.extend(recoveries);
                continue;
            };

            let pending = pending_list.remove(idx);
            let text = format_grouped_recovery_edit(&pending, &recoveries);
            if let Err(e) = transport.edit(pending.message_id, &text).await {
                warn!(reason = %reason, count = recoveries.len(), error = %e, "failed to edit grouped alert");
                remaining.extend(recoveries);
            }
        }

        remaining
    }

    #[cfg(test)]
    pub(crate) async fn pending_counts(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.singles.len(), state.groups.values().map(Vec::len).sum())
    }
}

#[async_trait::async_trait]
impl EventSink for AlertConsolidator {
    async fn on_events(&self, events: Vec<AlertEvent>) {
        self.send_batch(events).await;
    }
}
