//! In-memory list of monitored targets and the status transition rule.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::types::{
    AlertEvent, AlertKind, AlertReason, CheckReason, MonitorStatus, Snapshot, TargetIdentity,
    TargetSnapshot, TargetState,
};
use crate::database::TargetDefinition;

/// Result of applying one probe outcome to a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub reason: CheckReason,
    pub event: Option<AlertEvent>,
}

/// Targets sorted by name, plus a name index
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: Vec<TargetState>,
    by_name: HashMap<String, usize>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn get(&self, name: &str) -> Option<&TargetState> {
        self.by_name.get(name).map(|&idx| &self.targets[idx])
    }

    #[cfg(test)]
    pub fn targets(&self) -> &[TargetState] {
        &self.targets
    }

    pub fn identities(&self) -> Vec<TargetIdentity> {
        self.targets.iter().map(TargetState::identity).collect()
    }

    /// Replace the whole collection with `definitions`.
    ///
    /// Status and timestamps carry over for targets whose name, address and
    /// port are all unchanged. Disabled or malformed rows are skipped.
    pub fn replace(&mut self, definitions: &[TargetDefinition]) {
        let mut next: Vec<TargetState> = Vec::with_capacity(definitions.len());

        for definition in definitions {
            if !definition.enabled
                || definition.name.is_empty()
                || definition.address.is_empty()
                || definition.port == 0
            {
                continue;
            }

            let mut state =
                TargetState::new(&definition.name, &definition.address, definition.port);
            if let Some(previous) = self.get(&definition.name) {
                if previous.address == definition.address && previous.port == definition.port {
                    state.status = previous.status;
                    state.last_changed = previous.last_changed;
                    state.last_checked = previous.last_checked;
                }
            }
            next.push(state);
        }

        next.sort_by(|a, b| a.name.cmp(&b.name));
        next.dedup_by(|a, b| a.name == b.name);

        self.by_name = next.iter().enumerate().map(|(idx, t)| (t.name.clone(), idx)).collect();
        self.targets = next;
    }

    /// Apply a probe outcome.
    ///
    /// Returns `None` when the target is gone or was re-addressed since the
    /// probe was launched.
    pub fn apply(
        &mut self,
        identity: &TargetIdentity,
        up: bool,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        let idx = *self.by_name.get(&identity.name)?;
        let target = &mut self.targets[idx];
        if !target.same_identity(identity) {
            return None;
        }

        let observed = MonitorStatus::from_probe(up);
        target.last_checked = Some(now);

        let previous = target.status;
        if previous == observed {
            return Some(Transition { reason: CheckReason::Poll, event: None });
        }

        target.status = observed;
        target.last_changed = Some(now);

        let (reason, event_reason) = match previous {
            MonitorStatus::Unknown => (CheckReason::Init, AlertReason::InitialCheck),
            MonitorStatus::Up | MonitorStatus::Down => (CheckReason::Change, AlertReason::StateChange),
        };

        // A target coming up on its first check is not news
        let kind = match (previous, observed) {
            (MonitorStatus::Unknown, MonitorStatus::Up) => None,
            (_, MonitorStatus::Down) => Some(AlertKind::Down),
            (_, MonitorStatus::Up) => Some(AlertKind::Recovered),
            (_, MonitorStatus::Unknown) => None,
        };

        let event = kind.map(|kind| AlertEvent {
            kind,
            target: target.name.clone(),
            address: target.address.clone(),
            port: target.port,
            reason: event_reason,
            occurred: now,
        });

        Some(Transition { reason, event })
    }

    pub fn snapshot(&self, generated_at: DateTime<Utc>) -> Snapshot {
        let mut snapshot = Snapshot {
            generated_at,
            total: self.targets.len(),
            up: 0,
            down: 0,
            unknown: 0,
            targets: Vec::with_capacity(self.targets.len()),
        };

        for target in &self.targets {
            match target.status {
                MonitorStatus::Up => snapshot.up += 1,
                MonitorStatus::Down => snapshot.down += 1,
                MonitorStatus::Unknown => snapshot.unknown += 1,
            }
            snapshot.targets.push(TargetSnapshot::from(target));
        }

        snapshot
    }
}
