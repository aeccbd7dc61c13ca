use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Reachability of a target as last observed by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorStatus {
    /// Never checked since the target entered the registry
    #[default]
    Unknown,
    Up,
    Down,
}

impl MonitorStatus {
    pub fn from_probe(up: bool) -> Self {
        if up { MonitorStatus::Up } else { MonitorStatus::Down }
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorStatus::Unknown => write!(f, "UNKNOWN"),
            MonitorStatus::Up => write!(f, "UP"),
            MonitorStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// Why a history row was written for a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckReason {
    /// First check after the target entered the registry
    Init,
    /// Status flipped between up and down
    Change,
    /// Status unchanged
    Poll,
}

impl CheckReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckReason::Init => "INIT",
            CheckReason::Change => "CHANGE",
            CheckReason::Poll => "POLL",
        }
    }
}

impl fmt::Display for CheckReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of an alert event.
///
/// Declaration order is the dispatch order of groups: DOWN before RECOVERED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlertKind {
    Down,
    Recovered,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Down => write!(f, "DOWN"),
            AlertKind::Recovered => write!(f, "RECOVERED"),
        }
    }
}

/// Cause of an alert event.
///
/// Ordering matches the lexical order of the rendered reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlertReason {
    /// Target was down on its very first check
    InitialCheck,
    /// Target flipped between up and down
    StateChange,
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertReason::InitialCheck => write!(f, "initial-check"),
            AlertReason::StateChange => write!(f, "state-change"),
        }
    }
}

/// A reachability transition worth telling the operator about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub target: String,
    pub address: String,
    pub port: u16,
    pub reason: AlertReason,
    pub occurred: DateTime<Utc>,
}

/// Live state of one monitored endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetState {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub status: MonitorStatus,
    pub last_changed: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl TargetState {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            status: MonitorStatus::Unknown,
            last_changed: None,
            last_checked: None,
        }
    }

    /// Name, address and port all match
    pub fn same_identity(&self, other: &TargetIdentity) -> bool {
        self.name == other.name && self.address == other.address && self.port == other.port
    }

    pub fn identity(&self) -> TargetIdentity {
        TargetIdentity {
            name: self.name.clone(),
            address: self.address.clone(),
            port: self.port,
        }
    }
}

/// What a probe task needs to know about its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetIdentity {
    pub name: String,
    pub address: String,
    pub port: u16,
}

/// Point-in-time copy of the registry for reporting
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub up: usize,
    pub down: usize,
    pub unknown: usize,
    pub targets: Vec<TargetSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetSnapshot {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub status: MonitorStatus,
    pub last_changed: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl From<&TargetState> for TargetSnapshot {
    fn from(state: &TargetState) -> Self {
        Self {
            name: state.name.clone(),
            address: state.address.clone(),
            port: state.port,
            status: state.status,
            last_changed: state.last_changed,
            last_checked: state.last_checked,
        }
    }
}
