use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::monitoring::types::MonitorStatus;

/// Durable definition of a monitored endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDefinition {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub enabled: bool,
}

impl TargetDefinition {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self { name: name.into(), address: address.into(), port, enabled: true }
    }
}

/// One stored check result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRow {
    pub checked_at: DateTime<Utc>,
    pub status: MonitorStatus,
    pub address: String,
    pub port: u16,
    pub reason: String,
}

impl LogRow {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Convert a timestamp to unix milliseconds for storage
pub fn timestamp_to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert stored unix milliseconds back to a timestamp
pub fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

pub fn status_to_str(up: bool) -> &'static str {
    if up { "UP" } else { "DOWN" }
}

pub fn status_from_str(raw: &str) -> MonitorStatus {
    match raw.to_ascii_uppercase().as_str() {
        "UP" => MonitorStatus::Up,
        "DOWN" => MonitorStatus::Down,
        _ => MonitorStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_roundtrip_keeps_precision() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 15).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(millis_to_timestamp(timestamp_to_millis(at)), at);
    }

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!(status_from_str("up"), MonitorStatus::Up);
        assert_eq!(status_from_str("DOWN"), MonitorStatus::Down);
        assert_eq!(status_from_str("degraded"), MonitorStatus::Unknown);
    }
}
