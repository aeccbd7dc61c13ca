use thiserror::Error;

use crate::database::TargetDefinition;

const MAX_NAME_LEN: usize = 100;

/// A century of check history
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Rejected target or schedule input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("target name is required")]
    EmptyName,
    #[error("target name too long (max {MAX_NAME_LEN} characters)")]
    NameTooLong,
    #[error("target address is required")]
    EmptyAddress,
    #[error("target address cannot contain whitespace: {0:?}")]
    InvalidAddress(String),
    #[error("target port must be between 1 and 65535, got {0}")]
    InvalidPort(i64),
    #[error("interval must be between 1 and 86400 seconds, got {0}")]
    InvalidInterval(u64),
    #[error("timeout must be between 1 and 300 seconds, got {0}")]
    InvalidTimeout(u64),
    #[error("retention must be between 0 and {MAX_RETENTION_DAYS} days, got {0}")]
    InvalidRetention(i64),
}

/// Validate a target name
pub fn validate_target_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong);
    }

    Ok(trimmed.to_string())
}

/// Validate a target definition, returning the trimmed, typed form
pub fn validate_target(
    name: &str,
    address: &str,
    port: i64,
) -> Result<TargetDefinition, ValidationError> {
    let name = validate_target_name(name)?;

    let address = address.trim();
    if address.is_empty() {
        return Err(ValidationError::EmptyAddress);
    }
    if address.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidAddress(address.to_string()));
    }

    let port = u16::try_from(port)
        .ok()
        .filter(|port| *port > 0)
        .ok_or(ValidationError::InvalidPort(port))?;

    Ok(TargetDefinition::new(name, address, port))
}

/// Validate check interval
pub fn validate_interval(interval_seconds: u64) -> Result<(), ValidationError> {
    if interval_seconds == 0 || interval_seconds > 86400 {
        return Err(ValidationError::InvalidInterval(interval_seconds));
    }
    Ok(())
}

/// Validate connect timeout
pub fn validate_timeout(timeout_seconds: u64) -> Result<(), ValidationError> {
    if timeout_seconds == 0 || timeout_seconds > 300 {
        return Err(ValidationError::InvalidTimeout(timeout_seconds));
    }
    Ok(())
}

/// Validate history retention; 0 keeps rows forever
pub fn validate_retention_days(days: i64) -> Result<(), ValidationError> {
    if !(0..=MAX_RETENTION_DAYS).contains(&days) {
        return Err(ValidationError::InvalidRetention(days));
    }
    Ok(())
}
