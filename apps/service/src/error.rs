use thiserror::Error;

use crate::validation::ValidationError;

/// Errors surfaced by the engine's mutation API
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("target store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }
}
