// Typed errors with thiserror. Only config and boundary parse errors reach JS;
// everything else degrades to "no state change" inside the engine.

use thiserror::Error;

use crate::types::{LandmarkSource, TargetId};

/// Trial engine error types.
#[derive(Error, Debug)]
pub enum TrialError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid {input:?} frame: expected at least {expected} points, got {actual}")]
    InvalidFrame {
        input: LandmarkSource,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown target {0:?}")]
    UnknownTarget(TargetId),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TrialError {
    fn from(err: serde_json::Error) -> Self {
        TrialError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrialError>;
