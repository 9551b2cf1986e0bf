// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown operation kind: {0}")]
    UnknownOperation(String),

    #[error("Unknown caller tier: {0}")]
    UnknownTier(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
