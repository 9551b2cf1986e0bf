// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::domain::ConfigError),

    #[error("Admission rejected: {0}")]
    Admission(#[from] crate::application::admission::AdmissionError),

    #[error("Execution error: {0}")]
    Execution(#[from] crate::port::ExecutionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Queue closed: {0}")]
    QueueClosed(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
