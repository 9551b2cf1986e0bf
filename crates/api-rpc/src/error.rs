//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use atelier_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const QUEUE_CLOSED: i32 = 4004;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SYSTEM_ERROR: i32 = 5002;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::NotFound(msg) => ErrorObjectOwned::owned(code::NOT_FOUND, msg, None::<()>),
        AppError::QueueClosed(operation) => ErrorObjectOwned::owned(
            code::QUEUE_CLOSED,
            format!("{} queue is shut down", operation),
            None::<()>,
        ),
        AppError::Admission(e) => ErrorObjectOwned::owned(
            code::VALIDATION_ERROR,
            e.to_string(),
            Some(e.reason_code()),
        ),
        AppError::Domain(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Serialization(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Execution(e) => {
            ErrorObjectOwned::owned(code::SYSTEM_ERROR, e.to_string(), None::<()>)
        }
        AppError::Config(e) => {
            ErrorObjectOwned::owned(code::INTERNAL_ERROR, e.to_string(), None::<()>)
        }
    }
}
