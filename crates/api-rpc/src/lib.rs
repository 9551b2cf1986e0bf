//! JSON-RPC API Layer
//!
//! Exposes the render, export and sync queues over JSON-RPC 2.0.
//!
//! Methods: `jobs.submit.v1`, `jobs.cancel.v1`, `jobs.status.v1`, `admin.metrics.v1`.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
