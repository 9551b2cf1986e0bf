//! JSON-RPC Server
//!
//! Serves the queue API over HTTP on localhost.

use crate::handler::RpcHandler;
use crate::types::{CancelRequest, MetricsRequest, StatusRequest, SubmitRequest};
use atelier_core::application::JobServices;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9627;

/// RPC Server Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, services: JobServices) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(services)),
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address (useful with port 0) and the handle used to stop it.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let mut module = RpcModule::new(());

        // Register methods
        let handler = self.handler.clone();
        module
            .register_async_method("jobs.submit.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SubmitRequest = params.parse()?;
                    handler.submit(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("jobs.cancel.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CancelRequest = params.parse()?;
                    handler.cancel(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("jobs.status.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StatusRequest = params.parse()?;
                    handler.status(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        // Admin APIs
        let handler = self.handler.clone();
        module
            .register_async_method("admin.metrics.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    // Parameters are optional for this method
                    let req: Option<MetricsRequest> = params.parse()?;
                    handler.metrics(req.unwrap_or_default()).await
                }
            })
            .map_err(|e| e.to_string())?;

        info!(addr = %local_addr, "JSON-RPC server started successfully");

        let handle = server.start(module);
        Ok((local_addr, handle))
    }
}
