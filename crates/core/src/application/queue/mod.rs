//! Bounded priority job queue
//!
//! One instance per service (render, export, sync). The public [`JobQueue`]
//! is a cheap, cloneable handle; all state lives in a dispatcher task that
//! processes commands and completion events one at a time.
//!
//! ```text
//! let queue = JobQueue::builder(config, executor).spawn()?;
//! let id = queue.submit(SubmitRequest::new(CallerTier::Premium, 12)).await?;
//! let status = queue.get_status(&id).await?;
//! ```

mod dispatcher;
mod execution;
mod state;
mod view;

pub use view::{JobStatusView, QueueMetrics};

use crate::application::admission::{AdmissionError, SubmitRequest};
use crate::application::constants::COMMAND_CHANNEL_CAPACITY;
use crate::domain::{ConfigError, JobId, OperationKind, QueueConfig};
use crate::error::{AppError, Result};
use crate::port::id_provider::UuidProvider;
use crate::port::system_probe::NoopSystemProbe;
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{IdProvider, JobExecutor, SystemProbe, TimeProvider};
use dispatcher::{Command, Dispatcher};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Handle to a running queue
#[derive(Clone)]
pub struct JobQueue {
    config: Arc<QueueConfig>,
    commands: mpsc::Sender<Command>,
}

impl JobQueue {
    pub fn builder(config: QueueConfig, executor: Arc<dyn JobExecutor>) -> JobQueueBuilder {
        JobQueueBuilder {
            config,
            executor,
            time_provider: Arc::new(SystemTimeProvider),
            id_provider: Arc::new(UuidProvider),
            system_probe: Arc::new(NoopSystemProbe),
        }
    }

    pub fn operation(&self) -> OperationKind {
        self.config.operation
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Admit a job. Rejections are returned immediately and leave the queue untouched.
    pub async fn submit(&self, request: SubmitRequest) -> std::result::Result<JobId, AdmissionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Submit { request, reply })
            .await
            .map_err(|_| AdmissionError::QueueClosed)?;
        rx.await.map_err(|_| AdmissionError::QueueClosed)?
    }

    /// Cancel a waiting or running job. False if it is unknown or already terminal.
    pub async fn cancel(&self, id: &str) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Cancel {
            id: id.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.closed())
    }

    pub async fn get_status(&self, id: &str) -> Result<Option<JobStatusView>> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Status {
            id: id.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.closed())
    }

    pub async fn get_metrics(&self) -> Result<QueueMetrics> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Metrics { reply }).await?;
        rx.await.map_err(|_| self.closed())
    }

    /// Stop admission, signal every running job and stop the dispatcher
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Shutdown { reply }).await?;
        rx.await.map_err(|_| self.closed())
    }

    async fn request(&self, command: Command) -> Result<()> {
        self.commands.send(command).await.map_err(|_| self.closed())
    }

    fn closed(&self) -> AppError {
        AppError::QueueClosed(self.config.operation.to_string())
    }
}

/// Wires a queue's collaborators before spawning its dispatcher
pub struct JobQueueBuilder {
    config: QueueConfig,
    executor: Arc<dyn JobExecutor>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    system_probe: Arc<dyn SystemProbe>,
}

impl JobQueueBuilder {
    pub fn time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    pub fn id_provider(mut self, id_provider: Arc<dyn IdProvider>) -> Self {
        self.id_provider = id_provider;
        self
    }

    pub fn system_probe(mut self, system_probe: Arc<dyn SystemProbe>) -> Self {
        self.system_probe = system_probe;
        self
    }

    /// Validate the config and start the dispatcher task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> std::result::Result<JobQueue, ConfigError> {
        self.config.validate()?;

        let config = Arc::new(self.config);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let dispatcher = Dispatcher::new(
            Arc::clone(&config),
            self.executor,
            self.time_provider,
            self.id_provider,
            self.system_probe,
            events_tx,
        );
        tokio::spawn(dispatcher.run(commands_rx, events_rx));

        Ok(JobQueue {
            config,
            commands: commands_tx,
        })
    }
}
