//! Daemon settings: built-in defaults → `atelier.toml` → `--config` file → `ATELIER__*` env → flags.

use std::path::PathBuf;

use atelier_api_rpc::RpcServerConfig;
use atelier_core::application::constants::DEFAULT_HEALTH_INTERVAL;
use atelier_core::domain::{ConfigError, OperationKind, QueueConfig};
use atelier_infra_system::SimulationProfile;
use clap::{Parser, ValueEnum};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const LOCAL_CONFIG_BASENAME: &str = "atelier";
const ENV_PREFIX: &str = "ATELIER";

/// Command-line arguments for the daemon.
#[derive(Debug, Default, Parser)]
#[command(name = "atelier-job-engine", version, about = "Atelier job queue daemon")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config", env = "ATELIER_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Override the JSON-RPC port.
    #[arg(long = "rpc-port", env = "ATELIER_RPC_PORT")]
    pub rpc_port: Option<u16>,

    /// Override the log output format.
    #[arg(long = "log-format", env = "ATELIER_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Development: pretty formatting with colors
    #[default]
    Pretty,
    /// Production: JSON structured logging
    Json,
}

/// One config per service queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    pub render: QueueConfig,
    pub export: QueueConfig,
    pub sync: QueueConfig,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            render: QueueConfig::for_operation(OperationKind::Render),
            export: QueueConfig::for_operation(OperationKind::Export),
            sync: QueueConfig::for_operation(OperationKind::Sync),
        }
    }
}

impl QueueSettings {
    pub fn get(&self, kind: OperationKind) -> &QueueConfig {
        match kind {
            OperationKind::Render => &self.render,
            OperationKind::Export => &self.export,
            OperationKind::Sync => &self.sync,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub rpc: RpcServerConfig,
    pub log_format: LogFormat,
    pub health_interval_secs: u64,
    pub simulation: SimulationProfile,
    pub queues: QueueSettings,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            rpc: RpcServerConfig::default(),
            log_format: LogFormat::default(),
            health_interval_secs: DEFAULT_HEALTH_INTERVAL.as_secs(),
            simulation: SimulationProfile::default(),
            queues: QueueSettings::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid queue configuration: {0}")]
    Queue(#[from] ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Load settings using the configured precedence.
pub fn load(cli: &CliArgs) -> Result<DaemonSettings, LoadError> {
    load_layers(cli, Some(LOCAL_CONFIG_BASENAME), true)
}

fn load_layers(
    cli: &CliArgs,
    local_config: Option<&str>,
    with_env: bool,
) -> Result<DaemonSettings, LoadError> {
    let mut builder = Config::builder().add_source(Config::try_from(&DaemonSettings::default())?);

    if let Some(local) = local_config {
        builder = builder.add_source(File::with_name(local).required(false));
    }
    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }
    if with_env {
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
    }

    let mut settings: DaemonSettings = builder.build()?.try_deserialize()?;

    if let Some(port) = cli.rpc_port {
        settings.rpc.port = port;
    }
    if let Some(format) = cli.log_format {
        settings.log_format = format;
    }

    settings.validate()?;
    Ok(settings)
}

impl DaemonSettings {
    fn validate(&self) -> Result<(), LoadError> {
        if self.health_interval_secs == 0 {
            return Err(LoadError::Invalid {
                key: "health_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.simulation.failure_rate) {
            return Err(LoadError::Invalid {
                key: "simulation.failure_rate",
                reason: "must be within [0, 1]".to_string(),
            });
        }
        for kind in OperationKind::ALL {
            let queue = self.queues.get(kind);
            if queue.operation != kind {
                return Err(LoadError::Invalid {
                    key: "queues.*.operation",
                    reason: format!("{} section declares operation {}", kind, queue.operation),
                });
            }
            queue.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("atelier-{}-{}.toml", name, std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = load_layers(&CliArgs::default(), None, false).unwrap();
        assert_eq!(settings.queues.render.max_concurrent_jobs, 4);
        assert_eq!(settings.queues.export.queue_depth_limit, 50);
        assert_eq!(settings.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_file_overrides_defaults_and_flags_override_file() {
        let path = write_config(
            "override",
            r#"
log_format = "json"

[rpc]
port = 9700

[queues.sync]
max_concurrent_jobs = 16
retry_backoff_ms = 500
"#,
        );
        let cli = CliArgs {
            config_file: Some(path.clone()),
            rpc_port: Some(9800),
            log_format: None,
        };

        let settings = load_layers(&cli, None, false).unwrap();
        std::fs::remove_file(path).unwrap();

        assert_eq!(settings.rpc.port, 9800);
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.queues.sync.max_concurrent_jobs, 16);
        assert_eq!(settings.queues.sync.retry_backoff_ms, 500);
        // Untouched fields keep their defaults
        assert_eq!(settings.queues.sync.queue_depth_limit, 100);
    }

    #[test]
    fn test_rejects_values_below_minimums() {
        let path = write_config(
            "invalid",
            r#"
[queues.render]
max_concurrent_jobs = 0
"#,
        );
        let cli = CliArgs {
            config_file: Some(path.clone()),
            ..CliArgs::default()
        };

        let result = load_layers(&cli, None, false);
        std::fs::remove_file(path).unwrap();
        assert!(matches!(result, Err(LoadError::Queue(_))));
    }

    #[test]
    fn test_missing_explicit_config_file_fails() {
        let cli = CliArgs {
            config_file: Some(PathBuf::from("/nonexistent/atelier.toml")),
            ..CliArgs::default()
        };
        assert!(matches!(
            load_layers(&cli, None, false),
            Err(LoadError::Build(_))
        ));
    }
}
