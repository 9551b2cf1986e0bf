//! Atelier CLI - Command-line interface for the Atelier Job Engine

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9627";
const SERVICES: [&str; 3] = ["render", "export", "sync"];
const TIERS: [&str; 3] = ["basic", "standard", "premium"];

#[derive(Parser)]
#[command(name = "atelier")]
#[command(about = "Atelier Job Engine CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "ATELIER_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new job
    Submit {
        /// Service queue (render, export, sync)
        #[arg(value_parser = SERVICES)]
        service: String,

        /// Caller tier
        #[arg(short, long, value_parser = TIERS, default_value = "standard")]
        tier: String,

        /// Payload size in units (e.g. megabytes)
        #[arg(short, long)]
        size: u64,

        /// Payload as JSON string (e.g. '{"format":"pdf"}')
        #[arg(long)]
        payload: Option<String>,
    },

    /// Cancel a waiting or running job
    Cancel {
        #[arg(value_parser = SERVICES)]
        service: String,

        /// Job ID
        job_id: String,
    },

    /// Show where a job is and how it ended
    Status {
        #[arg(value_parser = SERVICES)]
        service: String,

        /// Job ID
        job_id: String,
    },

    /// Show queue metrics
    Metrics {
        /// Limit to one service
        #[arg(value_parser = SERVICES)]
        service: Option<String>,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct MetricsRow {
    #[tabled(rename = "service")]
    operation: String,
    #[tabled(rename = "waiting")]
    queue_depth: u64,
    #[tabled(rename = "active")]
    active_count: u64,
    #[tabled(rename = "limit")]
    max_concurrent: u64,
    #[tabled(rename = "util %", display_with = "percent")]
    utilization_percent: f64,
    #[tabled(rename = "completed")]
    completed_count: u64,
    #[tabled(rename = "failed")]
    failed_count: u64,
    #[tabled(rename = "timeout")]
    timeout_count: u64,
    #[tabled(rename = "cancelled")]
    cancelled_count: u64,
}

fn percent(value: &f64) -> String {
    format!("{:.1}", value)
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn print_status(status: &serde_json::Value) {
    let location = status["location"].as_str().unwrap_or("unknown");
    println!("  {} {}", "Location:".bold(), location);

    match location {
        "running" | "waiting" => {
            let job = &status["job"];
            println!("  {} {}", "State:".bold(), job["state"]);
            println!("  {} {}", "Priority:".bold(), job["priority"]);
            println!("  {} {}", "Attempts:".bold(), job["attempts"]);
            if let Some(position) = status["position"].as_u64() {
                println!("  {} {}", "Position:".bold(), position);
            }
        }
        "finished" => {
            let result = &status["result"];
            let outcome = result["status"].as_str().unwrap_or("UNKNOWN");
            let colored_outcome = match outcome {
                "COMPLETED" => outcome.green(),
                "CANCELLED" => outcome.yellow(),
                _ => outcome.red(),
            };
            println!("  {} {}", "Status:".bold(), colored_outcome);
            println!("  {} {}", "Attempts:".bold(), result["attempts"]);
            if let Some(output) = result["output"].as_str() {
                println!("  {} {}", "Output:".bold(), output);
            }
            if !result["error"].is_null() {
                println!("  {} {}", "Error:".bold(), result["error"]);
            }
            println!(
                "  {} {} ms waiting, {} ms running",
                "Timing:".bold(),
                result["queue_wait_ms"],
                result["run_ms"]
            );
        }
        _ => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            service,
            tier,
            size,
            payload,
        } => {
            let payload_json: serde_json::Value = match payload {
                Some(raw) => serde_json::from_str(&raw).context("Invalid JSON payload")?,
                None => serde_json::Value::Null,
            };

            let params = json!({
                "service": service,
                "caller_tier": tier,
                "payload_size_units": size,
                "payload": payload_json,
            });

            let result = call_rpc(&cli.rpc_url, "jobs.submit.v1", params).await?;

            if result["accepted"].as_bool().unwrap_or(false) {
                println!("{}", "✓ Job accepted".green().bold());
                println!("  {} {}", "Job ID:".bold(), result["job_id"].as_str().unwrap_or("-"));
            } else {
                println!(
                    "{} {}",
                    "✗ Job rejected:".red().bold(),
                    result["rejection_reason"].as_str().unwrap_or("UNKNOWN")
                );
                if let Some(message) = result["message"].as_str() {
                    println!("  {}", message);
                }
            }
        }

        Commands::Cancel { service, job_id } => {
            let params = json!({
                "service": service,
                "job_id": job_id,
            });

            let result = call_rpc(&cli.rpc_url, "jobs.cancel.v1", params).await?;

            if result["cancelled"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Job {} cancelled", job_id).green().bold());
            } else {
                println!(
                    "{}",
                    format!("○ Job {} not cancellable (unknown or already finished)", job_id)
                        .yellow()
                );
            }
        }

        Commands::Status { service, job_id } => {
            let params = json!({
                "service": service,
                "job_id": job_id,
            });

            let status = call_rpc(&cli.rpc_url, "jobs.status.v1", params).await?;
            println!("{}", format!("Job {}", job_id).cyan().bold());
            println!();
            print_status(&status);
        }

        Commands::Metrics { service } => {
            println!("{}", "Queue Metrics".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.metrics.v1", json!({ "service": service })).await {
                Ok(metrics) => {
                    let rows: Vec<MetricsRow> = serde_json::from_value(metrics["queues"].clone())
                        .context("Unexpected metrics payload")?;
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!("  {} {} seconds", "Uptime:".bold(), metrics["uptime_seconds"]);
                    println!();
                    println!("{}", Table::new(rows));
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
