//! JSON-RPC round trips against a full service stack
//!
//! Three queues with the simulated executor behind a real jsonrpsee server.

use std::sync::Arc;
use std::time::Duration;

use atelier_api_rpc::{RpcServer, RpcServerConfig};
use atelier_core::application::{JobQueue, JobServices};
use atelier_core::domain::{OperationKind, QueueConfig};
use atelier_core::port::JobExecutor;
use atelier_infra_system::{SimulatedExecutor, SimulationProfile};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::server::ServerHandle;
use serde_json::Value;

async fn start_stack() -> (HttpClient, ServerHandle, JobServices) {
    let executor: Arc<dyn JobExecutor> = Arc::new(SimulatedExecutor::new(SimulationProfile {
        render_ms_per_unit: 1,
        export_ms_per_unit: 1,
        sync_ms_per_unit: 1,
        failure_rate: 0.0,
    }));
    let spawn = |kind: OperationKind| {
        let mut config = QueueConfig::for_operation(kind);
        config.queue_depth_limit = 2;
        config.max_concurrent_jobs = 1;
        JobQueue::builder(config, executor.clone()).spawn().unwrap()
    };
    let services = JobServices::new(
        spawn(OperationKind::Render),
        spawn(OperationKind::Export),
        spawn(OperationKind::Sync),
    )
    .unwrap();

    let config = RpcServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let (addr, handle) = RpcServer::new(config, services.clone()).start().await.unwrap();
    let client = HttpClientBuilder::default()
        .build(format!("http://{}", addr))
        .unwrap();
    (client, handle, services)
}

fn params(pairs: &[(&str, Value)]) -> ObjectParams {
    let mut params = ObjectParams::new();
    for (key, value) in pairs {
        params.insert(key, value).unwrap();
    }
    params
}

async fn status(client: &HttpClient, service: &str, job_id: &str) -> Value {
    client
        .request(
            "jobs.status.v1",
            params(&[("service", service.into()), ("job_id", job_id.into())]),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_submit_status_until_finished() {
    let (client, handle, _services) = start_stack().await;

    let submitted: Value = client
        .request(
            "jobs.submit.v1",
            params(&[
                ("service", "export".into()),
                ("caller_tier", "standard".into()),
                ("payload_size_units", 5.into()),
                ("payload", serde_json::json!({ "format": "svg" })),
            ]),
        )
        .await
        .unwrap();
    assert_eq!(submitted["accepted"], true);
    let job_id = submitted["job_id"].as_str().unwrap().to_string();

    let mut finished = None;
    for _ in 0..200 {
        let current = status(&client, "export", &job_id).await;
        if current["location"] == "finished" {
            finished = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let finished = finished.expect("job did not finish");

    assert_eq!(finished["job_id"], job_id.as_str());
    assert_eq!(finished["result"]["status"], "COMPLETED");
    assert_eq!(finished["result"]["attempts"], 1);
    assert_eq!(
        finished["result"]["output"],
        format!("exports/{}.svg", job_id).as_str()
    );

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_rejections_are_reported_in_band() {
    let (client, handle, services) = start_stack().await;

    // Basic tier payload limit is 500 units by default
    let rejected: Value = client
        .request(
            "jobs.submit.v1",
            params(&[
                ("service", "render".into()),
                ("caller_tier", "basic".into()),
                ("payload_size_units", 501.into()),
            ]),
        )
        .await
        .unwrap();
    assert_eq!(rejected["accepted"], false);
    assert_eq!(rejected["rejection_reason"], "PAYLOAD_TOO_LARGE");
    assert!(rejected.get("job_id").is_none());

    // Unknown service is a malformed request, not a rejection
    let malformed = client
        .request::<Value, _>(
            "jobs.submit.v1",
            params(&[
                ("service", "print".into()),
                ("caller_tier", "basic".into()),
                ("payload_size_units", 1.into()),
            ]),
        )
        .await;
    assert!(malformed.is_err());

    // Closed queues surface as in-band rejections too
    services.queue(OperationKind::Sync).shutdown().await.unwrap();
    let closed: Value = client
        .request(
            "jobs.submit.v1",
            params(&[
                ("service", "sync".into()),
                ("caller_tier", "premium".into()),
                ("payload_size_units", 1.into()),
            ]),
        )
        .await
        .unwrap();
    assert_eq!(closed["rejection_reason"], "QUEUE_CLOSED");

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_cancel_unknown_and_status_not_found() {
    let (client, handle, _services) = start_stack().await;

    let cancelled: Value = client
        .request(
            "jobs.cancel.v1",
            params(&[("service", "render".into()), ("job_id", "missing".into())]),
        )
        .await
        .unwrap();
    assert_eq!(cancelled["cancelled"], false);

    let err = client
        .request::<Value, _>(
            "jobs.status.v1",
            params(&[("service", "render".into()), ("job_id", "missing".into())]),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));

    let metrics: Value = client
        .request(
            "admin.metrics.v1",
            params(&[("service", "render".into())]),
        )
        .await
        .unwrap();
    assert_eq!(metrics["queues"].as_array().unwrap().len(), 1);
    assert_eq!(metrics["queues"][0]["operation"], "render");

    handle.stop().unwrap();
}
