//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Chain RPC health
//! - Workflow outcomes and latency
//! - Polling ticks and timeouts
//! - Balance query failures

use crate::chain::SupportedChain;
use crate::error::{GatewayError, GatewayResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

lazy_static! {
    // Chain metrics
    pub static ref CHAIN_CONNECTED: GaugeVec = register_gauge_vec!(
        "gateway_chain_connected",
        "Chain RPC status (1=reachable, 0=unreachable)",
        &["chain"]
    ).unwrap();

    // Workflow metrics
    pub static ref WORKFLOW_OUTCOMES: CounterVec = register_counter_vec!(
        "gateway_workflow_outcomes_total",
        "Workflow outcomes by workflow and status",
        &["workflow", "status"]
    ).unwrap();

    pub static ref WORKFLOW_LATENCY: HistogramVec = register_histogram_vec!(
        "gateway_workflow_latency_seconds",
        "End-to-end workflow latency",
        &["workflow"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    ).unwrap();

    // Polling metrics
    pub static ref POLL_TICKS: CounterVec = register_counter_vec!(
        "gateway_poll_ticks_total",
        "Status polls issued by poller",
        &["poller"]
    ).unwrap();

    pub static ref POLL_TIMEOUTS: CounterVec = register_counter_vec!(
        "gateway_poll_timeouts_total",
        "Polling loops that exhausted their attempts",
        &["poller"]
    ).unwrap();

    // Balance metrics
    pub static ref BALANCE_FAILURES: CounterVec = register_counter_vec!(
        "gateway_balance_query_failures_total",
        "Failed balance queries by chain",
        &["chain"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self, shutdown: CancellationToken) -> GatewayResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| GatewayError::Config(format!("Cannot bind metrics port: {}", e)))?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| GatewayError::Internal(format!("Metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_chain_health(chain: SupportedChain, healthy: bool) {
    CHAIN_CONNECTED
        .with_label_values(&[chain.as_str()])
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_workflow(workflow: &str, status: &str, latency_secs: f64) {
    WORKFLOW_OUTCOMES
        .with_label_values(&[workflow, status])
        .inc();
    WORKFLOW_LATENCY
        .with_label_values(&[workflow])
        .observe(latency_secs);
}

pub fn record_poll_tick(poller: &str) {
    POLL_TICKS.with_label_values(&[poller]).inc();
}

pub fn record_poll_timeout(poller: &str) {
    POLL_TIMEOUTS.with_label_values(&[poller]).inc();
}

pub fn record_balance_failure(chain: SupportedChain) {
    BALANCE_FAILURES
        .with_label_values(&[chain.as_str()])
        .inc();
}
