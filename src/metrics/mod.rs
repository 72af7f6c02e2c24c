//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Bridge and transfer operations
//! - Step completions and confirmation decisions
//! - Simulations
//! - Live sessions

use crate::error::{BridgeCoreError, BridgeResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::{error, info};

lazy_static! {
    // Operation metrics
    pub static ref OPERATIONS_STARTED: CounterVec = register_counter_vec!(
        "paygate_bridge_operations_started_total",
        "Total bridge and transfer operations started",
        &["kind"]
    ).unwrap();

    pub static ref OPERATIONS_COMPLETED: CounterVec = register_counter_vec!(
        "paygate_bridge_operations_completed_total",
        "Total operations completed successfully",
        &["kind"]
    ).unwrap();

    pub static ref OPERATIONS_FAILED: CounterVec = register_counter_vec!(
        "paygate_bridge_operations_failed_total",
        "Total operations failed by error category",
        &["kind", "category"]
    ).unwrap();

    pub static ref OPERATION_LATENCY: HistogramVec = register_histogram_vec!(
        "paygate_bridge_operation_latency_seconds",
        "Time from submit to settlement",
        &["kind"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();

    // Progress metrics
    pub static ref STEPS_COMPLETED: CounterVec = register_counter_vec!(
        "paygate_bridge_steps_completed_total",
        "SDK steps completed by type id",
        &["type_id"]
    ).unwrap();

    pub static ref CONFIRMATIONS: CounterVec = register_counter_vec!(
        "paygate_bridge_confirmations_total",
        "Allowance and intent confirmations by decision",
        &["kind", "decision"]
    ).unwrap();

    // Simulation metrics
    pub static ref SIMULATIONS: CounterVec = register_counter_vec!(
        "paygate_bridge_simulations_total",
        "Simulations by outcome (ok, error, stale)",
        &["outcome"]
    ).unwrap();

    // Session metrics
    pub static ref ACTIVE_SESSIONS: Gauge = register_gauge!(
        "paygate_bridge_active_sessions",
        "Currently open sessions"
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

    pub async fn run(&self) -> BridgeResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| BridgeCoreError::Internal(format!("bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| BridgeCoreError::Internal(e.to_string()))?;

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

pub fn record_operation_started(kind: &str) {
    OPERATIONS_STARTED.with_label_values(&[kind]).inc();
}

pub fn record_operation_completed(kind: &str) {
    OPERATIONS_COMPLETED.with_label_values(&[kind]).inc();
}

pub fn record_operation_failed(kind: &str, category: &str) {
    OPERATIONS_FAILED.with_label_values(&[kind, category]).inc();
}

pub fn record_operation_latency(kind: &str, latency_secs: f64) {
    OPERATION_LATENCY.with_label_values(&[kind]).observe(latency_secs);
}

pub fn record_step_completed(type_id: &str) {
    STEPS_COMPLETED.with_label_values(&[type_id]).inc();
}

pub fn record_confirmation(kind: &str, decision: &str) {
    CONFIRMATIONS.with_label_values(&[kind, decision]).inc();
}

pub fn record_simulation(outcome: &str) {
    SIMULATIONS.with_label_values(&[outcome]).inc();
}

pub fn set_active_sessions(count: usize) {
    ACTIVE_SESSIONS.set(count as f64);
}
