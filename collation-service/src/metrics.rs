//! Metrics response types and the GET /metrics handler.

use crate::state::SharedState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::atomic::Ordering;

#[derive(Serialize)]
pub struct MetricsResponse {
    pub collations: u64,
    pub failures: FailureMetrics,
    pub avg_collate_ms: u64,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct FailureMetrics {
    pub data: u64,
    pub environment: u64,
}

pub async fn metrics(State(state): State<SharedState>) -> Json<MetricsResponse> {
    let collations = state.metrics.collations.load(Ordering::Relaxed);
    let total_ms = state.metrics.total_collate_ms.load(Ordering::Relaxed);
    let avg_collate_ms = if collations > 0 {
        total_ms / collations
    } else {
        0
    };

    Json(MetricsResponse {
        collations,
        failures: FailureMetrics {
            data: state.metrics.data_errors.load(Ordering::Relaxed),
            environment: state.metrics.environment_errors.load(Ordering::Relaxed),
        },
        avg_collate_ms,
        uptime_secs: state.started.elapsed().as_secs(),
    })
}
