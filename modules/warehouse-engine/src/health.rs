use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct HealthState {
    pub metrics: Arc<Metrics>,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "warehouse-engine",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Reports the one backpressure gauge the spec names explicitly —
/// `outbox_queue_size` — alongside the liveness payload so an operator can
/// watch the dispatcher fall behind without scraping a separate endpoint.
pub async fn ready(State(state): State<HealthState>) -> Json<Value> {
    Json(json!({
        "status": "ready",
        "outbox_queue_size": state.metrics.outbox_queue_size(),
    }))
}
