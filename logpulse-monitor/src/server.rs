//! Monitor HTTP API: live pipeline metrics over a polling endpoint.
//!
//! Stateless and safe to poll at any interval — every response is computed
//! fresh from the counters and the instantaneous queue depths.

use axum::{Router as AxumRouter, extract::State, response::Json, routing::get};
use logpulse_core::config::MonitorConfig;
use logpulse_observability::{MetricsCollector, MetricsSnapshot};
use logpulse_pipeline::QueueDepths;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

/// Shared state for the monitor API.
#[derive(Clone)]
pub struct MonitorState {
    pub collector: Arc<MetricsCollector>,
    pub depths: QueueDepths,
}

/// Build the axum router with all monitor routes.
pub fn build_router(state: MonitorState) -> AxumRouter {
    AxumRouter::new()
        .route("/monitor", get(monitor_snapshot))
        .route("/metrics", get(prometheus_metrics))
        .route("/health", get(health_check))
        .with_state(state)
}

/// `GET /monitor` — the legacy JSON snapshot.
async fn monitor_snapshot(State(state): State<MonitorState>) -> Json<MetricsSnapshot> {
    let snapshot = state
        .collector
        .snapshot(state.depths.raw_depth(), state.depths.parsed_depth());
    Json(snapshot)
}

/// `GET /metrics` — prometheus text exposition.
async fn prometheus_metrics(State(state): State<MonitorState>) -> String {
    state.collector.render()
}

/// `GET /health` — liveness probe.
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Monitor API server.
pub struct MonitorServer {
    config: MonitorConfig,
    state: MonitorState,
}

impl MonitorServer {
    pub fn new(config: MonitorConfig, collector: Arc<MetricsCollector>, depths: QueueDepths) -> Self {
        Self {
            config,
            state: MonitorState { collector, depths },
        }
    }

    /// Bind and serve until the process exits.
    pub async fn start(self) -> anyhow::Result<()> {
        if !self.config.enabled {
            info!("Monitor API disabled");
            return Ok(());
        }

        let addr = self.config.addr;
        let app = build_router(self.state);

        info!(addr = %addr, "Starting monitor API server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
