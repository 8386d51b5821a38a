//! Integration tests for the monitor API.
//!
//! Uses `tower::ServiceExt::oneshot` to call handlers without binding a real
//! TCP port — every test gets a fresh collector and pipeline.

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use crossbeam_channel::bounded;
use logpulse_core::LineParser;
use logpulse_core::config::PipelineConfig;
use logpulse_monitor::{MonitorState, build_router};
use logpulse_observability::{MetricsCollector, MetricsEvent};
use logpulse_pipeline::{Pipeline, Sink, build_sink};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // .oneshot()

// ── Helpers ───────────────────────────────────────────────────

fn make_state() -> (MonitorState, crossbeam_channel::Sender<Vec<u8>>) {
    let collector = Arc::new(MetricsCollector::new(Duration::from_secs(1)).unwrap());
    let (events_tx, _events_rx) = bounded::<MetricsEvent>(16);
    let sink: Arc<dyn Sink> = build_sink(&Default::default()).unwrap();
    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        LineParser::new("Asia/Shanghai").unwrap(),
        sink,
        events_tx,
    );
    let raw_tx = pipeline.raw_sender();
    let state = MonitorState {
        collector,
        depths: pipeline.depths(),
    };
    // The depth receivers and the returned sender keep the queues alive
    // after the pipeline itself drops.
    (state, raw_tx)
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ── /monitor ──────────────────────────────────────────────────

#[tokio::test]
async fn monitor_returns_exactly_the_snapshot_fields() {
    let (state, _raw_tx) = make_state();
    let resp = build_router(state)
        .oneshot(get_req("/monitor"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    let obj = json.as_object().unwrap();
    let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec!["errNum", "handleLine", "readChanLen", "runTime", "tps", "writeChanLen"]
    );
}

#[tokio::test]
async fn monitor_reflects_applied_events() {
    let (state, _raw_tx) = make_state();
    for _ in 0..5 {
        state.collector.apply(MetricsEvent::LineHandled);
    }
    state.collector.apply(MetricsEvent::ParseFailed);

    let resp = build_router(state)
        .oneshot(get_req("/monitor"))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["handleLine"], 5);
    assert_eq!(json["errNum"], 1);
    assert_eq!(json["tps"], 0.0);
}

#[tokio::test]
async fn monitor_reports_raw_queue_depth() {
    let (state, raw_tx) = make_state();
    raw_tx.send(b"line one".to_vec()).unwrap();
    raw_tx.send(b"line two".to_vec()).unwrap();
    raw_tx.send(b"line three".to_vec()).unwrap();

    let resp = build_router(state)
        .oneshot(get_req("/monitor"))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["readChanLen"], 3);
    assert_eq!(json["writeChanLen"], 0);
}

#[tokio::test]
async fn monitor_throughput_derives_from_samples() {
    let (state, _raw_tx) = make_state();
    for _ in 0..100 {
        state.collector.apply(MetricsEvent::LineHandled);
    }
    state.collector.sample();
    for _ in 0..45 {
        state.collector.apply(MetricsEvent::LineHandled);
    }
    state.collector.sample();

    let resp = build_router(state)
        .oneshot(get_req("/monitor"))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["tps"], 45.0);
    assert_eq!(json["handleLine"], 145);
}

// ── /metrics ──────────────────────────────────────────────────

#[tokio::test]
async fn metrics_returns_prometheus_text() {
    let (state, _raw_tx) = make_state();
    state.collector.apply(MetricsEvent::LineHandled);

    let resp = build_router(state)
        .oneshot(get_req("/metrics"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("logpulse_lines_handled_total 1"));
}

// ── /health ───────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok() {
    let (state, _raw_tx) = make_state();
    let resp = build_router(state)
        .oneshot(get_req("/health"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (state, _raw_tx) = make_state();
    let resp = build_router(state)
        .oneshot(get_req("/nope"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
