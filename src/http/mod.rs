//! Thin `axum` router mapping external endpoints onto the analytics core.
//! The WebSocket transport is grounded on the pack's `ag-ui-server`
//! `transport::ws` module: per-connection bounded channel, ping/pong
//! keepalive, `tokio::select!` fan-in of outbound events and inbound
//! control frames.

pub mod duration;
pub mod envelope;
pub mod handlers;

use std::any::Any;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;

use crate::core::CoreHandle;
use crate::error::AppError;

pub fn router(core: Arc<CoreHandle>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/api/v1/status", get(handlers::status))
        .route("/api/v1/cluster/overview", get(handlers::cluster_overview))
        .route("/api/v1/services", get(handlers::list_services))
        .route("/api/v1/services/:namespace/:name", get(handlers::service_detail))
        .route("/api/v1/metrics/nodes", get(handlers::latest_node_metrics))
        .route("/api/v1/metrics/pods/:namespace", get(handlers::latest_pod_metrics))
        .route("/api/v1/metrics/timeseries", get(handlers::timeseries))
        .route("/api/v1/hpa/:namespace", get(handlers::latest_hpa_metrics))
        .route("/api/v1/recommendations", get(handlers::list_recommendations))
        .route("/api/v1/recommendations/:id", get(handlers::get_recommendation))
        .route("/api/v1/recommendations/:id/apply", post(handlers::apply_recommendation))
        .route("/api/v1/analysis/:namespace/:service", get(handlers::analysis))
        .route("/api/v1/traffic/:namespace/:service", get(handlers::traffic))
        .route("/api/v1/cost/:namespace/:service", get(handlers::cost))
        .route("/api/v1/anomalies", get(handlers::anomalies))
        .route("/ws/updates", get(ws_upgrade))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(core)
}

/// Converts a handler panic into the same JSON envelope every other error
/// uses, so a bug in one handler never unwinds into a bare transport error.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    };
    log::error!("handler panicked: {detail}");
    AppError::Internal.into_response()
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(core): State<Arc<CoreHandle>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, core))
}

async fn handle_socket(mut socket: WebSocket, core: Arc<CoreHandle>) {
    let (handle, mut rx) = core.broadcaster.subscribe();
    let mut ping_interval = tokio::time::interval(core.broadcaster.keepalive_interval());

    loop {
        tokio::select! {
            envelope = rx.recv() => {
                match envelope {
                    Some(envelope) => {
                        let Ok(text) = serde_json::to_string(&envelope) else { continue };
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping_interval.tick() => {
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => core.broadcaster.note_activity(handle.id),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => core.broadcaster.note_activity(handle.id),
                    Some(Err(_)) => break,
                }
            }
        }
    }

    drop(handle);
}
