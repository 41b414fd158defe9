//! Launcher-facing device management endpoints.

use crate::config;
use crate::net;
use crate::web::shared::SharedState;
use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<SharedState>> {
    Router::new()
        .route("/api/local/info", get(local_info))
        .route("/api/device/settings", post(device_settings))
        .route("/api/device/disconnect", post(device_disconnect))
        .route("/api/device/delete", post(device_delete))
}

async fn local_info(State(state): State<Arc<SharedState>>) -> Response {
    let devices = state.devices.get_all_devices();
    let cfg = state.config.read();
    let mut info = json!({
        "server_id": cfg.server_id,
        "hostname": cfg.hostname,
        "pairing_code": cfg.pairing_code,
        "ip": net::local_ip(),
        "port": cfg.port,
        "scheme": cfg.scheme(),
        "version": config::version(),
        "devices": devices,
    });
    if let Some(expires_at) = cfg.pairing_expires_at {
        info["pairing_expires_at"] = json!(expires_at);
    }
    Json(info).into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"detail": "Unknown device"})),
    )
        .into_response()
}

#[derive(Deserialize)]
struct SettingsRequest {
    token: String,
    settings: Value,
}

async fn device_settings(
    State(state): State<Arc<SharedState>>,
    Json(req): Json<SettingsRequest>,
) -> Response {
    let Value::Object(patch) = req.settings else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "Settings must be an object"})),
        )
            .into_response();
    };
    if !state.devices.update_settings(&req.token, &patch) {
        return not_found();
    }
    Json(json!({"status": "ok"})).into_response()
}

#[derive(Deserialize)]
struct TokenRequest {
    token: String,
}

async fn device_disconnect(
    State(state): State<Arc<SharedState>>,
    Json(req): Json<TokenRequest>,
) -> Response {
    let disconnected = match state.devices.socket_sender(&req.token) {
        Some(tx) => tx
            .send(Message::Close(Some(CloseFrame {
                code: 1000,
                reason: "disconnected by host".into(),
            })))
            .is_ok(),
        None => false,
    };
    Json(json!({"status": "ok", "disconnected": disconnected})).into_response()
}

async fn device_delete(
    State(state): State<Arc<SharedState>>,
    Json(req): Json<TokenRequest>,
) -> Response {
    // Drop the live socket first so the client notices immediately.
    if let Some(tx) = state.devices.socket_sender(&req.token) {
        let _ = tx.send(Message::Close(Some(CloseFrame {
            code: 1000,
            reason: "unpaired".into(),
        })));
    }
    if !state.devices.delete_session(&req.token) {
        return not_found();
    }
    Json(json!({"status": "ok"})).into_response()
}
