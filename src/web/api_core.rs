//! Pairing and authentication endpoints.

use crate::config::{self, unix_now, unix_now_ms};
use crate::net;
use crate::web::shared::SharedState;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

pub fn router() -> Router<Arc<SharedState>> {
    Router::new()
        .route("/api/handshake", post(handshake))
        .route("/api/qr", get(qr_payload))
        .route("/api/qr/consume", post(qr_consume))
}

#[derive(Deserialize)]
struct HandshakeRequest {
    code: String,
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

fn forbidden(detail: &str) -> Response {
    (StatusCode::FORBIDDEN, Json(json!({"detail": detail}))).into_response()
}

async fn handshake(
    State(state): State<Arc<SharedState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<HandshakeRequest>,
) -> Response {
    let ip = addr.ip().to_string();
    let (allowed, retry_after) = state.pin_limiter.check(&ip);
    if !allowed {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", retry_after.to_string())],
            Json(json!({"detail": "Too many attempts"})),
        )
            .into_response();
    }

    let now = unix_now();
    let (code_matches, expired) = {
        let cfg = state.config.read();
        (req.code.trim() == cfg.pairing_code, cfg.pairing_expired(now))
    };
    if expired || !code_matches {
        state.pin_limiter.record_failure(&ip);
        return forbidden("Invalid Code");
    }

    state.pin_limiter.record_success(&ip);
    let device_id = req
        .device_id
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("Unknown device");
    let token = state.devices.authorize(&device_id, name, &ip);

    let (device, single_use) = {
        let cfg = state.config.read();
        (cfg.hostname.clone(), cfg.pairing_single_use)
    };
    if single_use {
        state.config.write().regenerate_pairing_code();
        info!("Pairing code rotated after single-use handshake");
    }

    Json(json!({"status": "ok", "token": token, "device": device})).into_response()
}

async fn qr_payload(State(state): State<Arc<SharedState>>) -> Response {
    let qr_token = state.qr_tokens.issue();
    let ip = net::local_ip();
    let nonce: String = Uuid::new_v4().simple().to_string().chars().take(16).collect();

    let cfg = state.config.read();
    let mut payload = json!({
        "type": "cyberdeck_pairing",
        "server_id": cfg.server_id,
        "hostname": cfg.hostname,
        "version": config::version(),
        "ip": ip,
        "port": cfg.port,
        "pairing_code": cfg.pairing_code,
        "scheme": cfg.scheme(),
        "ts": unix_now_ms(),
        "nonce": nonce,
        "qr_token": qr_token,
    });
    if let Some(expires_at) = cfg.pairing_expires_at {
        payload["pairing_expires_at"] = json!(expires_at);
    }
    payload["url"] = json!(format!(
        "cyberdeck://pair?host={}&port={}&scheme={}&qr_token={}",
        ip,
        cfg.port,
        cfg.scheme(),
        qr_token
    ));

    Json(payload).into_response()
}

#[derive(Deserialize)]
struct QrConsumeRequest {
    qr_token: String,
    device_id: String,
    #[serde(default)]
    name: Option<String>,
}

async fn qr_consume(
    State(state): State<Arc<SharedState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<QrConsumeRequest>,
) -> Response {
    if !state.qr_tokens.consume(&req.qr_token) {
        return forbidden("Invalid or expired QR token");
    }
    let device_id = req.device_id.trim();
    if device_id.is_empty() {
        return forbidden("Missing device id");
    }
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("Unknown device");
    let token = state
        .devices
        .authorize(device_id, name, &addr.ip().to_string());
    Json(json!({"status": "ok", "token": token})).into_response()
}
