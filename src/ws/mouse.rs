//! The `/ws/mouse` input dispatcher.
//!
//! A per-socket cooperative state machine: resolves the session token,
//! negotiates capabilities with the client, then translates JSON input
//! events into backend calls while emitting acks, heartbeat and cursor
//! telemetry. Heartbeat and cursor streaming run as sibling tasks that are
//! cancelled together with the socket.

use crate::clipboard;
use crate::config::unix_now_ms;
use crate::input::MouseButton;
use crate::protocol::{build_server_hello, extract_text_payload, is_text_event_type, protocol_payload};
use crate::web::shared::SharedState;
use crate::ws::motion::{MotionFilter, MotionParams, VirtualCursor};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use log::{info, warn};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio::time::sleep;

const CLOSE_POLICY_VIOLATION: u16 = 4003;
const CLOSE_GOING_AWAY: u16 = 1001;
const CLOSE_INTERNAL_ERROR: u16 = 1011;

pub async fn ws_mouse_handler(
    State(state): State<Arc<SharedState>>,
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr, headers, query))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("authorization")?.to_str().ok()?.trim();
    let rest = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))?;
    let token = rest.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn resolve_token(
    state: &SharedState,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> Option<String> {
    let allow_query = state.config.read().allow_query_token;
    if allow_query {
        if let Some(token) = query.get("token").map(|t| t.trim()).filter(|t| !t.is_empty()) {
            return Some(token.to_string());
        }
    }
    bearer_token(headers)
}

async fn close_with(mut socket: WebSocket, code: u16) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: "".into(),
        })))
        .await;
}

/// Queue an event frame, accounting it in the session diagnostics.
fn send_event(
    state: &SharedState,
    tx: &mpsc::UnboundedSender<Message>,
    token: &str,
    payload: Value,
) -> bool {
    let msg_type = payload
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_string();
    let ok = tx.send(Message::Text(payload.to_string().into())).is_ok();
    if ok {
        state.devices.mark_tx(token, &msg_type);
    }
    ok
}

/// Raw OS-level pointer move, tried when the backend call fails.
fn windows_force_move(dx: i32, dy: i32) -> bool {
    #[cfg(windows)]
    {
        return crate::input::windows::force_move_rel(dx, dy);
    }
    #[cfg(not(windows))]
    {
        let _ = (dx, dy);
        false
    }
}

fn windows_force_click(button: MouseButton, double: bool) -> bool {
    #[cfg(windows)]
    {
        return crate::input::windows::force_click(button, double);
    }
    #[cfg(not(windows))]
    {
        let _ = (button, double);
        false
    }
}

fn windows_force_scroll(dy: i32) -> bool {
    #[cfg(windows)]
    {
        return crate::input::windows::force_scroll(dy);
    }
    #[cfg(not(windows))]
    {
        let _ = dy;
        false
    }
}

fn windows_force_button(down: bool, button: MouseButton) -> bool {
    #[cfg(windows)]
    {
        return crate::input::windows::force_button(down, button);
    }
    #[cfg(not(windows))]
    {
        let _ = (down, button);
        false
    }
}

struct SocketRuntime {
    state: Arc<SharedState>,
    tx: mpsc::UnboundedSender<Message>,
    token: String,
    cursor: Arc<Mutex<VirtualCursor>>,
    /// One backend-failure warning per session.
    input_block_warned: bool,
}

impl SocketRuntime {
    fn perm(&self, key: &str) -> bool {
        self.state.devices.perm(&self.token, key)
    }

    fn send(&self, payload: Value) {
        send_event(&self.state, &self.tx, &self.token, payload);
    }

    /// Warn once per session that the platform swallowed our input.
    fn warn_input_blocked(&mut self) {
        if !cfg!(windows) || self.input_block_warned {
            return;
        }
        self.input_block_warned = true;
        if self.state.ws_log_enabled() {
            warn!(
                "WS input fallback exhausted (token={}). Foreground elevated windows may block injection.",
                self.token
            );
        }
        self.send(json!({
            "type": "warning",
            "code": "windows_input_blocked_or_elevated_window",
        }));
    }

    /// Dispatch relative pointer movement and track the virtual cursor.
    ///
    /// On Windows a failed backend call gets one raw OS-level retry before
    /// the per-session warning fires.
    fn apply_pointer_move(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        let moved = self.state.backend.move_rel(dx, dy) || windows_force_move(dx, dy);
        if !moved {
            self.warn_input_blocked();
        }
        self.cursor.lock().shift(dx, dy);
    }

    fn warn_if_failed(&mut self, ok: bool) {
        if !ok {
            self.warn_input_blocked();
        }
    }

    /// Text injection with the platform fallback chain.
    async fn inject_text(&mut self, text: String) {
        let mut delivered = false;

        #[cfg(windows)]
        {
            delivered = crate::input::windows::send_text_to_foreground(&text);
        }

        if !delivered {
            delivered = self.state.backend.write_text(&text);
        }
        if !delivered && !cfg!(windows) {
            // Clipboard route shells out; keep it off the reactor.
            let payload = text.clone();
            let copied = tokio::task::spawn_blocking(move || clipboard::copy_text(&payload))
                .await
                .unwrap_or(false);
            if copied {
                delivered = self
                    .state
                    .backend
                    .hotkey(&["ctrl".to_string(), "v".to_string()]);
            }
            if delivered && self.state.ws_log_enabled() {
                info!("WS text fallback used: token={} len={}", self.token, text.len());
            }
        }
        if !delivered && self.state.ws_log_enabled() {
            warn!("WS text injection failed: token={} len={}", self.token, text.len());
        }
    }
}

fn init_virtual_cursor(state: &SharedState) -> VirtualCursor {
    let (w, h) = state.safe_screen_size();
    let mut cursor = VirtualCursor::centered(w, h);
    if let Some((x, y)) = state.backend.position() {
        cursor = VirtualCursor::new(x, y, w, h);
    }
    cursor
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<SharedState>,
    addr: SocketAddr,
    headers: HeaderMap,
    query: HashMap<String, String>,
) {
    let Some(token) = resolve_token(&state, &headers, &query) else {
        close_with(socket, CLOSE_POLICY_VIOLATION).await;
        return;
    };
    if state.devices.get_session(&token).is_none() {
        close_with(socket, CLOSE_POLICY_VIOLATION).await;
        return;
    }
    if !state.devices.perm(&token, "perm_mouse") && !state.devices.perm(&token, "perm_keyboard") {
        close_with(socket, CLOSE_POLICY_VIOLATION).await;
        return;
    }

    let caps = state.backend.capabilities();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    let Some(epoch) = state.devices.register_socket(&token, tx.clone()) else {
        let _ = tx.send(Message::Close(Some(CloseFrame {
            code: CLOSE_POLICY_VIOLATION,
            reason: "".into(),
        })));
        let _ = writer.await;
        return;
    };

    if state.ws_log_enabled() {
        let ua = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        let ua: String = ua.chars().take(120).collect();
        info!("WS connected: token={} ip={} ua={}", token, addr.ip(), ua);
    }

    let (hb_interval_s, hb_timeout_s, proto_push, wayland) = {
        let cfg = state.config.read();
        (
            cfg.ws_heartbeat_interval_s,
            cfg.ws_heartbeat_timeout_s,
            cfg.ws_proto_push,
            crate::config::is_wayland_session(),
        )
    };

    let heartbeat_required = Arc::new(AtomicBool::new(false));
    let last_rx = Arc::new(Mutex::new(Instant::now()));
    let closing = Arc::new(AtomicBool::new(false));
    let close_notify = Arc::new(Notify::new());

    if proto_push {
        send_event(
            &state,
            &tx,
            &token,
            build_server_hello(&state.config, "hello", hb_interval_s, hb_timeout_s),
        );
    }

    if !caps.pointer || !caps.keyboard {
        let code = if wayland {
            "wayland_input_limited"
        } else {
            "input_backend_limited"
        };
        send_event(&state, &tx, &token, json!({"type": "warning", "code": code}));
    }
    if !caps.pointer && !caps.keyboard {
        send_event(
            &state,
            &tx,
            &token,
            json!({"type": "error", "code": "input_backend_unavailable"}),
        );
        let _ = tx.send(Message::Close(Some(CloseFrame {
            code: CLOSE_INTERNAL_ERROR,
            reason: "".into(),
        })));
        state.devices.unregister_socket(&token, epoch);
        let _ = writer.await;
        return;
    }

    // Geometry probing may shell out on X11; keep it off the reactor.
    let cursor = {
        let state = state.clone();
        let initial = tokio::task::spawn_blocking(move || init_virtual_cursor(&state))
            .await
            .unwrap_or_else(|_| VirtualCursor::centered(1920, 1080));
        Arc::new(Mutex::new(initial))
    };

    let heartbeat_task = {
        let state = state.clone();
        let tx = tx.clone();
        let token = token.clone();
        let heartbeat_required = heartbeat_required.clone();
        let last_rx = last_rx.clone();
        let closing = closing.clone();
        let close_notify = close_notify.clone();
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_secs(hb_interval_s)).await;
                if !(proto_push || heartbeat_required.load(Ordering::Relaxed)) {
                    continue;
                }
                let now_ms = unix_now_ms();
                if !send_event(
                    &state,
                    &tx,
                    &token,
                    json!({"type": "ping", "id": now_ms.to_string(), "ts": now_ms}),
                ) {
                    break;
                }
                if heartbeat_required.load(Ordering::Relaxed)
                    && last_rx.lock().elapsed() > Duration::from_secs(hb_timeout_s)
                {
                    let _ = tx.send(Message::Close(Some(CloseFrame {
                        code: CLOSE_GOING_AWAY,
                        reason: "".into(),
                    })));
                    closing.store(true, Ordering::Relaxed);
                    close_notify.notify_waiters();
                    break;
                }
            }
        })
    };

    let cursor_task = if state.config.read().cursor_stream {
        let state = state.clone();
        let tx = tx.clone();
        let token = token.clone();
        let cursor = cursor.clone();
        Some(tokio::spawn(async move {
            let fps = state.config.read().cursor_stream_fps.max(5);
            let min_dt = Duration::from_secs_f64(1.0 / fps as f64);
            let caps = state.backend.capabilities();
            let mut last_sent: Option<(i32, i32, u32, u32)> = None;
            loop {
                let pos = if caps.position && caps.screen_size {
                    match (state.backend.position(), state.backend.screen_size()) {
                        (Some((x, y)), Some((w, h))) => Some((x, y, w, h)),
                        _ => None,
                    }
                } else {
                    let c = *cursor.lock();
                    Some((c.x, c.y, c.w, c.h))
                };
                if let Some(pos) = pos {
                    if last_sent != Some(pos) {
                        let sent = send_event(
                            &state,
                            &tx,
                            &token,
                            json!({"type": "cursor", "x": pos.0, "y": pos.1, "w": pos.2, "h": pos.3}),
                        );
                        if !sent {
                            break;
                        }
                        last_sent = Some(pos);
                    }
                }
                sleep(min_dt).await;
            }
        }))
    } else {
        None
    };

    let motion_params = {
        let cfg = state.config.read();
        MotionParams::from_config(&cfg, wayland)
    };
    let mut motion = MotionFilter::new(motion_params);
    let start = Instant::now();
    let mut runtime = SocketRuntime {
        state: state.clone(),
        tx: tx.clone(),
        token: token.clone(),
        cursor: cursor.clone(),
        input_block_warned: false,
    };
    let mut input_lock_warned = false;

    loop {
        if closing.load(Ordering::Relaxed) {
            break;
        }
        let message = tokio::select! {
            msg = stream.next() => msg,
            _ = close_notify.notified() => None,
        };
        let Some(Ok(message)) = message else {
            break;
        };
        *last_rx.lock() = Instant::now();

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Ping/pong frames are answered by the protocol layer.
            _ => continue,
        };
        let Ok(data) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let msg_type = data
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        state.devices.mark_rx(&token, &msg_type);

        let mut event_id = data
            .get("event_id")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        if event_id.is_empty() {
            event_id = data
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .trim()
                .to_string();
        }
        if !event_id.is_empty() && !matches!(msg_type.as_str(), "hello" | "ping" | "pong") {
            let is_new = state.devices.track_event_id(&token, &event_id);
            runtime.send(json!({
                "type": "ack",
                "event_id": event_id,
                "accepted": is_new,
                "ts": unix_now_ms(),
            }));
            if !is_new {
                continue;
            }
        }

        match msg_type.as_str() {
            "hello" => {
                let caps_obj = data.get("capabilities").and_then(|c| c.as_object());
                let wants_heartbeat = caps_obj
                    .map(|c| {
                        c.get("heartbeat_ack").and_then(|v| v.as_bool()).unwrap_or(false)
                            || c.get("ws_heartbeat_ack").and_then(|v| v.as_bool()).unwrap_or(false)
                    })
                    .unwrap_or(false);
                heartbeat_required.store(wants_heartbeat, Ordering::Relaxed);
                let proto = data.get("protocol_version").and_then(|v| v.as_i64());
                state.devices.set_hello_info(&token, proto, wants_heartbeat);
                if state.ws_log_enabled() {
                    info!(
                        "WS hello: token={} protocol_version={:?} heartbeat_required={}",
                        token, proto, wants_heartbeat
                    );
                }
                let mut ack = protocol_payload(&state.config);
                ack["type"] = json!("hello_ack");
                ack["heartbeat_required"] = json!(wants_heartbeat);
                ack["heartbeat_interval_ms"] = json!(hb_interval_s * 1000);
                ack["heartbeat_timeout_ms"] = json!(hb_timeout_s * 1000);
                runtime.send(ack);
                if !proto_push {
                    runtime.send(build_server_hello(
                        &state.config,
                        "hello",
                        hb_interval_s,
                        hb_timeout_s,
                    ));
                }
            }

            "ping" => {
                runtime.send(json!({
                    "type": "pong",
                    "id": data.get("id").cloned().unwrap_or(Value::Null),
                    "ts": unix_now_ms(),
                }));
            }

            "pong" => {}

            _ if state.input_locked() => {
                if !input_lock_warned {
                    input_lock_warned = true;
                    runtime.send(json!({"type": "warning", "code": "remote_input_locked"}));
                }
            }

            "move" => {
                if !runtime.perm("perm_mouse") {
                    continue;
                }
                let dx = data.get("dx").and_then(|v| v.as_f64()).unwrap_or(0.0);
                let dy = data.get("dy").and_then(|v| v.as_f64()).unwrap_or(0.0);
                let (mx, my) = motion.step(dx, dy, start.elapsed().as_secs_f64());
                runtime.apply_pointer_move(mx, my);
            }

            "move_abs" => {
                if !runtime.perm("perm_mouse") {
                    continue;
                }
                let (Some(raw_x), Some(raw_y)) = (
                    data.get("x").and_then(|v| v.as_f64()),
                    data.get("y").and_then(|v| v.as_f64()),
                ) else {
                    continue;
                };
                if !raw_x.is_finite() || !raw_y.is_finite() {
                    continue;
                }
                let (cur_x, cur_y, target_x, target_y) = {
                    let c = cursor.lock();
                    let (tx_px, ty_px) = c.resolve_target(raw_x, raw_y);
                    (c.x, c.y, tx_px, ty_px)
                };
                motion.reset(start.elapsed().as_secs_f64());
                runtime.apply_pointer_move(target_x - cur_x, target_y - cur_y);
            }

            "click" => {
                if runtime.perm("perm_mouse") {
                    let ok = state.backend.click(MouseButton::Left, false)
                        || windows_force_click(MouseButton::Left, false);
                    runtime.warn_if_failed(ok);
                }
            }

            "rclick" => {
                if runtime.perm("perm_mouse") {
                    let ok = state.backend.click(MouseButton::Right, false)
                        || windows_force_click(MouseButton::Right, false);
                    runtime.warn_if_failed(ok);
                }
            }

            "dclick" => {
                if runtime.perm("perm_mouse") {
                    let ok = state.backend.click(MouseButton::Left, true)
                        || windows_force_click(MouseButton::Left, true);
                    runtime.warn_if_failed(ok);
                }
            }

            "scroll" => {
                if runtime.perm("perm_mouse") {
                    let dy = data.get("dy").and_then(|v| v.as_i64()).unwrap_or(0) as i32;
                    let ok = state.backend.scroll(dy) || windows_force_scroll(dy);
                    runtime.warn_if_failed(ok);
                }
            }

            "drag_s" => {
                if runtime.perm("perm_mouse") {
                    let ok = state.backend.mouse_down(MouseButton::Left)
                        || windows_force_button(true, MouseButton::Left);
                    runtime.warn_if_failed(ok);
                }
            }

            "drag_e" => {
                if runtime.perm("perm_mouse") {
                    let ok = state.backend.mouse_up(MouseButton::Left)
                        || windows_force_button(false, MouseButton::Left);
                    runtime.warn_if_failed(ok);
                }
            }

            t if is_text_event_type(t) => {
                if !runtime.perm("perm_keyboard") {
                    continue;
                }
                let text = extract_text_payload(&data);
                if !text.is_empty() {
                    runtime.inject_text(text).await;
                }
            }

            "key" => {
                if !runtime.perm("perm_keyboard") {
                    continue;
                }
                let val = data
                    .get("key")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if matches!(val.as_str(), "enter" | "backspace" | "space" | "win") {
                    let _ = state.backend.press(&val);
                }
            }

            "hotkey" => {
                if !runtime.perm("perm_keyboard") {
                    continue;
                }
                let keys: Vec<String> = data
                    .get("keys")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|k| k.as_str())
                            .map(|k| k.to_ascii_lowercase())
                            .collect()
                    })
                    .unwrap_or_default();
                if !keys.is_empty() {
                    let _ = state.backend.hotkey(&keys);
                }
            }

            "media" => {
                if !runtime.perm("perm_keyboard") {
                    continue;
                }
                let action = data
                    .get("action")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if let Some(key) = media_key(&action) {
                    let _ = state.backend.press(key);
                }
            }

            "shortcut" => {
                if !runtime.perm("perm_keyboard") {
                    continue;
                }
                let action = data
                    .get("action")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if let Some(chord) = shortcut_chord(&action) {
                    let keys: Vec<String> = chord.iter().map(|k| k.to_string()).collect();
                    let _ = state.backend.hotkey(&keys);
                }
            }

            "" => {}

            other => {
                if state.ws_log_enabled() {
                    info!("WS unknown event: token={} type={}", token, other);
                }
            }
        }
    }

    heartbeat_task.abort();
    if let Some(task) = cursor_task {
        task.abort();
    }
    state.devices.unregister_socket(&token, epoch);
    drop(tx);
    drop(runtime);
    let _ = writer.await;
    if state.ws_log_enabled() {
        info!("WS disconnected: token={}", token);
    }
}

/// Map a media action name to the backend key name.
fn media_key(action: &str) -> Option<&'static str> {
    Some(match action {
        "play_pause" => "playpause",
        "next" => "nexttrack",
        "prev" => "prevtrack",
        "stop" => "stop",
        "mute" => "volumemute",
        "vol_up" => "volumeup",
        "vol_down" => "volumedown",
        _ => return None,
    })
}

/// Map a shortcut action name to its key chord.
fn shortcut_chord(action: &str) -> Option<&'static [&'static str]> {
    Some(match action {
        "copy" => &["ctrl", "c"],
        "paste" => &["ctrl", "v"],
        "cut" => &["ctrl", "x"],
        "undo" => &["ctrl", "z"],
        "redo" => &["ctrl", "y"],
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::shared::test_support::state_with_fake_backend;

    fn runtime_for(state: &Arc<SharedState>) -> (SocketRuntime, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cursor = Arc::new(Mutex::new(VirtualCursor::centered(1920, 1080)));
        (
            SocketRuntime {
                state: state.clone(),
                tx,
                token: "tok-test".to_string(),
                cursor,
                input_block_warned: false,
            },
            rx,
        )
    }

    #[test]
    fn pointer_move_reaches_backend_and_virtual_cursor() {
        let (state, backend) = state_with_fake_backend();
        let (mut runtime, _rx) = runtime_for(&state);

        runtime.apply_pointer_move(10, -7);
        runtime.apply_pointer_move(0, 0);
        assert_eq!(backend.moves.lock().as_slice(), &[(10, -7)]);

        let c = *runtime.cursor.lock();
        assert_eq!((c.x, c.y), (970, 533));
    }

    #[test]
    fn virtual_cursor_clamps_on_large_moves() {
        let (state, _backend) = state_with_fake_backend();
        let (mut runtime, _rx) = runtime_for(&state);
        runtime.apply_pointer_move(100_000, -100_000);
        let c = *runtime.cursor.lock();
        assert_eq!((c.x, c.y), (1919, 0));
    }

    #[tokio::test]
    async fn text_injection_uses_backend_first() {
        let (state, backend) = state_with_fake_backend();
        let (mut runtime, _rx) = runtime_for(&state);
        runtime.inject_text("hello".to_string()).await;
        assert_eq!(backend.texts.lock().as_slice(), &["hello".to_string()]);
    }

    #[test]
    fn bearer_header_parses() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer tok-123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("tok-123".to_string()));

        let mut empty = HeaderMap::new();
        empty.insert("authorization", "Basic xyz".parse().unwrap());
        assert_eq!(bearer_token(&empty), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn media_actions_map_to_keys() {
        assert_eq!(media_key("play_pause"), Some("playpause"));
        assert_eq!(media_key("vol_up"), Some("volumeup"));
        assert_eq!(media_key("eject"), None);
    }

    #[test]
    fn shortcut_actions_map_to_chords() {
        assert_eq!(shortcut_chord("copy"), Some(&["ctrl", "c"][..]));
        assert_eq!(shortcut_chord("redo"), Some(&["ctrl", "y"][..]));
        assert_eq!(shortcut_chord("launch_missiles"), None);
    }
}
