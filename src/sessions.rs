//! Paired-device session registry.
//!
//! One [`DeviceSession`] per paired client, keyed by the opaque session
//! token. The registry enforces TTL/idle expiry and the session cap, tracks
//! the live WebSocket bound to each session, and persists itself to disk on
//! every mutating operation.

use crate::config::{unix_now, SharedConfig};
use axum::extract::ws::Message;
use log::{error, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;
use uuid::Uuid;

const EVENT_ID_RING_CAP: usize = 256;

/// Outbound handle of the WebSocket currently bound to a session.
///
/// The epoch grows monotonically across the whole registry; a late
/// disconnect from a superseded socket must never clear a newer binding.
#[derive(Clone)]
pub struct BoundSocket {
    pub epoch: u64,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Per-session WebSocket diagnostics counters.
#[derive(Debug, Clone, Default)]
pub struct SocketDiag {
    pub connected: bool,
    pub connect_count: u64,
    pub disconnect_count: u64,
    pub messages_rx: u64,
    pub messages_tx: u64,
    pub last_rx_type: Option<String>,
    pub last_tx_type: Option<String>,
    pub client_protocol_version: Option<i64>,
    pub heartbeat_required: bool,
}

pub struct DeviceSession {
    pub device_id: String,
    pub device_name: String,
    pub ip: String,
    pub token: String,
    pub settings: serde_json::Map<String, Value>,
    pub created_ts: f64,
    pub last_seen_ts: f64,
    socket: Option<BoundSocket>,
    socket_detached_ts: Option<f64>,
    event_ids: VecDeque<String>,
    pub diag: SocketDiag,
}

impl DeviceSession {
    fn new(device_id: &str, device_name: &str, ip: &str, now: f64) -> Self {
        Self {
            device_id: device_id.to_string(),
            device_name: device_name.to_string(),
            ip: ip.to_string(),
            token: Uuid::new_v4().to_string(),
            settings: serde_json::Map::new(),
            created_ts: now,
            last_seen_ts: now,
            socket: None,
            socket_detached_ts: None,
            event_ids: VecDeque::new(),
            diag: SocketDiag::default(),
        }
    }

    /// Permission lookup; absent keys grant access.
    pub fn perm(&self, key: &str) -> bool {
        match self.settings.get(key) {
            Some(Value::Bool(v)) => *v,
            Some(Value::Null) | None => true,
            Some(other) => other.as_i64().map(|v| v != 0).unwrap_or(true),
        }
    }
}

/// Snapshot returned to callers; carries no live socket state.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub device_id: String,
    pub device_name: String,
    pub ip: String,
    pub token: String,
    pub settings: serde_json::Map<String, Value>,
    pub created_ts: f64,
    pub last_seen_ts: f64,
}

impl SessionInfo {
    pub fn perm(&self, key: &str) -> bool {
        match self.settings.get(key) {
            Some(Value::Bool(v)) => *v,
            Some(Value::Null) | None => true,
            Some(other) => other.as_i64().map(|v| v != 0).unwrap_or(true),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedSession {
    device_id: String,
    device_name: String,
    ip: String,
    #[serde(default)]
    settings: serde_json::Map<String, Value>,
    #[serde(default)]
    created_ts: f64,
    #[serde(default)]
    last_seen_ts: f64,
}

struct Inner {
    sessions: HashMap<String, DeviceSession>,
    next_epoch: u64,
}

/// Authoritative device registry shared across the HTTP and WS planes.
pub struct DeviceManager {
    config: SharedConfig,
    inner: Mutex<Inner>,
}

impl DeviceManager {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                next_epoch: 0,
            }),
        }
    }

    fn is_expired(&self, s: &DeviceSession, now: f64) -> bool {
        let cfg = self.config.read();
        if cfg.session_ttl_s > 0 && now - s.created_ts > cfg.session_ttl_s as f64 {
            return true;
        }
        if cfg.session_idle_ttl_s > 0 && now - s.last_seen_ts > cfg.session_idle_ttl_s as f64 {
            return true;
        }
        false
    }

    fn prune_expired_locked(&self, inner: &mut Inner, now: f64) -> bool {
        let expired: Vec<String> = inner
            .sessions
            .iter()
            .filter(|(_, s)| self.is_expired(s, now))
            .map(|(t, _)| t.clone())
            .collect();
        for token in &expired {
            inner.sessions.remove(token);
        }
        !expired.is_empty()
    }

    fn enforce_max_sessions_locked(&self, inner: &mut Inner) -> bool {
        let max = self.config.read().max_sessions;
        if max == 0 || inner.sessions.len() <= max {
            return false;
        }
        let mut by_age: Vec<(String, f64)> = inner
            .sessions
            .iter()
            .map(|(t, s)| (t.clone(), s.last_seen_ts))
            .collect();
        by_age.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let evict = by_age.len() - max;
        for (token, _) in by_age.into_iter().take(evict) {
            inner.sessions.remove(&token);
        }
        true
    }

    /// Authorize a device, reusing the existing session for a known
    /// `device_id` and minting a fresh token otherwise.
    pub fn authorize(&self, device_id: &str, name: &str, ip: &str) -> String {
        self.authorize_at(device_id, name, ip, unix_now())
    }

    pub fn authorize_at(&self, device_id: &str, name: &str, ip: &str, now: f64) -> String {
        let token = {
            let mut inner = self.inner.lock();
            self.prune_expired_locked(&mut inner, now);

            let existing = inner
                .sessions
                .iter_mut()
                .find(|(_, s)| s.device_id == device_id);
            if let Some((token, s)) = existing {
                s.ip = ip.to_string();
                s.device_name = name.to_string();
                s.last_seen_ts = now;
                token.clone()
            } else {
                self.enforce_max_sessions_locked(&mut inner);
                let s = DeviceSession::new(device_id, name, ip, now);
                let token = s.token.clone();
                inner.sessions.insert(token.clone(), s);
                token
            }
        };
        self.save();
        token
    }

    /// Look up a session by token, touching it; expired records are purged.
    pub fn get_session(&self, token: &str) -> Option<SessionInfo> {
        self.get_session_at(token, unix_now())
    }

    pub fn get_session_at(&self, token: &str, now: f64) -> Option<SessionInfo> {
        let (out, purged) = {
            let mut inner = self.inner.lock();
            match inner.sessions.get_mut(token) {
                None => (None, false),
                Some(s) if self.is_expired(s, now) => {
                    inner.sessions.remove(token);
                    (None, true)
                }
                Some(s) => {
                    s.last_seen_ts = now;
                    (
                        Some(SessionInfo {
                            device_id: s.device_id.clone(),
                            device_name: s.device_name.clone(),
                            ip: s.ip.clone(),
                            token: s.token.clone(),
                            settings: s.settings.clone(),
                            created_ts: s.created_ts,
                            last_seen_ts: s.last_seen_ts,
                        }),
                        false,
                    )
                }
            }
        };
        if purged {
            self.save();
        }
        out
    }

    /// Bind a live socket to the session; returns the epoch to hand back on
    /// unregister, or `None` for an unknown token.
    pub fn register_socket(&self, token: &str, tx: mpsc::UnboundedSender<Message>) -> Option<u64> {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.next_epoch += 1;
        let epoch = inner.next_epoch;
        let s = inner.sessions.get_mut(token)?;
        s.socket = Some(BoundSocket { epoch, tx });
        s.socket_detached_ts = None;
        s.last_seen_ts = now;
        s.diag.connected = true;
        s.diag.connect_count += 1;
        Some(epoch)
    }

    /// Clear the socket binding only when `epoch` still names the current
    /// socket; late disconnects from superseded sockets are no-ops.
    pub fn unregister_socket(&self, token: &str, epoch: u64) {
        self.unregister_socket_at(token, epoch, unix_now())
    }

    pub fn unregister_socket_at(&self, token: &str, epoch: u64, now: f64) {
        let mut inner = self.inner.lock();
        if let Some(s) = inner.sessions.get_mut(token) {
            s.last_seen_ts = now;
            s.diag.connected = false;
            s.diag.disconnect_count += 1;
            if s.socket.as_ref().map(|b| b.epoch) == Some(epoch) {
                s.socket = None;
                s.socket_detached_ts = Some(now);
            }
        }
    }

    /// Outbound sender of the socket currently bound to `token`, if any.
    pub fn socket_sender(&self, token: &str) -> Option<mpsc::UnboundedSender<Message>> {
        let inner = self.inner.lock();
        inner
            .sessions
            .get(token)
            .and_then(|s| s.socket.as_ref().map(|b| b.tx.clone()))
    }

    /// Current socket epoch bound to `token`, if any.
    pub fn socket_epoch(&self, token: &str) -> Option<u64> {
        let inner = self.inner.lock();
        inner
            .sessions
            .get(token)
            .and_then(|s| s.socket.as_ref().map(|b| b.epoch))
    }

    pub fn delete_session(&self, token: &str) -> bool {
        let removed = self.inner.lock().sessions.remove(token).is_some();
        if removed {
            self.save();
        }
        removed
    }

    /// Merge a settings patch; `null` values remove keys.
    pub fn update_settings(&self, token: &str, patch: &serde_json::Map<String, Value>) -> bool {
        let updated = {
            let mut inner = self.inner.lock();
            match inner.sessions.get_mut(token) {
                None => false,
                Some(s) => {
                    for (k, v) in patch {
                        if v.is_null() {
                            s.settings.remove(k);
                        } else {
                            s.settings.insert(k.clone(), v.clone());
                        }
                    }
                    s.last_seen_ts = unix_now();
                    true
                }
            }
        };
        if updated {
            self.save();
        }
        updated
    }

    /// Remember an event id for idempotency; returns true when it is new.
    ///
    /// The ring lives on the session so retries deduplicate across socket
    /// reconnects within the session lifetime.
    pub fn track_event_id(&self, token: &str, event_id: &str) -> bool {
        let eid = event_id.trim();
        if eid.is_empty() {
            return true;
        }
        let mut inner = self.inner.lock();
        let Some(s) = inner.sessions.get_mut(token) else {
            return true;
        };
        if s.event_ids.iter().any(|e| e == eid) {
            return false;
        }
        if s.event_ids.len() >= EVENT_ID_RING_CAP {
            s.event_ids.pop_front();
        }
        s.event_ids.push_back(eid.to_string());
        true
    }

    /// Live permission lookup; unknown tokens deny everything.
    pub fn perm(&self, token: &str, key: &str) -> bool {
        let inner = self.inner.lock();
        inner.sessions.get(token).map(|s| s.perm(key)).unwrap_or(false)
    }

    pub fn mark_rx(&self, token: &str, msg_type: &str) {
        let mut inner = self.inner.lock();
        if let Some(s) = inner.sessions.get_mut(token) {
            s.diag.messages_rx += 1;
            s.diag.last_rx_type = Some(msg_type.to_string());
        }
    }

    pub fn mark_tx(&self, token: &str, msg_type: &str) {
        let mut inner = self.inner.lock();
        if let Some(s) = inner.sessions.get_mut(token) {
            s.diag.messages_tx += 1;
            s.diag.last_tx_type = Some(msg_type.to_string());
        }
    }

    pub fn set_hello_info(&self, token: &str, protocol_version: Option<i64>, heartbeat: bool) {
        let mut inner = self.inner.lock();
        if let Some(s) = inner.sessions.get_mut(token) {
            s.diag.client_protocol_version = protocol_version;
            s.diag.heartbeat_required = heartbeat;
        }
    }

    /// Device list snapshot for the local API, with grace-masked online flag.
    pub fn get_all_devices(&self) -> Vec<Value> {
        self.get_all_devices_at(unix_now())
    }

    pub fn get_all_devices_at(&self, now: f64) -> Vec<Value> {
        let grace = self.config.read().device_online_grace_s;
        let inner = self.inner.lock();
        inner
            .sessions
            .iter()
            .map(|(token, s)| {
                let online = s.socket.is_some()
                    || s.socket_detached_ts
                        .map(|t| now - t <= grace)
                        .unwrap_or(false);
                serde_json::json!({
                    "name": s.device_name,
                    "ip": s.ip,
                    "token": token,
                    "online": online,
                    "settings": s.settings,
                    "created_ts": s.created_ts,
                    "last_seen_ts": s.last_seen_ts,
                    "ws": {
                        "connected": s.diag.connected,
                        "connect_count": s.diag.connect_count,
                        "disconnect_count": s.diag.disconnect_count,
                        "messages_rx": s.diag.messages_rx,
                        "messages_tx": s.diag.messages_tx,
                        "client_protocol_version": s.diag.client_protocol_version,
                        "heartbeat_required": s.diag.heartbeat_required,
                    },
                })
            })
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Serialize all records to the session file via write-temp-then-rename.
    pub fn save(&self) {
        let path = self.config.read().session_file.clone();
        let data: HashMap<String, PersistedSession> = {
            let inner = self.inner.lock();
            inner
                .sessions
                .iter()
                .map(|(t, s)| {
                    (
                        t.clone(),
                        PersistedSession {
                            device_id: s.device_id.clone(),
                            device_name: s.device_name.clone(),
                            ip: s.ip.clone(),
                            settings: s.settings.clone(),
                            created_ts: s.created_ts,
                            last_seen_ts: s.last_seen_ts,
                        },
                    )
                })
                .collect()
        };
        let payload = match serde_json::to_vec_pretty(&data) {
            Ok(payload) => payload,
            Err(err) => {
                error!("Failed to serialize sessions: {}", err);
                return;
            }
        };
        let tmp = path.with_extension("json.tmp");
        let result = std::fs::write(&tmp, &payload).and_then(|_| std::fs::rename(&tmp, &path));
        if let Err(err) = result {
            error!("Failed to save sessions to {:?}: {}", path, err);
        }
    }

    /// Load records from disk; malformed files yield an empty store.
    pub fn load(&self) {
        self.load_at(unix_now())
    }

    pub fn load_at(&self, now: f64) {
        let path = self.config.read().session_file.clone();
        let parsed: HashMap<String, PersistedSession> = match std::fs::read(&path) {
            Err(_) => return,
            Ok(raw) => match serde_json::from_slice(&raw) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!("Discarding malformed session file {:?}: {}", path, err);
                    return;
                }
            },
        };
        {
            let mut inner = self.inner.lock();
            for (token, p) in parsed {
                inner.sessions.insert(
                    token.clone(),
                    DeviceSession {
                        device_id: p.device_id,
                        device_name: p.device_name,
                        ip: p.ip,
                        token,
                        settings: p.settings,
                        created_ts: if p.created_ts > 0.0 { p.created_ts } else { now },
                        last_seen_ts: if p.last_seen_ts > 0.0 { p.last_seen_ts } else { now },
                        socket: None,
                        socket_detached_ts: None,
                        event_ids: VecDeque::new(),
                        diag: SocketDiag::default(),
                    },
                );
            }
            self.prune_expired_locked(&mut inner, now);
            self.enforce_max_sessions_locked(&mut inner);
        }
        self.save();
    }

    #[cfg(test)]
    pub(crate) fn config_for_tests(&self) -> &SharedConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn set_timestamps_for_tests(&self, token: &str, created: f64, last_seen: f64) {
        let mut inner = self.inner.lock();
        if let Some(s) = inner.sessions.get_mut(token) {
            s.created_ts = created;
            s.last_seen_ts = last_seen;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager_with_tempdir() -> (DeviceManager, tempdir::TempDirGuard) {
        let guard = tempdir::TempDirGuard::new();
        let config = crate::config::shared_from_env();
        {
            let mut cfg = config.write();
            cfg.session_file = guard.path().join("cyberdeck_sessions.json");
            cfg.session_ttl_s = 0;
            cfg.session_idle_ttl_s = 0;
            cfg.max_sessions = 0;
            cfg.device_online_grace_s = 2.5;
        }
        (DeviceManager::new(config), guard)
    }

    mod tempdir {
        use std::path::{Path, PathBuf};

        pub struct TempDirGuard(PathBuf);

        impl TempDirGuard {
            pub fn new() -> Self {
                let dir = std::env::temp_dir().join(format!(
                    "cyberdeck-test-{}",
                    uuid::Uuid::new_v4()
                ));
                std::fs::create_dir_all(&dir).unwrap();
                Self(dir)
            }

            pub fn path(&self) -> &Path {
                &self.0
            }
        }

        impl Drop for TempDirGuard {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }

    fn fake_socket() -> mpsc::UnboundedSender<Message> {
        let (tx, _rx) = mpsc::unbounded_channel();
        tx
    }

    #[test]
    fn unregister_does_not_drop_newer_socket() {
        let (dm, _guard) = manager_with_tempdir();
        let token = dm.authorize("d1", "n1", "127.0.0.1");

        let old_epoch = dm.register_socket(&token, fake_socket()).unwrap();
        let new_epoch = dm.register_socket(&token, fake_socket()).unwrap();
        assert!(new_epoch > old_epoch);

        // Old socket disconnect arrives late, must not clear the new binding.
        dm.unregister_socket(&token, old_epoch);
        assert_eq!(dm.socket_epoch(&token), Some(new_epoch));

        dm.unregister_socket(&token, new_epoch);
        assert_eq!(dm.socket_epoch(&token), None);
    }

    #[test]
    fn authorize_updates_existing_session_for_same_device_id() {
        let (dm, _guard) = manager_with_tempdir();
        let token = dm.authorize("dev-1", "Device A", "10.0.0.1");
        let token2 = dm.authorize("dev-1", "Device A2", "10.0.0.2");
        assert_eq!(token, token2);
        let s = dm.get_session(&token).unwrap();
        assert_eq!(s.device_name, "Device A2");
        assert_eq!(s.ip, "10.0.0.2");
    }

    #[test]
    fn authorize_mints_distinct_tokens_per_device() {
        let (dm, _guard) = manager_with_tempdir();
        let a = dm.authorize("dev-a", "A", "10.0.0.1");
        let b = dm.authorize("dev-b", "B", "10.0.0.2");
        assert_ne!(a, b);
    }

    #[test]
    fn get_session_drops_expired_record() {
        let (dm, _guard) = manager_with_tempdir();
        let token = dm.authorize("d", "n", "127.0.0.1");
        dm.set_timestamps_for_tests(&token, 0.0, 0.0);
        dm.config_for_tests().write().session_ttl_s = 1;

        assert!(dm.get_session_at(&token, 10.0).is_none());
        assert_eq!(dm.session_count(), 0);
    }

    #[test]
    fn update_settings_removes_null_keys() {
        let (dm, _guard) = manager_with_tempdir();
        let token = dm.authorize("dev-2", "Device B", "10.0.0.3");
        let mut patch = serde_json::Map::new();
        patch.insert("a".to_string(), json!(1));
        patch.insert("b".to_string(), json!(2));
        assert!(dm.update_settings(&token, &patch));

        let mut patch2 = serde_json::Map::new();
        patch2.insert("a".to_string(), Value::Null);
        patch2.insert("c".to_string(), json!(3));
        assert!(dm.update_settings(&token, &patch2));

        let s = dm.get_session(&token).unwrap();
        assert!(!s.settings.contains_key("a"));
        assert_eq!(s.settings["b"], json!(2));
        assert_eq!(s.settings["c"], json!(3));
    }

    #[test]
    fn delete_session_returns_false_when_missing() {
        let (dm, _guard) = manager_with_tempdir();
        assert!(!dm.delete_session("nope"));
    }

    #[test]
    fn devices_report_online_flag_with_grace() {
        let (dm, _guard) = manager_with_tempdir();
        let token = dm.authorize("dev-3", "Device C", "10.0.0.4");

        let epoch = dm.register_socket(&token, fake_socket()).unwrap();
        let devices = dm.get_all_devices_at(100.0);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0]["online"], json!(true));

        dm.unregister_socket_at(&token, epoch, 101.0);
        // Within the grace window the device still reads online.
        assert_eq!(dm.get_all_devices_at(102.0)[0]["online"], json!(true));
        assert_eq!(dm.get_all_devices_at(104.0)[0]["online"], json!(false));
    }

    #[test]
    fn event_id_ring_dedupes_and_caps() {
        let (dm, _guard) = manager_with_tempdir();
        let token = dm.authorize("dev-4", "Device D", "10.0.0.5");
        assert!(dm.track_event_id(&token, "E1"));
        assert!(!dm.track_event_id(&token, "E1"));
        assert!(dm.track_event_id(&token, ""));
        for i in 0..EVENT_ID_RING_CAP {
            dm.track_event_id(&token, &format!("fill-{}", i));
        }
        // E1 fell off the ring and is accepted again.
        assert!(dm.track_event_id(&token, "E1"));
    }

    #[test]
    fn persistence_round_trips_and_survives_corruption() {
        let (dm, guard) = manager_with_tempdir();
        let token = dm.authorize("dev-5", "Device E", "10.0.0.6");
        let mut patch = serde_json::Map::new();
        patch.insert("perm_mouse".to_string(), json!(false));
        dm.update_settings(&token, &patch);

        let dm2 = DeviceManager::new(dm.config_for_tests().clone());
        dm2.load();
        let s = dm2.get_session(&token).unwrap();
        assert_eq!(s.device_id, "dev-5");
        assert!(!s.perm("perm_mouse"));

        std::fs::write(
            guard.path().join("cyberdeck_sessions.json"),
            b"{bad json",
        )
        .unwrap();
        let dm3 = DeviceManager::new(dm.config_for_tests().clone());
        dm3.load();
        assert_eq!(dm3.session_count(), 0);
    }

    #[test]
    fn max_sessions_evicts_least_recently_seen() {
        let (dm, _guard) = manager_with_tempdir();
        dm.config_for_tests().write().max_sessions = 2;
        let a = dm.authorize_at("dev-a", "A", "10.0.0.1", 100.0);
        let _b = dm.authorize_at("dev-b", "B", "10.0.0.2", 101.0);
        let _c = dm.authorize_at("dev-c", "C", "10.0.0.3", 102.0);
        assert_eq!(dm.session_count(), 2);
        assert!(dm.get_session_at(&a, 103.0).is_none());
    }
}
