//! Runtime configuration read from `CYBERDECK_*` environment variables.
//!
//! The process keeps one [`Config`] snapshot behind a shared lock; `reload`
//! re-reads the environment in place so long-running tasks observe changes
//! without a restart.

use log::warn;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Shared, hot-reloadable configuration handle.
pub type SharedConfig = Arc<RwLock<Config>>;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Read an integer environment variable with a safe fallback.
pub(crate) fn env_int(name: &str, default: i64) -> i64 {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<i64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Read a float environment variable with a safe fallback.
pub(crate) fn env_float(name: &str, default: f64) -> f64 {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<f64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Read a boolean environment variable using common truthy/falsy forms.
pub(crate) fn env_bool(name: &str, default: bool) -> bool {
    let raw = match std::env::var(name) {
        Ok(raw) => raw,
        Err(_) => return default,
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "y" | "t" => true,
        "0" | "false" | "no" | "off" | "n" | "f" => false,
        _ => default,
    }
}

/// Parse a comma-separated string into normalized non-empty unique values.
pub(crate) fn csv_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let s = part.trim();
        if !s.is_empty() && !out.iter().any(|x| x == s) {
            out.push(s.to_string());
        }
    }
    out
}

fn env_csv(name: &str, default: &[String]) -> Vec<String> {
    let raw = match std::env::var(name) {
        Ok(raw) => raw,
        Err(_) => default.join(","),
    };
    let out = csv_list(&raw);
    if out.is_empty() {
        vec!["*".to_string()]
    } else {
        out
    }
}

/// Current wall-clock time as fractional UNIX seconds.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Current wall-clock time in UNIX milliseconds.
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Detect whether the current session runs under a Wayland compositor.
pub fn is_wayland_session() -> bool {
    if cfg!(windows) {
        return false;
    }
    let xdg = std::env::var("XDG_SESSION_TYPE").unwrap_or_default();
    if xdg.trim().eq_ignore_ascii_case("wayland") {
        return true;
    }
    std::env::var("WAYLAND_DISPLAY")
        .map(|v| !v.is_empty())
        .unwrap_or(false)
}

fn default_data_dir() -> PathBuf {
    if cfg!(windows) {
        if let Some(dir) = dirs::data_local_dir() {
            return dir.join("CyberDeck");
        }
    } else if let Some(dir) = dirs::state_dir() {
        return dir.join("CyberDeck");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("state")
        .join("CyberDeck")
}

fn resolve_data_dir(fallback: &PathBuf) -> PathBuf {
    match std::env::var("CYBERDECK_DATA_DIR") {
        Ok(raw) if !raw.trim().is_empty() => PathBuf::from(raw.trim()),
        _ => fallback.clone(),
    }
}

fn fresh_pairing_code() -> String {
    format!("{:04}", Uuid::new_v4().as_u128() % 10_000)
}

fn env_pairing_code() -> Option<String> {
    match std::env::var("CYBERDECK_PAIRING_CODE") {
        Ok(raw) => {
            let code = raw.trim();
            if code.is_empty() {
                None
            } else {
                Some(code.chars().take(4).collect())
            }
        }
        Err(_) => None,
    }
}

fn detect_hostname() -> String {
    if let Ok(name) = std::env::var(if cfg!(windows) { "COMPUTERNAME" } else { "HOSTNAME" }) {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "CyberDeck PC".to_string())
}

#[derive(Debug, Clone)]
pub struct Config {
    /// TCP listen port and automatic reselection when busy.
    pub port: u16,
    pub port_auto: bool,

    /// UDP discovery responder port.
    pub udp_port: u16,

    /// mDNS service registration toggle.
    pub mdns_enabled: bool,

    /// Feature negotiation bounds.
    pub protocol_version: i64,
    pub min_supported_protocol_version: i64,

    /// Optional TLS material; scheme becomes `https` when enabled.
    pub tls_cert: String,
    pub tls_key: String,
    pub tls_enabled: bool,

    /// CORS allow-list; `*` forces credentials off.
    pub cors_origins: Vec<String>,
    pub cors_allow_credentials: bool,

    /// Permit WebSocket token in the query string.
    pub allow_query_token: bool,

    /// Session lifetime policy (0 disables the respective limit).
    pub session_ttl_s: i64,
    pub session_idle_ttl_s: i64,
    pub max_sessions: usize,

    /// Online-state hysteresis after a socket detaches.
    pub device_online_grace_s: f64,

    /// PIN brute-force limiter.
    pub pin_window_s: i64,
    pub pin_max_fails: u32,
    pub pin_block_s: i64,
    pub pin_state_stale_s: i64,
    pub pin_state_max_ips: usize,

    /// Pairing code and regeneration policy.
    pub pairing_code: String,
    pub pairing_ttl_s: i64,
    pub pairing_single_use: bool,
    pub pairing_expires_at: Option<f64>,

    /// Single-use QR token window (minimum 10 s applied by the store).
    pub qr_token_ttl_s: i64,

    /// Heartbeat cadence.
    pub ws_heartbeat_interval_s: u64,
    pub ws_heartbeat_timeout_s: u64,
    /// Push `server_hello` before the client speaks.
    pub ws_proto_push: bool,

    /// Cursor telemetry stream.
    pub cursor_stream: bool,
    pub cursor_stream_fps: u32,

    /// Pointer motion tunables.
    pub mouse_gain: f64,
    pub mouse_max_delta: i32,
    pub mouse_deadzone: f64,
    pub mouse_lag_damp_start_s: f64,
    pub mouse_lag_damp_min: f64,

    /// Logical canvas fallback when the backend cannot report screen size.
    pub stream_fallback_w: u32,
    pub stream_fallback_h: u32,

    pub verbose_ws_log: bool,
    pub debug: bool,

    /// Writable state directory and the session file inside it.
    pub data_dir: PathBuf,
    pub session_file: PathBuf,

    /// Process identity, stable for the process lifetime.
    pub server_id: String,
    pub hostname: String,
}

impl Config {
    pub fn from_env() -> Self {
        let wayland = is_wayland_session();
        let data_dir = resolve_data_dir(&default_data_dir());
        let session_file = data_dir.join("cyberdeck_sessions.json");

        let tls_cert = std::env::var("CYBERDECK_TLS_CERT").unwrap_or_default();
        let tls_key = std::env::var("CYBERDECK_TLS_KEY").unwrap_or_default();
        let tls_enabled =
            env_bool("CYBERDECK_TLS", false) && !tls_cert.is_empty() && !tls_key.is_empty();

        let cors_origins = env_csv("CYBERDECK_CORS_ORIGINS", &["*".to_string()]);
        let mut cors_allow_credentials = env_bool("CYBERDECK_CORS_ALLOW_CREDENTIALS", false);
        if cors_origins.iter().any(|o| o == "*") {
            cors_allow_credentials = false;
        }

        let pairing_ttl_s = env_int("CYBERDECK_PAIRING_TTL_S", 0);
        let pairing_expires_at = if pairing_ttl_s > 0 {
            Some(unix_now() + pairing_ttl_s as f64)
        } else {
            None
        };

        let mut cfg = Self {
            port: env_int("CYBERDECK_PORT", 8080).clamp(0, u16::MAX as i64) as u16,
            port_auto: env_bool("CYBERDECK_PORT_AUTO", true),
            udp_port: env_int("CYBERDECK_UDP_PORT", 5555).clamp(0, u16::MAX as i64) as u16,
            mdns_enabled: env_bool("CYBERDECK_MDNS", true),
            protocol_version: env_int("CYBERDECK_PROTOCOL_VERSION", 2),
            min_supported_protocol_version: env_int("CYBERDECK_MIN_PROTOCOL_VERSION", 1),
            tls_cert,
            tls_key,
            tls_enabled,
            cors_origins,
            cors_allow_credentials,
            allow_query_token: env_bool("CYBERDECK_ALLOW_QUERY_TOKEN", false),
            session_ttl_s: env_int("CYBERDECK_SESSION_TTL_S", 0),
            session_idle_ttl_s: env_int("CYBERDECK_SESSION_IDLE_TTL_S", 0),
            max_sessions: env_int("CYBERDECK_MAX_SESSIONS", 0).max(0) as usize,
            device_online_grace_s: env_float("CYBERDECK_DEVICE_ONLINE_GRACE_S", 2.5),
            pin_window_s: env_int("CYBERDECK_PIN_WINDOW_S", 60),
            pin_max_fails: env_int("CYBERDECK_PIN_MAX_FAILS", 8).max(1) as u32,
            pin_block_s: env_int("CYBERDECK_PIN_BLOCK_S", 300),
            pin_state_stale_s: env_int("CYBERDECK_PIN_STATE_STALE_S", 7200),
            pin_state_max_ips: env_int("CYBERDECK_PIN_STATE_MAX_IPS", 4096).max(1) as usize,
            pairing_code: env_pairing_code().unwrap_or_else(fresh_pairing_code),
            pairing_ttl_s,
            pairing_single_use: env_bool("CYBERDECK_PAIRING_SINGLE_USE", false),
            pairing_expires_at,
            qr_token_ttl_s: env_int("CYBERDECK_QR_TOKEN_TTL_S", 120),
            ws_heartbeat_interval_s: env_int("CYBERDECK_WS_HEARTBEAT_INTERVAL_S", 15).max(1) as u64,
            ws_heartbeat_timeout_s: env_int("CYBERDECK_WS_HEARTBEAT_TIMEOUT_S", 45).max(1) as u64,
            ws_proto_push: env_bool("CYBERDECK_WS_PROTO_PUSH", false),
            cursor_stream: env_bool("CYBERDECK_CURSOR_STREAM", !wayland),
            cursor_stream_fps: env_int("CYBERDECK_CURSOR_FPS", 30).max(1) as u32,
            mouse_gain: env_float("CYBERDECK_MOUSE_GAIN", if wayland { 1.35 } else { 1.0 })
                .clamp(0.1, 8.0),
            mouse_max_delta: env_int("CYBERDECK_MOUSE_MAX_DELTA", 160).max(8) as i32,
            mouse_deadzone: env_float("CYBERDECK_MOUSE_DEADZONE", if wayland { 0.2 } else { 0.0 })
                .clamp(0.0, 2.0),
            mouse_lag_damp_start_s: env_float(
                "CYBERDECK_MOUSE_LAG_DAMP_START_S",
                if wayland { 0.085 } else { 0.18 },
            )
            .clamp(0.01, 1.0),
            mouse_lag_damp_min: env_float("CYBERDECK_MOUSE_LAG_DAMP_MIN", 0.35).clamp(0.1, 1.0),
            stream_fallback_w: env_int("CYBERDECK_STREAM_W", 1920).max(320) as u32,
            stream_fallback_h: env_int("CYBERDECK_STREAM_H", 1080).max(240) as u32,
            verbose_ws_log: env_bool("CYBERDECK_VERBOSE_WS_LOG", true),
            debug: env_bool("CYBERDECK_DEBUG", false),
            data_dir,
            session_file,
            server_id: Uuid::new_v4().to_string().chars().take(8).collect(),
            hostname: detect_hostname(),
        };

        if let Err(err) = std::fs::create_dir_all(&cfg.data_dir) {
            warn!("Failed to create data dir {:?}: {}", cfg.data_dir, err);
            cfg.data_dir = std::env::temp_dir().join("cyberdeck");
            let _ = std::fs::create_dir_all(&cfg.data_dir);
            cfg.session_file = cfg.data_dir.join("cyberdeck_sessions.json");
        }
        cfg
    }

    /// Re-read every reloadable option from the environment in place.
    ///
    /// Process identity (`server_id`, `hostname`) is kept; the pairing code
    /// is only replaced when the environment pins one.
    pub fn reload(&mut self) {
        let server_id = self.server_id.clone();
        let hostname = self.hostname.clone();
        let pairing_code = self.pairing_code.clone();

        *self = Config::from_env();
        self.server_id = server_id;
        self.hostname = hostname;
        if env_pairing_code().is_none() {
            self.pairing_code = pairing_code;
        }
    }

    /// URL scheme matching the TLS setting.
    pub fn scheme(&self) -> &'static str {
        if self.tls_enabled {
            "https"
        } else {
            "http"
        }
    }

    /// Whether the pairing code has passed its configured expiry.
    pub fn pairing_expired(&self, now: f64) -> bool {
        matches!(self.pairing_expires_at, Some(at) if now >= at)
    }

    /// Rotate the pairing code, restarting the TTL window if one is set.
    pub fn regenerate_pairing_code(&mut self) {
        self.pairing_code = fresh_pairing_code();
        if self.pairing_ttl_s > 0 {
            self.pairing_expires_at = Some(unix_now() + self.pairing_ttl_s as f64);
        }
    }
}

pub fn shared_from_env() -> SharedConfig {
    Arc::new(RwLock::new(Config::from_env()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_int_falls_back_on_garbage() {
        std::env::set_var("CYBERDECK_TEST_INT_GARBAGE", "not-a-number");
        assert_eq!(env_int("CYBERDECK_TEST_INT_GARBAGE", 42), 42);
        std::env::remove_var("CYBERDECK_TEST_INT_GARBAGE");
        assert_eq!(env_int("CYBERDECK_TEST_INT_GARBAGE", 7), 7);
    }

    #[test]
    fn env_bool_accepts_common_forms() {
        std::env::set_var("CYBERDECK_TEST_BOOL_YES", " Yes ");
        std::env::set_var("CYBERDECK_TEST_BOOL_OFF", "off");
        std::env::set_var("CYBERDECK_TEST_BOOL_JUNK", "maybe");
        assert!(env_bool("CYBERDECK_TEST_BOOL_YES", false));
        assert!(!env_bool("CYBERDECK_TEST_BOOL_OFF", true));
        assert!(env_bool("CYBERDECK_TEST_BOOL_JUNK", true));
        std::env::remove_var("CYBERDECK_TEST_BOOL_YES");
        std::env::remove_var("CYBERDECK_TEST_BOOL_OFF");
        std::env::remove_var("CYBERDECK_TEST_BOOL_JUNK");
    }

    #[test]
    fn csv_list_dedupes_and_trims() {
        assert_eq!(
            csv_list(" a, b ,a,, c "),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(csv_list(" , ,").is_empty());
    }

    #[test]
    fn pairing_code_is_four_digits() {
        let code = fresh_pairing_code();
        assert_eq!(code.len(), 4);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn pairing_expiry_honors_ttl() {
        let mut cfg = Config::from_env();
        cfg.pairing_ttl_s = 10;
        cfg.pairing_expires_at = Some(100.0);
        assert!(!cfg.pairing_expired(99.0));
        assert!(cfg.pairing_expired(100.0));
        cfg.pairing_expires_at = None;
        assert!(!cfg.pairing_expired(1e12));
    }

    #[test]
    fn wildcard_origin_disables_credentials() {
        let cfg = Config::from_env();
        if cfg.cors_origins.iter().any(|o| o == "*") {
            assert!(!cfg.cors_allow_credentials);
        }
    }
}
