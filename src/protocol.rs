//! Protocol metadata shared by the HTTP and WebSocket planes.

use crate::config::{self, unix_now_ms, SharedConfig};
use serde_json::{json, Value};

const TEXT_EVENT_TYPES: &[&str] = &[
    "text",
    "type_text",
    "input_text",
    "insert_text",
    "keyboard_text",
];
const TEXT_FIELDS: &[&str] = &["text", "value", "message", "payload", "data"];

/// Stable feature flags supported by the current server build.
pub fn protocol_features() -> Value {
    json!({
        "stream_offer_v2": true,
        "stream_backend_select": true,
        "stream_diag": true,
        "ws_cursor": true,
        "ws_heartbeat": true,
        "file_transfer_resume": true,
        "file_transfer_checksum": true,
    })
}

/// Protocol metadata payload with runtime config and current server time.
pub fn protocol_payload(config: &SharedConfig) -> Value {
    let cfg = config.read();
    json!({
        "protocol_version": cfg.protocol_version,
        "min_supported_protocol_version": cfg.min_supported_protocol_version,
        "server_version": config::version(),
        "server_time_ms": unix_now_ms(),
        "features": protocol_features(),
    })
}

/// Normalized server hello payload used by the WS handshake.
pub fn build_server_hello(
    config: &SharedConfig,
    msg_type: &str,
    hb_interval_s: u64,
    hb_timeout_s: u64,
) -> Value {
    let mut payload = protocol_payload(config);
    payload["type"] = json!(if msg_type.is_empty() { "hello" } else { msg_type });
    payload["heartbeat_interval_ms"] = json!(hb_interval_s * 1000);
    payload["heartbeat_timeout_ms"] = json!(hb_timeout_s * 1000);
    payload
}

/// Whether an incoming message type should be interpreted as text input.
pub fn is_text_event_type(msg_type: &str) -> bool {
    let t = msg_type.trim().to_ascii_lowercase();
    TEXT_EVENT_TYPES.contains(&t.as_str())
}

/// Extract the first supported scalar text field from a WS payload.
pub fn extract_text_payload(data: &Value) -> String {
    let Some(map) = data.as_object() else {
        return String::new();
    };
    for field in TEXT_FIELDS {
        let Some(val) = map.get(*field) else {
            continue;
        };
        let text = match val {
            Value::Null | Value::Object(_) | Value::Array(_) => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if !text.is_empty() {
            return text;
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_carries_versions_and_features() {
        let config = crate::config::shared_from_env();
        let payload = protocol_payload(&config);
        assert!(payload["protocol_version"].as_i64().is_some());
        assert!(payload["min_supported_protocol_version"].as_i64().is_some());
        assert_eq!(payload["features"]["ws_heartbeat"], json!(true));
        assert!(payload["server_time_ms"].as_u64().unwrap() > 0);
    }

    #[test]
    fn server_hello_embeds_heartbeat_settings() {
        let config = crate::config::shared_from_env();
        let hello = build_server_hello(&config, "hello", 15, 45);
        assert_eq!(hello["type"], json!("hello"));
        assert_eq!(hello["heartbeat_interval_ms"], json!(15_000));
        assert_eq!(hello["heartbeat_timeout_ms"], json!(45_000));
    }

    #[test]
    fn text_event_types_are_recognized() {
        assert!(is_text_event_type("text"));
        assert!(is_text_event_type(" TYPE_TEXT "));
        assert!(is_text_event_type("keyboard_text"));
        assert!(!is_text_event_type("move"));
        assert!(!is_text_event_type(""));
    }

    #[test]
    fn text_payload_picks_first_scalar_field() {
        assert_eq!(
            extract_text_payload(&json!({"text": "hi", "value": "ignored"})),
            "hi"
        );
        assert_eq!(extract_text_payload(&json!({"value": 7})), "7");
        assert_eq!(
            extract_text_payload(&json!({"text": {"nested": 1}, "message": "m"})),
            "m"
        );
        assert_eq!(extract_text_payload(&json!({"other": "x"})), "");
        assert_eq!(extract_text_payload(&json!(null)), "");
    }
}
