//! UDP discovery responder.
//!
//! Answers `CYBERDECK_DISCOVER[:nonce]` broadcast datagrams with a JSON
//! description of the server endpoint so mobile clients can find the host
//! without manual configuration.

use crate::config::{self, SharedConfig};
use log::{error, info, warn};
use serde_json::json;
use std::net::{Ipv4Addr, UdpSocket};
use std::thread;

const DISCOVER_MARKER: &[u8] = b"CYBERDECK_DISCOVER";
const NONCE_LIMIT: usize = 32;

/// Extract the optional request nonce from a discovery datagram.
fn extract_nonce(data: &[u8]) -> Option<String> {
    let prefixed = data.strip_prefix(DISCOVER_MARKER)?;
    let rest = prefixed.strip_prefix(b":")?;
    let nonce: String = String::from_utf8_lossy(rest)
        .trim_end_matches(['\r', '\n'])
        .chars()
        .take(NONCE_LIMIT)
        .collect();
    if nonce.is_empty() {
        None
    } else {
        Some(nonce)
    }
}

fn build_reply(config: &SharedConfig, nonce: Option<String>) -> String {
    let cfg = config.read();
    let mut reply = json!({
        "cyberdeck": true,
        "proto": cfg.protocol_version,
        "id": cfg.server_id,
        "name": cfg.hostname,
        "port": cfg.port,
        "version": config::version(),
        "scheme": cfg.scheme(),
    });
    if let Some(nonce) = nonce {
        reply["nonce"] = json!(nonce);
    }
    reply.to_string()
}

fn discovery_loop(config: SharedConfig) {
    let udp_port = config.read().udp_port;
    let sock = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, udp_port)) {
        Ok(sock) => sock,
        Err(err) => {
            error!("UDP discovery bind failed on {}: {}", udp_port, err);
            return;
        }
    };
    if let Err(err) = sock.set_broadcast(true) {
        warn!("UDP discovery: SO_BROADCAST failed: {}", err);
    }
    info!("UDP discovery listening on {}", udp_port);

    let mut buf = [0u8; 1024];
    loop {
        let (len, addr) = match sock.recv_from(&mut buf) {
            Ok(recv) => recv,
            Err(_) => continue,
        };
        let data = &buf[..len];
        if !data
            .windows(DISCOVER_MARKER.len())
            .any(|w| w == DISCOVER_MARKER)
        {
            continue;
        }
        let reply = build_reply(&config, extract_nonce(data));
        // Per-datagram failures are swallowed; the responder must outlive them.
        let _ = sock.send_to(reply.as_bytes(), addr);
    }
}

/// Start the discovery responder on a dedicated daemon thread.
pub fn start(config: SharedConfig) {
    thread::Builder::new()
        .name("udp-discovery".into())
        .spawn(move || discovery_loop(config))
        .map(|_| ())
        .unwrap_or_else(|err| error!("UDP discovery thread spawn failed: {}", err));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_parses_and_truncates() {
        assert_eq!(extract_nonce(b"CYBERDECK_DISCOVER"), None);
        assert_eq!(extract_nonce(b"CYBERDECK_DISCOVER:"), None);
        assert_eq!(
            extract_nonce(b"CYBERDECK_DISCOVER:abc123"),
            Some("abc123".to_string())
        );
        let long = format!("CYBERDECK_DISCOVER:{}", "x".repeat(64));
        assert_eq!(extract_nonce(long.as_bytes()).unwrap().len(), 32);
    }

    #[test]
    fn reply_carries_identity_and_nonce() {
        let config = crate::config::shared_from_env();
        let reply = build_reply(&config, Some("n-1".to_string()));
        let parsed: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed["cyberdeck"], true);
        assert_eq!(parsed["nonce"], "n-1");
        assert!(parsed["id"].as_str().is_some());
        assert!(parsed["port"].as_u64().is_some());
    }

    #[test]
    fn reply_omits_missing_nonce() {
        let config = crate::config::shared_from_env();
        let parsed: serde_json::Value =
            serde_json::from_str(&build_reply(&config, None)).unwrap();
        assert!(parsed.get("nonce").is_none());
    }
}
