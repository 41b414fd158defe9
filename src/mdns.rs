//! mDNS presence advertisement.

use crate::config::{self, SharedConfig};
use crate::net;
use log::{info, warn};
use mdns_sd::{ServiceDaemon, ServiceInfo};
use std::collections::HashMap;

const SERVICE_TYPE: &str = "_cyberdeck._tcp.local.";

/// Register the server as an mDNS service on the local network.
///
/// Returns the daemon handle so the service stays registered for the
/// process lifetime; failures are logged and otherwise ignored.
pub fn start(config: &SharedConfig) -> Option<ServiceDaemon> {
    let cfg = config.read();
    let ip = net::local_ip();
    let instance = format!("CyberDeck-{}", cfg.server_id);
    let host = format!("{}.local.", cfg.hostname);

    let mut props = HashMap::new();
    props.insert("version".to_string(), config::version().to_string());
    props.insert("hostname".to_string(), cfg.hostname.clone());
    props.insert("id".to_string(), cfg.server_id.clone());
    props.insert("udp_port".to_string(), cfg.udp_port.to_string());
    props.insert("scheme".to_string(), cfg.scheme().to_string());

    let daemon = match ServiceDaemon::new() {
        Ok(daemon) => daemon,
        Err(err) => {
            warn!("mDNS daemon start failed: {}", err);
            return None;
        }
    };
    let info = match ServiceInfo::new(
        SERVICE_TYPE,
        &instance,
        &host,
        ip.as_str(),
        cfg.port,
        props,
    ) {
        Ok(info) => info,
        Err(err) => {
            warn!("mDNS service info invalid: {}", err);
            return None;
        }
    };
    match daemon.register(info) {
        Ok(()) => {
            info!("mDNS broadcast started: {} -> {}:{}", instance, ip, cfg.port);
            Some(daemon)
        }
        Err(err) => {
            warn!("mDNS register failed: {}", err);
            None
        }
    }
}
