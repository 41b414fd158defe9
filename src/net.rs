//! Socket helpers: port availability probing and local address discovery.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, UdpSocket};

/// Return whether the given TCP port can currently be bound on all interfaces.
pub fn port_available(port: u16) -> bool {
    TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).is_ok()
}

/// Pick a usable TCP port near `preferred`.
///
/// Tries the next few ports above the preferred one, then a fixed fallback
/// range, and finally asks the kernel for an ephemeral port.
pub fn find_free_port(preferred: u16) -> u16 {
    for offset in 1..=8u16 {
        let candidate = preferred.saturating_add(offset);
        if candidate != preferred && port_available(candidate) {
            return candidate;
        }
    }
    for candidate in 8100..8200u16 {
        if port_available(candidate) {
            return candidate;
        }
    }
    TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .unwrap_or(preferred)
}

/// Best-effort local LAN address of the default outbound interface.
///
/// Uses the connected-UDP trick; no packet is actually sent.
pub fn local_ip() -> String {
    let probe = || -> Option<String> {
        let sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
        sock.connect(("8.8.8.8", 80)).ok()?;
        Some(sock.local_addr().ok()?.ip().to_string())
    };
    probe().unwrap_or_else(|| "127.0.0.1".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_free_port_avoids_taken_port() {
        let holder = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let taken = holder.local_addr().unwrap().port();
        let picked = find_free_port(taken);
        assert_ne!(picked, taken);
        assert!(port_available(picked));
    }

    #[test]
    fn local_ip_is_parseable() {
        let ip = local_ip();
        assert!(ip.parse::<std::net::IpAddr>().is_ok());
    }
}
