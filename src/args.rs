use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "cyberdeck-core")]
#[command(author = "CyberDeck Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CyberDeck server core", long_about = None)]
pub struct Args {
    /// TCP listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// UDP discovery port
    #[arg(long)]
    pub udp_port: Option<u16>,

    /// Fixed pairing code (4 digits)
    #[arg(long)]
    pub pairing_code: Option<String>,

    /// Writable state directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Enable TLS (requires --tls-cert and --tls-key)
    #[arg(long, action)]
    pub tls: bool,

    /// TLS certificate path (PEM)
    #[arg(long)]
    pub tls_cert: Option<String>,

    /// TLS private key path (PEM)
    #[arg(long)]
    pub tls_key: Option<String>,

    /// Disable the UDP discovery responder
    #[arg(long, action)]
    pub no_discovery: bool,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl Args {
    /// Apply CLI overrides on top of the environment-derived config.
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(udp_port) = self.udp_port {
            cfg.udp_port = udp_port;
        }
        if let Some(code) = &self.pairing_code {
            let code = code.trim();
            if !code.is_empty() {
                cfg.pairing_code = code.chars().take(4).collect();
            }
        }
        if let Some(dir) = &self.data_dir {
            cfg.data_dir = dir.clone();
            cfg.session_file = dir.join("cyberdeck_sessions.json");
            let _ = std::fs::create_dir_all(dir);
        }
        if let Some(cert) = &self.tls_cert {
            cfg.tls_cert = cert.clone();
        }
        if let Some(key) = &self.tls_key {
            cfg.tls_key = key.clone();
        }
        if self.tls {
            cfg.tls_enabled = !cfg.tls_cert.is_empty() && !cfg.tls_key.is_empty();
        }
        if self.verbose {
            cfg.debug = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_on_top_of_env() {
        let mut cfg = Config::from_env();
        let args = Args::parse_from([
            "cyberdeck-core",
            "--port",
            "9000",
            "--pairing-code",
            "123456",
            "--tls",
        ]);
        args.apply(&mut cfg);
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.pairing_code, "1234");
        // TLS stays off without certificate material.
        assert!(!cfg.tls_enabled || (!cfg.tls_cert.is_empty() && !cfg.tls_key.is_empty()));
    }
}
