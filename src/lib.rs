//! CyberDeck server core.
//!
//! Remote input over WebSocket with LAN pairing, UDP/mDNS discovery and a
//! persistent device registry.

pub mod args;
pub mod clipboard;
pub mod config;
pub mod discovery;
pub mod input;
pub mod mdns;
pub mod net;
pub mod pin_limiter;
pub(crate) mod proc;
pub mod protocol;
pub mod qr_auth;
pub mod sessions;
pub mod web;
pub mod ws;

// Re-exports
pub use config::{Config, SharedConfig};
pub use input::{InputBackend, NullBackend};
pub use sessions::DeviceManager;
pub use web::SharedState;
