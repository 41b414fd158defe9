//! Platform input injection backends.
//!
//! The dispatcher drives one [`InputBackend`] chosen at startup from the
//! detected session kind. Capability flags are data on the backend, not type
//! identity; the WebSocket plane only ever sees the trait surface.

use log::info;
use std::sync::Arc;

pub mod enigo;

#[cfg(target_os = "linux")]
pub mod wayland;
#[cfg(target_os = "linux")]
pub mod x11;

#[cfg(windows)]
pub mod windows;

/// Operations a concrete backend can actually perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub pointer: bool,
    pub keyboard: bool,
    pub position: bool,
    pub screen_size: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "right" => MouseButton::Right,
            "middle" => MouseButton::Middle,
            _ => MouseButton::Left,
        }
    }
}

/// Minimal injection contract consumed by the API and WS layers.
///
/// Every operation reports success as a `bool`; `false` feeds the caller's
/// fallback chain instead of raising.
pub trait InputBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn capabilities(&self) -> Capabilities;

    /// One-time post-construction setup (disable failsafes and the like).
    fn configure(&self) {}

    fn position(&self) -> Option<(i32, i32)> {
        None
    }

    fn screen_size(&self) -> Option<(u32, u32)> {
        None
    }

    fn move_rel(&self, _dx: i32, _dy: i32) -> bool {
        false
    }

    fn click(&self, _button: MouseButton, _double: bool) -> bool {
        false
    }

    fn scroll(&self, _dy: i32) -> bool {
        false
    }

    fn mouse_down(&self, _button: MouseButton) -> bool {
        false
    }

    fn mouse_up(&self, _button: MouseButton) -> bool {
        false
    }

    fn write_text(&self, _text: &str) -> bool {
        false
    }

    fn press(&self, _key: &str) -> bool {
        false
    }

    fn hotkey(&self, _keys: &[String]) -> bool {
        false
    }
}

/// Fully unavailable backend.
pub struct NullBackend;

impl InputBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }
}

/// Desktop session kind detected from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Windows,
    X11,
    Wayland,
    Unknown,
}

impl SessionKind {
    pub fn detect() -> Self {
        if cfg!(windows) {
            return SessionKind::Windows;
        }
        let xdg = std::env::var("XDG_SESSION_TYPE")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match xdg.as_str() {
            "wayland" => return SessionKind::Wayland,
            "x11" => return SessionKind::X11,
            _ => {}
        }
        if std::env::var("WAYLAND_DISPLAY").map(|v| !v.is_empty()).unwrap_or(false) {
            return SessionKind::Wayland;
        }
        if std::env::var("DISPLAY").map(|v| !v.is_empty()).unwrap_or(false) {
            return SessionKind::X11;
        }
        SessionKind::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Windows => "windows",
            SessionKind::X11 => "x11",
            SessionKind::Wayland => "wayland",
            SessionKind::Unknown => "unknown",
        }
    }
}

/// Portable automation tier tried before giving up entirely.
///
/// On Windows this tier lives inside the Windows backend instead.
#[cfg(not(windows))]
fn build_portable_backend() -> Arc<dyn InputBackend> {
    use log::warn;

    match enigo::EnigoBackend::new() {
        Ok(backend) => Arc::new(backend),
        Err(err) => {
            warn!("Enigo backend init failed: {}", err);
            Arc::new(NullBackend)
        }
    }
}

#[cfg(target_os = "linux")]
fn build_linux_backend(kind: SessionKind) -> Arc<dyn InputBackend> {
    use log::warn;

    let attempts: &[&str] = match kind {
        SessionKind::Wayland => &["wayland", "x11"],
        _ => &["x11", "wayland"],
    };
    for name in attempts {
        match *name {
            "x11" => match x11::X11Backend::new() {
                Ok(backend) => return Arc::new(backend),
                Err(err) => warn!("X11 backend init failed: {}", err),
            },
            _ => match wayland::WaylandBackend::new() {
                Ok(backend) => return Arc::new(backend),
                Err(err) => warn!("Wayland backend init failed: {}", err),
            },
        }
    }
    build_portable_backend()
}

/// Build and configure the runtime input backend with safe fallbacks.
pub fn build_backend() -> Arc<dyn InputBackend> {
    let kind = SessionKind::detect();

    #[cfg(windows)]
    let backend: Arc<dyn InputBackend> = Arc::new(windows::WindowsBackend::new());

    #[cfg(target_os = "linux")]
    let backend: Arc<dyn InputBackend> = build_linux_backend(kind);

    #[cfg(not(any(windows, target_os = "linux")))]
    let backend: Arc<dyn InputBackend> = build_portable_backend();

    backend.configure();
    info!("Input backend: {} (session={})", backend.name(), kind.as_str());
    backend
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_names_normalize() {
        assert_eq!(MouseButton::from_name("right"), MouseButton::Right);
        assert_eq!(MouseButton::from_name(" Middle "), MouseButton::Middle);
        assert_eq!(MouseButton::from_name("left"), MouseButton::Left);
        assert_eq!(MouseButton::from_name("bogus"), MouseButton::Left);
    }

    #[test]
    fn null_backend_reports_zero_capabilities() {
        let backend = NullBackend;
        let caps = backend.capabilities();
        assert!(!caps.pointer && !caps.keyboard && !caps.position && !caps.screen_size);
        assert!(!backend.move_rel(1, 1));
        assert!(!backend.write_text("x"));
        assert!(backend.position().is_none());
    }
}
