//! Process-wide shared state handed to every transport handler.

use crate::config::SharedConfig;
use crate::input::InputBackend;
use crate::pin_limiter::PinLimiter;
use crate::qr_auth::QrTokenStore;
use crate::sessions::DeviceManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Explicitly-constructed services shared by the HTTP and WS planes.
pub struct SharedState {
    pub config: SharedConfig,
    pub devices: DeviceManager,
    pub pin_limiter: PinLimiter,
    pub qr_tokens: QrTokenStore,
    pub backend: Arc<dyn InputBackend>,
    input_locked: AtomicBool,
    pub start_time: Instant,
}

impl SharedState {
    pub fn new(config: SharedConfig, backend: Arc<dyn InputBackend>) -> Self {
        Self {
            devices: DeviceManager::new(config.clone()),
            pin_limiter: PinLimiter::new(config.clone()),
            qr_tokens: QrTokenStore::new(config.clone()),
            backend,
            input_locked: AtomicBool::new(false),
            start_time: Instant::now(),
            config,
        }
    }

    /// Verbose per-connection WebSocket logging gate.
    pub fn ws_log_enabled(&self) -> bool {
        let cfg = self.config.read();
        cfg.verbose_ws_log || cfg.debug
    }

    /// Global input-lock flag; locked input drops remote events.
    pub fn input_locked(&self) -> bool {
        self.input_locked.load(Ordering::Relaxed)
    }

    pub fn set_input_locked(&self, locked: bool) {
        self.input_locked.store(locked, Ordering::Relaxed);
    }

    /// Screen size from the backend, or the configured logical canvas.
    pub fn safe_screen_size(&self) -> (u32, u32) {
        if let Some((w, h)) = self.backend.screen_size() {
            if w > 0 && h > 0 {
                return (w, h);
            }
        }
        let cfg = self.config.read();
        (cfg.stream_fallback_w, cfg.stream_fallback_h)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::input::{Capabilities, MouseButton};
    use parking_lot::Mutex;

    /// Recording fake backend for dispatcher-level tests.
    #[derive(Default)]
    pub struct FakeBackend {
        pub moves: Mutex<Vec<(i32, i32)>>,
        pub clicks: Mutex<Vec<(MouseButton, bool)>>,
        pub texts: Mutex<Vec<String>>,
        pub keys: Mutex<Vec<String>>,
    }

    impl InputBackend for FakeBackend {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities {
                pointer: true,
                keyboard: true,
                position: false,
                screen_size: false,
            }
        }

        fn move_rel(&self, dx: i32, dy: i32) -> bool {
            self.moves.lock().push((dx, dy));
            true
        }

        fn click(&self, button: MouseButton, double: bool) -> bool {
            self.clicks.lock().push((button, double));
            true
        }

        fn scroll(&self, _dy: i32) -> bool {
            true
        }

        fn mouse_down(&self, _button: MouseButton) -> bool {
            true
        }

        fn mouse_up(&self, _button: MouseButton) -> bool {
            true
        }

        fn write_text(&self, text: &str) -> bool {
            self.texts.lock().push(text.to_string());
            true
        }

        fn press(&self, key: &str) -> bool {
            self.keys.lock().push(key.to_string());
            true
        }

        fn hotkey(&self, keys: &[String]) -> bool {
            self.keys.lock().push(keys.join("+"));
            true
        }
    }

    pub fn state_with_fake_backend() -> (Arc<SharedState>, Arc<FakeBackend>) {
        let backend = Arc::new(FakeBackend::default());
        let config = crate::config::shared_from_env();
        {
            let mut cfg = config.write();
            cfg.session_file = std::env::temp_dir().join(format!(
                "cyberdeck-state-test-{}.json",
                uuid::Uuid::new_v4()
            ));
            cfg.cursor_stream = false;
            cfg.verbose_ws_log = false;
        }
        let state = Arc::new(SharedState::new(config, backend.clone()));
        (state, backend)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::state_with_fake_backend;

    #[test]
    fn input_lock_round_trips() {
        let (state, _backend) = state_with_fake_backend();
        assert!(!state.input_locked());
        state.set_input_locked(true);
        assert!(state.input_locked());
    }

    #[test]
    fn safe_screen_size_falls_back_to_configured_canvas() {
        let (state, _backend) = state_with_fake_backend();
        let (w, h) = state.safe_screen_size();
        assert_eq!((w, h), (1920, 1080));
    }
}
