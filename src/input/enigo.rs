//! Cross-platform input injection through the `enigo` automation library.
//!
//! Portable middle tier of the backend fallback chain: used when the
//! session-specific Linux backends cannot initialize, and as the primary
//! high-level path of the Windows backend.

use super::{Capabilities, InputBackend, MouseButton};
use ::enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use parking_lot::Mutex;

/// Resolve a symbolic key name to an enigo key.
fn named_key(key: &str) -> Option<Key> {
    let key = key.trim().to_ascii_lowercase();
    let mapped = match key.as_str() {
        "enter" => Key::Return,
        "backspace" => Key::Backspace,
        "space" => Key::Space,
        "win" | "winleft" => Key::Meta,
        "ctrl" => Key::Control,
        "alt" => Key::Alt,
        "shift" => Key::Shift,
        "tab" => Key::Tab,
        "esc" => Key::Escape,
        "delete" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        #[cfg(not(target_os = "macos"))]
        "playpause" => Key::MediaPlayPause,
        #[cfg(not(target_os = "macos"))]
        "nexttrack" => Key::MediaNextTrack,
        #[cfg(not(target_os = "macos"))]
        "prevtrack" => Key::MediaPrevTrack,
        #[cfg(not(target_os = "macos"))]
        "volumemute" => Key::VolumeMute,
        #[cfg(not(target_os = "macos"))]
        "volumeup" => Key::VolumeUp,
        #[cfg(not(target_os = "macos"))]
        "volumedown" => Key::VolumeDown,
        single if single.chars().count() == 1 => Key::Unicode(single.chars().next().unwrap()),
        _ => return None,
    };
    Some(mapped)
}

fn button_of(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

/// Enigo-backed injector usable on any desktop session.
pub struct EnigoBackend {
    enigo: Mutex<Enigo>,
}

impl EnigoBackend {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let enigo = Enigo::new(&Settings::default())?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }
}

impl InputBackend for EnigoBackend {
    fn name(&self) -> &'static str {
        "enigo"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            pointer: true,
            keyboard: true,
            position: true,
            screen_size: true,
        }
    }

    fn position(&self) -> Option<(i32, i32)> {
        self.enigo.lock().location().ok()
    }

    fn screen_size(&self) -> Option<(u32, u32)> {
        let (w, h) = self.enigo.lock().main_display().ok()?;
        if w <= 0 || h <= 0 {
            return None;
        }
        Some((w as u32, h as u32))
    }

    fn move_rel(&self, dx: i32, dy: i32) -> bool {
        if dx == 0 && dy == 0 {
            return true;
        }
        self.enigo.lock().move_mouse(dx, dy, Coordinate::Rel).is_ok()
    }

    fn click(&self, button: MouseButton, double: bool) -> bool {
        let button = button_of(button);
        let count = if double { 2 } else { 1 };
        let mut enigo = self.enigo.lock();
        for _ in 0..count {
            if enigo.button(button, Direction::Click).is_err() {
                return false;
            }
        }
        true
    }

    fn scroll(&self, dy: i32) -> bool {
        if dy == 0 {
            return true;
        }
        // Positive wheel steps scroll up; enigo counts lines downward.
        self.enigo.lock().scroll(-dy, Axis::Vertical).is_ok()
    }

    fn mouse_down(&self, button: MouseButton) -> bool {
        self.enigo
            .lock()
            .button(button_of(button), Direction::Press)
            .is_ok()
    }

    fn mouse_up(&self, button: MouseButton) -> bool {
        self.enigo
            .lock()
            .button(button_of(button), Direction::Release)
            .is_ok()
    }

    fn write_text(&self, text: &str) -> bool {
        if text.is_empty() {
            return true;
        }
        self.enigo.lock().text(text).is_ok()
    }

    fn press(&self, key: &str) -> bool {
        match named_key(key) {
            Some(key) => self.enigo.lock().key(key, Direction::Click).is_ok(),
            None => false,
        }
    }

    fn hotkey(&self, keys: &[String]) -> bool {
        let resolved: Vec<Key> = keys
            .iter()
            .filter(|k| !k.trim().is_empty())
            .filter_map(|k| named_key(k))
            .collect();
        if resolved.is_empty() {
            return false;
        }
        let mut enigo = self.enigo.lock();
        for &key in &resolved {
            if enigo.key(key, Direction::Press).is_err() {
                return false;
            }
        }
        for &key in resolved.iter().rev() {
            let _ = enigo.key(key, Direction::Release);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_resolve() {
        assert!(matches!(named_key("enter"), Some(Key::Return)));
        assert!(matches!(named_key(" WIN "), Some(Key::Meta)));
        assert!(matches!(named_key("v"), Some(Key::Unicode('v'))));
        assert!(named_key("no-such-key").is_none());
        assert!(named_key("stop").is_none());
    }

    #[test]
    fn buttons_translate() {
        assert!(matches!(button_of(MouseButton::Right), Button::Right));
        assert!(matches!(button_of(MouseButton::Middle), Button::Middle));
    }
}
