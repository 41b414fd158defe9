//! Wayland input injection via uinput virtual devices.
//!
//! Compositors do not accept synthetic events from unprivileged clients, so
//! this backend creates kernel-level virtual pointer/keyboard devices. Text
//! entry prefers the `wtype` tool when present and falls back to
//! per-character key synthesis with shift handling for uppercase.

use super::{Capabilities, InputBackend, MouseButton};
use crate::proc;
use mouse_keyboard_input::*;
use parking_lot::Mutex;
use std::process::Command;
use std::time::Duration;

/// Map a logical key name to a Linux input key code.
fn named_key_code(key: &str) -> Option<u16> {
    let code = match key.trim().to_ascii_lowercase().as_str() {
        "enter" => KEY_ENTER,
        "backspace" => KEY_BACKSPACE,
        "space" => KEY_SPACE,
        "win" | "winleft" => KEY_LEFTMETA,
        "ctrl" => KEY_LEFTCTRL,
        "alt" => KEY_LEFTALT,
        "shift" => KEY_LEFTSHIFT,
        "tab" => KEY_TAB,
        "esc" => KEY_ESC,
        "delete" => KEY_DELETE,
        "home" => KEY_HOME,
        "end" => KEY_END,
        "pageup" => KEY_PAGEUP,
        "pagedown" => KEY_PAGEDOWN,
        "up" => KEY_UP,
        "down" => KEY_DOWN,
        "left" => KEY_LEFT,
        "right" => KEY_RIGHT,
        "playpause" => KEY_PLAYPAUSE,
        "nexttrack" => KEY_NEXTSONG,
        "prevtrack" => KEY_PREVIOUSSONG,
        "stop" => KEY_STOPCD,
        "volumemute" => KEY_MUTE,
        "volumeup" => KEY_VOLUMEUP,
        "volumedown" => KEY_VOLUMEDOWN,
        single if single.chars().count() == 1 => {
            let ch = single.chars().next().unwrap();
            char_key_code(ch)?.0
        }
        _ => return None,
    };
    Some(code)
}

/// Key code plus shift requirement for one typed character.
fn char_key_code(ch: char) -> Option<(u16, bool)> {
    if ch.is_ascii_uppercase() {
        return char_key_code(ch.to_ascii_lowercase()).map(|(code, _)| (code, true));
    }
    let code = match ch {
        'a' => KEY_A,
        'b' => KEY_B,
        'c' => KEY_C,
        'd' => KEY_D,
        'e' => KEY_E,
        'f' => KEY_F,
        'g' => KEY_G,
        'h' => KEY_H,
        'i' => KEY_I,
        'j' => KEY_J,
        'k' => KEY_K,
        'l' => KEY_L,
        'm' => KEY_M,
        'n' => KEY_N,
        'o' => KEY_O,
        'p' => KEY_P,
        'q' => KEY_Q,
        'r' => KEY_R,
        's' => KEY_S,
        't' => KEY_T,
        'u' => KEY_U,
        'v' => KEY_V,
        'w' => KEY_W,
        'x' => KEY_X,
        'y' => KEY_Y,
        'z' => KEY_Z,
        // The crate exports no KEY_0 constant; 11 is its raw event code.
        '0' => 11,
        '1' => KEY_1,
        '2' => KEY_2,
        '3' => KEY_3,
        '4' => KEY_4,
        '5' => KEY_5,
        '6' => KEY_6,
        '7' => KEY_7,
        '8' => KEY_8,
        '9' => KEY_9,
        '\n' | '\r' => KEY_ENTER,
        '\t' => KEY_TAB,
        ' ' => KEY_SPACE,
        '-' => KEY_MINUS,
        '=' => KEY_EQUAL,
        '[' => KEY_LEFTBRACE,
        ']' => KEY_RIGHTBRACE,
        ';' => KEY_SEMICOLON,
        '\'' => KEY_APOSTROPHE,
        '`' => KEY_GRAVE,
        '\\' => KEY_BACKSLASH,
        ',' => KEY_COMMA,
        '.' => KEY_DOT,
        '/' => KEY_SLASH,
        _ => return None,
    };
    Some((code, false))
}

/// uinput-backed injector for Wayland sessions.
///
/// Two kernel virtual devices, one serving pointer events and one serving
/// key events, mirroring what a physical mouse/keyboard pair looks like.
pub struct WaylandBackend {
    pointer: Mutex<VirtualDevice>,
    keyboard: Mutex<VirtualDevice>,
}

impl WaylandBackend {
    pub fn new() -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let pointer = VirtualDevice::default()?;
        let keyboard = VirtualDevice::default()?;
        Ok(Self {
            pointer: Mutex::new(pointer),
            keyboard: Mutex::new(keyboard),
        })
    }

    fn button_code(button: MouseButton) -> u16 {
        match button {
            MouseButton::Left => BTN_LEFT,
            MouseButton::Right => BTN_RIGHT,
            MouseButton::Middle => BTN_MIDDLE,
        }
    }

    fn tap_key(&self, code: u16) -> bool {
        self.keyboard.lock().click(code).is_ok()
    }

    /// Type text through `wtype` when the tool is installed.
    fn write_text_wtype(text: &str) -> bool {
        if text.is_empty() {
            return true;
        }
        // Longer payloads get proportionally longer to finish typing.
        let timeout = (0.04 * text.len() as f64).clamp(2.0, 8.0);
        proc::run_status(
            Command::new("wtype").arg("--").arg(text),
            Duration::from_secs_f64(timeout),
        )
    }
}

impl InputBackend for WaylandBackend {
    fn name(&self) -> &'static str {
        "linux_wayland_uinput"
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
        if dx == 0 && dy == 0 {
            return true;
        }
        self.pointer.lock().smooth_move_mouse(dx, dy).is_ok()
    }

    fn click(&self, button: MouseButton, double: bool) -> bool {
        let code = Self::button_code(button);
        let count = if double { 2 } else { 1 };
        for _ in 0..count {
            if self.pointer.lock().click(code).is_err() {
                return false;
            }
        }
        true
    }

    fn scroll(&self, dy: i32) -> bool {
        if dy == 0 {
            return true;
        }
        self.pointer.lock().smooth_scroll(0, dy).is_ok()
    }

    fn mouse_down(&self, button: MouseButton) -> bool {
        self.pointer.lock().press(Self::button_code(button)).is_ok()
    }

    fn mouse_up(&self, button: MouseButton) -> bool {
        self.pointer.lock().release(Self::button_code(button)).is_ok()
    }

    fn write_text(&self, text: &str) -> bool {
        if text.is_empty() {
            return true;
        }
        if Self::write_text_wtype(text) {
            return true;
        }

        // Resolve the whole sequence before touching the device.
        let mut seq = Vec::with_capacity(text.chars().count());
        for ch in text.chars() {
            match char_key_code(ch) {
                Some(pair) => seq.push(pair),
                None => return false,
            }
        }
        let mut keyboard = self.keyboard.lock();
        for (code, shifted) in seq {
            let ok = if shifted {
                keyboard.press(KEY_LEFTSHIFT).is_ok()
                    && keyboard.click(code).is_ok()
                    && keyboard.release(KEY_LEFTSHIFT).is_ok()
            } else {
                keyboard.click(code).is_ok()
            };
            if !ok {
                return false;
            }
        }
        true
    }

    fn press(&self, key: &str) -> bool {
        match named_key_code(key) {
            Some(code) => self.tap_key(code),
            None => false,
        }
    }

    fn hotkey(&self, keys: &[String]) -> bool {
        let codes: Vec<u16> = keys
            .iter()
            .filter(|k| !k.trim().is_empty())
            .filter_map(|k| named_key_code(k))
            .collect();
        if codes.is_empty() {
            return false;
        }
        let mut keyboard = self.keyboard.lock();
        for &code in &codes {
            if keyboard.press(code).is_err() {
                return false;
            }
        }
        for &code in codes.iter().rev() {
            let _ = keyboard.release(code);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_codes_handle_case_and_symbols() {
        assert_eq!(char_key_code('a'), Some((KEY_A, false)));
        assert_eq!(char_key_code('A'), Some((KEY_A, true)));
        assert_eq!(char_key_code('7'), Some((KEY_7, false)));
        assert_eq!(char_key_code('.'), Some((KEY_DOT, false)));
        assert_eq!(char_key_code('!'), None);
    }

    #[test]
    fn named_keys_resolve_to_codes() {
        assert_eq!(named_key_code("enter"), Some(KEY_ENTER));
        assert_eq!(named_key_code("win"), Some(KEY_LEFTMETA));
        assert_eq!(named_key_code("v"), Some(KEY_V));
        assert_eq!(named_key_code("no-such-key"), None);
    }
}
