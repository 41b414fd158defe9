//! X11 input injection using the XTest extension.

use super::{Capabilities, InputBackend, MouseButton};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::Command;
use std::time::Duration;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::ConnectionExt;
use x11rb::protocol::xtest;
use x11rb::xcb_ffi::XCBConnection;

const INPUT_KEY_PRESS: u8 = 2;
const INPUT_KEY_RELEASE: u8 = 3;
const INPUT_BUTTON_PRESS: u8 = 4;
const INPUT_BUTTON_RELEASE: u8 = 5;

const KEYSYM_SHIFT_L: u32 = 0xffe1;
const MAX_WHEEL_STEPS: i32 = 10;

/// Resolve a symbolic key name to an X keysym.
fn named_keysym(key: &str) -> Option<u32> {
    let keysym = match key.trim().to_ascii_lowercase().as_str() {
        "enter" => 0xff0d,
        "backspace" => 0xff08,
        "space" => 0x0020,
        "tab" => 0xff09,
        "esc" => 0xff1b,
        "delete" => 0xffff,
        "home" => 0xff50,
        "end" => 0xff57,
        "pageup" => 0xff55,
        "pagedown" => 0xff56,
        "up" => 0xff52,
        "down" => 0xff54,
        "left" => 0xff51,
        "right" => 0xff53,
        "ctrl" => 0xffe3,
        "alt" => 0xffe9,
        "shift" => KEYSYM_SHIFT_L,
        "win" | "winleft" => 0xffeb,
        "playpause" => 0x1008ff14,
        "nexttrack" => 0x1008ff17,
        "prevtrack" => 0x1008ff16,
        "stop" => 0x1008ff15,
        "volumemute" => 0x1008ff12,
        "volumeup" => 0x1008ff13,
        "volumedown" => 0x1008ff11,
        single if single.chars().count() == 1 => {
            let ch = single.chars().next().unwrap();
            char_keysym(ch)?.0
        }
        _ => return None,
    };
    Some(keysym)
}

/// Keysym plus shift requirement for one typed character.
fn char_keysym(ch: char) -> Option<(u32, bool)> {
    match ch {
        '\n' | '\r' => Some((0xff0d, false)),
        '\t' => Some((0xff09, false)),
        'A'..='Z' => Some((ch.to_ascii_lowercase() as u32, true)),
        c if (' '..='~').contains(&c) => Some((c as u32, false)),
        _ => None,
    }
}

/// XTest-backed input injector for X11 sessions.
pub struct X11Backend {
    conn: XCBConnection,
    root: u32,
    keysym_to_keycode: HashMap<u32, u8>,
    setup_size: (u16, u16),
    geometry_cache: Mutex<Option<(u32, u32)>>,
}

impl X11Backend {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let (conn, screen_num) = XCBConnection::connect(None)?;
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let setup_size = (screen.width_in_pixels, screen.height_in_pixels);

        // Cache the unshifted keysym of every keycode once.
        let mut keysym_to_keycode = HashMap::new();
        let min_keycode = conn.setup().min_keycode;
        let max_keycode = conn.setup().max_keycode;
        if let Ok(cookie) = conn.get_keyboard_mapping(min_keycode, max_keycode - min_keycode + 1) {
            if let Ok(mapping) = cookie.reply() {
                let per_code = mapping.keysyms_per_keycode as usize;
                for i in 0..=(max_keycode - min_keycode) as usize {
                    let offset = i * per_code;
                    if offset < mapping.keysyms.len() && mapping.keysyms[offset] != 0 {
                        keysym_to_keycode
                            .entry(mapping.keysyms[offset])
                            .or_insert((min_keycode as usize + i) as u8);
                    }
                }
            }
        }

        Ok(Self {
            conn,
            root,
            keysym_to_keycode,
            setup_size,
            geometry_cache: Mutex::new(None),
        })
    }

    fn keycode(&self, keysym: u32) -> Option<u8> {
        self.keysym_to_keycode.get(&keysym).copied()
    }

    fn fake_key(&self, keycode: u8, pressed: bool) -> bool {
        let input_type = if pressed { INPUT_KEY_PRESS } else { INPUT_KEY_RELEASE };
        xtest::fake_input(&self.conn, input_type, keycode, 0, self.root, 0, 0, 0).is_ok()
            && self.conn.flush().is_ok()
    }

    fn fake_button(&self, button: u8, pressed: bool) -> bool {
        let input_type = if pressed { INPUT_BUTTON_PRESS } else { INPUT_BUTTON_RELEASE };
        xtest::fake_input(&self.conn, input_type, button, 0, self.root, 0, 0, 0).is_ok()
            && self.conn.flush().is_ok()
    }

    fn tap_keysym(&self, keysym: u32, shifted: bool) -> bool {
        let Some(code) = self.keycode(keysym) else {
            return false;
        };
        let shift_code = if shifted { self.keycode(KEYSYM_SHIFT_L) } else { None };
        if let Some(shift) = shift_code {
            if !self.fake_key(shift, true) {
                return false;
            }
        }
        let ok = self.fake_key(code, true) && self.fake_key(code, false);
        if let Some(shift) = shift_code {
            self.fake_key(shift, false);
        }
        ok
    }

    fn button_code(button: MouseButton) -> u8 {
        match button {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
        }
    }

    /// Parse `xrandr --current` output into the active screen size.
    fn xrandr_screen_size() -> Option<(u32, u32)> {
        let out = crate::proc::run_capture(
            Command::new("xrandr").arg("--current"),
            Duration::from_secs(1),
        )?;
        parse_xrandr_current(&out)
    }
}

pub(crate) fn parse_xrandr_current(stdout: &str) -> Option<(u32, u32)> {
    for line in stdout.lines() {
        let Some((_, rest)) = line.split_once(" current ") else {
            continue;
        };
        let dims = rest.split(',').next()?.trim();
        let (w, h) = dims.split_once(" x ")?;
        return Some((w.trim().parse().ok()?, h.trim().parse().ok()?));
    }
    None
}

impl InputBackend for X11Backend {
    fn name(&self) -> &'static str {
        "linux_x11_xtest"
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
        let reply = self.conn.query_pointer(self.root).ok()?.reply().ok()?;
        Some((reply.root_x as i32, reply.root_y as i32))
    }

    fn screen_size(&self) -> Option<(u32, u32)> {
        if let Some(size) = *self.geometry_cache.lock() {
            return Some(size);
        }
        let size = Self::xrandr_screen_size()
            .unwrap_or((self.setup_size.0 as u32, self.setup_size.1 as u32));
        *self.geometry_cache.lock() = Some(size);
        Some(size)
    }

    fn move_rel(&self, dx: i32, dy: i32) -> bool {
        if dx == 0 && dy == 0 {
            return true;
        }
        let wx = dx.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        let wy = dy.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        // Warping with no destination window moves the pointer relatively.
        self.conn
            .warp_pointer(x11rb::NONE, x11rb::NONE, 0, 0, 0, 0, wx, wy)
            .is_ok()
            && self.conn.flush().is_ok()
    }

    fn click(&self, button: MouseButton, double: bool) -> bool {
        let code = Self::button_code(button);
        let count = if double { 2 } else { 1 };
        for _ in 0..count {
            if !(self.fake_button(code, true) && self.fake_button(code, false)) {
                return false;
            }
        }
        true
    }

    fn scroll(&self, dy: i32) -> bool {
        if dy == 0 {
            return true;
        }
        // Wheel maps to button 4 (up) / 5 (down), one pair per step.
        let button = if dy > 0 { 4 } else { 5 };
        for _ in 0..dy.abs().min(MAX_WHEEL_STEPS) {
            if !(self.fake_button(button, true) && self.fake_button(button, false)) {
                return false;
            }
        }
        true
    }

    fn mouse_down(&self, button: MouseButton) -> bool {
        self.fake_button(Self::button_code(button), true)
    }

    fn mouse_up(&self, button: MouseButton) -> bool {
        self.fake_button(Self::button_code(button), false)
    }

    fn write_text(&self, text: &str) -> bool {
        if text.is_empty() {
            return true;
        }
        let mut seq = Vec::with_capacity(text.chars().count());
        for ch in text.chars() {
            match char_keysym(ch) {
                Some(pair) => seq.push(pair),
                None => return false,
            }
        }
        for (keysym, shifted) in seq {
            if !self.tap_keysym(keysym, shifted) {
                return false;
            }
        }
        true
    }

    fn press(&self, key: &str) -> bool {
        match named_keysym(key) {
            Some(keysym) => self.tap_keysym(keysym, false),
            None => false,
        }
    }

    fn hotkey(&self, keys: &[String]) -> bool {
        let codes: Vec<u8> = keys
            .iter()
            .filter(|k| !k.trim().is_empty())
            .filter_map(|k| named_keysym(k).and_then(|s| self.keycode(s)))
            .collect();
        if codes.is_empty() {
            return false;
        }
        for &code in &codes {
            if !self.fake_key(code, true) {
                return false;
            }
        }
        for &code in codes.iter().rev() {
            self.fake_key(code, false);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xrandr_current_line_parses() {
        let sample = "Screen 0: minimum 320 x 200, current 2560 x 1440, maximum 16384 x 16384\n\
                      DP-1 connected primary 2560x1440+0+0";
        assert_eq!(parse_xrandr_current(sample), Some((2560, 1440)));
        assert_eq!(parse_xrandr_current("no geometry here"), None);
    }

    #[test]
    fn char_keysyms_cover_ascii() {
        assert_eq!(char_keysym('a'), Some((0x61, false)));
        assert_eq!(char_keysym('A'), Some((0x61, true)));
        assert_eq!(char_keysym(' '), Some((0x20, false)));
        assert_eq!(char_keysym('\n'), Some((0xff0d, false)));
        assert_eq!(char_keysym('é'), None);
    }

    #[test]
    fn named_keys_resolve() {
        assert_eq!(named_keysym("enter"), Some(0xff0d));
        assert_eq!(named_keysym("WIN"), Some(0xffeb));
        assert_eq!(named_keysym("volumeup"), Some(0x1008ff13));
        assert_eq!(named_keysym("x"), Some(0x78));
        assert_eq!(named_keysym("definitely-not-a-key"), None);
    }
}
