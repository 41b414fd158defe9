//! Windows input injection.
//!
//! Two tiers: the high-level enigo automation layer is the primary path,
//! and raw Win32 SendInput calls back it up when that layer is missing or
//! rejected. The `force_*` helpers expose the raw tier directly so the
//! dispatcher can retry an event that the primary backend dropped.

use super::enigo::EnigoBackend;
use super::{Capabilities, InputBackend, MouseButton};
use log::warn;
use windows::Win32::Foundation::{LPARAM, POINT, WPARAM};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, VkKeyScanW, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT,
    KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN,
    MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY, VK_BACK,
    VK_CONTROL, VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE, VK_HOME, VK_LEFT, VK_LWIN,
    VK_MEDIA_NEXT_TRACK, VK_MEDIA_PLAY_PAUSE, VK_MEDIA_PREV_TRACK, VK_MEDIA_STOP, VK_MENU,
    VK_NEXT, VK_PRIOR, VK_RETURN, VK_RIGHT, VK_SHIFT, VK_SPACE, VK_TAB, VK_UP, VK_VOLUME_DOWN,
    VK_VOLUME_MUTE, VK_VOLUME_UP,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetForegroundWindow, GetSystemMetrics, SendMessageW, SetCursorPos, SM_CXSCREEN,
    SM_CYSCREEN, WM_CHAR,
};

const WHEEL_DELTA: i32 = 120;

fn named_virtual_key(key: &str) -> Option<VIRTUAL_KEY> {
    let vk = match key.trim().to_ascii_lowercase().as_str() {
        "enter" => VK_RETURN,
        "backspace" => VK_BACK,
        "space" => VK_SPACE,
        "win" | "winleft" => VK_LWIN,
        "ctrl" => VK_CONTROL,
        "alt" => VK_MENU,
        "shift" => VK_SHIFT,
        "tab" => VK_TAB,
        "esc" => VK_ESCAPE,
        "delete" => VK_DELETE,
        "home" => VK_HOME,
        "end" => VK_END,
        "pageup" => VK_PRIOR,
        "pagedown" => VK_NEXT,
        "up" => VK_UP,
        "down" => VK_DOWN,
        "left" => VK_LEFT,
        "right" => VK_RIGHT,
        "playpause" => VK_MEDIA_PLAY_PAUSE,
        "nexttrack" => VK_MEDIA_NEXT_TRACK,
        "prevtrack" => VK_MEDIA_PREV_TRACK,
        "stop" => VK_MEDIA_STOP,
        "volumemute" => VK_VOLUME_MUTE,
        "volumeup" => VK_VOLUME_UP,
        "volumedown" => VK_VOLUME_DOWN,
        single if single.chars().count() == 1 => {
            let ch = single.chars().next().unwrap();
            let scan = unsafe { VkKeyScanW(ch as u16) };
            if scan == -1 {
                return None;
            }
            VIRTUAL_KEY((scan & 0xff) as u16)
        }
        _ => return None,
    };
    Some(vk)
}

fn send_mouse(flags: MOUSE_EVENT_FLAGS, dx: i32, dy: i32, data: i32) -> bool {
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: data as u32,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) == 1 }
}

fn send_key(vk: VIRTUAL_KEY, pressed: bool) -> bool {
    let input = INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: 0,
                dwFlags: if pressed {
                    KEYBD_EVENT_FLAGS(0)
                } else {
                    KEYEVENTF_KEYUP
                },
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) == 1 }
}

fn tap_key(vk: VIRTUAL_KEY) -> bool {
    send_key(vk, true) && send_key(vk, false)
}

fn button_flags(button: MouseButton) -> (MOUSE_EVENT_FLAGS, MOUSE_EVENT_FLAGS) {
    match button {
        MouseButton::Left => (MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP),
        MouseButton::Right => (MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP),
        MouseButton::Middle => (MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP),
    }
}

fn cursor_position() -> Option<(i32, i32)> {
    let mut pt = POINT::default();
    unsafe { GetCursorPos(&mut pt).ok()? };
    Some((pt.x, pt.y))
}

/// Raw pointer move bypassing the primary automation layer.
pub fn force_move_rel(dx: i32, dy: i32) -> bool {
    if dx == 0 && dy == 0 {
        return true;
    }
    if let Some((x, y)) = cursor_position() {
        if unsafe { SetCursorPos(x + dx, y + dy) }.is_ok() {
            return true;
        }
    }
    // Last-resort relative move event.
    send_mouse(MOUSEEVENTF_MOVE, dx, dy, 0)
}

/// Raw click bypassing the primary automation layer.
pub fn force_click(button: MouseButton, double: bool) -> bool {
    let (down, up) = button_flags(button);
    let count = if double { 2 } else { 1 };
    let mut ok = true;
    for _ in 0..count {
        ok = send_mouse(down, 0, 0, 0) && send_mouse(up, 0, 0, 0) && ok;
    }
    ok
}

/// Raw wheel event bypassing the primary automation layer.
pub fn force_scroll(dy: i32) -> bool {
    if dy == 0 {
        return true;
    }
    send_mouse(MOUSEEVENTF_WHEEL, 0, 0, dy * WHEEL_DELTA)
}

/// Raw button press/release bypassing the primary automation layer.
pub fn force_button(down: bool, button: MouseButton) -> bool {
    let (down_flag, up_flag) = button_flags(button);
    send_mouse(if down { down_flag } else { up_flag }, 0, 0, 0)
}

/// Push characters straight at the foreground window.
///
/// Last-resort text path for elevated or otherwise input-blocked targets.
pub fn send_text_to_foreground(text: &str) -> bool {
    let hwnd = unsafe { GetForegroundWindow() };
    if hwnd.0.is_null() {
        return false;
    }
    for unit in text.encode_utf16() {
        unsafe {
            SendMessageW(hwnd, WM_CHAR, WPARAM(unit as usize), LPARAM(0));
        }
    }
    true
}

/// Windows injector: enigo primary, SendInput fallback.
pub struct WindowsBackend {
    primary: Option<EnigoBackend>,
}

impl WindowsBackend {
    pub fn new() -> Self {
        let primary = match EnigoBackend::new() {
            Ok(backend) => Some(backend),
            Err(err) => {
                warn!("Windows automation layer init failed: {}", err);
                None
            }
        };
        Self { primary }
    }

    fn primary(&self) -> Option<&EnigoBackend> {
        self.primary.as_ref()
    }
}

impl InputBackend for WindowsBackend {
    fn name(&self) -> &'static str {
        "windows_enigo_sendinput"
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
        if let Some(pos) = self.primary().and_then(|p| p.position()) {
            return Some(pos);
        }
        cursor_position()
    }

    fn screen_size(&self) -> Option<(u32, u32)> {
        if let Some(size) = self.primary().and_then(|p| p.screen_size()) {
            return Some(size);
        }
        let w = unsafe { GetSystemMetrics(SM_CXSCREEN) };
        let h = unsafe { GetSystemMetrics(SM_CYSCREEN) };
        if w <= 0 || h <= 0 {
            return None;
        }
        Some((w as u32, h as u32))
    }

    fn move_rel(&self, dx: i32, dy: i32) -> bool {
        if self.primary().map(|p| p.move_rel(dx, dy)).unwrap_or(false) {
            return true;
        }
        force_move_rel(dx, dy)
    }

    fn click(&self, button: MouseButton, double: bool) -> bool {
        if self
            .primary()
            .map(|p| p.click(button, double))
            .unwrap_or(false)
        {
            return true;
        }
        force_click(button, double)
    }

    fn scroll(&self, dy: i32) -> bool {
        if self.primary().map(|p| p.scroll(dy)).unwrap_or(false) {
            return true;
        }
        force_scroll(dy)
    }

    fn mouse_down(&self, button: MouseButton) -> bool {
        if self.primary().map(|p| p.mouse_down(button)).unwrap_or(false) {
            return true;
        }
        force_button(true, button)
    }

    fn mouse_up(&self, button: MouseButton) -> bool {
        if self.primary().map(|p| p.mouse_up(button)).unwrap_or(false) {
            return true;
        }
        force_button(false, button)
    }

    fn write_text(&self, text: &str) -> bool {
        if text.is_empty() {
            return true;
        }
        if self.primary().map(|p| p.write_text(text)).unwrap_or(false) {
            return true;
        }
        for ch in text.chars() {
            let scan = unsafe { VkKeyScanW(ch as u16) };
            if scan == -1 {
                return false;
            }
            let vk = VIRTUAL_KEY((scan & 0xff) as u16);
            let shifted = (scan >> 8) & 0x01 != 0;
            let ok = if shifted {
                send_key(VK_SHIFT, true) && tap_key(vk) && send_key(VK_SHIFT, false)
            } else {
                tap_key(vk)
            };
            if !ok {
                return false;
            }
        }
        true
    }

    fn press(&self, key: &str) -> bool {
        if self.primary().map(|p| p.press(key)).unwrap_or(false) {
            return true;
        }
        match named_virtual_key(key) {
            Some(vk) => tap_key(vk),
            None => false,
        }
    }

    fn hotkey(&self, keys: &[String]) -> bool {
        if self.primary().map(|p| p.hotkey(keys)).unwrap_or(false) {
            return true;
        }
        let vks: Vec<VIRTUAL_KEY> = keys
            .iter()
            .filter(|k| !k.trim().is_empty())
            .filter_map(|k| named_virtual_key(k))
            .collect();
        if vks.is_empty() {
            return false;
        }
        for &vk in &vks {
            if !send_key(vk, true) {
                return false;
            }
        }
        for &vk in vks.iter().rev() {
            send_key(vk, false);
        }
        true
    }
}
