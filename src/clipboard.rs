//! System clipboard integration for the text-injection fallback path.
//!
//! Copies text through the platform toolchain (`wl-copy`, `xclip`, `xsel`,
//! `pbcopy`); the dispatcher then issues a paste chord. All helpers shell out
//! and must run off the async reactor.

use crate::config::is_wayland_session;
use crate::proc;
use std::process::Command;
use std::time::Duration;

const COPY_TIMEOUT: Duration = Duration::from_secs(2);

fn copy_with(cmd: &str, args: &[&str], payload: &[u8]) -> bool {
    proc::run_stdin(Command::new(cmd).args(args), payload, COPY_TIMEOUT)
}

/// Copy text to the system clipboard through the first working tool.
pub fn copy_text(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let payload = text.as_bytes();

    if cfg!(target_os = "linux") {
        if is_wayland_session()
            && copy_with("wl-copy", &["--type", "text/plain;charset=utf-8"], payload)
        {
            return true;
        }
        if copy_with("xclip", &["-selection", "clipboard", "-in"], payload) {
            return true;
        }
        return copy_with("xsel", &["--clipboard", "--input"], payload);
    }
    if cfg!(target_os = "macos") {
        return copy_with("pbcopy", &[], payload);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_rejected() {
        assert!(!copy_text(""));
    }

    #[test]
    fn missing_tool_fails_cleanly() {
        assert!(!copy_with("cyberdeck-no-such-binary", &[], b"payload"));
    }
}
