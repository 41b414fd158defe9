//! Bounded subprocess helpers.
//!
//! Every external tool the server shells out to (clipboard, geometry,
//! typing) is blocking I/O and must not hang a worker thread forever: each
//! helper polls the child and kills it once the deadline passes.

use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

fn wait_with_timeout(mut child: Child, timeout: Duration) -> Option<Child> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return Some(child),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(_) => return None,
        }
    }
}

fn finished_ok(child: &mut Child) -> bool {
    matches!(child.try_wait(), Ok(Some(status)) if status.success())
}

/// Run a command to completion within `timeout`; true on exit status 0.
pub(crate) fn run_status(cmd: &mut Command, timeout: Duration) -> bool {
    let child = match cmd.stdout(Stdio::null()).stderr(Stdio::null()).spawn() {
        Ok(child) => child,
        Err(_) => return false,
    };
    match wait_with_timeout(child, timeout) {
        Some(mut child) => finished_ok(&mut child),
        None => false,
    }
}

/// Feed `payload` on stdin and wait within `timeout`; true on status 0.
pub(crate) fn run_stdin(cmd: &mut Command, payload: &[u8], timeout: Duration) -> bool {
    let mut child = match cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => return false,
    };
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(payload);
    }
    match wait_with_timeout(child, timeout) {
        Some(mut child) => finished_ok(&mut child),
        None => false,
    }
}

/// Capture stdout of a command finishing within `timeout`.
pub(crate) fn run_capture(cmd: &mut Command, timeout: Duration) -> Option<String> {
    let child = match cmd.stdout(Stdio::piped()).stderr(Stdio::null()).spawn() {
        Ok(child) => child,
        Err(_) => return None,
    };
    let mut child = wait_with_timeout(child, timeout)?;
    if !finished_ok(&mut child) {
        return None;
    }
    let mut out = String::new();
    use std::io::Read;
    child.stdout.take()?.read_to_string(&mut out).ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reports_success_and_failure() {
        assert!(run_status(
            Command::new("sh").args(["-c", "exit 0"]),
            Duration::from_secs(2)
        ));
        assert!(!run_status(
            Command::new("sh").args(["-c", "exit 3"]),
            Duration::from_secs(2)
        ));
        assert!(!run_status(
            &mut Command::new("cyberdeck-no-such-binary"),
            Duration::from_secs(2)
        ));
    }

    #[test]
    fn hung_child_is_killed_at_deadline() {
        let started = Instant::now();
        let ok = run_status(
            Command::new("sh").args(["-c", "sleep 30"]),
            Duration::from_millis(150),
        );
        assert!(!ok);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn capture_returns_stdout() {
        let out = run_capture(
            Command::new("sh").args(["-c", "printf hello"]),
            Duration::from_secs(2),
        );
        assert_eq!(out.as_deref(), Some("hello"));
    }

    #[test]
    fn stdin_payload_reaches_child() {
        assert!(run_stdin(
            Command::new("sh").args(["-c", "grep -q payload"]),
            b"payload\n",
            Duration::from_secs(2),
        ));
    }
}
