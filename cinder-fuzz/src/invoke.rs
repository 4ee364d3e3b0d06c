//! Cancellable subprocess execution.
//!
//! Both toolchain invocations (clang, the fuzz target) block the
//! solving thread until the subprocess exits, so `cancel()` must be
//! able to kill the process from another thread. The child handle lives
//! behind a mutex; the waiting side polls `try_wait` under that lock
//! and the cancelling side kills under the same lock, so a kill can
//! never race a reap.

use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Shared state for one manager's active subprocess.
#[derive(Debug, Default)]
pub(crate) struct SubprocessHandle {
    child: Mutex<Option<Child>>,
    cancelled: AtomicBool,
}

impl SubprocessHandle {
    /// Whether a cancellation was requested. Never reset.
    pub(crate) fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation: raise the flag and kill the active child,
    /// if any. Idempotent, safe to call with no child running.
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Ok(mut slot) = self.child.lock()
            && let Some(child) = slot.as_mut()
        {
            let _ = child.kill();
        }
    }

    /// Spawn `cmd` and block until it exits or is cancelled. After a
    /// cancellation the returned status reflects the kill; callers must
    /// consult [`SubprocessHandle::cancelled`] to tell the cases apart.
    pub(crate) fn run(&self, cmd: &mut Command) -> io::Result<ExitStatus> {
        {
            let mut slot = self
                .child
                .lock()
                .map_err(|_| io::Error::other("subprocess lock poisoned"))?;
            let child = cmd.spawn()?;
            *slot = Some(child);
            // A cancel that landed between flag and spawn would miss the
            // child; re-check while still holding the lock.
            if self.cancelled()
                && let Some(child) = slot.as_mut()
            {
                let _ = child.kill();
            }
        }
        loop {
            {
                let mut slot = self
                    .child
                    .lock()
                    .map_err(|_| io::Error::other("subprocess lock poisoned"))?;
                let Some(child) = slot.as_mut() else {
                    return Err(io::Error::other("subprocess handle cleared"));
                };
                if let Some(status) = child.try_wait()? {
                    *slot = None;
                    return Ok(status);
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Build a `Stdio` for a captured stream: a file when quiet-mode
/// redirection asked for one, the parent's stream otherwise.
pub(crate) fn capture_to(path: Option<&Path>) -> io::Result<Stdio> {
    match path {
        Some(path) => Ok(Stdio::from(std::fs::File::create(path)?)),
        None => Ok(Stdio::inherit()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_runs_to_completion() {
        let handle = SubprocessHandle::default();
        let status = handle.run(&mut Command::new("true")).unwrap();
        assert!(status.success());
        assert!(!handle.cancelled());
    }

    #[test]
    fn test_cancel_kills_running_child() {
        let handle = Arc::new(SubprocessHandle::default());
        let canceller = Arc::clone(&handle);
        let waiter = std::thread::spawn(move || {
            let mut cmd = Command::new("sleep");
            cmd.arg("30");
            handle.run(&mut cmd)
        });
        std::thread::sleep(Duration::from_millis(100));
        canceller.cancel();
        let status = waiter.join().unwrap().unwrap();
        assert!(!status.success());
        assert!(canceller.cancelled());
    }

    #[test]
    fn test_cancel_without_child_is_harmless() {
        let handle = SubprocessHandle::default();
        handle.cancel();
        handle.cancel();
        assert!(handle.cancelled());
    }

    #[test]
    fn test_capture_to_file() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("out.txt");
        let handle = SubprocessHandle::default();
        let mut cmd = Command::new("echo");
        cmd.arg("hello");
        cmd.stdout(capture_to(Some(&log)).unwrap());
        let status = handle.run(&mut cmd).unwrap();
        assert!(status.success());
        let captured = std::fs::read_to_string(&log).unwrap();
        assert_eq!(captured.trim(), "hello");
    }
}
