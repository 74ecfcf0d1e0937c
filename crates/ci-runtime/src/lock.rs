use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

const LOCK_RETRIES: u32 = 5;
const LOCK_BASE_BACKOFF: Duration = Duration::from_millis(100);

/// Exclusive lock file, held for the lifetime of this value. Dropped (and
/// the file removed) when the daemon releases it or exits.
pub struct DaemonLock {
    path: PathBuf,
}

impl DaemonLock {
    /// Non-blocking acquire with five retries at doubling backoff —
    /// `100ms, 200ms, 400ms, 800ms, 1600ms` — so two concurrent `start`
    /// calls resolve to exactly one winner within about 3 seconds instead
    /// of racing on file creation.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut attempt = 0;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => return Ok(Self { path: path.to_path_buf() }),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                    if attempt >= LOCK_RETRIES {
                        return Err(Error::AlreadyRunning);
                    }
                    std::thread::sleep(LOCK_BASE_BACKOFF * 2u32.pow(attempt - 1));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Writes the current process's pid to `path`, overwriting any stale value.
pub fn write_pid_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, std::process::id().to_string())?;
    Ok(())
}

pub fn remove_pid_file(path: &Path) {
    let _ = std::fs::remove_file(path);
}

/// Reads a pid file and reports whether that process still exists. Does
/// not check health — callers combine this with a `/api/health` probe for
/// the full liveness definition (spec §4.1).
pub fn pid_file_process_alive(path: &Path) -> bool {
    let Ok(raw) = std::fs::read_to_string(path) else { return false };
    let Ok(pid) = raw.trim().parse::<i32>() else { return false };
    process_alive(pid)
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    // Signal 0 performs no-op delivery: error means the pid is gone or not ours.
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    true
}

/// Removes a pid file that points at a process which is no longer alive.
pub fn clear_stale_pid_file(path: &Path) {
    if path.exists() && !pid_file_process_alive(path) {
        remove_pid_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_on_a_held_lock_fails_fast_in_tests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.lock");
        let _first = DaemonLock::acquire(&path).unwrap();
        let second = DaemonLock::acquire(&path);
        assert!(matches!(second, Err(Error::AlreadyRunning)));
    }

    #[test]
    fn lock_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.lock");
        {
            let _lock = DaemonLock::acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn pid_file_roundtrips_and_reports_self_alive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.pid");
        write_pid_file(&path).unwrap();
        assert!(pid_file_process_alive(&path));
    }
}
