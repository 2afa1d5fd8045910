//! Single-instance guard
//!
//! A lock file next to the ledger (`<ledger>.lock`) holds the pid of the
//! process that owns the ledger. A lock naming a live process stops the run;
//! a lock naming a dead process is stale and gets replaced.
//!
//! Checking and creating the lock are two steps, so two processes started at
//! the same instant can both get through. This guards against accidental
//! overlapping runs from a scheduler, nothing more.

use crate::error::{CliError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lock file path for a ledger
pub fn lock_path_for(ledger_path: &Path) -> PathBuf {
    let mut name: OsString = ledger_path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Holds the ledger lock; the lock file is removed on drop
#[derive(Debug)]
pub struct InstanceGuard {
    lock_path: PathBuf,
    pid: u32,
}

impl InstanceGuard {
    /// Acquire the lock for `ledger_path`.
    ///
    /// Fails with [`CliError::AlreadyRunning`] when the lock names a process
    /// that is still alive.
    pub fn acquire(ledger_path: impl AsRef<Path>) -> Result<Self> {
        let lock_path = lock_path_for(ledger_path.as_ref());

        if lock_path.exists() {
            let contents = std::fs::read_to_string(&lock_path)?;
            match contents.trim().parse::<u32>() {
                Ok(pid) if process_alive(pid) => {
                    return Err(CliError::AlreadyRunning { pid, lock_path });
                },
                Ok(pid) => {
                    warn!(pid, lock = %lock_path.display(), "Removing stale lock file");
                },
                Err(_) => {
                    warn!(lock = %lock_path.display(), "Removing unreadable lock file");
                },
            }
            std::fs::remove_file(&lock_path)?;
        }

        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let pid = std::process::id();
        std::fs::write(&lock_path, pid.to_string())?;
        debug!(pid, lock = %lock_path.display(), "Acquired ledger lock");

        Ok(Self { lock_path, pid })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        // Only remove a lock we still own
        let owned = std::fs::read_to_string(&self.lock_path)
            .map(|c| c.trim() == self.pid.to_string())
            .unwrap_or(false);
        if owned {
            if let Err(e) = std::fs::remove_file(&self.lock_path) {
                warn!(lock = %self.lock_path.display(), error = %e, "Failed to remove lock file");
            }
        }
    }
}

/// Whether a process with `pid` exists
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // Signal 0 performs the permission and existence checks only
    let rc = unsafe { libc::kill(pid, 0) };
    if rc == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/var/lib/.processes.db")),
            PathBuf::from("/var/lib/.processes.db.lock")
        );
    }

    #[test]
    fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let ledger = dir.path().join("ledger.db");

        let guard = InstanceGuard::acquire(&ledger).unwrap();
        let lock = guard.lock_path().to_path_buf();
        assert_eq!(
            std::fs::read_to_string(&lock).unwrap(),
            std::process::id().to_string()
        );

        drop(guard);
        assert!(!lock.exists());
    }

    #[test]
    fn test_live_lock_fails_fast() {
        let dir = TempDir::new().unwrap();
        let ledger = dir.path().join("ledger.db");
        let lock = lock_path_for(&ledger);
        std::fs::write(&lock, std::process::id().to_string()).unwrap();

        let result = InstanceGuard::acquire(&ledger);
        assert!(matches!(result, Err(CliError::AlreadyRunning { .. })));
        // the other run's lock is untouched
        assert!(lock.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_lock_is_replaced() {
        let dir = TempDir::new().unwrap();
        let ledger = dir.path().join("ledger.db");
        let lock = lock_path_for(&ledger);

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();
        std::fs::write(&lock, dead_pid.to_string()).unwrap();

        let guard = InstanceGuard::acquire(&ledger).unwrap();
        assert_eq!(guard.pid(), std::process::id());
    }

    #[test]
    fn test_garbage_lock_is_replaced() {
        let dir = TempDir::new().unwrap();
        let ledger = dir.path().join("ledger.db");
        std::fs::write(lock_path_for(&ledger), "not a pid").unwrap();

        assert!(InstanceGuard::acquire(&ledger).is_ok());
    }
}
