//! Test-only helpers for isolating the global state area.
//!
//! Tests that touch `~/.config/crewkit` redirect HOME to a tempdir. HOME is
//! process-global, so those tests serialize on one lock for their lifetime.

use std::sync::{Mutex, MutexGuard, OnceLock};
use tempfile::TempDir;

static HOME_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct HomeGuard {
    _dir: TempDir,
    _lock: MutexGuard<'static, ()>,
    previous: Option<std::ffi::OsString>,
}

impl Drop for HomeGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(prev) => std::env::set_var("HOME", prev),
            None => std::env::remove_var("HOME"),
        }
    }
}

/// Point HOME at a fresh tempdir for the duration of the guard.
pub fn isolated_home() -> HomeGuard {
    let lock = HOME_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = TempDir::new().expect("temp home");
    let previous = std::env::var_os("HOME");
    std::env::set_var("HOME", dir.path());
    HomeGuard {
        _dir: dir,
        _lock: lock,
        previous,
    }
}
