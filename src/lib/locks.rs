//! Per-username mutual exclusion
//!
//! Create and revoke for the same username are serialised inside one
//! process; different usernames never wait on each other. The host's
//! account set is still owned by the external tool, so this does not
//! protect against a second process driving it.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Set of usernames currently held, plus a condvar to wait for release
#[derive(Debug, Default)]
pub struct KeyedLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free, then hold it until the guard drops
    pub fn acquire(&self, key: &str) -> KeyGuard<'_> {
        let mut held = self.lock_set();
        while held.contains(key) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        held.insert(key.to_string());

        KeyGuard {
            locks: self,
            key: key.to_string(),
        }
    }

    #[cfg(test)]
    fn is_held(&self, key: &str) -> bool {
        self.lock_set().contains(key)
    }

    fn release(&self, key: &str) {
        self.lock_set().remove(key);
        self.released.notify_all();
    }

    // Poisoning is ignored: every update is a single insert or remove
    fn lock_set(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases its key on drop
#[derive(Debug)]
pub struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.key);
    }
}
