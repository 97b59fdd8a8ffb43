//! Per-resource-key mutual exclusion.
//!
//! The record store is single-record atomic with no transactions, so
//! every check-then-act sequence in this core (supersede-and-issue a
//! code, conflict-check a slot, admit against a load ceiling) is
//! serialized on a derived string key. Locks are held only for the
//! duration of the local read+write; never across a collaborator call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// How large the key map may grow before stale entries are swept.
const SWEEP_THRESHOLD: usize = 1024;

/// A table of named mutexes, one per resource key.
///
/// `acquire` hands back the `Arc<Mutex<()>>` for the key; the caller
/// locks it for the critical section:
///
/// ```ignore
/// let cell = locks.acquire(&key);
/// let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);
/// // read, check, write
/// ```
pub struct KeyedLocks {
    entries: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get (or create) the mutex for `key`.
    ///
    /// The guard of the returned mutex protects no data; a poisoned
    /// guard is still a valid exclusion token, so callers recover it
    /// with `PoisonError::into_inner`.
    pub fn acquire(&self, key: &str) -> Arc<Mutex<()>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() > SWEEP_THRESHOLD {
            // Drop mutexes nobody is currently holding or waiting on.
            entries.retain(|_, cell| Arc::strong_count(cell) > 1);
        }
        entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn same_key_returns_same_mutex() {
        let locks = KeyedLocks::new();
        let a = locks.acquire("caregiver:T1:2024-06-01:09:00-10:00");
        let b = locks.acquire("caregiver:T1:2024-06-01:09:00-10:00");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_keys_are_independent() {
        let locks = KeyedLocks::new();
        let a = locks.acquire("specialist:A");
        let b = locks.acquire("specialist:B");
        assert!(!Arc::ptr_eq(&a, &b));

        // Holding one must not block the other.
        let _guard_a = a.lock().unwrap();
        let guard_b = b.try_lock();
        assert!(guard_b.is_ok());
    }

    #[test]
    fn serializes_read_modify_write_on_one_key() {
        let locks = Arc::new(KeyedLocks::new());
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let cell = locks.acquire("shared");
                    let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);
                    // Non-atomic read-then-write; only correct under the lock.
                    let seen = counter.load(Ordering::Relaxed);
                    counter.store(seen + 1, Ordering::Relaxed);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::Relaxed), 800);
    }

    #[test]
    fn sweep_keeps_held_locks() {
        let locks = KeyedLocks::new();
        let held = locks.acquire("held");
        let _guard = held.lock().unwrap();

        // Grow past the sweep threshold with one-shot keys.
        for i in 0..(SWEEP_THRESHOLD + 2) {
            let _ = locks.acquire(&format!("transient:{i}"));
        }

        // The held key must still map to the same mutex.
        let again = locks.acquire("held");
        assert!(Arc::ptr_eq(&held, &again));
    }
}
