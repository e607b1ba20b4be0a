//! Per-instance serialization of decisions.
//!
//! The state read, cooldown check, resize call and state write for one
//! instance must not interleave with another decision for the same
//! instance. Different instances never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// One async mutex per instance key, created on demand and dropped when
/// nobody holds or waits for it.
#[derive(Clone, Default)]
pub struct InstanceLocks {
    inner: Arc<Mutex<LockMap>>,
}

/// Held for the duration of one instance's decision.
pub struct InstanceGuard {
    key: String,
    locks: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other decision holds `key`, then hold it.
    pub async fn acquire(&self, key: &str) -> InstanceGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key.to_string()).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        InstanceGuard {
            key: key.to_string(),
            locks: self.inner.clone(),
            guard: Some(guard),
        }
    }

    /// Number of instances with a live lock entry.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        // Release first so the strong count below only sees waiters.
        drop(self.guard.take());
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = map.get(&self.key)
            && Arc::strong_count(lock) == 1
        {
            map.remove(&self.key);
        }
    }
}
