//! Advisory locks: per-entity in-flight guards and the scanner writer lease.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};

use craftvault_types::{CraftvaultError, Result};

// ---------------------------------------------------------------------------
// EntityLocks
// ---------------------------------------------------------------------------

/// Per-entity advisory locks: at most one in-flight orchestration step per
/// listing or escrow. A second attempt while the guard lives is Rejected —
/// the caller is told the operation is already running, nothing queues.
#[derive(Debug, Clone, Default)]
pub struct EntityLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

/// RAII guard; dropping it releases the entity.
#[derive(Debug)]
pub struct EntityGuard {
    key: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl EntityLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim `key` for the duration of the returned guard.
    ///
    /// # Errors
    /// Returns `OperationInFlight` if the key is already claimed.
    pub fn try_lock(&self, key: impl Into<String>) -> Result<EntityGuard> {
        let key = key.into();
        let mut held = self.held.lock().expect("entity lock set poisoned");
        if !held.insert(key.clone()) {
            return Err(CraftvaultError::OperationInFlight { entity: key });
        }
        Ok(EntityGuard {
            key,
            held: Arc::clone(&self.held),
        })
    }

    /// Number of entities currently claimed.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held.lock().expect("entity lock set poisoned").len()
    }
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .expect("entity lock set poisoned")
            .remove(&self.key);
    }
}

// ---------------------------------------------------------------------------
// Lease
// ---------------------------------------------------------------------------

/// The writer-lease record: who holds the scanner writer role for a catalog
/// and until when. A lease past its expiry is up for grabs; the holder
/// renews it every scan cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub holder: String,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
