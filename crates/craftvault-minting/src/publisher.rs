//! The content-publisher port.
//!
//! The store is content-addressed: the same bytes always yield the same
//! address, and a publish is durable (at-least-once) once it returns. The
//! real provider is an external collaborator behind this trait;
//! [`MemoryPublisher`] is the in-process reference used by tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;

use craftvault_types::{ContentAddress, Result};

/// Publishes raw bytes to the content-addressed store.
#[async_trait]
pub trait ContentPublisher: Send + Sync {
    /// Publish `bytes`, returning their content address. Idempotent per
    /// content hash; transient provider failures are expected and
    /// surfaced as Transient-class errors.
    async fn publish(&self, bytes: &[u8]) -> Result<ContentAddress>;
}

/// In-memory content store.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    stored: Mutex<HashMap<ContentAddress, Vec<u8>>>,
    publishes: AtomicU64,
}

impl MemoryPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve previously published bytes.
    #[must_use]
    pub fn fetch(&self, address: &ContentAddress) -> Option<Vec<u8>> {
        self.stored
            .lock()
            .expect("publisher poisoned")
            .get(address)
            .cloned()
    }

    /// Number of publish calls served (including idempotent re-publishes).
    #[must_use]
    pub fn publish_count(&self) -> u64 {
        self.publishes.load(Ordering::Relaxed)
    }

    /// Number of distinct addresses stored.
    #[must_use]
    pub fn stored_count(&self) -> usize {
        self.stored.lock().expect("publisher poisoned").len()
    }
}

#[async_trait]
impl ContentPublisher for MemoryPublisher {
    async fn publish(&self, bytes: &[u8]) -> Result<ContentAddress> {
        self.publishes.fetch_add(1, Ordering::Relaxed);
        let address = ContentAddress::for_bytes(bytes);
        self.stored
            .lock()
            .expect("publisher poisoned")
            .insert(address.clone(), bytes.to_vec());
        Ok(address)
    }
}
