//! In-memory catalog backend.
//!
//! The reference implementation of [`CatalogStore`]: RwLock'd maps with the
//! same observable semantics a durable backend must provide — optimistic
//! listing versions, idempotent escrow upserts, apply-then-advance cursor
//! persistence, and an expiring writer lease.

use std::{
    collections::HashMap,
    sync::{Mutex, RwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};

use craftvault_types::{
    Certificate, CertificateId, CraftvaultError, EscrowId, EscrowSnapshot, Listing, ListingId,
    MintCheckpoint, ReconcileCursor, Result,
};

use crate::{
    lock::Lease,
    store::{CatalogStore, EscrowIntent},
};

/// In-memory [`CatalogStore`].
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    listings: RwLock<HashMap<ListingId, Listing>>,
    certificates: RwLock<HashMap<CertificateId, Certificate>>,
    escrows: RwLock<HashMap<EscrowId, EscrowSnapshot>>,
    checkpoints: RwLock<HashMap<ListingId, MintCheckpoint>>,
    intents: RwLock<HashMap<CertificateId, EscrowIntent>>,
    cursor: RwLock<ReconcileCursor>,
    lease: Mutex<Option<Lease>>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored listings.
    #[must_use]
    pub fn listing_count(&self) -> usize {
        self.listings.read().expect("listings poisoned").len()
    }

    /// Number of stored escrow snapshots.
    #[must_use]
    pub fn escrow_count(&self) -> usize {
        self.escrows.read().expect("escrows poisoned").len()
    }
}

impl CatalogStore for MemoryCatalog {
    fn create_listing(&self, mut listing: Listing) -> Result<Listing> {
        let mut listings = self.listings.write().expect("listings poisoned");
        if listings.contains_key(&listing.id) {
            return Err(CraftvaultError::Internal(format!(
                "listing {} already exists",
                listing.id
            )));
        }
        listing.version = 1;
        listings.insert(listing.id, listing.clone());
        Ok(listing)
    }

    fn listing(&self, id: ListingId) -> Result<Listing> {
        self.listings
            .read()
            .expect("listings poisoned")
            .get(&id)
            .cloned()
            .ok_or(CraftvaultError::ListingNotFound(id))
    }

    fn update_listing(&self, listing: &Listing) -> Result<Listing> {
        let mut listings = self.listings.write().expect("listings poisoned");
        let stored = listings
            .get_mut(&listing.id)
            .ok_or(CraftvaultError::ListingNotFound(listing.id))?;
        if stored.version != listing.version {
            return Err(CraftvaultError::VersionConflict {
                expected: listing.version,
                stored: stored.version,
            });
        }
        let mut updated = listing.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    fn listing_for_certificate(&self, certificate: CertificateId) -> Result<Option<Listing>> {
        Ok(self
            .listings
            .read()
            .expect("listings poisoned")
            .values()
            .find(|l| l.certificate == Some(certificate))
            .cloned())
    }

    fn put_certificate(&self, certificate: Certificate) -> Result<()> {
        self.certificates
            .write()
            .expect("certificates poisoned")
            .insert(certificate.id, certificate);
        Ok(())
    }

    fn certificate(&self, id: CertificateId) -> Result<Certificate> {
        self.certificates
            .read()
            .expect("certificates poisoned")
            .get(&id)
            .cloned()
            .ok_or(CraftvaultError::CertificateUnknown(id))
    }

    fn upsert_escrow(&self, snapshot: EscrowSnapshot) -> Result<()> {
        self.escrows
            .write()
            .expect("escrows poisoned")
            .insert(snapshot.id, snapshot);
        Ok(())
    }

    fn escrow(&self, id: EscrowId) -> Result<Option<EscrowSnapshot>> {
        Ok(self
            .escrows
            .read()
            .expect("escrows poisoned")
            .get(&id)
            .cloned())
    }

    fn save_checkpoint(&self, checkpoint: &MintCheckpoint) -> Result<()> {
        self.checkpoints
            .write()
            .expect("checkpoints poisoned")
            .insert(checkpoint.listing, checkpoint.clone());
        Ok(())
    }

    fn checkpoint(&self, listing: ListingId) -> Result<Option<MintCheckpoint>> {
        Ok(self
            .checkpoints
            .read()
            .expect("checkpoints poisoned")
            .get(&listing)
            .cloned())
    }

    fn clear_checkpoint(&self, listing: ListingId) -> Result<()> {
        self.checkpoints
            .write()
            .expect("checkpoints poisoned")
            .remove(&listing);
        Ok(())
    }

    fn save_intent(&self, intent: &EscrowIntent) -> Result<()> {
        self.intents
            .write()
            .expect("intents poisoned")
            .insert(intent.certificate, intent.clone());
        Ok(())
    }

    fn intent_for_certificate(&self, certificate: CertificateId) -> Result<Option<EscrowIntent>> {
        Ok(self
            .intents
            .read()
            .expect("intents poisoned")
            .get(&certificate)
            .cloned())
    }

    fn clear_intent(&self, certificate: CertificateId) -> Result<()> {
        self.intents
            .write()
            .expect("intents poisoned")
            .remove(&certificate);
        Ok(())
    }

    fn load_cursor(&self) -> Result<ReconcileCursor> {
        Ok(*self.cursor.read().expect("cursor poisoned"))
    }

    fn store_cursor(&self, cursor: ReconcileCursor) -> Result<()> {
        let mut stored = self.cursor.write().expect("cursor poisoned");
        // Re-storing the same position is legal (idempotent replay);
        // moving backwards — including back to genesis — is not.
        let regression = match (stored.applied_through, cursor.applied_through) {
            (Some(current), Some(proposed)) => proposed < current,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if regression {
            return Err(CraftvaultError::CursorRegression {
                current: stored.applied_through.unwrap_or_default(),
                proposed: cursor.applied_through.unwrap_or_default(),
            });
        }
        *stored = cursor;
        Ok(())
    }

    fn acquire_lease(&self, holder: &str, ttl: Duration, now: DateTime<Utc>) -> Result<()> {
        let mut lease = self.lease.lock().expect("lease poisoned");
        if let Some(current) = lease.as_ref() {
            if current.holder != holder && !current.is_expired(now) {
                return Err(CraftvaultError::LeaseHeld {
                    holder: current.holder.clone(),
                });
            }
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CraftvaultError::Configuration(format!("lease ttl: {e}")))?;
        *lease = Some(Lease {
            holder: holder.to_string(),
            expires_at: now + ttl,
        });
        Ok(())
    }

    fn release_lease(&self, holder: &str) -> Result<()> {
        let mut lease = self.lease.lock().expect("lease poisoned");
        if lease.as_ref().is_some_and(|l| l.holder == holder) {
            *lease = None;
        }
        Ok(())
    }
}
