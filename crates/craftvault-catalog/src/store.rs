//! The `CatalogStore` trait — the contract every backend implements.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use craftvault_types::{
    AccountId, Certificate, CertificateId, EscrowId, EscrowSnapshot, Listing, ListingId,
    MintCheckpoint, PendingHandle, ReconcileCursor, Result,
};

/// A submitted-but-unobserved escrow creation, persisted by the gateway so
/// a crash between submission and the scanner's first sighting loses
/// nothing. The scanner clears it when the creation event lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowIntent {
    pub listing: ListingId,
    pub certificate: CertificateId,
    pub buyer: AccountId,
    pub amount: Decimal,
    pub handle: PendingHandle,
}

/// Key-addressed read/update of Listing, Certificate, Escrow, and Cursor
/// records.
///
/// Listing writes are optimistic: `update_listing` fails with
/// `VersionConflict` when the stored version differs from the version the
/// caller read. Escrow upserts are idempotent — re-applying an already
/// applied snapshot is a no-op, which is what lets the scanner replay a
/// batch after a crash.
pub trait CatalogStore: Send + Sync {
    // --- Listings -------------------------------------------------------

    /// Store a new listing. The stored copy starts at version 1.
    fn create_listing(&self, listing: Listing) -> Result<Listing>;

    /// Fetch a listing by id.
    fn listing(&self, id: ListingId) -> Result<Listing>;

    /// Optimistic update: succeeds only if the stored version equals
    /// `listing.version`; returns the stored copy with the bumped version.
    fn update_listing(&self, listing: &Listing) -> Result<Listing>;

    /// Listing owning the given certificate, if any.
    fn listing_for_certificate(&self, certificate: CertificateId) -> Result<Option<Listing>>;

    // --- Certificates ---------------------------------------------------

    fn put_certificate(&self, certificate: Certificate) -> Result<()>;

    fn certificate(&self, id: CertificateId) -> Result<Certificate>;

    // --- Escrow snapshots ----------------------------------------------

    /// Idempotent upsert keyed by escrow id.
    fn upsert_escrow(&self, snapshot: EscrowSnapshot) -> Result<()>;

    fn escrow(&self, id: EscrowId) -> Result<Option<EscrowSnapshot>>;

    // --- Mint checkpoints ----------------------------------------------

    fn save_checkpoint(&self, checkpoint: &MintCheckpoint) -> Result<()>;

    fn checkpoint(&self, listing: ListingId) -> Result<Option<MintCheckpoint>>;

    fn clear_checkpoint(&self, listing: ListingId) -> Result<()>;

    // --- Escrow intents -------------------------------------------------

    fn save_intent(&self, intent: &EscrowIntent) -> Result<()>;

    fn intent_for_certificate(&self, certificate: CertificateId) -> Result<Option<EscrowIntent>>;

    fn clear_intent(&self, certificate: CertificateId) -> Result<()>;

    // --- Reconciliation cursor -----------------------------------------

    fn load_cursor(&self) -> Result<ReconcileCursor>;

    /// Persist the cursor. Callers must have durably applied every event up
    /// to the cursor's position first (apply-then-advance).
    fn store_cursor(&self, cursor: ReconcileCursor) -> Result<()>;

    // --- Writer lease ---------------------------------------------------

    /// Acquire or renew the scanner writer lease. Fails with `LeaseHeld`
    /// while another holder's lease is unexpired.
    fn acquire_lease(&self, holder: &str, ttl: Duration, now: DateTime<Utc>) -> Result<()>;

    /// Drop the lease if `holder` owns it; no-op otherwise.
    fn release_lease(&self, holder: &str) -> Result<()>;
}
