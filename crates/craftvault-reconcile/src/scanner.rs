//! The reconciliation scan cycle.
//!
//! Each cycle: renew the writer lease, load the cursor, query escrow logs
//! up to the safe head (ledger head minus the confirmation-depth margin),
//! apply each decoded event in (block, log index) order through the pure
//! transition function, and persist the cursor only after every event in
//! the batch has been durably applied. A crash between apply and cursor
//! persistence re-applies the batch on restart; the transition function
//! rejects the replays and the catalog upserts absorb them.

use std::sync::Arc;

use craftvault_catalog::CatalogStore;
use craftvault_escrow::{Transition, transition};
use craftvault_ledger::LedgerClient;
use craftvault_types::{
    Certificate, CraftvaultError, DecodedEvent, EscrowEvent, EscrowSnapshot, EscrowStatus,
    EventTopic, ListingStage, Result, ScanConfig,
};

use crate::scheduler::Ticker;

/// Counters for one scan cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanMetrics {
    /// Events that produced an accepted transition.
    pub applied: usize,
    /// Duplicate or out-of-order events rejected by the state machine.
    pub rejected: usize,
    /// Logs matching a subscribed topic that failed to decode.
    pub undecodable: usize,
}

/// The single writer of escrow status for one catalog.
pub struct ReconcileScanner {
    catalog: Arc<dyn CatalogStore>,
    ledger: Arc<LedgerClient>,
    config: ScanConfig,
    /// Lease holder identity, unique per deployment instance.
    holder: String,
}

impl ReconcileScanner {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        ledger: Arc<LedgerClient>,
        config: ScanConfig,
        holder: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            ledger,
            config,
            holder: holder.into(),
        }
    }

    /// Run scan cycles until the ticker stops. Rejected-class errors (the
    /// writer lease held elsewhere) skip the cycle; Transient errors are
    /// logged and retried next tick; Fatal errors stop the loop.
    pub async fn run<T: Ticker>(&self, mut ticker: T) {
        while ticker.tick().await {
            match self.scan_once().await {
                Ok(metrics) => {
                    if metrics.applied > 0 || metrics.undecodable > 0 {
                        tracing::info!(
                            applied = metrics.applied,
                            rejected = metrics.rejected,
                            undecodable = metrics.undecodable,
                            "scan cycle applied events"
                        );
                    }
                }
                Err(err) if err.is_rejection() => {
                    tracing::debug!(%err, "scan cycle skipped");
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(%err, "scan cycle failed, retrying next tick");
                }
                Err(err) => {
                    tracing::error!(%err, "fatal scan error, stopping scanner");
                    break;
                }
            }
        }
        let _ = self.catalog.release_lease(&self.holder);
    }

    /// One scan cycle.
    ///
    /// # Errors
    /// `LeaseHeld` (Rejected) when another instance owns the writer role;
    /// Transient node errors; Fatal catalog/cursor corruption.
    pub async fn scan_once(&self) -> Result<ScanMetrics> {
        let head = self.ledger.latest_block().await?;
        self.catalog
            .acquire_lease(&self.holder, self.config.lease_ttl, head.time)?;

        let mut cursor = self.catalog.load_cursor()?;
        let safe_head = head.number.saturating_sub(self.config.confirmation_depth);
        let from_block = cursor.next_block();
        if from_block > safe_head {
            return Ok(ScanMetrics::default());
        }

        let logs = self
            .ledger
            .query_logs(from_block, safe_head, &EventTopic::escrow_topics())
            .await?;
        let batch = craftvault_ledger::decode_escrow_events(&logs, &EventTopic::escrow_topics());

        let mut metrics = ScanMetrics {
            undecodable: batch.undecodable,
            ..ScanMetrics::default()
        };

        let loaded = cursor;
        for event in &batch.events {
            // The cursor block is re-queried on purpose; skip what's
            // already applied.
            if loaded.is_applied(event.position) {
                continue;
            }
            if self.apply(event)? {
                metrics.applied += 1;
            } else {
                metrics.rejected += 1;
            }
        }

        // Durable apply finished; only now may the bookmark move. It moves
        // past undecodable entries too — they are processed by skipping.
        if let Some(max_position) = logs.iter().map(|l| l.position).max() {
            if !loaded.is_applied(max_position) {
                cursor.advance_to(max_position)?;
                self.catalog.store_cursor(cursor)?;
            }
        }
        Ok(metrics)
    }

    /// Apply one decoded event. Returns whether the transition was
    /// accepted; rejections are expected duplicate traffic.
    fn apply(&self, event: &DecodedEvent) -> Result<bool> {
        let escrow_id = event.event.escrow_id();
        let current = self.catalog.escrow(escrow_id)?;

        match transition(current.as_ref().map(|s| s.status), &event.event) {
            Transition::Rejected(reason) => {
                tracing::debug!(%escrow_id, %reason, "transition rejected");
                Ok(false)
            }
            Transition::Applied(EscrowStatus::Created) => {
                let EscrowEvent::Created {
                    escrow,
                    certificate,
                    buyer,
                    seller,
                    amount,
                } = &event.event
                else {
                    return Err(CraftvaultError::Internal(
                        "created status from non-creation event".into(),
                    ));
                };
                self.catalog.upsert_escrow(EscrowSnapshot {
                    id: *escrow,
                    certificate: *certificate,
                    buyer: *buyer,
                    seller: *seller,
                    amount: *amount,
                    status: EscrowStatus::Created,
                    created_at: event.block_time,
                    released_at: None,
                    refunded_at: None,
                })?;
                self.catalog.clear_intent(*certificate)?;
                self.advance_listing(*certificate, ListingStage::Escrowed, None)?;
                tracing::info!(%escrow, %certificate, buyer = %buyer, "escrow observed");
                Ok(true)
            }
            Transition::Applied(next) => {
                // Transition only accepts settlement on an existing
                // Created snapshot.
                let mut snapshot = current.ok_or_else(|| {
                    CraftvaultError::Internal("settlement applied without snapshot".into())
                })?;
                match next {
                    EscrowStatus::Released => {
                        snapshot.mark_released(event.block_time)?;
                        self.catalog.upsert_escrow(snapshot.clone())?;
                        // Ownership follows the ledger: buyer takes the
                        // certificate, listing is sold.
                        self.transfer_certificate(&snapshot)?;
                        self.advance_listing(
                            snapshot.certificate,
                            ListingStage::Sold,
                            Some(snapshot.buyer),
                        )?;
                        tracing::info!(escrow = %snapshot.id, "escrow released");
                    }
                    EscrowStatus::Refunded => {
                        snapshot.mark_refunded(event.block_time)?;
                        self.catalog.upsert_escrow(snapshot.clone())?;
                        // Funds return to the buyer; the certificate stays
                        // with the seller and the listing is sellable again.
                        self.advance_listing(snapshot.certificate, ListingStage::Listed, None)?;
                        tracing::info!(escrow = %snapshot.id, "escrow refunded");
                    }
                    EscrowStatus::Created => unreachable!("handled above"),
                }
                Ok(true)
            }
        }
    }

    fn transfer_certificate(&self, snapshot: &EscrowSnapshot) -> Result<()> {
        match self.catalog.certificate(snapshot.certificate) {
            Ok(certificate) => self.catalog.put_certificate(Certificate {
                owner: snapshot.buyer,
                ..certificate
            }),
            // An escrow observed for a certificate this catalog never
            // minted; nothing local to transfer.
            Err(CraftvaultError::CertificateUnknown(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Move the listing owning `certificate` to `stage` (and optionally a
    /// new owner), retrying version conflicts. A listing this catalog does
    /// not track is fine — the escrow may belong to another deployment.
    fn advance_listing(
        &self,
        certificate: craftvault_types::CertificateId,
        stage: ListingStage,
        new_owner: Option<craftvault_types::AccountId>,
    ) -> Result<()> {
        let mut attempts = 0u32;
        loop {
            let Some(mut listing) = self.catalog.listing_for_certificate(certificate)? else {
                return Ok(());
            };
            if listing.stage == stage {
                return Ok(());
            }
            if let Err(err) = listing.advance(stage) {
                // The snapshot is ledger truth either way; a listing whose
                // local lifecycle lags (gateway crashed mid-flow) must not
                // wedge the cursor.
                tracing::warn!(%certificate, %err, "listing stage not advanced");
                return Ok(());
            }
            if let Some(owner) = new_owner {
                listing.owner = owner;
            }
            match self.catalog.update_listing(&listing) {
                Ok(_) => return Ok(()),
                Err(CraftvaultError::VersionConflict { .. }) if attempts < 3 => attempts += 1,
                Err(CraftvaultError::VersionConflict { .. }) => {
                    return Err(CraftvaultError::VersionRetriesExhausted { attempts });
                }
                Err(err) => return Err(err),
            }
        }
    }
}
