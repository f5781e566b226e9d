//! The market gateway.
//!
//! One gateway serves one signing identity (the original system's backend
//! wallet for mints, a client-held wallet for purchases; tests bind one
//! gateway per role). Identity parameters on release/refund are checked
//! against the ledger-reported escrow fields, never against the catalog's
//! stored creator.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use craftvault_catalog::{CatalogStore, EntityLocks, EscrowIntent};
use craftvault_escrow::{ReleasePolicy, authorize_refund, authorize_release};
use craftvault_ledger::{ContractCall, LedgerClient};
use craftvault_minting::MintOrchestrator;
use craftvault_types::{
    AccountId, Certificate, CraftvaultError, EscrowConfig, EscrowId, EscrowSnapshot, Listing,
    ListingDraft, ListingId, ListingStage, PendingHandle, Result,
};

/// A status snapshot plus the deadline countdown, computed against the
/// latest ledger block time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowStatusView {
    pub snapshot: EscrowSnapshot,
    pub deadline: DateTime<Utc>,
    /// Time left until release eligibility; zero once elapsed.
    pub remaining: chrono::Duration,
}

/// Entry point for mint, listing, and escrow requests.
pub struct MarketGateway {
    catalog: Arc<dyn CatalogStore>,
    ledger: Arc<LedgerClient>,
    minting: Arc<MintOrchestrator>,
    locks: EntityLocks,
    escrow_config: EscrowConfig,
    release_policy: ReleasePolicy,
}

impl MarketGateway {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        ledger: Arc<LedgerClient>,
        minting: Arc<MintOrchestrator>,
        locks: EntityLocks,
        escrow_config: EscrowConfig,
        release_policy: ReleasePolicy,
    ) -> Self {
        Self {
            catalog,
            ledger,
            minting,
            locks,
            escrow_config,
            release_policy,
        }
    }

    /// Create a draft listing in the catalog. Nothing touches the ledger
    /// until the mint request.
    pub fn create_listing(&self, draft: &ListingDraft) -> Result<Listing> {
        let listing = Listing::draft(ListingId::new(), draft, Utc::now());
        let stored = self.catalog.create_listing(listing)?;
        tracing::info!(listing = %stored.id, seller = %stored.seller, "listing drafted");
        Ok(stored)
    }

    /// Run the mint saga for a listing. Resumable; see the orchestrator.
    pub async fn request_mint(&self, listing: ListingId, content: &[u8]) -> Result<Certificate> {
        self.minting.mint(listing, content).await
    }

    /// Offer a minted listing for sale. Catalog-only stage change.
    pub fn request_list(&self, listing: ListingId) -> Result<Listing> {
        self.update_listing(listing, |l| l.advance(ListingStage::Listed))
    }

    /// Mark a listing inactive. Listings are never deleted.
    pub fn retire_listing(&self, listing: ListingId) -> Result<Listing> {
        self.update_listing(listing, |l| {
            l.active = false;
            Ok(())
        })
    }

    /// Submit an escrow-create transaction for a listed certificate.
    ///
    /// Returns as soon as the submission is accepted; the listing flips to
    /// `Escrowed` only when the scanner observes the creation event.
    pub async fn request_escrow_create(
        &self,
        listing_id: ListingId,
        buyer: AccountId,
        amount: Decimal,
    ) -> Result<PendingHandle> {
        let listing = self.catalog.listing(listing_id)?;
        if !listing.active {
            return Err(CraftvaultError::ListingInactive(listing_id));
        }
        let certificate = listing
            .certificate
            .ok_or(CraftvaultError::CertificateMissing(listing_id))?;
        if listing.stage != ListingStage::Listed {
            return Err(CraftvaultError::InvalidStageTransition {
                from: listing.stage,
                to: ListingStage::Escrowed,
            });
        }
        if amount != listing.price {
            return Err(CraftvaultError::PriceMismatch {
                asking: listing.price,
                offered: amount,
            });
        }

        let _guard = self.locks.try_lock(format!("listing:{listing_id}"))?;
        let handle = self
            .ledger
            .submit(ContractCall::CreateEscrow { certificate }, amount)
            .await?;
        self.catalog.save_intent(&EscrowIntent {
            listing: listing_id,
            certificate,
            buyer,
            amount,
            handle,
        })?;
        tracing::info!(
            listing = %listing_id,
            %certificate,
            buyer = %buyer,
            tx = %handle.tx_hash,
            "escrow creation submitted"
        );
        Ok(handle)
    }

    /// Submit a release for an escrow after the local authorization check.
    /// A request the ledger would reject is refused here without a ledger
    /// round-trip.
    pub async fn request_release(
        &self,
        escrow: EscrowId,
        requester: AccountId,
    ) -> Result<PendingHandle> {
        let snapshot = self
            .catalog
            .escrow(escrow)?
            .ok_or(CraftvaultError::EscrowNotFound(escrow))?;
        let now = self.ledger.latest_block().await?.time;
        authorize_release(
            &snapshot,
            requester,
            now,
            self.escrow_config.holding_chrono(),
            &self.release_policy,
        )?;

        let _guard = self.locks.try_lock(format!("escrow:{escrow}"))?;
        let handle = self
            .ledger
            .submit(ContractCall::ReleaseEscrow { escrow }, Decimal::ZERO)
            .await?;
        tracing::info!(%escrow, requester = %requester, tx = %handle.tx_hash, "release submitted");
        Ok(handle)
    }

    /// Submit a refund for an escrow after the local authorization check
    /// (buyer only, deadline elapsed, still open).
    pub async fn request_refund(
        &self,
        escrow: EscrowId,
        requester: AccountId,
    ) -> Result<PendingHandle> {
        let snapshot = self
            .catalog
            .escrow(escrow)?
            .ok_or(CraftvaultError::EscrowNotFound(escrow))?;
        let now = self.ledger.latest_block().await?.time;
        authorize_refund(
            &snapshot,
            requester,
            now,
            self.escrow_config.holding_chrono(),
        )?;

        let _guard = self.locks.try_lock(format!("escrow:{escrow}"))?;
        let handle = self
            .ledger
            .submit(ContractCall::RefundEscrow { escrow }, Decimal::ZERO)
            .await?;
        tracing::info!(%escrow, requester = %requester, tx = %handle.tx_hash, "refund submitted");
        Ok(handle)
    }

    /// Current snapshot plus deadline countdown. The countdown is computed
    /// against the latest ledger block time, consistent with the
    /// submission-side gating.
    pub async fn escrow_status(&self, escrow: EscrowId) -> Result<EscrowStatusView> {
        let snapshot = self
            .catalog
            .escrow(escrow)?
            .ok_or(CraftvaultError::EscrowNotFound(escrow))?;
        let now = self.ledger.latest_block().await?.time;
        let holding = self.escrow_config.holding_chrono();
        Ok(EscrowStatusView {
            deadline: snapshot.deadline(holding),
            remaining: snapshot.remaining(holding, now),
            snapshot,
        })
    }

    fn update_listing(
        &self,
        listing_id: ListingId,
        mutate: impl Fn(&mut Listing) -> Result<()>,
    ) -> Result<Listing> {
        // Bounded optimistic-write retry; the scanner may race us.
        let mut attempts = 0u32;
        loop {
            let mut listing = self.catalog.listing(listing_id)?;
            mutate(&mut listing)?;
            match self.catalog.update_listing(&listing) {
                Ok(updated) => return Ok(updated),
                Err(CraftvaultError::VersionConflict { .. }) if attempts < 3 => attempts += 1,
                Err(CraftvaultError::VersionConflict { .. }) => {
                    return Err(CraftvaultError::VersionRetriesExhausted { attempts });
                }
                Err(err) => return Err(err),
            }
        }
    }
}
