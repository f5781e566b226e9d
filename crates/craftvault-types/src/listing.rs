//! Listing model: a physical-good offer and its tokenization lifecycle.
//!
//! A listing is created as a draft by the seller, minted into a certificate,
//! put up for sale, escrowed by a buyer, and finally sold — or returned to
//! sale after a refund. Listings are never deleted, only marked inactive.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, CertificateId, CraftvaultError, ListingId, Result};

/// Lifecycle stage of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingStage {
    /// Seller draft, nothing on-ledger yet.
    Draft,
    /// Certificate minted, not yet offered for sale.
    Minted,
    /// Offered for sale, eligible for a new escrow.
    Listed,
    /// An escrow for this listing is open on the ledger.
    Escrowed,
    /// Escrow released; ownership transferred to the buyer.
    Sold,
}

impl ListingStage {
    /// Whether the lifecycle permits moving to `next`.
    ///
    /// The only backwards edge is `Escrowed -> Listed` (refund).
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Minted)
                | (Self::Minted, Self::Listed)
                | (Self::Listed, Self::Escrowed)
                | (Self::Escrowed, Self::Sold)
                | (Self::Escrowed, Self::Listed)
        )
    }
}

impl fmt::Display for ListingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::Minted => write!(f, "MINTED"),
            Self::Listed => write!(f, "LISTED"),
            Self::Escrowed => write!(f, "ESCROWED"),
            Self::Sold => write!(f, "SOLD"),
        }
    }
}

/// Seller-supplied input for a new listing. Title, description, and
/// category are opaque to the core; they only flow into the metadata
/// document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    /// Asking price in the ledger-native unit.
    pub price: Decimal,
    pub seller: AccountId,
    /// Primary asset bytes (image or similar) to publish.
    pub content: Vec<u8>,
}

/// A catalog listing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    /// Current owner. Starts as the seller; mutates on confirmed transfer
    /// only (the scanner applying a release event).
    pub owner: AccountId,
    pub seller: AccountId,
    /// Certificate linkage, set once by the mint saga.
    pub certificate: Option<CertificateId>,
    pub stage: ListingStage,
    /// Listings are never deleted, only marked inactive.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency version; bumped by the catalog on every write.
    pub version: u64,
}

impl Listing {
    /// Create a draft listing from seller input.
    #[must_use]
    pub fn draft(id: ListingId, draft: &ListingDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            category: draft.category.clone(),
            price: draft.price,
            owner: draft.seller,
            seller: draft.seller,
            certificate: None,
            stage: ListingStage::Draft,
            active: true,
            created_at,
            version: 0,
        }
    }

    /// Move to `next`, enforcing the lifecycle edges.
    ///
    /// # Errors
    /// Returns `InvalidStageTransition` for an illegal edge.
    pub fn advance(&mut self, next: ListingStage) -> Result<()> {
        if !self.stage.can_advance_to(next) {
            return Err(CraftvaultError::InvalidStageTransition {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        Ok(())
    }

    /// Attach the minted certificate and mark the listing `Minted`.
    ///
    /// # Errors
    /// Returns `AlreadyMinted` if a certificate is already linked.
    pub fn attach_certificate(&mut self, certificate: CertificateId) -> Result<()> {
        if let Some(existing) = self.certificate {
            return Err(CraftvaultError::AlreadyMinted {
                listing: self.id,
                certificate: existing,
            });
        }
        self.certificate = Some(certificate);
        self.advance(ListingStage::Minted)
    }

    /// Whether a new escrow may be opened against this listing.
    #[must_use]
    pub fn escrowable(&self) -> bool {
        self.active && self.stage == ListingStage::Listed && self.certificate.is_some()
    }
}
