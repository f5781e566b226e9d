//! Mint saga progress: stages and the per-listing checkpoint.
//!
//! The checkpoint is persisted in the catalog after every completed step so
//! a crashed or interrupted mint resumes from where it stopped. In
//! particular the pending handle is stored *before* the confirmation wait —
//! restarting from step one after the transaction landed would mint twice.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ContentAddress, ListingId, PendingHandle};

/// The steps of the mint saga, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MintStage {
    /// Nothing done yet.
    Started,
    /// Primary content published, address recorded.
    ContentPublished,
    /// Metadata document published, certificate URI recorded.
    MetadataPublished,
    /// Mint transaction submitted, pending handle recorded.
    Submitted,
    /// Receipt confirmed, certificate id extracted.
    Confirmed,
}

impl fmt::Display for MintStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "STARTED"),
            Self::ContentPublished => write!(f, "CONTENT_PUBLISHED"),
            Self::MetadataPublished => write!(f, "METADATA_PUBLISHED"),
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::Confirmed => write!(f, "CONFIRMED"),
        }
    }
}

/// Durable record of how far a listing's mint has progressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintCheckpoint {
    pub listing: ListingId,
    pub content: Option<ContentAddress>,
    pub metadata: Option<ContentAddress>,
    pub pending: Option<PendingHandle>,
}

impl MintCheckpoint {
    #[must_use]
    pub fn new(listing: ListingId) -> Self {
        Self {
            listing,
            content: None,
            metadata: None,
            pending: None,
        }
    }

    /// The furthest completed stage recorded in this checkpoint.
    #[must_use]
    pub fn furthest(&self) -> MintStage {
        if self.pending.is_some() {
            MintStage::Submitted
        } else if self.metadata.is_some() {
            MintStage::MetadataPublished
        } else if self.content.is_some() {
            MintStage::ContentPublished
        } else {
            MintStage::Started
        }
    }
}
