//! Typed ledger events and the raw log they decode from.
//!
//! The ledger emits three well-known escrow event shapes plus the
//! certificate transfer event. Raw logs are opaque `(topics, data)` pairs
//! ordered by [`LedgerPosition`]; the ledger crate's decoder turns them into
//! the types here, skipping (and counting) anything it cannot parse.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, CertificateId, EscrowId, LedgerPosition, TxHash};

// ---------------------------------------------------------------------------
// RawLog
// ---------------------------------------------------------------------------

/// An undecoded log entry as returned by the ledger node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub position: LedgerPosition,
    /// Block time of the containing block — the authoritative event time.
    pub block_time: DateTime<Utc>,
    pub tx_hash: TxHash,
    /// topics[0] is the event-signature hash.
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// EventTopic
// ---------------------------------------------------------------------------

/// The event shapes the core subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    EscrowCreated,
    EscrowReleased,
    EscrowRefunded,
    Transfer,
}

impl EventTopic {
    /// The canonical signature string hashed into `topics[0]`.
    #[must_use]
    pub fn signature(self) -> &'static str {
        match self {
            Self::EscrowCreated => "EscrowCreated(uint64,address,uint128)",
            Self::EscrowReleased => "EscrowReleased(uint64,address,uint128)",
            Self::EscrowRefunded => "EscrowRefunded(uint64,address,uint128)",
            Self::Transfer => "Transfer(address,address,uint64)",
        }
    }

    /// The three escrow topics the reconciliation scanner subscribes to.
    #[must_use]
    pub fn escrow_topics() -> [Self; 3] {
        [Self::EscrowCreated, Self::EscrowReleased, Self::EscrowRefunded]
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EscrowCreated => write!(f, "EscrowCreated"),
            Self::EscrowReleased => write!(f, "EscrowReleased"),
            Self::EscrowRefunded => write!(f, "EscrowRefunded"),
            Self::Transfer => write!(f, "Transfer"),
        }
    }
}

// ---------------------------------------------------------------------------
// EscrowEvent
// ---------------------------------------------------------------------------

/// A decoded escrow lifecycle event.
///
/// The creation log additionally carries the seller and the certificate
/// under sale in its data words; release and refund identify the escrow
/// alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowEvent {
    Created {
        escrow: EscrowId,
        certificate: CertificateId,
        buyer: AccountId,
        seller: AccountId,
        amount: Decimal,
    },
    Released {
        escrow: EscrowId,
        buyer: AccountId,
        amount: Decimal,
    },
    Refunded {
        escrow: EscrowId,
        buyer: AccountId,
        amount: Decimal,
    },
}

impl EscrowEvent {
    #[must_use]
    pub fn escrow_id(&self) -> EscrowId {
        match self {
            Self::Created { escrow, .. }
            | Self::Released { escrow, .. }
            | Self::Refunded { escrow, .. } => *escrow,
        }
    }

    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::Created { .. } => EventTopic::EscrowCreated,
            Self::Released { .. } => EventTopic::EscrowReleased,
            Self::Refunded { .. } => EventTopic::EscrowRefunded,
        }
    }
}

/// An escrow event paired with where and when the ledger emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub position: LedgerPosition,
    pub block_time: DateTime<Utc>,
    pub tx_hash: TxHash,
    pub event: EscrowEvent,
}

// ---------------------------------------------------------------------------
// CertificateTransfer
// ---------------------------------------------------------------------------

/// A decoded certificate ownership transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateTransfer {
    pub from: AccountId,
    pub to: AccountId,
    pub certificate: CertificateId,
}

impl CertificateTransfer {
    /// A transfer from the zero identity is a fresh mint.
    #[must_use]
    pub fn is_mint(&self) -> bool {
        self.from.is_zero()
    }
}
