//! Error types for the CraftVault settlement core.
//!
//! All errors use the `CV_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Listing errors
//! - 2xx: Mint saga errors
//! - 3xx: Escrow errors
//! - 4xx: Ledger client errors
//! - 5xx: Reconciliation errors
//! - 6xx: Catalog errors
//! - 9xx: General / internal errors
//!
//! Every error carries an [`ErrorClass`] so callers apply the right policy
//! mechanically: `Transient` is retried with bounded backoff, `Rejected` is
//! logged and ignored, `Fatal` is surfaced and never auto-retried.

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    AccountId, CertificateId, EscrowId, EscrowStatus, LedgerPosition, ListingId, ListingStage,
    MintStage, PendingHandle, TxHash,
};

/// Retry-policy classification for every [`CraftvaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Expected to succeed on retry with bounded exponential backoff.
    Transient,
    /// Precondition not met or duplicate observation. Not an error condition;
    /// logged and ignored, never retried.
    Rejected,
    /// Needs operator attention. Blind retry risks double-minting or double
    /// submission, so these are never auto-retried.
    Fatal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Central error enum for all CraftVault operations.
#[derive(Debug, Error)]
pub enum CraftvaultError {
    // =================================================================
    // Listing Errors (1xx)
    // =================================================================
    /// The requested listing does not exist in the catalog.
    #[error("CV_ERR_100: Listing not found: {0}")]
    ListingNotFound(ListingId),

    /// The listing lifecycle does not permit this stage change.
    #[error("CV_ERR_101: Invalid stage transition: {from} -> {to}")]
    InvalidStageTransition { from: ListingStage, to: ListingStage },

    /// The listing has been marked inactive.
    #[error("CV_ERR_102: Listing is inactive: {0}")]
    ListingInactive(ListingId),

    /// The listing has no minted certificate yet.
    #[error("CV_ERR_103: Listing has no certificate: {0}")]
    CertificateMissing(ListingId),

    /// The offered amount does not match the asking price.
    #[error("CV_ERR_104: Price mismatch: asking {asking}, offered {offered}")]
    PriceMismatch { asking: Decimal, offered: Decimal },

    // =================================================================
    // Mint Saga Errors (2xx)
    // =================================================================
    /// The mint saga stopped partway. Carries the furthest completed stage
    /// so the caller resumes from the checkpoint instead of restarting.
    #[error("CV_ERR_200: Mint interrupted after {after}: {reason}")]
    MintInterrupted { after: MintStage, reason: String },

    /// The mint transaction confirmed but no zero-from transfer event was
    /// found in the receipt. Needs manual reconciliation; a retry would mint
    /// a second certificate.
    #[error("CV_ERR_201: No certificate in mint receipt {0}")]
    CertificateNotFound(TxHash),

    /// Content publication failed after exhausting retries.
    #[error("CV_ERR_202: Content publish failed: {reason}")]
    PublishFailed { reason: String },

    /// A certificate already exists for this listing.
    #[error("CV_ERR_203: Listing already minted: {listing} -> {certificate}")]
    AlreadyMinted {
        listing: ListingId,
        certificate: CertificateId,
    },

    // =================================================================
    // Escrow Errors (3xx)
    // =================================================================
    /// No escrow snapshot with this id.
    #[error("CV_ERR_300: Escrow not found: {0}")]
    EscrowNotFound(EscrowId),

    /// The requester is not the ledger-reported buyer for this escrow.
    #[error("CV_ERR_301: Requester {requester} is not the buyer of {escrow}")]
    NotBuyer {
        escrow: EscrowId,
        requester: AccountId,
    },

    /// The holding period has not elapsed yet.
    #[error("CV_ERR_302: Holding period not elapsed for {escrow} (deadline {deadline})")]
    DeadlineNotReached {
        escrow: EscrowId,
        deadline: chrono::DateTime<chrono::Utc>,
    },

    /// The escrow already reached a terminal status.
    #[error("CV_ERR_303: Escrow {escrow} already terminal: {status}")]
    AlreadyTerminal {
        escrow: EscrowId,
        status: EscrowStatus,
    },

    /// A creation event was observed for an escrow id already known.
    #[error("CV_ERR_304: Duplicate escrow creation observed: {0}")]
    DuplicateEscrow(EscrowId),

    /// Another orchestration step is already in flight for this entity.
    #[error("CV_ERR_305: Operation already in flight for {entity}")]
    OperationInFlight { entity: String },

    // =================================================================
    // Ledger Client Errors (4xx)
    // =================================================================
    /// The node rejected the assigned nonce as already used.
    #[error("CV_ERR_400: Stale nonce: assigned {assigned}, node expects {expected}")]
    StaleNonce { assigned: u64, expected: u64 },

    /// Fee was below the market floor after the bounded escalation attempts.
    #[error("CV_ERR_401: Fee too low after {attempts} attempts")]
    FeeTooLow { attempts: u32 },

    /// Confirmation did not accumulate before the caller's deadline.
    /// Carries the handle so the caller can resume polling or resubmit
    /// with the same nonce.
    #[error("CV_ERR_402: Confirmation timeout for {}", handle.tx_hash)]
    ConfirmationTimeout { handle: PendingHandle },

    /// The ledger node could not be reached or answered with a server fault.
    #[error("CV_ERR_403: Ledger node unavailable: {reason}")]
    NodeUnavailable { reason: String },

    /// The node rejected the submission outright (malformed, unfunded, ...).
    #[error("CV_ERR_404: Submission rejected: {reason}")]
    SubmissionRejected { reason: String },

    // =================================================================
    // Reconciliation Errors (5xx)
    // =================================================================
    /// The persisted cursor would move backwards — storage corruption.
    #[error("CV_ERR_500: Cursor regression: {current} -> {proposed}")]
    CursorRegression {
        current: LedgerPosition,
        proposed: LedgerPosition,
    },

    /// Another scanner instance holds the writer lease for this catalog.
    #[error("CV_ERR_501: Writer lease held by {holder}")]
    LeaseHeld { holder: String },

    // =================================================================
    // Catalog Errors (6xx)
    // =================================================================
    /// Optimistic write lost the race: stored version moved on.
    #[error("CV_ERR_600: Version conflict: expected {expected}, stored {stored}")]
    VersionConflict { expected: u64, stored: u64 },

    /// Version-conflict retries exhausted; surfaced for the operator.
    #[error("CV_ERR_601: Version conflict retries exhausted after {attempts} attempts")]
    VersionRetriesExhausted { attempts: u32 },

    /// No certificate record with this id.
    #[error("CV_ERR_602: Certificate not found in catalog: {0}")]
    CertificateUnknown(CertificateId),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("CV_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("CV_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config, missing fields, etc.).
    #[error("CV_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk, network).
    #[error("CV_ERR_903: I/O error: {0}")]
    Io(String),
}

impl CraftvaultError {
    /// The retry-policy class of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            // Expected to clear on retry.
            Self::PublishFailed { .. }
            | Self::StaleNonce { .. }
            | Self::FeeTooLow { .. }
            | Self::NodeUnavailable { .. }
            | Self::VersionConflict { .. }
            | Self::MintInterrupted { .. }
            | Self::ConfirmationTimeout { .. } => ErrorClass::Transient,

            // Precondition failures and duplicate observations.
            Self::ListingNotFound(_)
            | Self::InvalidStageTransition { .. }
            | Self::ListingInactive(_)
            | Self::CertificateMissing(_)
            | Self::PriceMismatch { .. }
            | Self::AlreadyMinted { .. }
            | Self::EscrowNotFound(_)
            | Self::NotBuyer { .. }
            | Self::DeadlineNotReached { .. }
            | Self::AlreadyTerminal { .. }
            | Self::DuplicateEscrow(_)
            | Self::OperationInFlight { .. }
            | Self::LeaseHeld { .. } => ErrorClass::Rejected,

            // Operator territory.
            Self::CertificateNotFound(_)
            | Self::SubmissionRejected { .. }
            | Self::CursorRegression { .. }
            | Self::VersionRetriesExhausted { .. }
            | Self::CertificateUnknown(_)
            | Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Io(_) => ErrorClass::Fatal,
        }
    }

    /// Whether a caller should retry this operation with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Whether this is a local rejection (no error condition, no retry).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        self.class() == ErrorClass::Rejected
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, CraftvaultError>;

impl From<std::io::Error> for CraftvaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CraftvaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = CraftvaultError::ListingNotFound(ListingId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("CV_ERR_100"), "Got: {msg}");
    }

    #[test]
    fn price_mismatch_display() {
        let err = CraftvaultError::PriceMismatch {
            asking: Decimal::new(100, 0),
            offered: Decimal::new(50, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("CV_ERR_104"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn transient_class() {
        let err = CraftvaultError::NodeUnavailable {
            reason: "connection refused".into(),
        };
        assert_eq!(err.class(), ErrorClass::Transient);
        assert!(err.is_transient());
    }

    #[test]
    fn rejected_class() {
        let err = CraftvaultError::DuplicateEscrow(EscrowId(7));
        assert_eq!(err.class(), ErrorClass::Rejected);
        assert!(err.is_rejection());
        assert!(!err.is_transient());
    }

    #[test]
    fn fatal_class_for_missing_certificate() {
        let err = CraftvaultError::CertificateNotFound(TxHash([0u8; 32]));
        assert_eq!(err.class(), ErrorClass::Fatal);
    }

    #[test]
    fn version_conflict_transient_until_exhausted() {
        let racing = CraftvaultError::VersionConflict {
            expected: 3,
            stored: 4,
        };
        assert_eq!(racing.class(), ErrorClass::Transient);

        let exhausted = CraftvaultError::VersionRetriesExhausted { attempts: 3 };
        assert_eq!(exhausted.class(), ErrorClass::Fatal);
    }

    #[test]
    fn all_errors_have_cv_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(CraftvaultError::EscrowNotFound(EscrowId(1))),
            Box::new(CraftvaultError::FeeTooLow { attempts: 3 }),
            Box::new(CraftvaultError::Internal("test".into())),
            Box::new(CraftvaultError::LeaseHeld {
                holder: "scanner-b".into(),
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("CV_ERR_"),
                "Error missing CV_ERR_ prefix: {msg}"
            );
        }
    }
}
