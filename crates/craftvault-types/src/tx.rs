//! Submission artifacts: the pending handle and the confirmation receipt.
//!
//! A [`PendingHandle`] is persisted against the entity that submitted it
//! (mint checkpoint, escrow intent) *before* any confirmation wait, so a
//! crash mid-wait resumes by re-polling the same handle instead of
//! resubmitting — resubmission under a fresh nonce would double-spend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RawLog, TxHash};

/// Handle for a submitted, not-yet-confirmed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingHandle {
    pub tx_hash: TxHash,
    /// The sequence number this submission consumed. A resubmission after a
    /// confirmation timeout must reuse it.
    pub nonce: u64,
    pub submitted_at: DateTime<Utc>,
}

/// A confirmed transaction receipt with its raw logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    /// Block that included the transaction.
    pub block: u64,
    pub block_time: DateTime<Utc>,
    /// Whether the transaction executed successfully.
    pub succeeded: bool,
    pub logs: Vec<RawLog>,
}

impl Receipt {
    /// Confirmations accumulated at `head` (1 when head == inclusion block,
    /// 0 when the node's head has not reached the inclusion block).
    #[must_use]
    pub fn confirmations(&self, head: u64) -> u64 {
        if head < self.block {
            return 0;
        }
        head - self.block + 1
    }
}
