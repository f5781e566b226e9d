//! The reconciliation cursor: the durable bookmark of the last ledger
//! position whose events have been applied to the catalog.
//!
//! Invariant: the cursor advances only after the batch of events up to the
//! new position has been durably applied. Advance-then-apply would lose
//! events on a crash between the two writes; apply-then-advance merely
//! re-applies a batch, which the catalog absorbs idempotently.

use serde::{Deserialize, Serialize};

use crate::{CraftvaultError, LedgerPosition, Result};

/// Last durably applied ledger position for the escrow topic set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReconcileCursor {
    /// `None` means nothing has been applied yet (scan from genesis).
    pub applied_through: Option<LedgerPosition>,
}

impl ReconcileCursor {
    /// A cursor that has applied nothing.
    pub const GENESIS: Self = Self {
        applied_through: None,
    };

    /// First block a scan cycle should query.
    #[must_use]
    pub fn next_block(&self) -> u64 {
        match self.applied_through {
            // Same-block logs above the applied index are filtered by
            // `is_applied`, so re-querying the cursor block is safe.
            Some(pos) => pos.block,
            None => 0,
        }
    }

    /// Whether an event at `pos` is already covered by this cursor.
    #[must_use]
    pub fn is_applied(&self, pos: LedgerPosition) -> bool {
        self.applied_through.is_some_and(|applied| pos <= applied)
    }

    /// Advance to `pos`. Only forward movement is legal.
    ///
    /// # Errors
    /// Returns `CursorRegression` if `pos` is at or before the current
    /// position — that indicates storage corruption, not a retryable race.
    pub fn advance_to(&mut self, pos: LedgerPosition) -> Result<()> {
        if let Some(current) = self.applied_through {
            if pos <= current {
                return Err(CraftvaultError::CursorRegression {
                    current,
                    proposed: pos,
                });
            }
        }
        self.applied_through = Some(pos);
        Ok(())
    }
}
