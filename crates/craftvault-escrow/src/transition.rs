//! The escrow transition function.
//!
//! `transition(current, event)` is the single place the legal lifecycle is
//! written down:
//!
//! ```text
//! (none)  --Created-->  Created --Released--> Released (terminal)
//!                               --Refunded--> Refunded (terminal)
//! ```
//!
//! Everything else is a rejection. Duplicate deliveries and replays are
//! expected from an at-least-once event stream, so a rejection carries a
//! reason for the metrics but is never an error.

use std::fmt;

use craftvault_types::{EscrowEvent, EscrowId, EscrowStatus};

/// Why an event did not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A creation event for an escrow id already known.
    DuplicateCreation(EscrowId),
    /// Any event targeting an escrow already in a terminal status.
    Terminal {
        escrow: EscrowId,
        status: EscrowStatus,
    },
    /// A settlement event for an escrow never observed as created.
    UnknownEscrow(EscrowId),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateCreation(id) => write!(f, "duplicate creation of {id}"),
            Self::Terminal { escrow, status } => {
                write!(f, "{escrow} already terminal ({status})")
            }
            Self::UnknownEscrow(id) => write!(f, "settlement for unknown {id}"),
        }
    }
}

/// Outcome of applying one event to one escrow's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The event applies; the escrow moves to this status.
    Applied(EscrowStatus),
    /// Idempotent no-op; logged and counted, never an error.
    Rejected(RejectReason),
}

impl Transition {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Apply `event` to an escrow currently in `current` (`None` = never seen).
///
/// Pure and total: no I/O, no clock, no randomness. Replaying any sequence
/// of events with duplicates, in any order the ledger could emit them,
/// converges to the same terminal status as processing them once in
/// canonical order.
#[must_use]
pub fn transition(current: Option<EscrowStatus>, event: &EscrowEvent) -> Transition {
    let escrow = event.escrow_id();
    match (current, event) {
        (None, EscrowEvent::Created { .. }) => Transition::Applied(EscrowStatus::Created),
        (Some(_), EscrowEvent::Created { .. }) => {
            Transition::Rejected(RejectReason::DuplicateCreation(escrow))
        }

        (None, _) => Transition::Rejected(RejectReason::UnknownEscrow(escrow)),

        (Some(EscrowStatus::Created), EscrowEvent::Released { .. }) => {
            Transition::Applied(EscrowStatus::Released)
        }
        (Some(EscrowStatus::Created), EscrowEvent::Refunded { .. }) => {
            Transition::Applied(EscrowStatus::Refunded)
        }

        (Some(status), _) => Transition::Rejected(RejectReason::Terminal { escrow, status }),
    }
}
