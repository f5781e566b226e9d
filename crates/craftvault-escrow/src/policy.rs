//! Submission-side authorization for release and refund requests.
//!
//! The ledger is the final authority; these checks exist so the gateway
//! never submits a transaction it already knows will be rejected. All
//! identity comparisons use the ledger-reported buyer/seller from the
//! escrow snapshot — the catalog's stored creator is a read model and may
//! disagree. "Now" is the latest ledger block time, not wall-clock: only
//! the deadline gates new submissions, never the escrow's status.

use chrono::{DateTime, Duration, Utc};

use craftvault_types::{AccountId, CraftvaultError, EscrowSnapshot, EscrowStatus, Result};

/// Deployment policy for who may release after the holding period.
#[derive(Debug, Clone, Default)]
pub struct ReleasePolicy {
    /// Operator identity allowed to force a release once the deadline has
    /// elapsed; `None` disables operator releases entirely.
    pub operator: Option<AccountId>,
}

/// May `requester` submit a release for this escrow at `now`?
///
/// The buyer may release at any time (confirming receipt). The operator —
/// when the deployed policy names one — may release only after the
/// deadline. Anyone else is rejected locally, without a ledger round-trip.
///
/// # Errors
/// `AlreadyTerminal`, `NotBuyer`, or `DeadlineNotReached` — all
/// Rejected-class.
pub fn authorize_release(
    snapshot: &EscrowSnapshot,
    requester: AccountId,
    now: DateTime<Utc>,
    holding_period: Duration,
    policy: &ReleasePolicy,
) -> Result<()> {
    ensure_open(snapshot)?;

    if requester == snapshot.buyer {
        return Ok(());
    }

    if policy.operator == Some(requester) {
        if snapshot.deadline_elapsed(holding_period, now) {
            return Ok(());
        }
        tracing::debug!(escrow = %snapshot.id, %requester, "operator release before deadline");
        return Err(CraftvaultError::DeadlineNotReached {
            escrow: snapshot.id,
            deadline: snapshot.deadline(holding_period),
        });
    }

    tracing::debug!(escrow = %snapshot.id, %requester, "release by non-buyer rejected");
    Err(CraftvaultError::NotBuyer {
        escrow: snapshot.id,
        requester,
    })
}

/// May `requester` submit a refund for this escrow at `now`?
///
/// Only the buyer, and only once the holding period has elapsed with the
/// escrow still open.
///
/// # Errors
/// `AlreadyTerminal`, `NotBuyer`, or `DeadlineNotReached` — all
/// Rejected-class.
pub fn authorize_refund(
    snapshot: &EscrowSnapshot,
    requester: AccountId,
    now: DateTime<Utc>,
    holding_period: Duration,
) -> Result<()> {
    ensure_open(snapshot)?;

    if requester != snapshot.buyer {
        return Err(CraftvaultError::NotBuyer {
            escrow: snapshot.id,
            requester,
        });
    }

    if !snapshot.deadline_elapsed(holding_period, now) {
        return Err(CraftvaultError::DeadlineNotReached {
            escrow: snapshot.id,
            deadline: snapshot.deadline(holding_period),
        });
    }

    Ok(())
}

fn ensure_open(snapshot: &EscrowSnapshot) -> Result<()> {
    if snapshot.status.is_terminal() {
        return Err(CraftvaultError::AlreadyTerminal {
            escrow: snapshot.id,
            status: snapshot.status,
        });
    }
    Ok(())
}
