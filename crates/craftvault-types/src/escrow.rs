//! Escrow model: a ledger-held balance pending release or refund.
//!
//! The snapshot is the catalog's read model of one on-ledger escrow.
//! Its status is monotonic: `Created` is the only non-terminal state, and
//! once `Released` or `Refunded` it never changes again. Only the
//! reconciliation scanner writes status, by applying observed ledger events.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, CertificateId, CraftvaultError, EscrowId, Result};

/// Escrow lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowStatus {
    /// Funds held, awaiting release or refund.
    Created,
    /// Funds handed to the seller. Terminal.
    Released,
    /// Funds returned to the buyer. Terminal.
    Refunded,
}

impl EscrowStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Released | Self::Refunded)
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Released => write!(f, "RELEASED"),
            Self::Refunded => write!(f, "REFUNDED"),
        }
    }
}

/// The catalog snapshot of one on-ledger escrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowSnapshot {
    pub id: EscrowId,
    /// The certificate whose sale this escrow settles.
    pub certificate: CertificateId,
    /// Ledger-reported buyer (authoritative for authorization).
    pub buyer: AccountId,
    /// Ledger-reported seller (authoritative for authorization).
    pub seller: AccountId,
    pub amount: Decimal,
    pub status: EscrowStatus,
    /// Ledger block time of the creation event — never orchestrator
    /// wall-clock.
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl EscrowSnapshot {
    /// Release-eligibility deadline: creation block time + holding period.
    #[must_use]
    pub fn deadline(&self, holding_period: Duration) -> DateTime<Utc> {
        self.created_at + holding_period
    }

    /// Whether the holding period has elapsed at `now` (ledger block time).
    #[must_use]
    pub fn deadline_elapsed(&self, holding_period: Duration, now: DateTime<Utc>) -> bool {
        now >= self.deadline(holding_period)
    }

    /// Time left until the deadline, floored at zero.
    #[must_use]
    pub fn remaining(&self, holding_period: Duration, now: DateTime<Utc>) -> Duration {
        (self.deadline(holding_period) - now).max(Duration::zero())
    }

    /// Apply a release observed at `at` (block time).
    ///
    /// # Errors
    /// Returns `AlreadyTerminal` if the status is already terminal.
    pub fn mark_released(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;
        self.status = EscrowStatus::Released;
        self.released_at = Some(at);
        Ok(())
    }

    /// Apply a refund observed at `at` (block time).
    ///
    /// # Errors
    /// Returns `AlreadyTerminal` if the status is already terminal.
    pub fn mark_refunded(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.ensure_open()?;
        self.status = EscrowStatus::Refunded;
        self.refunded_at = Some(at);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(CraftvaultError::AlreadyTerminal {
                escrow: self.id,
                status: self.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_snapshot(created_at: DateTime<Utc>) -> EscrowSnapshot {
        EscrowSnapshot {
            id: EscrowId(1),
            certificate: CertificateId(1),
            buyer: AccountId([1u8; 20]),
            seller: AccountId([2u8; 20]),
            amount: Decimal::new(45, 0),
            status: EscrowStatus::Created,
            created_at,
            released_at: None,
            refunded_at: None,
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!EscrowStatus::Created.is_terminal());
        assert!(EscrowStatus::Released.is_terminal());
        assert!(EscrowStatus::Refunded.is_terminal());
    }

    #[test]
    fn deadline_is_creation_plus_holding() {
        let t0 = Utc::now();
        let snap = make_snapshot(t0);
        let holding = Duration::days(7);
        assert_eq!(snap.deadline(holding), t0 + holding);
        assert!(!snap.deadline_elapsed(holding, t0 + Duration::days(6)));
        assert!(snap.deadline_elapsed(holding, t0 + Duration::days(7)));
    }

    #[test]
    fn remaining_floors_at_zero() {
        let t0 = Utc::now();
        let snap = make_snapshot(t0);
        let holding = Duration::days(7);
        assert_eq!(snap.remaining(holding, t0 + Duration::days(3)), Duration::days(4));
        assert_eq!(snap.remaining(holding, t0 + Duration::days(9)), Duration::zero());
    }

    #[test]
    fn release_sets_terminal_status() {
        let t0 = Utc::now();
        let mut snap = make_snapshot(t0);
        let t1 = t0 + Duration::days(1);
        snap.mark_released(t1).unwrap();
        assert_eq!(snap.status, EscrowStatus::Released);
        assert_eq!(snap.released_at, Some(t1));
    }

    #[test]
    fn terminal_is_sticky() {
        let t0 = Utc::now();
        let mut snap = make_snapshot(t0);
        snap.mark_refunded(t0 + Duration::days(8)).unwrap();

        let err = snap.mark_released(t0 + Duration::days(9)).unwrap_err();
        assert!(matches!(err, CraftvaultError::AlreadyTerminal { .. }));
        assert_eq!(snap.status, EscrowStatus::Refunded);

        let err = snap.mark_refunded(t0 + Duration::days(9)).unwrap_err();
        assert!(matches!(err, CraftvaultError::AlreadyTerminal { .. }));
    }
}
