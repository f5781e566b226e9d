//! Configuration for the ledger client, orchestrators, and scanner.
//!
//! The original system kept its wallet and contract handles in process-wide
//! singletons; here every component receives its configuration explicitly at
//! construction.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Ledger client configuration: fee selection and confirmation waiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Premium applied over the observed market fee (0.125 = +12.5%).
    pub fee_premium: Decimal,
    /// Additional escalation applied per fee retry attempt.
    pub fee_escalation: Decimal,
    /// Attempts before a fee-too-low submission is reported failed.
    pub max_fee_attempts: u32,
    /// Fixed gas limit attached to submissions.
    pub gas_limit: u64,
    /// Receipt poll interval while awaiting confirmation.
    pub receipt_poll_interval: Duration,
    /// Maximum block span per log query page.
    pub page_blocks: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fee_premium: Decimal::new(constants::DEFAULT_FEE_PREMIUM_MILLIS as i64, 3),
            fee_escalation: Decimal::new(constants::DEFAULT_FEE_ESCALATION_MILLIS as i64, 3),
            max_fee_attempts: constants::DEFAULT_MAX_FEE_ATTEMPTS,
            gas_limit: constants::DEFAULT_GAS_LIMIT,
            receipt_poll_interval: Duration::from_millis(constants::DEFAULT_RECEIPT_POLL_MS),
            page_blocks: constants::DEFAULT_PAGE_BLOCKS,
        }
    }
}

/// Escrow timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Holding period between creation (block time) and release eligibility.
    pub holding_period: Duration,
}

impl EscrowConfig {
    /// Holding period as a chrono duration for block-time arithmetic.
    #[must_use]
    pub fn holding_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.holding_period)
            .unwrap_or_else(|_| chrono::Duration::days(7))
    }
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            holding_period: Duration::from_secs(constants::DEFAULT_HOLDING_PERIOD_SECS),
        }
    }
}

/// Reconciliation scanner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Interval between scan cycles.
    pub interval: Duration,
    /// Blocks to trail behind the ledger head (reorg margin).
    pub confirmation_depth: u64,
    /// Writer-lease time-to-live; renewed each cycle.
    pub lease_ttl: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(constants::DEFAULT_SCAN_INTERVAL_MS),
            confirmation_depth: constants::DEFAULT_CONFIRMATION_DEPTH,
            lease_ttl: Duration::from_secs(constants::DEFAULT_LEASE_TTL_SECS),
        }
    }
}

/// Mint / gateway orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Backoff for content publication retries.
    pub publish_backoff: BackoffConfig,
    /// Confirmations required before a mint receipt is trusted.
    pub min_confirmations: u64,
    /// Deadline for a single confirmation wait.
    pub confirmation_deadline: Duration,
    /// Optimistic-write retries before surfacing the conflict.
    pub version_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            publish_backoff: BackoffConfig::default(),
            min_confirmations: constants::DEFAULT_MIN_CONFIRMATIONS,
            confirmation_deadline: Duration::from_secs(
                constants::DEFAULT_CONFIRMATION_DEADLINE_SECS,
            ),
            version_retries: constants::DEFAULT_VERSION_RETRIES,
        }
    }
}

/// Bounded exponential backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub base: Duration,
    /// Multiplier applied per attempt.
    pub factor: u32,
    /// Total attempts (including the first).
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(constants::DEFAULT_BACKOFF_BASE_MS),
            factor: constants::DEFAULT_BACKOFF_FACTOR,
            max_attempts: constants::DEFAULT_PUBLISH_ATTEMPTS,
        }
    }
}
