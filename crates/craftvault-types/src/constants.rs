//! System-wide constants for the CraftVault settlement core.

/// Fixed-point scale for ledger-native amounts (9 decimal places).
pub const AMOUNT_SCALE: u32 = 9;

/// Default escrow holding period in seconds (7 days).
pub const DEFAULT_HOLDING_PERIOD_SECS: u64 = 7 * 24 * 60 * 60;

/// Default gas limit for mint and escrow transactions.
pub const DEFAULT_GAS_LIMIT: u64 = 500_000;

/// Default premium over the observed market fee, in thousandths (125 = 12.5%).
pub const DEFAULT_FEE_PREMIUM_MILLIS: u64 = 125;

/// Default fee escalation step between retry attempts, in thousandths.
pub const DEFAULT_FEE_ESCALATION_MILLIS: u64 = 250;

/// Maximum fee escalation attempts before a submission is reported failed.
pub const DEFAULT_MAX_FEE_ATTEMPTS: u32 = 3;

/// Default confirmations required before a receipt is trusted.
pub const DEFAULT_MIN_CONFIRMATIONS: u64 = 1;

/// Default receipt poll interval in milliseconds.
pub const DEFAULT_RECEIPT_POLL_MS: u64 = 2_000;

/// Default confirmation-wait deadline in seconds.
pub const DEFAULT_CONFIRMATION_DEADLINE_SECS: u64 = 180;

/// Blocks the scanner trails behind the head to sidestep reorganizations.
pub const DEFAULT_CONFIRMATION_DEPTH: u64 = 6;

/// Default scan cycle interval in milliseconds (one ledger block time).
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 12_000;

/// Maximum block span requested from the node per log query page.
pub const DEFAULT_PAGE_BLOCKS: u64 = 2_000;

/// Default writer-lease time-to-live in seconds.
pub const DEFAULT_LEASE_TTL_SECS: u64 = 30;

/// Default attempts for content publication before surfacing failure.
pub const DEFAULT_PUBLISH_ATTEMPTS: u32 = 4;

/// Default base delay for exponential backoff in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 250;

/// Default backoff multiplier between attempts.
pub const DEFAULT_BACKOFF_FACTOR: u32 = 2;

/// Default optimistic-write retries before the conflict is surfaced.
pub const DEFAULT_VERSION_RETRIES: u32 = 3;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "CraftVault";
