//! # craftvault-reconcile
//!
//! The reconciliation plane: a recurring scan cycle that pulls escrow
//! events from the ledger (trailing the head by a confirmation-depth
//! margin), replays them through the pure transition function, applies
//! accepted transitions to the catalog, and advances the durable cursor
//! only after the whole batch has landed.
//!
//! The scanner is the single writer of escrow status. Requests submit
//! transactions and return; the state everyone reads converges here.

pub mod scanner;
pub mod scheduler;

pub use scanner::{ReconcileScanner, ScanMetrics};
pub use scheduler::{CancelHandle, IntervalTicker, ManualTicker, ManualTickerHandle, Ticker};
