//! # craftvault-ingress
//!
//! The request gateway: the asynchronous operations exposed to the
//! surrounding API layer. Every operation validates locally first — a
//! request the ledger would reject never leaves the process — then submits
//! and returns without waiting for terminal state. Terminal state arrives
//! through the reconciliation scanner; callers poll [`escrow_status`].
//!
//! [`escrow_status`]: MarketGateway::escrow_status

pub mod gateway;

pub use gateway::{EscrowStatusView, MarketGateway};
