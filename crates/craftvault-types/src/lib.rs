//! # craftvault-types
//!
//! Shared types, errors, and configuration for the **CraftVault**
//! tokenization and escrow settlement core.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`ListingId`], [`AccountId`], [`CertificateId`], [`EscrowId`], [`TxHash`], [`ContentAddress`], [`LedgerPosition`]
//! - **Listing model**: [`Listing`], [`ListingStage`], [`ListingDraft`]
//! - **Certificate model**: [`Certificate`]
//! - **Escrow model**: [`EscrowSnapshot`], [`EscrowStatus`]
//! - **Event model**: [`RawLog`], [`EscrowEvent`], [`CertificateTransfer`], [`DecodedEvent`], [`EventTopic`]
//! - **Submission model**: [`PendingHandle`], [`Receipt`]
//! - **Mint saga model**: [`MintStage`], [`MintCheckpoint`]
//! - **Cursor**: [`ReconcileCursor`]
//! - **Configuration**: [`LedgerConfig`], [`EscrowConfig`], [`ScanConfig`], [`OrchestratorConfig`], [`BackoffConfig`]
//! - **Errors**: [`CraftvaultError`] with `CV_ERR_` prefix codes and [`ErrorClass`] tags
//! - **Constants**: system-wide limits and defaults

pub mod backoff;
pub mod certificate;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod escrow;
pub mod event;
pub mod ids;
pub mod listing;
pub mod mint;
pub mod tx;

// Re-export all primary types at crate root for ergonomic imports:
//   use craftvault_types::{Listing, EscrowSnapshot, EscrowEvent, ...};

pub use backoff::*;
pub use certificate::*;
pub use config::*;
pub use cursor::*;
pub use error::*;
pub use escrow::*;
pub use event::*;
pub use ids::*;
pub use listing::*;
pub use mint::*;
pub use tx::*;

// Constants are accessed via `craftvault_types::constants::FOO`
// (not re-exported to avoid name collisions).
