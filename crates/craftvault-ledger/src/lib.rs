//! # craftvault-ledger
//!
//! The Ledger Client plane: everything that talks to the external
//! append-only ledger. Wraps transaction submission (nonce sequencing, fee
//! selection with a configurable premium, bounded escalation), confirmation
//! waiting with caller-supplied deadlines, structured log decoding, and
//! paginated log queries with deterministic (block, log index) ordering.
//!
//! The node itself sits behind the [`LedgerNode`] port; production wires an
//! RPC adapter, tests wire the scripted in-memory node from [`testkit`].

pub mod client;
pub mod codec;
pub mod node;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use client::LedgerClient;
pub use codec::{DecodedBatch, decode_escrow_events, extract_mint_transfer, topic_hash};
pub use node::{BlockRef, ContractCall, FeeQuote, LedgerNode, SignedTransaction};
