//! # craftvault-catalog
//!
//! The Catalog Store contract and its in-memory reference backend.
//!
//! The catalog is the single shared mutable resource of the system: the
//! read model for listings, certificates, and escrow snapshots, plus the
//! durable scraps the orchestrators need to survive a crash (mint
//! checkpoints, escrow intents, the reconciliation cursor, the scanner's
//! writer lease). Every listing write goes through optimistic versioning so
//! a stale orchestration step cannot clobber a newer reconciled state.

pub mod lock;
pub mod memory;
pub mod store;

pub use lock::{EntityGuard, EntityLocks, Lease};
pub use memory::MemoryCatalog;
pub use store::{CatalogStore, EscrowIntent};
