//! # craftvault-minting
//!
//! The minting orchestrator: turns a draft listing into an on-ledger
//! certificate. Publishes the asset bytes and the metadata document to the
//! content store, submits the mint transaction, waits for confirmation,
//! extracts the assigned certificate id from the zero-from transfer event,
//! and persists the certificate against the listing.
//!
//! Every step is idempotent and checkpointed; a crash at any point resumes
//! from the checkpoint instead of redoing (and in the worst case
//! re-minting) completed work.

pub mod metadata;
pub mod orchestrator;
pub mod publisher;

pub use metadata::MetadataDocument;
pub use orchestrator::MintOrchestrator;
pub use publisher::{ContentPublisher, MemoryPublisher};
