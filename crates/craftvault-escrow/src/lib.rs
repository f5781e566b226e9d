//! # craftvault-escrow
//!
//! The pure plane of the escrow lifecycle: the transition function the
//! reconciliation scanner drives, and the authorization checks the gateway
//! runs before submitting release/refund transactions.
//!
//! Nothing here performs I/O. The transition function is deterministic and
//! total — every (state, event) pair maps to either an applied status or a
//! rejection, and rejections are expected traffic (duplicate delivery),
//! not errors.

pub mod policy;
pub mod transition;

pub use policy::{ReleasePolicy, authorize_refund, authorize_release};
pub use transition::{RejectReason, Transition, transition};
