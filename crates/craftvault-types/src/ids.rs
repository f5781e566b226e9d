//! Globally unique identifiers used throughout CraftVault.
//!
//! Locally minted identifiers ([`ListingId`]) use UUIDv7 for time-ordered
//! lexicographic sorting. Ledger-assigned identifiers ([`CertificateId`],
//! [`EscrowId`]) are plain integers handed out by the contract; the core
//! never invents them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ListingId
// ---------------------------------------------------------------------------

/// Globally unique listing identifier. Uses UUIDv7 for time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ListingId(pub Uuid);

impl ListingId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for ListingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A ledger account identity (20-byte address).
///
/// The all-zero address is the mint sentinel: a certificate transfer whose
/// `from` side is [`AccountId::ZERO`] is a fresh mint, not a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    /// The null/zero identity used as the `from` side of mint transfers.
    pub const ZERO: Self = Self([0u8; 20]);

    #[must_use]
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Random account for tests and fixtures.
    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; 20];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes[..]);
        Self(bytes)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// CertificateId
// ---------------------------------------------------------------------------

/// Ledger-assigned certificate identifier, monotonic per contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CertificateId(pub u64);

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cert:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EscrowId
// ---------------------------------------------------------------------------

/// Ledger-assigned escrow identifier.
///
/// Globally unique per escrow instance: a certificate re-escrowed after a
/// refund gets a fresh id, so duplicate-creation detection stays strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EscrowId(pub u64);

impl fmt::Display for EscrowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "escrow:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TxHash
// ---------------------------------------------------------------------------

/// A ledger transaction hash (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes[..]);
        Self(bytes)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// ContentAddress
// ---------------------------------------------------------------------------

/// A hash-derived identifier for bytes published to the content store.
///
/// Same bytes ⇒ same address; the publisher is idempotent per content hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ContentAddress(pub String);

impl ContentAddress {
    /// Derive the canonical address for a byte payload (SHA-256, hex).
    #[must_use]
    pub fn for_bytes(bytes: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"craftvault:content:v1:");
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// The URI form embedded in metadata documents.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("cas://{}", self.0)
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// LedgerPosition
// ---------------------------------------------------------------------------

/// A position in the ledger's event stream: (block number, log index).
///
/// Total order matches the ledger's canonical event ordering; the
/// reconciliation cursor and log queries both rely on it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize, Default,
)]
pub struct LedgerPosition {
    pub block: u64,
    pub log_index: u32,
}

impl LedgerPosition {
    #[must_use]
    pub fn new(block: u64, log_index: u32) -> Self {
        Self { block, log_index }
    }
}

impl fmt::Display for LedgerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.block, self.log_index)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_id_uniqueness() {
        let a = ListingId::new();
        let b = ListingId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn listing_id_ordering() {
        let a = ListingId::new();
        let b = ListingId::new();
        assert!(a < b);
    }

    #[test]
    fn zero_account_is_mint_sentinel() {
        assert!(AccountId::ZERO.is_zero());
        assert!(!AccountId::random().is_zero());
    }

    #[test]
    fn account_display_is_hex() {
        let id = AccountId([0xab; 20]);
        let s = format!("{id}");
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 2 + 40);
    }

    #[test]
    fn content_address_is_deterministic() {
        let a = ContentAddress::for_bytes(b"handwoven basket");
        let b = ContentAddress::for_bytes(b"handwoven basket");
        assert_eq!(a, b);
        assert_ne!(a, ContentAddress::for_bytes(b"ceramic vase"));
    }

    #[test]
    fn content_address_uri_form() {
        let addr = ContentAddress::for_bytes(b"x");
        assert!(addr.uri().starts_with("cas://"));
    }

    #[test]
    fn ledger_position_ordering() {
        let a = LedgerPosition::new(10, 3);
        let b = LedgerPosition::new(10, 4);
        let c = LedgerPosition::new(11, 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn serde_roundtrips() {
        let lid = ListingId::new();
        let json = serde_json::to_string(&lid).unwrap();
        let back: ListingId = serde_json::from_str(&json).unwrap();
        assert_eq!(lid, back);

        let pos = LedgerPosition::new(42, 7);
        let json = serde_json::to_string(&pos).unwrap();
        let back: LedgerPosition = serde_json::from_str(&json).unwrap();
        assert_eq!(pos, back);
    }
}
