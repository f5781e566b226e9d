//! Certificate model: the minted on-ledger identity of a listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, CertificateId, ContentAddress, TxHash};

/// A minted certificate. Created exactly once per listing by the mint saga.
///
/// Immutable after creation except for `owner`, which mirrors ledger truth
/// and is only updated by the reconciliation scanner applying an observed
/// transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Ledger-assigned id, monotonic per contract.
    pub id: CertificateId,
    /// Content address of the metadata document (the certificate URI).
    pub metadata: ContentAddress,
    /// Owning identity, authoritative from the ledger.
    pub owner: AccountId,
    /// The transaction that minted this certificate.
    pub mint_tx: TxHash,
    /// Block time of the mint confirmation.
    pub minted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certificate_serde_roundtrip() {
        let cert = Certificate {
            id: CertificateId(7),
            metadata: ContentAddress::for_bytes(b"metadata"),
            owner: AccountId([2u8; 20]),
            mint_tx: TxHash([3u8; 32]),
            minted_at: Utc::now(),
        };
        let json = serde_json::to_string(&cert).unwrap();
        let back: Certificate = serde_json::from_str(&json).unwrap();
        assert_eq!(cert, back);
    }
}
