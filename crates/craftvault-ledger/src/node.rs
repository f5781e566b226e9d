//! The ledger-node port and the transaction types that cross it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sha3::{Digest, Keccak256};

use craftvault_types::{
    AccountId, CertificateId, ContentAddress, EscrowId, RawLog, Receipt, Result, TxHash,
};

// ---------------------------------------------------------------------------
// ContractCall
// ---------------------------------------------------------------------------

/// The contract operations the core submits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    /// Mint a certificate carrying the metadata URI.
    Mint { metadata: ContentAddress },
    /// Open an escrow for the certificate; the attached value is the price.
    CreateEscrow { certificate: CertificateId },
    /// Hand the escrowed funds to the seller.
    ReleaseEscrow { escrow: EscrowId },
    /// Return the escrowed funds to the buyer.
    RefundEscrow { escrow: EscrowId },
}

impl ContractCall {
    fn hash_into(&self, hasher: &mut Keccak256) {
        match self {
            Self::Mint { metadata } => {
                hasher.update([0u8]);
                hasher.update(metadata.0.as_bytes());
            }
            Self::CreateEscrow { certificate } => {
                hasher.update([1u8]);
                hasher.update(certificate.0.to_be_bytes());
            }
            Self::ReleaseEscrow { escrow } => {
                hasher.update([2u8]);
                hasher.update(escrow.0.to_be_bytes());
            }
            Self::RefundEscrow { escrow } => {
                hasher.update([3u8]);
                hasher.update(escrow.0.to_be_bytes());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SignedTransaction
// ---------------------------------------------------------------------------

/// A fully formed, signed submission.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub from: AccountId,
    pub call: ContractCall,
    /// Funds attached to the call (escrow creation carries the price).
    pub value: Decimal,
    pub nonce: u64,
    /// Per-gas fee offered.
    pub fee: Decimal,
    pub gas_limit: u64,
    pub hash: TxHash,
    /// ed25519 signature over the hash.
    pub signature: Vec<u8>,
}

impl SignedTransaction {
    /// The transaction hash commits to sender, call, value, nonce, and fee.
    #[must_use]
    pub fn compute_hash(
        from: AccountId,
        call: &ContractCall,
        value: Decimal,
        nonce: u64,
        fee: Decimal,
    ) -> TxHash {
        let mut hasher = Keccak256::new();
        hasher.update(b"craftvault:tx:v1:");
        hasher.update(from.as_bytes());
        call.hash_into(&mut hasher);
        hasher.update(value.to_string().as_bytes());
        hasher.update(nonce.to_be_bytes());
        hasher.update(fee.to_string().as_bytes());
        let digest = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&digest);
        TxHash(hash)
    }
}

// ---------------------------------------------------------------------------
// LedgerNode port
// ---------------------------------------------------------------------------

/// The observed market fee per gas unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub market_fee: Decimal,
}

/// A block reference: number plus block time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub number: u64,
    pub time: DateTime<Utc>,
}

/// Connection to a ledger node. Production backs this with an RPC adapter;
/// tests use the scripted node.
#[async_trait]
pub trait LedgerNode: Send + Sync {
    /// Current market fee estimate.
    async fn fee_quote(&self) -> Result<FeeQuote>;

    /// Next expected nonce for the account.
    async fn account_nonce(&self, account: AccountId) -> Result<u64>;

    /// Submit a signed transaction. Typed rejections: `StaleNonce`,
    /// `FeeTooLow`, `SubmissionRejected`, `NodeUnavailable`.
    async fn submit(&self, tx: SignedTransaction) -> Result<TxHash>;

    /// Receipt for an included transaction, `None` while pending.
    async fn receipt(&self, tx: TxHash) -> Result<Option<Receipt>>;

    /// The node's current head.
    async fn latest_block(&self) -> Result<BlockRef>;

    /// Logs in `[from_block, to_block]` whose `topics[0]` is in `topics`,
    /// ordered by (block number, log index).
    async fn logs(&self, from_block: u64, to_block: u64, topics: &[[u8; 32]])
        -> Result<Vec<RawLog>>;
}
