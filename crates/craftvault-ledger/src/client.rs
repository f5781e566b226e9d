//! The ledger client: signing, nonce sequencing, fee selection, and
//! confirmation waiting.
//!
//! One client serves one signing identity. Submissions are serialized
//! through the nonce guard so two concurrent orchestrations can never
//! consume the same sequence number; confirmation waits run outside the
//! guard and suspend only the calling task.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rust_decimal::Decimal;
use sha3::{Digest, Keccak256};
use tokio::sync::Mutex;

use craftvault_types::{
    AccountId, CraftvaultError, EventTopic, LedgerConfig, PendingHandle, RawLog, Receipt, Result,
};

use crate::{
    codec::{self, DecodedBatch},
    node::{ContractCall, LedgerNode, SignedTransaction},
};

/// Client for one signing identity against one ledger node.
pub struct LedgerClient {
    node: Arc<dyn LedgerNode>,
    signer: SigningKey,
    sender: AccountId,
    config: LedgerConfig,
    /// Next nonce to assign; `None` means refetch from the node. The guard
    /// also serializes submissions for this identity.
    next_nonce: Mutex<Option<u64>>,
}

impl LedgerClient {
    #[must_use]
    pub fn new(node: Arc<dyn LedgerNode>, signer: SigningKey, config: LedgerConfig) -> Self {
        let sender = Self::account_for(&signer.verifying_key());
        Self {
            node,
            signer,
            sender,
            config,
            next_nonce: Mutex::new(None),
        }
    }

    /// The ledger address derived from a verifying key (trailing 20 bytes
    /// of the Keccak-256 key digest).
    #[must_use]
    pub fn account_for(key: &VerifyingKey) -> AccountId {
        let mut hasher = Keccak256::new();
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..32]);
        AccountId(bytes)
    }

    /// The identity this client signs and submits as.
    #[must_use]
    pub fn sender(&self) -> AccountId {
        self.sender
    }

    fn build(&self, call: ContractCall, value: Decimal, nonce: u64, fee: Decimal) -> SignedTransaction {
        let hash = SignedTransaction::compute_hash(self.sender, &call, value, nonce, fee);
        let signature = self.signer.sign(hash.as_bytes()).to_bytes().to_vec();
        SignedTransaction {
            from: self.sender,
            call,
            value,
            nonce,
            fee,
            gas_limit: self.config.gas_limit,
            hash,
            signature,
        }
    }

    /// Submit a call. Assigns the next nonce, offers the market fee plus
    /// the configured premium, and returns without waiting for inclusion.
    ///
    /// A stale-nonce rejection is retried exactly once with the node's
    /// expected nonce; a fee-too-low rejection escalates the fee up to
    /// `max_fee_attempts` before the failure is surfaced.
    pub async fn submit(&self, call: ContractCall, value: Decimal) -> Result<PendingHandle> {
        let mut guard = self.next_nonce.lock().await;
        let mut nonce = match *guard {
            Some(n) => n,
            None => self.node.account_nonce(self.sender).await?,
        };

        let quote = self.node.fee_quote().await?;
        let mut fee = quote.market_fee * (Decimal::ONE + self.config.fee_premium);
        let mut nonce_refreshed = false;
        let mut attempt = 1u32;

        loop {
            let tx = self.build(call.clone(), value, nonce, fee);
            match self.node.submit(tx).await {
                Ok(tx_hash) => {
                    *guard = Some(nonce + 1);
                    return Ok(PendingHandle {
                        tx_hash,
                        nonce,
                        submitted_at: Utc::now(),
                    });
                }
                Err(CraftvaultError::StaleNonce { expected, assigned }) if !nonce_refreshed => {
                    tracing::warn!(assigned, expected, "stale nonce, refreshing once");
                    nonce = expected;
                    nonce_refreshed = true;
                }
                Err(CraftvaultError::FeeTooLow { .. }) if attempt < self.config.max_fee_attempts => {
                    attempt += 1;
                    fee *= Decimal::ONE + self.config.fee_escalation;
                    tracing::debug!(attempt, %fee, "fee below floor, escalating");
                }
                Err(CraftvaultError::FeeTooLow { .. }) => {
                    *guard = None;
                    return Err(CraftvaultError::FeeTooLow { attempts: attempt });
                }
                Err(err) => {
                    // Unknown whether the node consumed anything; refetch
                    // the nonce on the next submission.
                    *guard = None;
                    return Err(err);
                }
            }
        }
    }

    /// Resubmit after a confirmation timeout, reusing the handle's nonce so
    /// the ledger can include at most one of the two submissions.
    pub async fn resubmit(
        &self,
        handle: &PendingHandle,
        call: ContractCall,
        value: Decimal,
    ) -> Result<PendingHandle> {
        let quote = self.node.fee_quote().await?;
        let fee = quote.market_fee
            * (Decimal::ONE + self.config.fee_premium + self.config.fee_escalation);
        let tx = self.build(call, value, handle.nonce, fee);
        let tx_hash = self.node.submit(tx).await?;
        Ok(PendingHandle {
            tx_hash,
            nonce: handle.nonce,
            submitted_at: Utc::now(),
        })
    }

    /// Poll until the transaction has `min_confirmations` confirmations or
    /// the caller's deadline elapses. On timeout the handle comes back
    /// inside the error so the caller can keep polling or resubmit; the
    /// wait itself never retries or resubmits.
    pub async fn await_confirmation(
        &self,
        handle: PendingHandle,
        min_confirmations: u64,
        deadline: Duration,
    ) -> Result<Receipt> {
        let start = tokio::time::Instant::now();
        loop {
            if let Some(receipt) = self.node.receipt(handle.tx_hash).await? {
                if !receipt.succeeded {
                    return Err(CraftvaultError::SubmissionRejected {
                        reason: format!("transaction {} reverted", handle.tx_hash),
                    });
                }
                let head = self.node.latest_block().await?.number;
                if receipt.confirmations(head) >= min_confirmations {
                    return Ok(receipt);
                }
            }
            if start.elapsed() >= deadline {
                return Err(CraftvaultError::ConfirmationTimeout { handle });
            }
            tokio::time::sleep(self.config.receipt_poll_interval).await;
        }
    }

    /// Decode the receipt's logs into typed events, counting what does not
    /// parse.
    #[must_use]
    pub fn decode_events(receipt: &Receipt, expected: &[EventTopic]) -> DecodedBatch {
        codec::decode_escrow_events(&receipt.logs, expected)
    }

    /// Query logs over `[from_block, to_block]`, paginated internally and
    /// returned in deterministic (block, log index) order.
    pub async fn query_logs(
        &self,
        from_block: u64,
        to_block: u64,
        topics: &[EventTopic],
    ) -> Result<Vec<RawLog>> {
        let hashes: Vec<[u8; 32]> = topics.iter().map(|t| codec::topic_hash(*t)).collect();
        let mut all = Vec::new();
        let mut start = from_block;
        while start <= to_block {
            let end = start
                .saturating_add(self.config.page_blocks.saturating_sub(1))
                .min(to_block);
            let mut page = self.node.logs(start, end, &hashes).await?;
            all.append(&mut page);
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }
        all.sort_by_key(|l| l.position);
        Ok(all)
    }

    /// The node's current head block.
    pub async fn latest_block(&self) -> Result<crate::node::BlockRef> {
        self.node.latest_block().await
    }

    /// Receipt lookup without waiting.
    pub async fn receipt(&self, handle: &PendingHandle) -> Result<Option<Receipt>> {
        self.node.receipt(handle.tx_hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use craftvault_types::{CertificateId, ContentAddress, EscrowId};

    use crate::testkit::{ScriptedNode, SubmitFault};

    fn signer(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn client_with(node: Arc<ScriptedNode>) -> LedgerClient {
        LedgerClient::new(node, signer(7), LedgerConfig::default())
    }

    fn mint_call() -> ContractCall {
        ContractCall::Mint {
            metadata: ContentAddress::for_bytes(b"meta"),
        }
    }

    #[tokio::test]
    async fn nonces_are_sequential() {
        let node = Arc::new(ScriptedNode::new());
        let client = client_with(Arc::clone(&node));

        let h0 = client.submit(mint_call(), Decimal::ZERO).await.unwrap();
        let h1 = client.submit(mint_call(), Decimal::ZERO).await.unwrap();
        let h2 = client.submit(mint_call(), Decimal::ZERO).await.unwrap();
        assert_eq!((h0.nonce, h1.nonce, h2.nonce), (0, 1, 2));
        assert_eq!(node.submission_count(), 3);
    }

    #[tokio::test]
    async fn stale_nonce_retried_exactly_once() {
        let node = Arc::new(ScriptedNode::new());
        // The node has already seen two submissions from this sender
        // (e.g. a previous process); the fresh client would assign 0.
        let client = client_with(Arc::clone(&node));
        node.push_fault(SubmitFault::StaleNonce { expected: 2 });

        let handle = client.submit(mint_call(), Decimal::ZERO).await.unwrap();
        assert_eq!(handle.nonce, 2);
        assert_eq!(node.submission_count(), 1);

        // The refreshed sequence continues locally without another fetch.
        let next = client.submit(mint_call(), Decimal::ZERO).await.unwrap();
        assert_eq!(next.nonce, 3);
    }

    #[tokio::test]
    async fn fee_escalation_is_bounded() {
        let node = Arc::new(ScriptedNode::new());
        let client = client_with(Arc::clone(&node));
        // Floor far above market * (1 + premium) * escalations.
        node.set_min_fee(Decimal::new(1_000_000, 0));

        let err = client.submit(mint_call(), Decimal::ZERO).await.unwrap_err();
        assert!(matches!(err, CraftvaultError::FeeTooLow { attempts: 3 }));
        assert_eq!(node.submission_count(), 0);
    }

    #[tokio::test]
    async fn fee_escalation_clears_a_raised_floor() {
        let node = Arc::new(ScriptedNode::new());
        let client = client_with(Arc::clone(&node));
        // Market fee is 1.0; premium lands at 1.125. A floor of 1.2 needs
        // one escalation step to clear.
        node.set_min_fee(Decimal::new(12, 1));

        let handle = client.submit(mint_call(), Decimal::ZERO).await.unwrap();
        assert_eq!(handle.nonce, 0);
        assert_eq!(node.submission_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_timeout_returns_resumable_handle() {
        let node = Arc::new(ScriptedNode::new());
        let client = client_with(Arc::clone(&node));

        let handle = client.submit(mint_call(), Decimal::ZERO).await.unwrap();
        // Never mined: the wait must give up at the deadline.
        let err = client
            .await_confirmation(handle, 1, Duration::from_secs(10))
            .await
            .unwrap_err();
        let CraftvaultError::ConfirmationTimeout { handle: returned } = err else {
            panic!("expected timeout, got {err}");
        };
        assert_eq!(returned, handle);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_after_mining() {
        let node = Arc::new(ScriptedNode::new());
        let client = client_with(Arc::clone(&node));

        let handle = client.submit(mint_call(), Decimal::ZERO).await.unwrap();
        node.mine();

        let receipt = client
            .await_confirmation(handle, 1, Duration::from_secs(10))
            .await
            .unwrap();
        assert!(receipt.succeeded);
        assert_eq!(receipt.tx_hash, handle.tx_hash);
    }

    #[tokio::test(start_paused = true)]
    async fn min_confirmations_waits_for_depth() {
        let node = Arc::new(ScriptedNode::new());
        let client = client_with(Arc::clone(&node));

        let handle = client.submit(mint_call(), Decimal::ZERO).await.unwrap();
        node.mine();
        // Only 1 confirmation so far; require 3.
        let err = client
            .await_confirmation(handle, 3, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, CraftvaultError::ConfirmationTimeout { .. }));

        node.advance_blocks(2);
        let receipt = client
            .await_confirmation(handle, 3, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(receipt.succeeded);
    }

    #[tokio::test]
    async fn resubmit_reuses_nonce() {
        let node = Arc::new(ScriptedNode::new());
        let client = client_with(Arc::clone(&node));

        let handle = client.submit(mint_call(), Decimal::ZERO).await.unwrap();
        // The scripted node drops the pending entry so the resubmission is
        // accepted under the same nonce.
        node.drop_pending();

        let second = client.resubmit(&handle, mint_call(), Decimal::ZERO).await.unwrap();
        assert_eq!(second.nonce, handle.nonce);
        // Escalated fee changes the hash even though the call is identical.
        assert_ne!(second.tx_hash, handle.tx_hash);
    }

    #[tokio::test]
    async fn query_logs_pages_and_orders() {
        let node = Arc::new(ScriptedNode::new());
        let client = LedgerClient::new(
            Arc::clone(&node) as Arc<dyn LedgerNode>,
            signer(7),
            LedgerConfig {
                page_blocks: 10,
                ..LedgerConfig::default()
            },
        );

        // Scatter creation events across a span wider than one page.
        for i in 0..5u64 {
            node.advance_blocks(7);
            node.inject_escrow_created(
                EscrowId(i),
                CertificateId(i),
                AccountId([1u8; 20]),
                AccountId([2u8; 20]),
                Decimal::ONE,
            );
        }

        let head = node.head();
        let logs = client
            .query_logs(0, head, &EventTopic::escrow_topics())
            .await
            .unwrap();
        assert_eq!(logs.len(), 5);
        assert!(logs.windows(2).all(|w| w[0].position < w[1].position));
        assert!(node.log_queries() >= 4, "expected paged queries");
    }
}
