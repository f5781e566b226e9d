//! Scripted in-memory ledger node for tests.
//!
//! `ScriptedNode` behaves like a tiny single-contract chain: submissions
//! are validated (nonce, fee floor), mined on demand, and mined calls emit
//! the same logs the real contract would. Tests script faults, fee floors,
//! block production, and externally observed events (escrows created by
//! other parties) without any network.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use craftvault_types::{
    AccountId, CertificateId, CraftvaultError, EscrowId, LedgerPosition, RawLog, Receipt, Result,
    TxHash,
};

use crate::{
    codec,
    node::{BlockRef, ContractCall, FeeQuote, LedgerNode, SignedTransaction},
};

/// A scripted submission failure, popped once per `submit` call.
#[derive(Debug, Clone, Copy)]
pub enum SubmitFault {
    /// Reject with a stale-nonce error and re-seat the account at `expected`.
    StaleNonce { expected: u64 },
    /// Reject with a fee-too-low error regardless of the offered fee.
    FeeTooLow,
    /// Reject as unreachable.
    Unavailable,
}

#[derive(Debug, Clone)]
struct EscrowRecord {
    certificate: CertificateId,
    buyer: AccountId,
    seller: AccountId,
    amount: Decimal,
}

#[derive(Debug, Default)]
struct NodeState {
    head: u64,
    market_fee: Decimal,
    min_fee: Decimal,
    nonces: HashMap<AccountId, u64>,
    pending: Vec<SignedTransaction>,
    receipts: HashMap<TxHash, Receipt>,
    logs: Vec<RawLog>,
    faults: VecDeque<SubmitFault>,
    cert_owners: HashMap<CertificateId, AccountId>,
    escrows: HashMap<EscrowId, EscrowRecord>,
    next_certificate: u64,
    next_escrow: u64,
    accepted: u64,
    log_queries: u64,
    logs_in_head: u32,
}

/// In-memory scripted [`LedgerNode`].
#[derive(Debug)]
pub struct ScriptedNode {
    state: Mutex<NodeState>,
    genesis_time: DateTime<Utc>,
    block_interval: chrono::Duration,
}

impl Default for ScriptedNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedNode {
    /// Node at genesis with a 12-second block interval and a market fee of 1.
    #[must_use]
    pub fn new() -> Self {
        Self::with_interval(chrono::Duration::seconds(12))
    }

    /// Node with a custom block interval (longer intervals keep block
    /// arithmetic small in holding-period tests).
    #[must_use]
    pub fn with_interval(block_interval: chrono::Duration) -> Self {
        Self {
            state: Mutex::new(NodeState {
                market_fee: Decimal::ONE,
                next_certificate: 1,
                next_escrow: 1,
                ..NodeState::default()
            }),
            genesis_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            block_interval,
        }
    }

    fn block_time(&self, block: u64) -> DateTime<Utc> {
        self.genesis_time + self.block_interval * i32::try_from(block).unwrap_or(i32::MAX)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NodeState> {
        self.state.lock().expect("scripted node poisoned")
    }

    // --- scripting -----------------------------------------------------

    pub fn set_market_fee(&self, fee: Decimal) {
        self.lock().market_fee = fee;
    }

    pub fn set_min_fee(&self, fee: Decimal) {
        self.lock().min_fee = fee;
    }

    pub fn push_fault(&self, fault: SubmitFault) {
        self.lock().faults.push_back(fault);
    }

    /// Drop all pending submissions and roll the affected nonces back, as
    /// if the transactions were never seen.
    pub fn drop_pending(&self) {
        let mut state = self.lock();
        let pending = std::mem::take(&mut state.pending);
        for tx in pending {
            let nonce = state.nonces.entry(tx.from).or_insert(0);
            *nonce = (*nonce).min(tx.nonce);
        }
    }

    /// Mine one block containing all pending submissions.
    pub fn mine(&self) {
        let mut state = self.lock();
        state.head += 1;
        state.logs_in_head = 0;
        let head = state.head;
        let time = self.block_time(head);
        let pending = std::mem::take(&mut state.pending);
        for tx in pending {
            self.execute(&mut state, tx, head, time);
        }
    }

    /// Mine `n` empty blocks (pending submissions stay pending).
    pub fn advance_blocks(&self, n: u64) {
        let mut state = self.lock();
        state.head += n;
        state.logs_in_head = 0;
    }

    /// Advance the chain until the head block time reaches `at` or later.
    pub fn advance_until(&self, at: DateTime<Utc>) {
        loop {
            let head = self.lock().head;
            if self.block_time(head) >= at {
                return;
            }
            self.advance_blocks(1);
        }
    }

    fn push_log(
        state: &mut NodeState,
        head: u64,
        time: DateTime<Utc>,
        tx_hash: TxHash,
        topics: Vec<[u8; 32]>,
        data: Vec<u8>,
    ) -> RawLog {
        let log = RawLog {
            position: LedgerPosition::new(head, state.logs_in_head),
            block_time: time,
            tx_hash,
            topics,
            data,
        };
        state.logs_in_head += 1;
        state.logs.push(log.clone());
        log
    }

    #[allow(clippy::needless_pass_by_value)]
    fn execute(&self, state: &mut NodeState, tx: SignedTransaction, head: u64, time: DateTime<Utc>) {
        let mut receipt_logs = Vec::new();
        match &tx.call {
            ContractCall::Mint { .. } => {
                let certificate = CertificateId(state.next_certificate);
                state.next_certificate += 1;
                state.cert_owners.insert(certificate, tx.from);
                let (topics, data) = codec::encode_transfer(AccountId::ZERO, tx.from, certificate);
                receipt_logs.push(Self::push_log(state, head, time, tx.hash, topics, data));
            }
            ContractCall::CreateEscrow { certificate } => {
                if let Some(seller) = state.cert_owners.get(certificate).copied() {
                    let escrow = EscrowId(state.next_escrow);
                    state.next_escrow += 1;
                    state.escrows.insert(
                        escrow,
                        EscrowRecord {
                            certificate: *certificate,
                            buyer: tx.from,
                            seller,
                            amount: tx.value,
                        },
                    );
                    let (topics, data) = codec::encode_escrow_created(
                        escrow,
                        *certificate,
                        tx.from,
                        seller,
                        tx.value,
                    );
                    receipt_logs.push(Self::push_log(state, head, time, tx.hash, topics, data));
                }
            }
            ContractCall::ReleaseEscrow { escrow } => {
                if let Some(record) = state.escrows.get(escrow).cloned() {
                    state.cert_owners.insert(record.certificate, record.buyer);
                    let (topics, data) = codec::encode_escrow_settled(
                        craftvault_types::EventTopic::EscrowReleased,
                        *escrow,
                        record.buyer,
                        record.amount,
                    );
                    receipt_logs.push(Self::push_log(state, head, time, tx.hash, topics, data));
                }
            }
            ContractCall::RefundEscrow { escrow } => {
                if let Some(record) = state.escrows.get(escrow).cloned() {
                    let (topics, data) = codec::encode_escrow_settled(
                        craftvault_types::EventTopic::EscrowRefunded,
                        *escrow,
                        record.buyer,
                        record.amount,
                    );
                    receipt_logs.push(Self::push_log(state, head, time, tx.hash, topics, data));
                }
            }
        }
        state.receipts.insert(
            tx.hash,
            Receipt {
                tx_hash: tx.hash,
                block: head,
                block_time: time,
                succeeded: true,
                logs: receipt_logs,
            },
        );
    }

    /// Record an externally created escrow: a log in a fresh block, as if
    /// another party had submitted it.
    pub fn inject_escrow_created(
        &self,
        escrow: EscrowId,
        certificate: CertificateId,
        buyer: AccountId,
        seller: AccountId,
        amount: Decimal,
    ) {
        let mut state = self.lock();
        state.head += 1;
        state.logs_in_head = 0;
        let head = state.head;
        let time = self.block_time(head);
        state.escrows.insert(
            escrow,
            EscrowRecord {
                certificate,
                buyer,
                seller,
                amount,
            },
        );
        state.next_escrow = state.next_escrow.max(escrow.0 + 1);
        let (topics, data) = codec::encode_escrow_created(escrow, certificate, buyer, seller, amount);
        Self::push_log(&mut state, head, time, TxHash([0xEE; 32]), topics, data);
    }

    /// Record an externally observed settlement event (release or refund).
    pub fn inject_escrow_settled(
        &self,
        topic: craftvault_types::EventTopic,
        escrow: EscrowId,
        buyer: AccountId,
        amount: Decimal,
    ) {
        let mut state = self.lock();
        state.head += 1;
        state.logs_in_head = 0;
        let head = state.head;
        let time = self.block_time(head);
        let (topics, data) = codec::encode_escrow_settled(topic, escrow, buyer, amount);
        Self::push_log(&mut state, head, time, TxHash([0xEE; 32]), topics, data);
    }

    /// Emit a log carrying a subscribed topic but truncated data — the
    /// kind of entry the decoder must count and skip.
    pub fn inject_malformed(&self, topic: craftvault_types::EventTopic) {
        let mut state = self.lock();
        state.head += 1;
        state.logs_in_head = 0;
        let head = state.head;
        let time = self.block_time(head);
        let topics = vec![codec::topic_hash(topic), [0u8; 32]];
        Self::push_log(&mut state, head, time, TxHash([0xBA; 32]), topics, vec![0u8; 7]);
    }

    /// Duplicate the last emitted log in a fresh block — scripted
    /// double-delivery.
    pub fn replay_last_log(&self) {
        let mut state = self.lock();
        let Some(last) = state.logs.last().cloned() else {
            return;
        };
        state.head += 1;
        state.logs_in_head = 0;
        let head = state.head;
        let time = self.block_time(head);
        Self::push_log(&mut state, head, time, last.tx_hash, last.topics, last.data);
    }

    // --- inspection ----------------------------------------------------

    #[must_use]
    pub fn head(&self) -> u64 {
        self.lock().head
    }

    /// Block time at the current head.
    #[must_use]
    pub fn head_time(&self) -> DateTime<Utc> {
        let head = self.lock().head;
        self.block_time(head)
    }

    /// Accepted (not faulted) submissions so far.
    #[must_use]
    pub fn submission_count(&self) -> u64 {
        self.lock().accepted
    }

    /// Number of `logs` queries served.
    #[must_use]
    pub fn log_queries(&self) -> u64 {
        self.lock().log_queries
    }

    /// Current owner of a certificate, per the scripted contract.
    #[must_use]
    pub fn certificate_owner(&self, certificate: CertificateId) -> Option<AccountId> {
        self.lock().cert_owners.get(&certificate).copied()
    }
}

#[async_trait]
impl LedgerNode for ScriptedNode {
    async fn fee_quote(&self) -> Result<FeeQuote> {
        Ok(FeeQuote {
            market_fee: self.lock().market_fee,
        })
    }

    async fn account_nonce(&self, account: AccountId) -> Result<u64> {
        Ok(self.lock().nonces.get(&account).copied().unwrap_or(0))
    }

    async fn submit(&self, tx: SignedTransaction) -> Result<TxHash> {
        let mut state = self.lock();

        if let Some(fault) = state.faults.pop_front() {
            match fault {
                SubmitFault::StaleNonce { expected } => {
                    state.nonces.insert(tx.from, expected);
                    return Err(CraftvaultError::StaleNonce {
                        assigned: tx.nonce,
                        expected,
                    });
                }
                SubmitFault::FeeTooLow => {
                    return Err(CraftvaultError::FeeTooLow { attempts: 1 });
                }
                SubmitFault::Unavailable => {
                    return Err(CraftvaultError::NodeUnavailable {
                        reason: "scripted outage".into(),
                    });
                }
            }
        }

        let expected = state.nonces.get(&tx.from).copied().unwrap_or(0);
        if tx.nonce != expected {
            return Err(CraftvaultError::StaleNonce {
                assigned: tx.nonce,
                expected,
            });
        }
        if tx.fee < state.min_fee {
            return Err(CraftvaultError::FeeTooLow { attempts: 1 });
        }

        state.nonces.insert(tx.from, expected + 1);
        state.accepted += 1;
        let hash = tx.hash;
        state.pending.push(tx);
        Ok(hash)
    }

    async fn receipt(&self, tx: TxHash) -> Result<Option<Receipt>> {
        Ok(self.lock().receipts.get(&tx).cloned())
    }

    async fn latest_block(&self) -> Result<BlockRef> {
        let head = self.lock().head;
        Ok(BlockRef {
            number: head,
            time: self.block_time(head),
        })
    }

    async fn logs(
        &self,
        from_block: u64,
        to_block: u64,
        topics: &[[u8; 32]],
    ) -> Result<Vec<RawLog>> {
        let mut state = self.lock();
        state.log_queries += 1;
        Ok(state
            .logs
            .iter()
            .filter(|log| {
                log.position.block >= from_block
                    && log.position.block <= to_block
                    && log
                        .topics
                        .first()
                        .is_some_and(|sig| topics.contains(sig))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_times_advance_with_interval() {
        let node = ScriptedNode::with_interval(chrono::Duration::hours(1));
        let t0 = node.head_time();
        node.advance_blocks(3);
        assert_eq!(node.head_time() - t0, chrono::Duration::hours(3));
    }

    #[tokio::test]
    async fn mined_mint_emits_zero_from_transfer() {
        let node = ScriptedNode::new();
        let owner = AccountId([7u8; 20]);
        let tx = SignedTransaction {
            from: owner,
            call: ContractCall::Mint {
                metadata: craftvault_types::ContentAddress::for_bytes(b"m"),
            },
            value: Decimal::ZERO,
            nonce: 0,
            fee: Decimal::ONE,
            gas_limit: 500_000,
            hash: TxHash([1u8; 32]),
            signature: vec![],
        };
        node.submit(tx).await.unwrap();
        node.mine();

        let receipt = node.receipt(TxHash([1u8; 32])).await.unwrap().unwrap();
        let transfer = codec::extract_mint_transfer(&receipt).unwrap();
        assert!(transfer.is_mint());
        assert_eq!(node.certificate_owner(transfer.certificate), Some(owner));
    }

    #[tokio::test]
    async fn escrow_cycle_emits_expected_logs() {
        let node = ScriptedNode::new();
        let seller = AccountId([1u8; 20]);
        let buyer = AccountId([2u8; 20]);

        // Seed a certificate owned by the seller.
        node.inject_escrow_created(
            EscrowId(99),
            CertificateId(50),
            buyer,
            seller,
            Decimal::ONE,
        );
        node.inject_escrow_settled(
            craftvault_types::EventTopic::EscrowReleased,
            EscrowId(99),
            buyer,
            Decimal::ONE,
        );

        let logs = node
            .logs(
                0,
                node.head(),
                &[
                    codec::topic_hash(craftvault_types::EventTopic::EscrowCreated),
                    codec::topic_hash(craftvault_types::EventTopic::EscrowReleased),
                ],
            )
            .await
            .unwrap();
        assert_eq!(logs.len(), 2);
    }
}
