//! Log codec: event-signature topics, word packing, and typed decoding.
//!
//! Decoding is total: a log that does not parse is skipped and counted,
//! never an error. The original system wrapped its log parsing in
//! best-effort try/catch; here every decoder returns an `Option` and the
//! batch carries an undecodable count the scanner surfaces as a metric.
//!
//! Wire layout: `topics[0]` is the Keccak-256 hash of the canonical event
//! signature; indexed fields follow as 32-byte words in `topics[1..]`;
//! remaining fields are packed as 32-byte words in `data`. Amounts travel
//! as fixed-point integers scaled by [`constants::AMOUNT_SCALE`].

use rust_decimal::Decimal;
use sha3::{Digest, Keccak256};

use craftvault_types::{
    AccountId, CertificateId, CertificateTransfer, DecodedEvent, EscrowEvent, EscrowId,
    EventTopic, RawLog, Receipt, constants,
};

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// Keccak-256 hash of the topic's canonical signature.
#[must_use]
pub fn topic_hash(topic: EventTopic) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(topic.signature().as_bytes());
    let digest = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&digest);
    hash
}

// ---------------------------------------------------------------------------
// Word packing
// ---------------------------------------------------------------------------

fn u64_word(v: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&v.to_be_bytes());
    word
}

fn account_word(a: AccountId) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(a.as_bytes());
    word
}

fn word_u64(word: &[u8]) -> Option<u64> {
    let tail: [u8; 8] = word.get(24..32)?.try_into().ok()?;
    Some(u64::from_be_bytes(tail))
}

fn word_account(word: &[u8]) -> Option<AccountId> {
    let tail: [u8; 20] = word.get(12..32)?.try_into().ok()?;
    Some(AccountId(tail))
}

fn word_amount(word: &[u8]) -> Option<Decimal> {
    let tail: [u8; 16] = word.get(16..32)?.try_into().ok()?;
    Some(units_to_amount(u128::from_be_bytes(tail)))
}

/// Scale a decimal amount to ledger-native integer units.
/// `None` for negative amounts or overflow.
#[must_use]
pub fn amount_to_units(amount: Decimal) -> Option<u128> {
    let mut scaled = amount;
    scaled.rescale(constants::AMOUNT_SCALE);
    u128::try_from(scaled.mantissa()).ok()
}

/// Inverse of [`amount_to_units`].
#[must_use]
pub fn units_to_amount(units: u128) -> Decimal {
    // i128 cannot overflow here: units fits 16 bytes and mantissa is i128,
    // but clamp anyway rather than panic on a hostile log.
    let mantissa = i128::try_from(units).unwrap_or(i128::MAX);
    Decimal::from_i128_with_scale(mantissa, constants::AMOUNT_SCALE)
}

// ---------------------------------------------------------------------------
// Encoding (used by the scripted node; a real node emits these natively)
// ---------------------------------------------------------------------------

/// Topics + data for an `EscrowCreated` log.
#[must_use]
pub fn encode_escrow_created(
    escrow: EscrowId,
    certificate: CertificateId,
    buyer: AccountId,
    seller: AccountId,
    amount: Decimal,
) -> (Vec<[u8; 32]>, Vec<u8>) {
    let units = amount_to_units(amount).unwrap_or(0);
    let mut data = Vec::with_capacity(4 * 32);
    data.extend_from_slice(&u64_word(certificate.0));
    data.extend_from_slice(&account_word(buyer));
    data.extend_from_slice(&account_word(seller));
    let mut amount_word = [0u8; 32];
    amount_word[16..].copy_from_slice(&units.to_be_bytes());
    data.extend_from_slice(&amount_word);
    (
        vec![topic_hash(EventTopic::EscrowCreated), u64_word(escrow.0)],
        data,
    )
}

/// Topics + data for an `EscrowReleased` or `EscrowRefunded` log.
#[must_use]
pub fn encode_escrow_settled(
    topic: EventTopic,
    escrow: EscrowId,
    buyer: AccountId,
    amount: Decimal,
) -> (Vec<[u8; 32]>, Vec<u8>) {
    let units = amount_to_units(amount).unwrap_or(0);
    let mut data = Vec::with_capacity(2 * 32);
    data.extend_from_slice(&account_word(buyer));
    let mut amount_word = [0u8; 32];
    amount_word[16..].copy_from_slice(&units.to_be_bytes());
    data.extend_from_slice(&amount_word);
    (vec![topic_hash(topic), u64_word(escrow.0)], data)
}

/// Topics for a `Transfer` log (all fields indexed, empty data).
#[must_use]
pub fn encode_transfer(
    from: AccountId,
    to: AccountId,
    certificate: CertificateId,
) -> (Vec<[u8; 32]>, Vec<u8>) {
    (
        vec![
            topic_hash(EventTopic::Transfer),
            account_word(from),
            account_word(to),
            u64_word(certificate.0),
        ],
        Vec::new(),
    )
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn data_word(data: &[u8], index: usize) -> Option<&[u8]> {
    data.get(index * 32..(index + 1) * 32)
}

/// Decode one escrow lifecycle log. `None` if the log is not a well-formed
/// escrow event.
#[must_use]
pub fn decode_escrow_log(log: &RawLog) -> Option<EscrowEvent> {
    let sig = log.topics.first()?;
    let escrow = EscrowId(word_u64(log.topics.get(1)?)?);

    if *sig == topic_hash(EventTopic::EscrowCreated) {
        return Some(EscrowEvent::Created {
            escrow,
            certificate: CertificateId(word_u64(data_word(&log.data, 0)?)?),
            buyer: word_account(data_word(&log.data, 1)?)?,
            seller: word_account(data_word(&log.data, 2)?)?,
            amount: word_amount(data_word(&log.data, 3)?)?,
        });
    }

    let settled = |released: bool| -> Option<EscrowEvent> {
        let buyer = word_account(data_word(&log.data, 0)?)?;
        let amount = word_amount(data_word(&log.data, 1)?)?;
        Some(if released {
            EscrowEvent::Released { escrow, buyer, amount }
        } else {
            EscrowEvent::Refunded { escrow, buyer, amount }
        })
    };

    if *sig == topic_hash(EventTopic::EscrowReleased) {
        return settled(true);
    }
    if *sig == topic_hash(EventTopic::EscrowRefunded) {
        return settled(false);
    }
    None
}

/// Decode one certificate transfer log.
#[must_use]
pub fn decode_transfer_log(log: &RawLog) -> Option<CertificateTransfer> {
    if *log.topics.first()? != topic_hash(EventTopic::Transfer) {
        return None;
    }
    Some(CertificateTransfer {
        from: word_account(log.topics.get(1)?)?,
        to: word_account(log.topics.get(2)?)?,
        certificate: CertificateId(word_u64(log.topics.get(3)?)?),
    })
}

/// The result of decoding a batch of raw logs.
#[derive(Debug, Clone, Default)]
pub struct DecodedBatch {
    /// Decoded events in (block, log index) order.
    pub events: Vec<DecodedEvent>,
    /// Logs that matched a subscribed topic but failed to parse.
    pub undecodable: usize,
}

/// Decode every log whose signature matches one of `expected`, in
/// deterministic (block, log index) order. Unknown or malformed entries are
/// counted, never fatal.
#[must_use]
pub fn decode_escrow_events(logs: &[RawLog], expected: &[EventTopic]) -> DecodedBatch {
    let wanted: Vec<[u8; 32]> = expected.iter().map(|t| topic_hash(*t)).collect();
    let mut batch = DecodedBatch::default();

    for log in logs {
        let Some(sig) = log.topics.first() else {
            continue;
        };
        if !wanted.contains(sig) {
            continue;
        }
        match decode_escrow_log(log) {
            Some(event) => batch.events.push(DecodedEvent {
                position: log.position,
                block_time: log.block_time,
                tx_hash: log.tx_hash,
                event,
            }),
            None => batch.undecodable += 1,
        }
    }

    batch.events.sort_by_key(|e| e.position);
    batch
}

/// Find the mint transfer (zero `from`) in a confirmed receipt.
#[must_use]
pub fn extract_mint_transfer(receipt: &Receipt) -> Option<CertificateTransfer> {
    receipt
        .logs
        .iter()
        .filter_map(decode_transfer_log)
        .find(CertificateTransfer::is_mint)
}
