//! Conversion of raw explorer records into [`IncomingTransaction`]s

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDateTime};
use lazy_static::lazy_static;
use primitive_types::U256;
use rand::Rng;

use crate::{
    data_structures::{IncomingTransaction, TransactionCategory, TransactionStatus, TxParams},
    errors::{IncomingTxError, IncomingTxResult},
    scanning::explorer_client::RawExplorerTransaction,
};

lazy_static! {
    // Random starting offset, then strictly increasing
    static ref NEXT_ID: AtomicU64 =
        AtomicU64::new(rand::thread_rng().gen_range(0..u64::from(u32::MAX)));
}

/// Process-unique transaction id
pub fn next_transaction_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Map one raw explorer record to the wallet representation
///
/// `gas`, `gasPrice`, `nonce` and `value` arrive as decimal strings and are
/// re-encoded as `0x` hex. `timestamp` becomes epoch milliseconds.
pub fn normalize(
    raw: &RawExplorerTransaction,
    chain_id: u64,
) -> IncomingTxResult<IncomingTransaction> {
    Ok(IncomingTransaction {
        id: next_transaction_id(),
        hash: raw.hash.clone(),
        block_number: parse_block_number(&raw.block_number),
        time: parse_timestamp_millis(&raw.timestamp)?,
        // TODO: surface failed transactions once the explorer's isError flag is trusted
        status: TransactionStatus::Confirmed,
        metamask_network_id: chain_id,
        tx_params: TxParams {
            from: raw.from.clone(),
            to: raw.to.clone(),
            gas: decimal_to_hex("gas", &raw.gas)?,
            gas_price: decimal_to_hex("gasPrice", &raw.gas_price)?,
            nonce: decimal_to_hex("nonce", &raw.nonce)?,
            value: decimal_to_hex("value", &raw.value)?,
        },
        transaction_category: TransactionCategory::Incoming,
    })
}

/// Decimal string to `0x` hex; an empty field counts as zero
pub fn decimal_to_hex(field: &'static str, decimal: &str) -> IncomingTxResult<String> {
    let decimal = decimal.trim();
    if decimal.is_empty() {
        return Ok(format!("{:#x}", U256::zero()));
    }
    if !decimal.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IncomingTxError::normalization(field, decimal));
    }
    let value =
        U256::from_dec_str(decimal).map_err(|_| IncomingTxError::normalization(field, decimal))?;
    Ok(format!("{value:#x}"))
}

/// Block number as an integer, `None` when absent or unparsable
pub fn parse_block_number(block_number: &str) -> Option<u64> {
    block_number.trim().parse().ok()
}

/// Explorer timestamp to epoch milliseconds
///
/// Accepts RFC 3339 dates, `YYYY-MM-DD HH:MM:SS` (UTC) and integer epoch seconds.
pub fn parse_timestamp_millis(timestamp: &str) -> IncomingTxResult<i64> {
    let timestamp = timestamp.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(date.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc().timestamp_millis());
    }
    timestamp
        .parse::<i64>()
        .ok()
        .and_then(|secs| secs.checked_mul(1000))
        .ok_or_else(|| IncomingTxError::normalization("timestamp", timestamp))
}
