//! Reduction of an explorer response to the new incoming transactions

use std::collections::HashSet;

use serde::Serialize;
use tracing::warn;

use crate::{
    data_structures::{addresses_match, IncomingTransaction},
    errors::IncomingTxResult,
    scanning::{explorer_client::ExplorerFetch, normalizer::normalize},
};

/// Incoming transactions found by one fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledBatch {
    /// Highest block number among `transactions`
    pub latest_block: Option<u64>,
    /// Unique by hash, ordered by time
    pub transactions: Vec<IncomingTransaction>,
}

impl ReconciledBatch {
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Filter a fetch down to transactions received by `requested_address`
///
/// A failed or empty response, or one from an unsupported network, is the
/// normal "nothing new" outcome. Records are deduplicated by hash (first wins)
/// before normalization. A record that fails to normalize, incoming or not,
/// fails the whole batch so the caller keeps its stored progress.
pub fn reconcile(
    fetch: &ExplorerFetch,
    requested_address: &str,
) -> IncomingTxResult<ReconciledBatch> {
    let Some(chain_id) = fetch.chain_id else {
        return Ok(ReconciledBatch::default());
    };
    let records = fetch.response.records();
    if !fetch.response.is_success() || records.is_empty() {
        return Ok(ReconciledBatch::default());
    }

    let mut seen = HashSet::new();
    let mut transactions = Vec::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.hash.as_str()) {
            continue;
        }
        let tx = normalize(record, chain_id).map_err(|e| {
            warn!(address = %fetch.address, hash = %record.hash, "Malformed explorer record: {e}");
            e
        })?;
        transactions.push(tx);
    }

    transactions.retain(|tx| {
        !tx.tx_params.to.is_empty() && addresses_match(&tx.tx_params.to, requested_address)
    });
    transactions.sort_by_key(|tx| tx.time);

    let latest_block = transactions.iter().filter_map(|tx| tx.block_number).max();

    Ok(ReconciledBatch {
        latest_block,
        transactions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::IncomingTxError;
    use crate::scanning::explorer_client::{ExplorerResponse, RawExplorerTransaction};

    const WATCHED: &str = "0xAAA0000000000000000000000000000000000001";

    fn record(hash: &str, to: &str, block: &str, timestamp: &str) -> RawExplorerTransaction {
        RawExplorerTransaction {
            hash: hash.to_string(),
            from: "0xccc0000000000000000000000000000000000003".to_string(),
            to: to.to_string(),
            value: "1".to_string(),
            gas: "21000".to_string(),
            gas_price: "1".to_string(),
            nonce: "1".to_string(),
            block_number: block.to_string(),
            timestamp: timestamp.to_string(),
            is_error: "0".to_string(),
        }
    }

    fn fetch(records: Vec<RawExplorerTransaction>) -> ExplorerFetch {
        ExplorerFetch {
            address: WATCHED.to_string(),
            chain_id: Some(1),
            response: ExplorerResponse::success(records),
        }
    }

    #[test]
    fn test_failed_status_yields_nothing() {
        let mut f = fetch(vec![record("0x1", WATCHED, "10", "1000")]);
        f.response.status = serde_json::Value::from(0);
        assert_eq!(reconcile(&f, WATCHED).unwrap(), ReconciledBatch::default());
    }

    #[test]
    fn test_empty_result_yields_nothing() {
        assert_eq!(reconcile(&fetch(vec![]), WATCHED).unwrap(), ReconciledBatch::default());
    }

    #[test]
    fn test_unsupported_network_yields_nothing() {
        let f = ExplorerFetch::unsupported(WATCHED);
        assert_eq!(reconcile(&f, WATCHED).unwrap(), ReconciledBatch::default());
    }

    #[test]
    fn test_duplicate_hashes_collapse_to_first() {
        let f = fetch(vec![
            record("0x1", WATCHED, "10", "1000"),
            record("0x1", WATCHED, "11", "2000"),
        ]);
        let batch = reconcile(&f, WATCHED).unwrap();
        assert_eq!(batch.transactions.len(), 1);
        assert_eq!(batch.transactions[0].block_number, Some(10));
    }

    #[test]
    fn test_outgoing_records_are_dropped() {
        let f = fetch(vec![
            record("0x1", "0xbbb0000000000000000000000000000000000002", "10", "1000"),
            record("0x2", "", "11", "1000"),
        ]);
        let batch = reconcile(&f, WATCHED).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.latest_block, None);
    }

    #[test]
    fn test_sort_is_stable_for_equal_times() {
        let f = fetch(vec![
            record("0x3", WATCHED, "12", "3000"),
            record("0x1", WATCHED, "10", "1000"),
            record("0x2", WATCHED, "11", "1000"),
        ]);
        let hashes: Vec<_> = reconcile(&f, WATCHED)
            .unwrap()
            .transactions
            .into_iter()
            .map(|tx| tx.hash)
            .collect();
        assert_eq!(hashes, vec!["0x1", "0x2", "0x3"]);
    }

    #[test]
    fn test_latest_block_ignores_missing_block_numbers() {
        let f = fetch(vec![
            record("0x1", WATCHED, "", "1000"),
            record("0x2", WATCHED, "9", "2000"),
        ]);
        assert_eq!(reconcile(&f, WATCHED).unwrap().latest_block, Some(9));

        let f = fetch(vec![record("0x1", WATCHED, "", "1000")]);
        assert_eq!(reconcile(&f, WATCHED).unwrap().latest_block, None);
    }

    #[test]
    fn test_network_prefixed_request_address_matches() {
        let f = fetch(vec![record("0x1", WATCHED, "10", "1000")]);
        let batch = reconcile(&f, "xdcaaa0000000000000000000000000000000000001").unwrap();
        assert_eq!(batch.transactions.len(), 1);
    }

    #[test]
    fn test_malformed_sibling_record_fails_the_batch() {
        let good = record("0x1", WATCHED, "10", "1000");
        let mut bad = record("0x2", "0xbbb0000000000000000000000000000000000002", "10", "1000");
        bad.value = "1e18".to_string();
        match reconcile(&fetch(vec![good, bad]), WATCHED) {
            Err(IncomingTxError::Normalization { field, value }) => {
                assert_eq!(field, "value");
                assert_eq!(value, "1e18");
            }
            other => panic!("expected normalization error, got {other:?}"),
        }
    }
}
