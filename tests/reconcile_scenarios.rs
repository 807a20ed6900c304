//! End-to-end reconciliation scenarios through the public API

mod common;

use std::sync::Arc;

use incoming_tx_tracker::{
    data_structures::{IncomingTxState, NetworkId},
    scanning::{
        mock_record, reconcile, CycleParams, ExplorerResponse, MockTransactionSource,
        TransactionSource,
    },
    storage::{IncrementalStateStore, MemoryStorage},
};

use common::{Harness, OTHER, WATCHED};

#[tokio::test]
async fn test_only_records_sent_to_the_watched_address_are_kept() {
    let source = MockTransactionSource::new();
    let upper = WATCHED.to_uppercase().replacen("0X", "0x", 1);
    source.push_records(vec![
        mock_record("0x03", &WATCHED.to_lowercase(), "140", "2021-03-01T00:10:00Z"),
        mock_record("0x01", &upper, "120", "2021-03-01T00:00:00Z"),
        mock_record("0x02", OTHER, "130", "2021-03-01T00:05:00Z"),
    ]);

    let fetch = source
        .fetch_transactions(WATCHED, Some(100), "mainnet")
        .await
        .unwrap();
    let batch = reconcile(&fetch, WATCHED).unwrap();

    let hashes: Vec<_> = batch.transactions.iter().map(|tx| tx.hash.as_str()).collect();
    assert_eq!(hashes, vec!["0x01", "0x03"]);
    assert_eq!(batch.transactions[0].time, 1614556800000);
    assert_eq!(batch.transactions[1].time, 1614557400000);
    assert_eq!(batch.latest_block, Some(140));
    assert!(batch
        .transactions
        .iter()
        .all(|tx| tx.metamask_network_id == 1));
}

#[tokio::test]
async fn test_network_prefixed_records_are_canonicalized() {
    let source = MockTransactionSource::new();
    source.push_records(vec![mock_record(
        "0x01",
        "xdcaaa0000000000000000000000000000000000001",
        "120",
        "2021-03-01T00:00:00Z",
    )]);

    let fetch = source
        .fetch_transactions(WATCHED, None, "mainnet")
        .await
        .unwrap();
    let batch = reconcile(&fetch, WATCHED).unwrap();

    assert_eq!(batch.transactions.len(), 1);
    let params = &batch.transactions[0].tx_params;
    assert_eq!(params.to, "0xaaa0000000000000000000000000000000000001");
    assert!(params.from.starts_with("0x"));
    assert_eq!(params.value, "0xde0b6b3a7640000");
    assert_eq!(params.gas, "0x5208");
}

#[tokio::test]
async fn test_last_fetched_block_advances_past_latest_block() {
    let mut seeded = IncomingTxState::default();
    seeded.last_fetched_blocks.insert(NetworkId::Mainnet, Some(100));
    let store = Arc::new(
        IncrementalStateStore::open(Arc::new(MemoryStorage::with_state(seeded)))
            .await
            .unwrap(),
    );
    let harness = Harness::with_store(true, store).await;
    harness.source.push_records(vec![
        mock_record("0x01", WATCHED, "120", "2021-03-01T00:00:00Z"),
        mock_record("0x02", WATCHED, "150", "2021-03-01T00:05:00Z"),
    ]);

    let report = harness
        .tracker
        .run_cycle(CycleParams::new(WATCHED))
        .await
        .expect("cycle completes");

    assert_eq!(harness.source.calls()[0].from_block, Some(100));
    assert_eq!(report.latest_block, Some(150));
    assert_eq!(report.new_transactions.len(), 2);
    assert_eq!(
        harness.store.get_last_fetched_block(NetworkId::Mainnet).await,
        Some(151)
    );
}

#[tokio::test]
async fn test_refetching_the_same_records_adds_nothing() {
    let harness = Harness::new(true).await;
    let records = vec![mock_record("0x01", WATCHED, "120", "2021-03-01T00:00:00Z")];
    harness.source.push_records(records.clone());
    harness.source.push_records(records);

    let first = harness
        .tracker
        .run_cycle(CycleParams::new(WATCHED).with_block_number(100))
        .await
        .unwrap();
    let stored = harness.store.get_transaction("0x01").await.unwrap();

    let second = harness
        .tracker
        .run_cycle(CycleParams::new(WATCHED))
        .await
        .unwrap();

    assert_eq!(first.new_transactions.len(), 1);
    assert!(second.new_transactions.is_empty());
    assert_eq!(second.summary.already_known, 1);
    assert_eq!(harness.source.calls()[1].from_block, Some(121));
    assert_eq!(harness.store.get_transaction("0x01").await.unwrap(), stored);
    assert_eq!(harness.store.transaction_count().await, 1);
}

#[tokio::test]
async fn test_explorer_error_status_counts_as_nothing_new() {
    let harness = Harness::new(true).await;
    harness.source.push_response(
        serde_json::from_str::<ExplorerResponse>(
            r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#,
        )
        .unwrap(),
    );

    let report = harness
        .tracker
        .run_cycle(CycleParams::new(WATCHED).with_block_number(200))
        .await
        .unwrap();

    assert!(report.new_transactions.is_empty());
    assert_eq!(report.latest_block, None);
    assert_eq!(
        harness.store.get_last_fetched_block(NetworkId::Mainnet).await,
        Some(201)
    );
}

#[tokio::test]
async fn test_malformed_sibling_keeps_start_block_for_retry() {
    let harness = Harness::new(true).await;
    let good = mock_record("0xgood", WATCHED, "100", "2021-03-01T00:00:00Z");
    let mut bad = mock_record("0xbad", OTHER, "100", "2021-03-01T00:00:00Z");
    bad.value = "1e18".to_string();
    harness.source.push_records(vec![good.clone(), bad]);
    harness.source.push_records(vec![good]);

    let report = harness
        .tracker
        .run_cycle(CycleParams::new(WATCHED).with_block_number(100))
        .await;

    assert!(report.is_none());
    assert_eq!(
        harness.store.get_last_fetched_block(NetworkId::Mainnet).await,
        None
    );
    assert_eq!(harness.store.transaction_count().await, 0);
    assert_eq!(harness.event_types(), vec!["CycleFailed"]);

    let report = harness
        .tracker
        .run_cycle(CycleParams::new(WATCHED).with_block_number(100))
        .await
        .expect("retry completes");

    assert_eq!(harness.source.calls()[1].from_block, Some(100));
    assert_eq!(report.new_transactions.len(), 1);
    assert!(harness.store.get_transaction("0xgood").await.is_some());
    assert_eq!(
        harness.store.get_last_fetched_block(NetworkId::Mainnet).await,
        Some(101)
    );
}
