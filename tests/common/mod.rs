//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use incoming_tx_tracker::{
    events::listeners::{mock_listener::CapturedEvents, MockEventListener},
    scanning::{
        IncomingTransactionsTracker, LocalBlockTracker, LocalNetworkProvider, LocalPreferences,
        MockTransactionSource, PreferencesSnapshot,
    },
    storage::IncrementalStateStore,
};

pub const WATCHED: &str = "0xAAA0000000000000000000000000000000000001";
pub const OTHER: &str = "0xBBB0000000000000000000000000000000000002";

/// Tracker wired to local signal sources and a mock explorer
pub struct Harness {
    pub tracker: Arc<IncomingTransactionsTracker>,
    pub source: MockTransactionSource,
    pub store: Arc<IncrementalStateStore>,
    pub blocks: Arc<LocalBlockTracker>,
    pub network: Arc<LocalNetworkProvider>,
    pub preferences: Arc<LocalPreferences>,
    pub events: CapturedEvents,
}

impl Harness {
    pub async fn new(enabled: bool) -> Self {
        let store = Arc::new(IncrementalStateStore::in_memory().await.unwrap());
        Self::with_store(enabled, store).await
    }

    pub async fn with_store(enabled: bool, store: Arc<IncrementalStateStore>) -> Self {
        let source = MockTransactionSource::new();
        let blocks = Arc::new(LocalBlockTracker::new(16));
        let network = Arc::new(LocalNetworkProvider::new("mainnet", 16));
        let preferences = Arc::new(LocalPreferences::new(PreferencesSnapshot::new(
            Some(WATCHED.to_string()),
            enabled,
        )));
        let listener = MockEventListener::new();
        let events = listener.captured();

        let tracker = IncomingTransactionsTracker::builder()
            .with_source(Arc::new(source.clone()))
            .with_store(Arc::clone(&store))
            .with_block_tracker(blocks.clone())
            .with_network_provider(network.clone())
            .with_preferences(preferences.clone())
            .with_event_listener(Box::new(listener))
            .build()
            .await
            .unwrap();

        Self {
            tracker,
            source,
            store,
            blocks,
            network,
            preferences,
            events,
        }
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        MockEventListener::event_types(&self.events)
    }

    /// Wait until the mock explorer has served `count` requests
    pub async fn wait_for_calls(&self, count: usize) {
        let source = self.source.clone();
        wait_until(move || source.call_count() >= count).await;
    }
}

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Give spawned tasks time to react to a signal that should be ignored
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
