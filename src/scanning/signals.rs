//! External signals the tracker reacts to
//!
//! The block tracker, network provider and preferences store live outside
//! this crate. The tracker only sees them through these narrow traits. The
//! `Local*` types are in-process implementations backed by tokio channels,
//! for hosts that push updates themselves (and for tests).

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

/// Parse a hexadecimal block number (`0x`-prefixed or bare)
pub fn parse_block_hex(hex: &str) -> Option<u64> {
    let hex = hex.trim();
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    u64::from_str_radix(digits, 16).ok()
}

/// Source of new block notifications
pub trait BlockTracker: Send + Sync {
    /// Stream of hexadecimal block numbers emitted on every new latest block
    fn subscribe_latest(&self) -> broadcast::Receiver<String>;

    /// Latest known block, hexadecimal
    fn current_block(&self) -> Option<String>;
}

/// Source of the active network
pub trait NetworkProvider: Send + Sync {
    /// Name of the active network (`"mainnet"`, `"goerli"`, `"localhost"`, ...)
    fn current_network(&self) -> String;

    /// Stream of new network names
    fn subscribe_network_changes(&self) -> broadcast::Receiver<String>;
}

/// Feature flags relevant to the tracker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    #[serde(default)]
    pub show_incoming_transactions: bool,
}

/// Preferences as seen by the tracker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesSnapshot {
    pub selected_address: Option<String>,
    #[serde(default)]
    pub feature_flags: FeatureFlags,
}

impl PreferencesSnapshot {
    pub fn new(selected_address: Option<String>, show_incoming_transactions: bool) -> Self {
        Self {
            selected_address,
            feature_flags: FeatureFlags {
                show_incoming_transactions,
            },
        }
    }

    pub fn incoming_transactions_enabled(&self) -> bool {
        self.feature_flags.show_incoming_transactions
    }
}

/// Source of user preferences
pub trait PreferencesProvider: Send + Sync {
    /// Current preferences
    fn snapshot(&self) -> PreferencesSnapshot;

    /// Receiver notified on every preference change
    fn subscribe(&self) -> watch::Receiver<PreferencesSnapshot>;
}

/// Block tracker fed by [`LocalBlockTracker::publish_block`]
#[derive(Debug)]
pub struct LocalBlockTracker {
    sender: broadcast::Sender<String>,
    current: Mutex<Option<String>>,
}

impl LocalBlockTracker {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            current: Mutex::new(None),
        }
    }

    /// Record `hex` as the latest block and notify listeners
    pub fn publish_block(&self, hex: impl Into<String>) {
        let hex = hex.into();
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(hex.clone());
        // no subscribers is fine
        let _ = self.sender.send(hex);
    }

    /// Set the latest known block without notifying
    pub fn set_current_block(&self, hex: impl Into<String>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(hex.into());
    }

    /// Number of active block listeners
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl BlockTracker for LocalBlockTracker {
    fn subscribe_latest(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    fn current_block(&self) -> Option<String> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Network provider fed by [`LocalNetworkProvider::set_network`]
#[derive(Debug)]
pub struct LocalNetworkProvider {
    sender: broadcast::Sender<String>,
    current: Mutex<String>,
}

impl LocalNetworkProvider {
    pub fn new(network: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            current: Mutex::new(network.into()),
        }
    }

    /// Switch network and notify listeners
    pub fn set_network(&self, network: impl Into<String>) {
        let network = network.into();
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = network.clone();
        let _ = self.sender.send(network);
    }
}

impl NetworkProvider for LocalNetworkProvider {
    fn current_network(&self) -> String {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn subscribe_network_changes(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }
}

/// Preferences store backed by a watch channel
#[derive(Debug)]
pub struct LocalPreferences {
    sender: watch::Sender<PreferencesSnapshot>,
}

impl LocalPreferences {
    pub fn new(initial: PreferencesSnapshot) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Apply `f` to the preferences and notify subscribers
    pub fn update(&self, f: impl FnOnce(&mut PreferencesSnapshot)) {
        self.sender.send_modify(f);
    }

    pub fn set_selected_address(&self, address: impl Into<String>) {
        let address = address.into();
        self.update(|prefs| prefs.selected_address = Some(address));
    }

    pub fn set_show_incoming_transactions(&self, enabled: bool) {
        self.update(|prefs| prefs.feature_flags.show_incoming_transactions = enabled);
    }
}

impl PreferencesProvider for LocalPreferences {
    fn snapshot(&self) -> PreferencesSnapshot {
        self.sender.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<PreferencesSnapshot> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block_hex() {
        assert_eq!(parse_block_hex("0x96"), Some(150));
        assert_eq!(parse_block_hex("0XFF"), Some(255));
        assert_eq!(parse_block_hex("1a"), Some(26));
        assert_eq!(parse_block_hex("0x"), None);
        assert_eq!(parse_block_hex("latest"), None);
    }

    #[test]
    fn test_preferences_deserialize_from_store_shape() {
        let json = r#"{
            "selectedAddress": "0xabc",
            "featureFlags": { "showIncomingTransactions": true }
        }"#;
        let prefs: PreferencesSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(prefs.selected_address.as_deref(), Some("0xabc"));
        assert!(prefs.incoming_transactions_enabled());

        let prefs: PreferencesSnapshot = serde_json::from_str(r#"{ "selectedAddress": null }"#).unwrap();
        assert!(!prefs.incoming_transactions_enabled());
    }

    #[tokio::test]
    async fn test_local_block_tracker_publishes() {
        let tracker = LocalBlockTracker::new(8);
        let mut rx = tracker.subscribe_latest();
        tracker.publish_block("0x10");
        assert_eq!(rx.recv().await.unwrap(), "0x10");
        assert_eq!(tracker.current_block().as_deref(), Some("0x10"));
        assert_eq!(tracker.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_local_preferences_notify() {
        let prefs = LocalPreferences::new(PreferencesSnapshot::default());
        let mut rx = prefs.subscribe();
        prefs.set_show_incoming_transactions(true);
        rx.changed().await.unwrap();
        assert!(rx.borrow().incoming_transactions_enabled());
    }
}
