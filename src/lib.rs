//! Incoming transaction tracking for XDC wallets
//!
//! This crate keeps a wallet's view of transactions *received* by its selected
//! address up to date by polling a `blocksscan.io` style block explorer.
//! Fetched records are normalized into the wallet's transaction shape,
//! deduplicated by hash and merged into an observable, persisted state that
//! also remembers, per network, which block to fetch from next.
//!
//! ## Features
//!
//! - `http` (default): the reqwest based [`scanning::ExplorerClient`]
//! - `storage`: SQLite persistence via [`storage::SqliteIncomingTxStorage`]
//! - `cli`: the `incoming-tx` command line tool
//!
//! Without the `storage` feature state lives in memory only.
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use incoming_tx_tracker::scanning::{
//!     CycleParams, IncomingTransactionsTracker, LocalBlockTracker, LocalNetworkProvider,
//!     LocalPreferences, PreferencesSnapshot,
//! };
//!
//! async fn sync_once() -> Result<(), Box<dyn std::error::Error>> {
//!     let address = "xdc8c4e2a0b7d6fa8d1e05af5aa27ab13d8a5d2cc10";
//!     let tracker = IncomingTransactionsTracker::builder()
//!         .with_block_tracker(Arc::new(LocalBlockTracker::new(16)))
//!         .with_network_provider(Arc::new(LocalNetworkProvider::new("mainnet", 16)))
//!         .with_preferences(Arc::new(LocalPreferences::new(PreferencesSnapshot::new(
//!             Some(address.to_string()),
//!             true,
//!         ))))
//!         .build()
//!         .await?;
//!
//!     if let Some(report) = tracker.run_cycle(CycleParams::new(address)).await {
//!         println!("{} new incoming transactions", report.new_transactions.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod data_structures;
pub mod errors;
pub mod events;
pub mod scanning;
pub mod storage;

pub use data_structures::*;
pub use errors::*;
pub use scanning::{CycleParams, CycleReport, IncomingTransactionsTracker, TrackerConfig};
pub use storage::IncrementalStateStore;
