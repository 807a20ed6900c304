//! Incoming transaction scanning
//!
//! A reconciliation cycle flows through these modules in order:
//!
//! 1. [`explorer_client`] fetches the raw transaction list of an address
//! 2. [`normalizer`] maps each raw record to an [`IncomingTransaction`]
//! 3. [`reconciler`] deduplicates, filters and orders the batch
//! 4. the [`IncrementalStateStore`] merges it
//!
//! [`tracker`] decides when cycles run, driven by the signal sources in
//! [`signals`].
//!
//! [`IncomingTransaction`]: crate::data_structures::IncomingTransaction
//! [`IncrementalStateStore`]: crate::storage::IncrementalStateStore

pub mod config;
pub mod explorer_client;
pub mod mocks;
pub mod normalizer;
pub mod reconciler;
pub mod signals;
pub mod tracker;

pub use config::{TrackerConfig, DEFAULT_EXPLORER_DOMAIN, DEFAULT_REQUEST_TIMEOUT};
#[cfg(feature = "http")]
pub use explorer_client::ExplorerClient;
pub use explorer_client::{
    transaction_list_url, ExplorerFetch, ExplorerResponse, ExplorerResult,
    RawExplorerTransaction, TransactionSource,
};
pub use mocks::{mock_record, MockReply, MockTransactionSource, RecordedFetch};
pub use normalizer::{decimal_to_hex, normalize, parse_block_number, parse_timestamp_millis};
pub use reconciler::{reconcile, ReconciledBatch};
pub use signals::{
    parse_block_hex, BlockTracker, FeatureFlags, LocalBlockTracker, LocalNetworkProvider,
    LocalPreferences, NetworkProvider, PreferencesProvider, PreferencesSnapshot,
};
pub use tracker::{
    CycleParams, CycleReport, IncomingTransactionsTracker, TrackerBuilder, TrackerStatus,
};
