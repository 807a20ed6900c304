//! Incoming transaction model
//!
//! This is the wallet-side shape of a transaction received by a watched
//! address. The serialized form is what the UI and other collaborators read
//! from the observable state, so field names follow that JSON layout.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::network::NetworkId;

/// Status assigned to fetched transactions
///
/// Every record fetched from the explorer is currently classified as
/// confirmed; the explorer's error flag is not consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Confirmed,
}

/// Category tag carried by every tracked transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionCategory {
    Incoming,
}

/// Transaction parameters in wallet representation
///
/// Addresses are canonical (`0x`) and numeric fields are `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxParams {
    pub from: String,
    pub to: String,
    pub gas: String,
    pub gas_price: String,
    pub nonce: String,
    pub value: String,
}

/// A transaction sent to the watched address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingTransaction {
    /// Locally generated identifier, unrelated to `hash`
    pub id: u64,
    /// Transaction hash, the deduplication key
    pub hash: String,
    pub block_number: Option<u64>,
    /// Epoch milliseconds
    pub time: i64,
    pub status: TransactionStatus,
    /// Chain id of the network the transaction was fetched on
    pub metamask_network_id: u64,
    pub tx_params: TxParams,
    pub transaction_category: TransactionCategory,
}

/// All known incoming transactions keyed by hash
pub type IncomingTransactionsMap = HashMap<String, IncomingTransaction>;

/// Next block to fetch from, per network (`None` = never fetched)
pub type LastFetchedBlocks = BTreeMap<NetworkId, Option<u64>>;

/// Persisted and observable tracker state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingTxState {
    pub incoming_transactions: IncomingTransactionsMap,
    #[serde(rename = "incomingTxLastFetchedBlocksByNetwork")]
    pub last_fetched_blocks: LastFetchedBlocks,
}

impl Default for IncomingTxState {
    fn default() -> Self {
        Self {
            incoming_transactions: HashMap::new(),
            last_fetched_blocks: NetworkId::ALL.iter().map(|n| (*n, None)).collect(),
        }
    }
}

impl IncomingTxState {
    /// Stored block for `network`, `None` when never fetched
    pub fn last_fetched_block(&self, network: NetworkId) -> Option<u64> {
        self.last_fetched_blocks.get(&network).copied().flatten()
    }

    /// Fill in any network missing from a persisted snapshot
    pub fn with_all_networks(mut self) -> Self {
        for network in NetworkId::ALL {
            self.last_fetched_blocks.entry(network).or_insert(None);
        }
        self
    }

    /// Transactions ordered by time, oldest first
    pub fn transactions_by_time(&self) -> Vec<&IncomingTransaction> {
        let mut txs: Vec<_> = self.incoming_transactions.values().collect();
        txs.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.hash.cmp(&b.hash)));
        txs
    }

    /// Transactions fetched on `network`
    pub fn transactions_for_network(&self, network: NetworkId) -> Vec<&IncomingTransaction> {
        let chain_id = network.chain_id();
        self.transactions_by_time()
            .into_iter()
            .filter(|tx| tx.metamask_network_id == chain_id)
            .collect()
    }
}
