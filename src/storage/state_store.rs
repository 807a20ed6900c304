//! Incremental state store
//!
//! Holds the accumulated incoming transactions and the per-network block to
//! fetch from next. All mutation goes through [`IncrementalStateStore::merge`],
//! which runs under the write lock, persists the delta through the backend
//! and only then swaps the in-memory state, so readers see either the state
//! before a merge or after it.
//!
//! Block progress only moves forward: a merge that would lower a network's
//! last fetched block (an older cycle finishing late) keeps the stored value.
//!
//! Subscribers receive the delta of every merge rather than a copy of the
//! state. A subscriber that lags behind the channel resynchronizes with
//! [`IncrementalStateStore::snapshot`].

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::{
    data_structures::{IncomingTransaction, IncomingTxState, NetworkId},
    errors::IncomingTxResult,
    storage::{
        memory::MemoryStorage,
        storage_trait::{IncomingTxStorage, StateUpdate},
    },
};

/// Outcome of one merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub network: NetworkId,
    pub previous_block: Option<u64>,
    pub last_fetched_block: Option<u64>,
    /// Hashes newly added to the state
    pub inserted: Vec<String>,
    /// Transactions ignored because their hash was already known
    pub already_known: usize,
}

/// Buffered merge notifications per subscriber
pub const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Next block to fetch from after a fetch that started at `fetched_from_block`
///
/// The block after the newest incoming transaction when one was found,
/// otherwise the block after the starting block.
pub fn next_fetch_block(
    fetched_from_block: Option<u64>,
    latest_block: Option<u64>,
) -> Option<u64> {
    latest_block
        .or(fetched_from_block)
        .map(|block| block.saturating_add(1))
}

/// Persistent, observable incoming transaction state
pub struct IncrementalStateStore {
    state: RwLock<IncomingTxState>,
    backend: Arc<dyn IncomingTxStorage>,
    notifier: broadcast::Sender<Arc<StateUpdate>>,
}

impl IncrementalStateStore {
    /// Open the store over `backend`, loading persisted state if any
    pub async fn open(backend: Arc<dyn IncomingTxStorage>) -> IncomingTxResult<Self> {
        backend.initialize().await?;
        let state = backend
            .load_state()
            .await?
            .map(IncomingTxState::with_all_networks)
            .unwrap_or_default();

        debug!(
            backend = backend.name(),
            transactions = state.incoming_transactions.len(),
            "Loaded incoming transaction state"
        );

        let (notifier, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Ok(Self {
            state: RwLock::new(state),
            backend,
            notifier,
        })
    }

    /// Store backed by a fresh [`MemoryStorage`]
    pub async fn in_memory() -> IncomingTxResult<Self> {
        Self::open(Arc::new(MemoryStorage::new())).await
    }

    /// Block the next fetch for `network` starts at, `None` when never fetched
    pub async fn get_last_fetched_block(&self, network: NetworkId) -> Option<u64> {
        self.state.read().await.last_fetched_block(network)
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> IncomingTxState {
        self.state.read().await.clone()
    }

    /// Look up a stored transaction
    pub async fn get_transaction(&self, hash: &str) -> Option<IncomingTransaction> {
        self.state.read().await.incoming_transactions.get(hash).cloned()
    }

    /// Number of stored transactions
    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.incoming_transactions.len()
    }

    /// Receive the delta applied by every subsequent merge
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StateUpdate>> {
        self.notifier.subscribe()
    }

    /// Merge the result of a fetch for `network`
    ///
    /// Existing hashes are never overwritten. The last fetched block becomes
    /// `latest_block + 1` (or `fetched_from_block + 1` when nothing was found)
    /// unless the stored value is already higher.
    pub async fn merge(
        &self,
        network: NetworkId,
        fetched_from_block: Option<u64>,
        latest_block: Option<u64>,
        new_transactions: Vec<IncomingTransaction>,
    ) -> IncomingTxResult<MergeSummary> {
        let mut state = self.state.write().await;

        let previous_block = state.last_fetched_block(network);
        let next = next_fetch_block(fetched_from_block, latest_block);
        let last_fetched_block = match (previous_block, next) {
            (Some(current), Some(next)) => Some(current.max(next)),
            (current, next) => next.or(current),
        };

        let mut seen = HashSet::new();
        let mut already_known = 0;
        let mut inserted = Vec::new();
        for tx in new_transactions {
            let known = state.incoming_transactions.contains_key(&tx.hash);
            if known || !seen.insert(tx.hash.clone()) {
                already_known += 1;
                continue;
            }
            inserted.push(tx);
        }

        let update = StateUpdate {
            network,
            last_fetched_block,
            inserted,
        };
        self.backend.persist_merge(&update).await?;
        update.apply_to(&mut state);

        let summary = MergeSummary {
            network,
            previous_block,
            last_fetched_block,
            inserted: update.inserted.iter().map(|tx| tx.hash.clone()).collect(),
            already_known,
        };

        info!(
            %network,
            from = ?previous_block,
            to = ?last_fetched_block,
            new = summary.inserted.len(),
            "Merged incoming transactions"
        );

        // no subscribers is fine
        let _ = self.notifier.send(Arc::new(update));
        Ok(summary)
    }
}

impl std::fmt::Debug for IncrementalStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalStateStore")
            .field("backend", &self.backend.name())
            .finish()
    }
}
