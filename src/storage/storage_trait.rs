//! Storage trait for incoming transaction state
//!
//! Backends hold the two persisted maps (transactions by hash and last
//! fetched block by network). They are written only through
//! [`IncomingTxStorage::persist_merge`], which carries the already reconciled
//! delta of one merge.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    data_structures::{IncomingTransaction, IncomingTxState, NetworkId},
    errors::IncomingTxResult,
};

/// Delta produced by one merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub network: NetworkId,
    /// New value of the network's last fetched block
    pub last_fetched_block: Option<u64>,
    /// Transactions whose hash was not yet stored
    pub inserted: Vec<IncomingTransaction>,
}

impl StateUpdate {
    /// Apply the delta to an in-memory state; existing hashes are never replaced
    pub fn apply_to(&self, state: &mut IncomingTxState) {
        state
            .last_fetched_blocks
            .insert(self.network, self.last_fetched_block);
        for tx in &self.inserted {
            state
                .incoming_transactions
                .entry(tx.hash.clone())
                .or_insert_with(|| tx.clone());
        }
    }
}

/// Persistence backend for the incremental state store
#[async_trait]
pub trait IncomingTxStorage: Send + Sync {
    /// Prepare the backend (create schema, etc.)
    async fn initialize(&self) -> IncomingTxResult<()> {
        Ok(())
    }

    /// Load the persisted state, `None` on first run
    async fn load_state(&self) -> IncomingTxResult<Option<IncomingTxState>>;

    /// Durably apply one merge; must be all-or-nothing
    async fn persist_merge(&self, update: &StateUpdate) -> IncomingTxResult<()>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}
