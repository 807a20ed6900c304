//! In-process storage backend

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    data_structures::IncomingTxState,
    errors::{IncomingTxError, IncomingTxResult},
    storage::storage_trait::{IncomingTxStorage, StateUpdate},
};

/// Keeps the state in memory; also used to seed state in tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<Option<IncomingTxState>>>,
    fail_next_write: Arc<Mutex<bool>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously persisted state
    pub fn with_state(state: IncomingTxState) -> Self {
        Self {
            state: Arc::new(Mutex::new(Some(state))),
            fail_next_write: Arc::new(Mutex::new(false)),
        }
    }

    /// Current persisted state
    pub fn persisted(&self) -> Option<IncomingTxState> {
        self.state.lock().ok().and_then(|s| s.clone())
    }

    /// Make the next `persist_merge` fail
    pub fn fail_next_write(&self) {
        if let Ok(mut flag) = self.fail_next_write.lock() {
            *flag = true;
        }
    }

    fn lock_err<T>(_: T) -> IncomingTxError {
        IncomingTxError::Storage("memory storage lock poisoned".to_string())
    }
}

#[async_trait]
impl IncomingTxStorage for MemoryStorage {
    async fn load_state(&self) -> IncomingTxResult<Option<IncomingTxState>> {
        Ok(self.state.lock().map_err(Self::lock_err)?.clone())
    }

    async fn persist_merge(&self, update: &StateUpdate) -> IncomingTxResult<()> {
        {
            let mut fail = self.fail_next_write.lock().map_err(Self::lock_err)?;
            if *fail {
                *fail = false;
                return Err(IncomingTxError::Storage("simulated write failure".to_string()));
            }
        }
        let mut guard = self.state.lock().map_err(Self::lock_err)?;
        let state = guard.get_or_insert_with(IncomingTxState::default);
        update.apply_to(state);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
