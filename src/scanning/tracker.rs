//! Trigger coordinator for incoming transaction tracking
//!
//! [`IncomingTransactionsTracker`] turns three external signals (new block,
//! preference change, network change) into reconciliation cycles. A cycle
//! fetches the watched address' transaction list from the explorer,
//! reconciles it and merges the result into the [`IncrementalStateStore`].
//!
//! The tracker is a two-state machine. `Running` owns the block listener
//! task; `Stopped` owns nothing. Starting always replaces an existing
//! listener, so repeated starts never produce duplicate cycles per block.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use incoming_tx_tracker::scanning::{
//!     IncomingTransactionsTracker, LocalBlockTracker, LocalNetworkProvider, LocalPreferences,
//!     PreferencesSnapshot,
//! };
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let blocks = Arc::new(LocalBlockTracker::new(16));
//!     let preferences = Arc::new(LocalPreferences::new(PreferencesSnapshot::new(
//!         Some("0x8c4e2a0b7d6fa8d1e05af5aa27ab13d8a5d2cc10".to_string()),
//!         true,
//!     )));
//!     let tracker = IncomingTransactionsTracker::builder()
//!         .with_block_tracker(blocks.clone())
//!         .with_network_provider(Arc::new(LocalNetworkProvider::new("mainnet", 16)))
//!         .with_preferences(preferences)
//!         .build()
//!         .await?;
//!
//!     tracker.spawn_signal_listeners();
//!     tracker.start().await;
//!     blocks.publish_block("0x1b4");
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{broadcast::error::RecvError, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    data_structures::{IncomingTransaction, NetworkId},
    errors::{IncomingTxError, IncomingTxResult},
    events::{CycleTrigger, EventDispatcher, EventListener, IncomingTxEvent},
    scanning::{
        config::TrackerConfig,
        explorer_client::TransactionSource,
        reconciler::reconcile,
        signals::{
            parse_block_hex, BlockTracker, NetworkProvider, PreferencesProvider,
            PreferencesSnapshot,
        },
    },
    storage::{IncrementalStateStore, MergeSummary},
};

/// Parameters of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleParams {
    /// Address whose incoming transactions are fetched
    pub address: String,
    /// Fallback start block when the network has never been fetched
    pub block_number: Option<u64>,
    /// Network override; the provider's current network when `None`
    pub network: Option<String>,
    pub trigger: CycleTrigger,
}

impl CycleParams {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            block_number: None,
            network: None,
            trigger: CycleTrigger::Manual,
        }
    }

    pub fn with_block_number(mut self, block_number: u64) -> Self {
        self.block_number = Some(block_number);
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn with_trigger(mut self, trigger: CycleTrigger) -> Self {
        self.trigger = trigger;
        self
    }
}

/// Result of a completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub network: NetworkId,
    pub address: String,
    pub from_block: Option<u64>,
    pub latest_block: Option<u64>,
    /// Transactions added to the state by this cycle
    pub new_transactions: Vec<IncomingTransaction>,
    pub summary: MergeSummary,
}

/// Externally visible run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackerStatus {
    Stopped,
    Running,
}

/// Owned block listener: its task and the means to end it
#[derive(Debug)]
struct BlockListener {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl BlockListener {
    /// Ask the listener to stop; a cycle already running is left to finish
    fn remove(self) {
        let _ = self.shutdown.send(());
        drop(self.task);
    }
}

#[derive(Debug)]
enum TrackerState {
    Stopped,
    Running(BlockListener),
}

enum CycleOutcome {
    Completed(CycleReport),
    Skipped { network: String, reason: String },
}

/// Everything a cycle needs, shared with the listener tasks
struct CycleRunner {
    source: Arc<dyn TransactionSource>,
    store: Arc<IncrementalStateStore>,
    block_tracker: Arc<dyn BlockTracker>,
    network_provider: Arc<dyn NetworkProvider>,
    preferences: Arc<dyn PreferencesProvider>,
    events: tokio::sync::Mutex<EventDispatcher>,
}

impl CycleRunner {
    fn is_enabled(&self) -> bool {
        self.preferences.snapshot().incoming_transactions_enabled()
    }

    async fn emit(&self, event: IncomingTxEvent) {
        self.events.lock().await.dispatch(event).await;
    }

    async fn on_latest_block(&self, block_hex: &str) {
        let Some(address) = self.preferences.snapshot().selected_address else {
            debug!("New block but no selected address");
            return;
        };
        let mut params = CycleParams::new(address).with_trigger(CycleTrigger::NewBlock);
        params.block_number = parse_block_hex(block_hex);
        self.run_cycle(params).await;
    }

    async fn run_cycle(&self, params: CycleParams) -> Option<CycleReport> {
        let network = params
            .network
            .clone()
            .unwrap_or_else(|| self.network_provider.current_network());

        match self.try_run_cycle(&params, &network).await {
            Ok(CycleOutcome::Completed(report)) => {
                self.emit(IncomingTxEvent::CycleCompleted {
                    trigger: params.trigger,
                    address: report.address.clone(),
                    from_block: report.from_block,
                    latest_block: report.latest_block,
                    summary: report.summary.clone(),
                })
                .await;
                Some(report)
            }
            Ok(CycleOutcome::Skipped { network, reason }) => {
                debug!(%network, %reason, "Incoming transaction cycle skipped");
                self.emit(IncomingTxEvent::CycleSkipped {
                    trigger: params.trigger,
                    network,
                    reason,
                })
                .await;
                None
            }
            Err(e) => {
                error!(
                    %network,
                    address = %params.address,
                    transient = e.is_transient(),
                    "Incoming transaction cycle failed: {e}"
                );
                self.emit(IncomingTxEvent::CycleFailed {
                    trigger: params.trigger,
                    network,
                    address: params.address.clone(),
                    error: e.to_string(),
                })
                .await;
                None
            }
        }
    }

    async fn try_run_cycle(
        &self,
        params: &CycleParams,
        network_name: &str,
    ) -> IncomingTxResult<CycleOutcome> {
        let network = NetworkId::resolve(network_name);

        let stored_block = match network {
            Some(network) => self.store.get_last_fetched_block(network).await,
            None => None,
        };
        let from_block = stored_block.or(params.block_number).or_else(|| {
            self.block_tracker
                .current_block()
                .and_then(|hex| parse_block_hex(&hex))
        });

        debug!(
            network = network_name,
            address = %params.address,
            ?from_block,
            trigger = ?params.trigger,
            "Fetching incoming transactions"
        );

        let fetch = self
            .source
            .fetch_transactions(&params.address, from_block, network_name)
            .await?;

        let Some(network) = network else {
            return Ok(CycleOutcome::Skipped {
                network: network_name.to_string(),
                reason: "no explorer for network".to_string(),
            });
        };

        let batch = reconcile(&fetch, &params.address)?;
        let summary = self
            .store
            .merge(network, from_block, batch.latest_block, batch.transactions.clone())
            .await?;

        let new_transactions = batch
            .transactions
            .into_iter()
            .filter(|tx| summary.inserted.contains(&tx.hash))
            .collect();

        Ok(CycleOutcome::Completed(CycleReport {
            network,
            address: params.address.clone(),
            from_block,
            latest_block: batch.latest_block,
            new_transactions,
            summary,
        }))
    }
}

/// Coordinates block, preference and network signals into reconciliation cycles
pub struct IncomingTransactionsTracker {
    runner: Arc<CycleRunner>,
    state: Mutex<TrackerState>,
    shutdown: watch::Sender<bool>,
    signal_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl IncomingTransactionsTracker {
    /// Start building a tracker
    pub fn builder() -> TrackerBuilder {
        TrackerBuilder::new()
    }

    /// Shared state store
    pub fn store(&self) -> Arc<IncrementalStateStore> {
        Arc::clone(&self.runner.store)
    }

    /// Current run state
    pub fn status(&self) -> TrackerStatus {
        match *self.lock_state() {
            TrackerState::Stopped => TrackerStatus::Stopped,
            TrackerState::Running(_) => TrackerStatus::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status() == TrackerStatus::Running
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Begin reacting to new blocks
    ///
    /// Does nothing and returns `false` while the feature flag is disabled.
    /// An existing block listener is replaced rather than duplicated.
    pub async fn start(&self) -> bool {
        if !self.runner.is_enabled() {
            debug!("Incoming transactions disabled, not starting");
            return false;
        }

        let blocks = self.runner.block_tracker.subscribe_latest();
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(listen_for_blocks(
            Arc::clone(&self.runner),
            blocks,
            shutdown_rx,
        ));

        let previous = std::mem::replace(
            &mut *self.lock_state(),
            TrackerState::Running(BlockListener { shutdown, task }),
        );
        if let TrackerState::Running(listener) = previous {
            listener.remove();
        }

        info!("Incoming transaction tracker started");
        self.runner.emit(IncomingTxEvent::tracker_started()).await;
        true
    }

    /// Stop reacting to new blocks; safe to call when already stopped
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.lock_state(), TrackerState::Stopped);
        if let TrackerState::Running(listener) = previous {
            listener.remove();
            info!("Incoming transaction tracker stopped");
            self.runner.emit(IncomingTxEvent::tracker_stopped()).await;
        }
    }

    /// React to a preferences update
    ///
    /// Feature flag off stops the tracker, on starts it. A changed selected
    /// address triggers a cycle for the new address, but only while
    /// `showIncomingTransactions` is on; with the flag off the change is
    /// logged and no fetch happens.
    pub async fn handle_preferences_change(
        &self,
        previous: &PreferencesSnapshot,
        current: &PreferencesSnapshot,
    ) {
        let was_enabled = previous.incoming_transactions_enabled();
        let is_enabled = current.incoming_transactions_enabled();
        if was_enabled != is_enabled {
            if was_enabled {
                self.stop().await;
            } else {
                self.start().await;
            }
        }

        if previous.selected_address == current.selected_address {
            return;
        }
        let Some(address) = current.selected_address.clone() else {
            return;
        };
        if !is_enabled {
            debug!("Selected address changed while incoming transactions are disabled");
            return;
        }
        self.runner
            .run_cycle(CycleParams::new(address).with_trigger(CycleTrigger::AddressChanged))
            .await;
    }

    /// React to the active network changing to `network`
    ///
    /// Runs a cycle for the selected address on the new network. Nothing is
    /// fetched while `showIncomingTransactions` is off or no address is
    /// selected.
    pub async fn handle_network_change(&self, network: &str) {
        let preferences = self.runner.preferences.snapshot();
        if !preferences.incoming_transactions_enabled() {
            debug!(network, "Network changed while incoming transactions are disabled");
            return;
        }
        let Some(address) = preferences.selected_address else {
            return;
        };
        self.runner
            .run_cycle(
                CycleParams::new(address)
                    .with_network(network)
                    .with_trigger(CycleTrigger::NetworkChanged),
            )
            .await;
    }

    /// React to a new latest block (hexadecimal)
    pub async fn handle_latest_block(&self, block_hex: &str) {
        self.runner.on_latest_block(block_hex).await;
    }

    /// Run one reconciliation cycle
    ///
    /// Failures are logged, reported as [`IncomingTxEvent::CycleFailed`] and
    /// leave the stored state unchanged; `None` is returned for failed and
    /// skipped cycles.
    pub async fn run_cycle(&self, params: CycleParams) -> Option<CycleReport> {
        self.runner.run_cycle(params).await
    }

    /// Route preference and network updates to the handlers
    ///
    /// Runs until [`shutdown`](Self::shutdown) or until the signal sources close.
    pub fn spawn_signal_listeners(self: &Arc<Self>) {
        let mut preferences = self.runner.preferences.subscribe();
        let mut previous = preferences.borrow_and_update().clone();
        let mut shutdown = self.shutdown.subscribe();
        let tracker = Arc::clone(self);
        let preferences_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    changed = preferences.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let current = preferences.borrow_and_update().clone();
                        tracker.handle_preferences_change(&previous, &current).await;
                        previous = current;
                    }
                }
            }
        });

        let mut networks = self.runner.network_provider.subscribe_network_changes();
        let mut shutdown = self.shutdown.subscribe();
        let tracker = Arc::clone(self);
        let network_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    network = networks.recv() => match network {
                        Ok(network) => tracker.handle_network_change(&network).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Missed network change notifications");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });

        self.signal_tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend([preferences_task, network_task]);
    }

    /// Stop the tracker and end the signal listeners
    pub async fn shutdown(&self) {
        self.stop().await;
        self.shutdown.send_replace(true);
        let tasks: Vec<_> = self
            .signal_tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Signal listener ended abnormally: {e}");
            }
        }
    }
}

impl std::fmt::Debug for IncomingTransactionsTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingTransactionsTracker")
            .field("status", &self.status())
            .field("store", &self.runner.store)
            .finish()
    }
}

async fn listen_for_blocks(
    runner: Arc<CycleRunner>,
    mut blocks: tokio::sync::broadcast::Receiver<String>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            block = blocks.recv() => match block {
                Ok(block_hex) => runner.on_latest_block(&block_hex).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Block listener lagged, continuing with newer blocks");
                }
                Err(RecvError::Closed) => {
                    debug!("Block tracker closed");
                    break;
                }
            }
        }
    }
}

/// Builder for [`IncomingTransactionsTracker`]
#[derive(Default)]
pub struct TrackerBuilder {
    config: Option<TrackerConfig>,
    source: Option<Arc<dyn TransactionSource>>,
    store: Option<Arc<IncrementalStateStore>>,
    block_tracker: Option<Arc<dyn BlockTracker>>,
    network_provider: Option<Arc<dyn NetworkProvider>>,
    preferences: Option<Arc<dyn PreferencesProvider>>,
    listeners: Vec<Box<dyn EventListener>>,
}

impl TrackerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config for the default explorer client
    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Transaction source; defaults to an [`ExplorerClient`](crate::scanning::ExplorerClient)
    pub fn with_source(mut self, source: Arc<dyn TransactionSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// State store; defaults to an in-memory store
    pub fn with_store(mut self, store: Arc<IncrementalStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_block_tracker(mut self, block_tracker: Arc<dyn BlockTracker>) -> Self {
        self.block_tracker = Some(block_tracker);
        self
    }

    pub fn with_network_provider(mut self, network_provider: Arc<dyn NetworkProvider>) -> Self {
        self.network_provider = Some(network_provider);
        self
    }

    pub fn with_preferences(mut self, preferences: Arc<dyn PreferencesProvider>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Register an event listener
    pub fn with_event_listener(mut self, listener: Box<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    fn default_source(config: TrackerConfig) -> IncomingTxResult<Arc<dyn TransactionSource>> {
        #[cfg(feature = "http")]
        {
            Ok(Arc::new(crate::scanning::ExplorerClient::new(config)?))
        }
        #[cfg(not(feature = "http"))]
        {
            let _ = config;
            Err(IncomingTxError::OperationNotSupported(
                "HTTP feature not enabled; provide a transaction source".to_string(),
            ))
        }
    }

    /// Build the tracker (initially stopped)
    pub async fn build(self) -> IncomingTxResult<Arc<IncomingTransactionsTracker>> {
        let block_tracker = self.block_tracker.ok_or_else(|| {
            IncomingTxError::Configuration("Block tracker not specified".to_string())
        })?;
        let network_provider = self.network_provider.ok_or_else(|| {
            IncomingTxError::Configuration("Network provider not specified".to_string())
        })?;
        let preferences = self.preferences.ok_or_else(|| {
            IncomingTxError::Configuration("Preferences provider not specified".to_string())
        })?;

        let source = match self.source {
            Some(source) => source,
            None => Self::default_source(self.config.unwrap_or_default())?,
        };
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(IncrementalStateStore::in_memory().await?),
        };

        let mut events = EventDispatcher::new();
        for listener in self.listeners {
            events
                .register(listener)
                .map_err(|e| IncomingTxError::Configuration(e.to_string()))?;
        }

        let (shutdown, _) = watch::channel(false);
        Ok(Arc::new(IncomingTransactionsTracker {
            runner: Arc::new(CycleRunner {
                source,
                store,
                block_tracker,
                network_provider,
                preferences,
                events: tokio::sync::Mutex::new(events),
            }),
            state: Mutex::new(TrackerState::Stopped),
            shutdown,
            signal_tasks: Mutex::new(Vec::new()),
        }))
    }
}
