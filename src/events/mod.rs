//! Event system for the incoming transaction tracker
//!
//! The tracker reports its lifecycle (started/stopped) and the outcome of
//! every reconciliation cycle to registered listeners. Listener failures are
//! isolated: they are logged and never interrupt the tracker or other
//! listeners.
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use incoming_tx_tracker::events::{EventDispatcher, EventListener, IncomingTxEvent};
//!
//! struct Notifier;
//!
//! #[async_trait]
//! impl EventListener for Notifier {
//!     async fn handle_event(
//!         &mut self,
//!         event: &IncomingTxEvent,
//!     ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!         if let IncomingTxEvent::CycleCompleted { summary, .. } = event {
//!             println!("{} new incoming transactions", summary.inserted.len());
//!         }
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "Notifier"
//!     }
//! }
//!
//! let mut dispatcher = EventDispatcher::new();
//! dispatcher.register(Box::new(Notifier)).unwrap();
//! ```

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub mod listeners;
pub mod types;

pub use types::*;

/// Errors that can occur during event dispatcher operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventDispatcherError {
    /// Attempted to register a listener with a duplicate name
    #[error("Listener with name '{0}' is already registered")]
    DuplicateListener(String),
    /// Attempted to register more listeners than the configured maximum
    #[error("Cannot register listener: maximum of {max} listeners allowed, currently have {current}")]
    TooManyListeners { current: usize, max: usize },
    /// Listener name is empty
    #[error("Invalid listener name: '{0}'")]
    InvalidListenerName(String),
}

/// Statistics about event processing
#[derive(Debug, Default, Clone)]
pub struct EventStats {
    pub total_events_dispatched: usize,
    pub total_listener_calls: usize,
    pub total_listener_errors: usize,
    pub total_processing_time: Duration,
    pub events_by_type: HashMap<String, usize>,
    pub errors_by_listener: HashMap<String, usize>,
}

/// Trait for handling tracker events asynchronously
///
/// Implementations should handle errors gracefully; a returned error is
/// logged by the dispatcher and otherwise ignored.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Handle a tracker event
    async fn handle_event(
        &mut self,
        event: &IncomingTxEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Name used for logging and duplicate detection
    fn name(&self) -> &'static str {
        "UnnamedListener"
    }

    /// Whether this listener wants `event`
    fn wants_event(&self, _event: &IncomingTxEvent) -> bool {
        true
    }
}

/// Delivers events to registered listeners in registration order
pub struct EventDispatcher {
    listeners: Vec<Box<dyn EventListener>>,
    registered_names: HashSet<String>,
    max_listeners: Option<usize>,
    stats: EventStats,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            registered_names: HashSet::new(),
            max_listeners: None,
            stats: EventStats::default(),
        }
    }

    /// Create a dispatcher that accepts at most `max_listeners`
    pub fn new_with_limit(max_listeners: usize) -> Self {
        Self {
            max_listeners: Some(max_listeners),
            ..Self::new()
        }
    }

    /// Register an event listener
    ///
    /// # Errors
    ///
    /// * `DuplicateListener` - a listener with the same name is already registered
    /// * `TooManyListeners` - the listener limit would be exceeded
    /// * `InvalidListenerName` - the name is empty
    pub fn register(&mut self, listener: Box<dyn EventListener>) -> Result<(), EventDispatcherError> {
        let listener_name = listener.name().to_string();

        if listener_name.trim().is_empty() {
            return Err(EventDispatcherError::InvalidListenerName(listener_name));
        }
        if self.registered_names.contains(&listener_name) {
            return Err(EventDispatcherError::DuplicateListener(listener_name));
        }
        if let Some(max) = self.max_listeners {
            if self.listeners.len() >= max {
                return Err(EventDispatcherError::TooManyListeners {
                    current: self.listeners.len(),
                    max,
                });
            }
        }

        self.registered_names.insert(listener_name);
        self.listeners.push(listener);
        Ok(())
    }

    /// Dispatch an event to all interested listeners
    pub async fn dispatch(&mut self, event: IncomingTxEvent) {
        let dispatch_start = Instant::now();
        let event_type = event.event_type();

        self.stats.total_events_dispatched += 1;
        *self
            .stats
            .events_by_type
            .entry(event_type.to_string())
            .or_insert(0) += 1;

        for listener in &mut self.listeners {
            if !listener.wants_event(&event) {
                continue;
            }

            self.stats.total_listener_calls += 1;
            if let Err(e) = listener.handle_event(&event).await {
                let listener_name = listener.name();
                self.stats.total_listener_errors += 1;
                *self
                    .stats
                    .errors_by_listener
                    .entry(listener_name.to_string())
                    .or_insert(0) += 1;
                warn!(listener = listener_name, event = event_type, "Event listener failed: {e}");
            }
        }

        self.stats.total_processing_time += dispatch_start.elapsed();
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Names of registered listeners
    pub fn listener_names(&self) -> Vec<&'static str> {
        self.listeners.iter().map(|l| l.name()).collect()
    }

    /// Copy of the processing statistics
    pub fn get_stats(&self) -> EventStats {
        self.stats.clone()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_names())
            .field("max_listeners", &self.max_listeners)
            .finish()
    }
}
