//! Mock event listener for testing scenarios
//!
//! Captures every received event behind an `Arc<Mutex<_>>` so tests can keep
//! a handle after the listener is moved into a dispatcher.
//!
//! ```rust,ignore
//! let mock = MockEventListener::new();
//! let captured = mock.captured();
//! dispatcher.register(Box::new(mock))?;
//! // ... run the tracker ...
//! assert_eq!(captured.lock().unwrap().len(), 2);
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::events::{EventListener, IncomingTxEvent};

/// Shared handle to captured events
pub type CapturedEvents = Arc<Mutex<Vec<IncomingTxEvent>>>;

/// Event listener that records everything it receives
#[derive(Debug, Clone, Default)]
pub struct MockEventListener {
    events: CapturedEvents,
    capture_only: Option<Vec<&'static str>>,
}

impl MockEventListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only capture the given event types
    pub fn capture_only(event_types: Vec<&'static str>) -> Self {
        Self {
            events: CapturedEvents::default(),
            capture_only: Some(event_types),
        }
    }

    /// Handle to the captured events
    pub fn captured(&self) -> CapturedEvents {
        Arc::clone(&self.events)
    }

    /// Event type names in capture order
    pub fn event_types(events: &CapturedEvents) -> Vec<&'static str> {
        events
            .lock()
            .map(|events| events.iter().map(|e| e.event_type()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventListener for MockEventListener {
    async fn handle_event(
        &mut self,
        event: &IncomingTxEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.events
            .lock()
            .map_err(|_| "captured events lock poisoned")?
            .push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MockEventListener"
    }

    fn wants_event(&self, event: &IncomingTxEvent) -> bool {
        self.capture_only
            .as_ref()
            .map(|types| types.contains(&event.event_type()))
            .unwrap_or(true)
    }
}
