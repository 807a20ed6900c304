//! Listener that logs tracker events through `tracing`

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::events::{EventListener, IncomingTxEvent};

/// Logs events; failures at `error`, new transactions at `info`, the rest at `debug`
#[derive(Debug, Clone, Default)]
pub struct LoggingListener {
    quiet: bool,
}

impl LoggingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only log failures and cycles that found something
    pub fn quiet() -> Self {
        Self { quiet: true }
    }
}

#[async_trait]
impl EventListener for LoggingListener {
    async fn handle_event(
        &mut self,
        event: &IncomingTxEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match event {
            IncomingTxEvent::CycleFailed { .. } => error!("{}", event.summary()),
            IncomingTxEvent::CycleCompleted { summary, .. } if !summary.inserted.is_empty() => {
                info!("{}", event.summary())
            }
            _ if !self.quiet => debug!("{}", event.summary()),
            _ => {}
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LoggingListener"
    }
}
