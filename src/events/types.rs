//! Event types emitted by the incoming transaction tracker

use std::time::SystemTime;

use serde::Serialize;

use crate::storage::MergeSummary;

/// What caused a reconciliation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    /// Block tracker reported a new latest block
    NewBlock,
    /// Selected address changed
    AddressChanged,
    /// Active network changed
    NetworkChanged,
    /// Invoked directly through `run_cycle`
    Manual,
}

/// Lifecycle and cycle events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum IncomingTxEvent {
    TrackerStarted {
        timestamp: SystemTime,
    },
    TrackerStopped {
        timestamp: SystemTime,
    },
    CycleCompleted {
        trigger: CycleTrigger,
        address: String,
        from_block: Option<u64>,
        latest_block: Option<u64>,
        summary: MergeSummary,
    },
    /// Cycle ended without fetching or merging
    CycleSkipped {
        trigger: CycleTrigger,
        network: String,
        reason: String,
    },
    /// Cycle aborted; stored state was left unchanged
    CycleFailed {
        trigger: CycleTrigger,
        network: String,
        address: String,
        error: String,
    },
}

impl IncomingTxEvent {
    pub fn tracker_started() -> Self {
        Self::TrackerStarted {
            timestamp: SystemTime::now(),
        }
    }

    pub fn tracker_stopped() -> Self {
        Self::TrackerStopped {
            timestamp: SystemTime::now(),
        }
    }

    /// Name of the event variant
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TrackerStarted { .. } => "TrackerStarted",
            Self::TrackerStopped { .. } => "TrackerStopped",
            Self::CycleCompleted { .. } => "CycleCompleted",
            Self::CycleSkipped { .. } => "CycleSkipped",
            Self::CycleFailed { .. } => "CycleFailed",
        }
    }

    /// One line human readable summary
    pub fn summary(&self) -> String {
        match self {
            Self::TrackerStarted { .. } => "tracker started".to_string(),
            Self::TrackerStopped { .. } => "tracker stopped".to_string(),
            Self::CycleCompleted {
                trigger, summary, ..
            } => format!(
                "{:?} cycle on {}: {} new, next block {:?}",
                trigger,
                summary.network,
                summary.inserted.len(),
                summary.last_fetched_block
            ),
            Self::CycleSkipped {
                trigger,
                network,
                reason,
            } => format!("{trigger:?} cycle on {network} skipped: {reason}"),
            Self::CycleFailed {
                trigger,
                network,
                error,
                ..
            } => format!("{trigger:?} cycle on {network} failed: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::NetworkId;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = IncomingTxEvent::CycleCompleted {
            trigger: CycleTrigger::NewBlock,
            address: "0xabc".to_string(),
            from_block: Some(100),
            latest_block: Some(150),
            summary: MergeSummary {
                network: NetworkId::Mainnet,
                previous_block: Some(100),
                last_fetched_block: Some(151),
                inserted: vec!["0x1".to_string()],
                already_known: 0,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CycleCompleted");
        assert_eq!(json["trigger"], "new_block");
        assert_eq!(json["summary"]["last_fetched_block"], 151);
        assert_eq!(event.summary(), "NewBlock cycle on mainnet: 1 new, next block Some(151)");
    }
}
