//! Event types for the rockfall pipeline event system
//!
//! Provides the pipeline event definitions and the EventBus shared by the
//! orchestrator, the CLI and any progress-polling collaborator.

mod stage_types;

pub use stage_types::{StageName, StageStatus};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pipeline run events
///
/// Events are broadcast via EventBus and serialize to tagged JSON so an
/// external progress endpoint can forward them unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RiskEvent {
    /// A prediction run was accepted and is about to execute its first stage
    RunStarted {
        /// Run UUID
        run_id: Uuid,
        /// Site identifier from the request
        site_id: String,
        /// When the run started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A stage changed status
    ///
    /// `partial_output` is present on `done` and carries a small progress
    /// payload (counts, labels), never the full stage output.
    StageProgress {
        /// Run UUID
        run_id: Uuid,
        /// Stage that changed
        stage: StageName,
        /// New stage status
        status: StageStatus,
        /// Optional progress payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial_output: Option<serde_json::Value>,
        /// When the status changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The run produced a risk assessment
    RunCompleted {
        /// Run UUID
        run_id: Uuid,
        /// Final risk level label
        risk_level: String,
        /// Fused risk probability
        probability: f64,
        /// When the run completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A stage failed; no further stages execute
    RunFailed {
        /// Run UUID
        run_id: Uuid,
        /// Failing stage
        stage: StageName,
        /// Human-readable reason
        reason: String,
        /// When the failure was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The caller cancelled the run between stages
    RunCancelled {
        /// Run UUID
        run_id: Uuid,
        /// First stage that did not run
        stage: StageName,
        /// When cancellation was observed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RiskEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            RiskEvent::RunStarted { .. } => "RunStarted",
            RiskEvent::StageProgress { .. } => "StageProgress",
            RiskEvent::RunCompleted { .. } => "RunCompleted",
            RiskEvent::RunFailed { .. } => "RunFailed",
            RiskEvent::RunCancelled { .. } => "RunCancelled",
        }
    }

    /// Run this event belongs to
    pub fn run_id(&self) -> Uuid {
        match self {
            RiskEvent::RunStarted { run_id, .. }
            | RiskEvent::StageProgress { run_id, .. }
            | RiskEvent::RunCompleted { run_id, .. }
            | RiskEvent::RunFailed { run_id, .. }
            | RiskEvent::RunCancelled { run_id, .. } => *run_id,
        }
    }

    /// True for events after which the run emits nothing further
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RiskEvent::RunCompleted { .. } | RiskEvent::RunFailed { .. } | RiskEvent::RunCancelled { .. }
        )
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for pipeline events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the pipeline)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use rockfall_common::events::{EventBus, RiskEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(RiskEvent::RunStarted {
///     run_id: uuid::Uuid::new_v4(),
///     site_id: "pit-north".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "RunStarted");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RiskEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// A single run emits at most 2 + 2 * 7 events, so small capacities are
    /// fine for one subscriber following one run.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RiskEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RiskEvent,
    ) -> Result<usize, broadcast::error::SendError<RiskEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RiskEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn progress(run_id: Uuid, stage: StageName, status: StageStatus) -> RiskEvent {
        RiskEvent::StageProgress {
            run_id,
            stage,
            status,
            partial_output: None,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(10);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        let result = bus.emit(progress(Uuid::new_v4(), StageName::Preprocessing, StageStatus::Running));
        assert!(result.is_err());
    }

    #[test]
    fn test_eventbus_emit_lossy_on_full_channel() {
        let bus = Arc::new(EventBus::new(2));
        let mut _rx = bus.subscribe(); // Subscribe but don't receive

        let run_id = Uuid::new_v4();
        for stage in StageName::ALL {
            bus.emit_lossy(progress(run_id, stage, StageStatus::Done));
        }

        // Lagged receiver reports the overflow instead of blocking the sender
        assert!(matches!(
            _rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = Arc::new(EventBus::new(10));
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let run_id = Uuid::new_v4();
        let delivered = bus
            .emit(progress(run_id, StageName::MlPrediction, StageStatus::Running))
            .expect("emit should succeed");
        assert_eq!(delivered, 2);

        let r1 = rx1.try_recv().expect("rx1 should receive");
        let r2 = rx2.try_recv().expect("rx2 should receive");
        assert_eq!(r1, r2);
        assert_eq!(r1.run_id(), run_id);
    }

    #[test]
    fn test_stage_progress_serialization() {
        let run_id = Uuid::new_v4();
        let event = RiskEvent::StageProgress {
            run_id,
            stage: StageName::FusionInputAssembly,
            status: StageStatus::Done,
            partial_output: Some(serde_json::json!({ "features": 14 })),
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "StageProgress");
        assert_eq!(json["stage"], "fusion_input_assembly");
        assert_eq!(json["status"], "done");
        assert_eq!(json["partial_output"]["features"], 14);

        let back: RiskEvent = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, event);
    }

    #[test]
    fn test_terminal_events() {
        let run_id = Uuid::new_v4();
        let now = chrono::Utc::now();
        assert!(!progress(run_id, StageName::Finalization, StageStatus::Done).is_terminal());
        assert!(RiskEvent::RunCompleted {
            run_id,
            risk_level: "low".into(),
            probability: 0.1,
            timestamp: now,
        }
        .is_terminal());
        assert!(RiskEvent::RunCancelled {
            run_id,
            stage: StageName::GeometryExtraction,
            timestamp: now,
        }
        .is_terminal());
    }
}
