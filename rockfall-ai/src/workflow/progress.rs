//! Progress reporting for one run
//!
//! Events go to an optional `mpsc` channel (a single dedicated consumer,
//! awaited so none are dropped) and to an optional `EventBus` (any number
//! of subscribers, lossy when nobody listens).

use chrono::Utc;
use rockfall_common::events::{EventBus, RiskEvent, StageName, StageStatus};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Clone)]
pub struct ProgressReporter {
    run_id: Uuid,
    event_tx: Option<mpsc::Sender<RiskEvent>>,
    event_bus: Option<EventBus>,
}

impl ProgressReporter {
    pub fn new(run_id: Uuid, event_tx: Option<mpsc::Sender<RiskEvent>>, event_bus: Option<EventBus>) -> Self {
        Self {
            run_id,
            event_tx,
            event_bus,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub async fn emit(&self, event: RiskEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(event.clone());
        }
        if let Some(tx) = &self.event_tx {
            // Receiver gone: the caller stopped listening, the run carries on
            let _ = tx.send(event).await;
        }
    }

    pub async fn stage(&self, stage: StageName, status: StageStatus, partial_output: Option<serde_json::Value>) {
        self.emit(RiskEvent::StageProgress {
            run_id: self.run_id,
            stage,
            status,
            partial_output,
            timestamp: Utc::now(),
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_channel_and_bus() {
        let (tx, mut rx) = mpsc::channel(8);
        let bus = EventBus::new(8);
        let mut sub = bus.subscribe();
        let reporter = ProgressReporter::new(Uuid::new_v4(), Some(tx), Some(bus));

        reporter.stage(StageName::Preprocessing, StageStatus::Running, None).await;

        let from_channel = rx.recv().await.expect("channel event");
        let from_bus = sub.recv().await.expect("bus event");
        assert_eq!(from_channel, from_bus);
        assert_eq!(from_channel.run_id(), reporter.run_id());
    }

    #[tokio::test]
    async fn test_closed_channel_is_ignored() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let reporter = ProgressReporter::new(Uuid::new_v4(), Some(tx), None);
        reporter.stage(StageName::Finalization, StageStatus::Done, None).await;
    }
}
