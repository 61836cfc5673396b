//! Pipeline run state machine
//!
//! A run moves `Pending → Running → Completed | Failed | Cancelled`. Each of
//! the seven stages keeps its own record (`pending|running|done|failed`,
//! timestamps, partial output). Outputs of every successful stage are kept
//! on the run, so a failed or cancelled run stays auditable.

use crate::error::StageFailure;
use crate::features::{CleanedWindow, ExtractedFeatures, FeatureFrame, ImageAggregate, SensorValidationReport};
use crate::types::{FusedResult, RiskAssessment};
use chrono::{DateTime, Utc};
use rockfall_common::events::{StageName, StageStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// One stage of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageName,
    pub status: StageStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Compact summary for progress display
    pub partial_output: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl StageRecord {
    fn new(stage: StageName) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            started_at: None,
            finished_at: None,
            partial_output: None,
            error: None,
        }
    }
}

/// Output of the ml_prediction stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutput {
    /// Value folded into the snapshot before tabular scoring
    pub spatial_adjustment: f64,
    pub fused: FusedResult,
}

/// Outputs of every stage that completed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageOutputs {
    pub cleaned: Option<CleanedWindow>,
    /// `None` both before geometry extraction and when no imagery was submitted;
    /// the stage record tells the two apart
    pub images: Option<ImageAggregate>,
    pub features: Option<ExtractedFeatures>,
    pub validation: Option<SensorValidationReport>,
    pub frame: Option<FeatureFrame>,
    pub prediction: Option<PredictionOutput>,
    pub assessment: Option<RiskAssessment>,
}

/// Overall progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    pub completed_stages: usize,
    pub total_stages: usize,
    /// 0.0 - 100.0
    pub percentage: f64,
    pub current_stage: Option<StageName>,
}

/// State of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub site_id: String,
    pub status: RunStatus,
    pub stages: Vec<StageRecord>,
    pub outputs: StageOutputs,
    pub failure: Option<StageFailure>,
    /// First stage that never started because the run was cancelled
    pub cancelled_before: Option<StageName>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(site_id: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            site_id: site_id.into(),
            status: RunStatus::Pending,
            stages: StageName::ALL.iter().map(|&s| StageRecord::new(s)).collect(),
            outputs: StageOutputs::default(),
            failure: None,
            cancelled_before: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn record(&self, stage: StageName) -> &StageRecord {
        &self.stages[stage.index()]
    }

    fn record_mut(&mut self, stage: StageName) -> &mut StageRecord {
        &mut self.stages[stage.index()]
    }

    pub fn start_stage(&mut self, stage: StageName) {
        self.status = RunStatus::Running;
        let record = self.record_mut(stage);
        record.status = StageStatus::Running;
        record.started_at = Some(Utc::now());
    }

    pub fn complete_stage(&mut self, stage: StageName, partial_output: Option<serde_json::Value>) {
        let record = self.record_mut(stage);
        record.status = StageStatus::Done;
        record.finished_at = Some(Utc::now());
        record.partial_output = partial_output;
    }

    /// Mark `failure.stage` failed and the run failed
    pub fn fail_stage(&mut self, failure: StageFailure) {
        let record = self.record_mut(failure.stage);
        record.status = StageStatus::Failed;
        record.finished_at = Some(Utc::now());
        record.error = Some(failure.reason.clone());
        self.failure = Some(failure);
        self.finish(RunStatus::Failed);
    }

    /// Stop before `next_stage`; it and every later stage stay pending
    pub fn cancel(&mut self, next_stage: StageName) {
        tracing::debug!(run_id = %self.run_id, stage = %next_stage, "Run cancelled");
        self.cancelled_before = Some(next_stage);
        self.finish(RunStatus::Cancelled);
    }

    pub fn complete(&mut self) {
        self.finish(RunStatus::Completed);
    }

    fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    pub fn progress(&self) -> RunProgress {
        let completed_stages = self
            .stages
            .iter()
            .filter(|r| r.status == StageStatus::Done)
            .count();
        let total_stages = self.stages.len();
        RunProgress {
            completed_stages,
            total_stages,
            percentage: if total_stages > 0 {
                completed_stages as f64 / total_stages as f64 * 100.0
            } else {
                0.0
            },
            current_stage: self
                .stages
                .iter()
                .find(|r| r.status == StageStatus::Running)
                .map(|r| r.stage),
        }
    }
}
