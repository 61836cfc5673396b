//! Pipeline stage names and statuses

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Preprocessing,
    GeometryExtraction,
    FeatureExtraction,
    SensorValidation,
    FusionInputAssembly,
    MlPrediction,
    Finalization,
}

impl StageName {
    /// All stages in execution order
    pub const ALL: [StageName; 7] = [
        StageName::Preprocessing,
        StageName::GeometryExtraction,
        StageName::FeatureExtraction,
        StageName::SensorValidation,
        StageName::FusionInputAssembly,
        StageName::MlPrediction,
        StageName::Finalization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Preprocessing => "preprocessing",
            StageName::GeometryExtraction => "geometry_extraction",
            StageName::FeatureExtraction => "feature_extraction",
            StageName::SensorValidation => "sensor_validation",
            StageName::FusionInputAssembly => "fusion_input_assembly",
            StageName::MlPrediction => "ml_prediction",
            StageName::Finalization => "finalization",
        }
    }

    /// Position in the execution order (0-based)
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Stage that follows this one, if any
    pub fn next(&self) -> Option<StageName> {
        Self::ALL.get(self.index() + 1).copied()
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage completion status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    #[default]
    Pending,
    Running,
    Done,
    Failed,
}

impl StageStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, StageStatus::Done | StageStatus::Failed)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Done => "done",
            StageStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}
