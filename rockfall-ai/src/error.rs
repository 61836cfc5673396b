//! Error types for rockfall-ai
//!
//! One enum per tier so each layer reports only what it can know, plus the
//! unified `PipelineError` the orchestrator works with. `StageFailure` is
//! the serializable form handed to callers.

use crate::types::ModalityId;
use rockfall_common::events::StageName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tier 1 (feature engineering) errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// No usable readings in the window
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Scaler or layout mismatch
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Tier 2 predictor errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictorError {
    /// The vector lacks a feature the predictor requires
    #[error("{modality} predictor requires missing feature '{feature}'")]
    FeatureMissing { modality: ModalityId, feature: String },

    /// The predictor could not run at all
    #[error("{modality} modality unavailable: {reason}")]
    ModalityUnavailable { modality: ModalityId, reason: String },
}

/// Tier 2 fusion errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FusionError {
    /// None of the probability-bearing modalities produced a score
    #[error("No weighted modality produced a score")]
    NoModalities,

    /// A score was outside [0, 1], non-finite, or duplicated
    #[error("Invalid {modality} score: {reason}")]
    InvalidScore { modality: ModalityId, reason: String },
}

/// Unified pipeline error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("{modality} predictor requires missing feature '{feature}'")]
    FeatureMissing { modality: ModalityId, feature: String },

    #[error("{modality} modality unavailable: {reason}")]
    ModalityUnavailable { modality: ModalityId, reason: String },

    #[error("Fusion failed: {0}")]
    Fusion(#[from] FusionError),

    #[error("Stage {stage} exceeded its {timeout_ms} ms budget")]
    StageTimeout { stage: StageName, timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Run cancelled before stage {stage}")]
    Cancelled { stage: StageName },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FeatureError> for PipelineError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::InsufficientData(msg) => PipelineError::InsufficientData(msg),
            FeatureError::Configuration(msg) => PipelineError::Configuration(msg),
        }
    }
}

impl From<PredictorError> for PipelineError {
    fn from(err: PredictorError) -> Self {
        match err {
            PredictorError::FeatureMissing { modality, feature } => {
                PipelineError::FeatureMissing { modality, feature }
            }
            PredictorError::ModalityUnavailable { modality, reason } => {
                PipelineError::ModalityUnavailable { modality, reason }
            }
        }
    }
}

impl From<rockfall_common::Error> for PipelineError {
    fn from(err: rockfall_common::Error) -> Self {
        match err {
            rockfall_common::Error::Config(msg) => PipelineError::Configuration(msg),
            other => PipelineError::Configuration(other.to_string()),
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::InsufficientData(_) => FailureKind::InsufficientData,
            PipelineError::FeatureMissing { .. } => FailureKind::FeatureMissing,
            PipelineError::ModalityUnavailable { .. } => FailureKind::ModalityUnavailable,
            PipelineError::Fusion(_) => FailureKind::Fusion,
            PipelineError::StageTimeout { .. } => FailureKind::StageTimeout,
            PipelineError::Configuration(_) => FailureKind::Configuration,
            PipelineError::Cancelled { .. } => FailureKind::Cancelled,
            PipelineError::Internal(_) => FailureKind::Internal,
        }
    }

    /// Structured failure record naming the stage that produced this error
    pub fn at_stage(&self, stage: StageName) -> StageFailure {
        StageFailure {
            stage,
            kind: self.kind(),
            reason: self.to_string(),
        }
    }
}

/// Machine-readable failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InsufficientData,
    FeatureMissing,
    ModalityUnavailable,
    Fusion,
    StageTimeout,
    Configuration,
    Cancelled,
    Internal,
}

/// User-visible structured failure: which stage failed and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("stage {stage} failed ({kind:?}): {reason}")]
pub struct StageFailure {
    pub stage: StageName,
    pub kind: FailureKind,
    pub reason: String,
}
