//! rockfall-ai library interface
//!
//! Multi-modal rockfall risk assessment for open-pit slopes. Exposes the
//! pipeline and every tier for integration testing.

pub mod classifier;
pub mod config;
pub mod error;
pub mod explain;
pub mod features;
pub mod fusion;
pub mod predictors;
pub mod types;
pub mod workflow;

pub use crate::classifier::RiskClassifier;
pub use crate::config::ModelConfig;
pub use crate::error::{FailureKind, PipelineError, StageFailure};
pub use crate::fusion::FusionEngine;
pub use crate::types::{PredictionRequest, RiskAssessment, RiskLevel};
pub use crate::workflow::{RiskPipeline, RunReport};
