//! Confidence analysis: label, model agreement, and what lowered confidence

use crate::classifier::RiskClassifier;
use crate::types::{ConfidenceAnalysis, ConfidenceLevel, FusedResult, ModalityId};

const HIGH_CONFIDENCE: f64 = 0.8;
const MEDIUM_CONFIDENCE: f64 = 0.6;
const AGREEMENT_FLOOR: f64 = 0.7;

pub fn confidence_level(confidence: f64) -> ConfidenceLevel {
    if confidence > HIGH_CONFIDENCE {
        ConfidenceLevel::High
    } else if confidence > MEDIUM_CONFIDENCE {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

/// `max(0, 1 - var(level indices) / 2)` over the informative modality scores
///
/// Fewer than two informative scores agree trivially.
pub fn model_agreement(fused: &FusedResult, classifier: &RiskClassifier) -> f64 {
    let indices: Vec<f64> = fused
        .contributing_modalities
        .iter()
        .filter(|s| !s.is_void())
        .map(|s| classifier.classify(s.probability).index() as f64)
        .collect();
    if indices.len() < 2 {
        return 1.0;
    }
    let n = indices.len() as f64;
    let mean = indices.iter().sum::<f64>() / n;
    let variance = indices.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / n;
    (1.0 - variance / 2.0).max(0.0)
}

pub fn analyze(
    fused: &FusedResult,
    classifier: &RiskClassifier,
    imputed_features: &[String],
) -> ConfidenceAnalysis {
    let model_agreement = model_agreement(fused, classifier);
    let mut factors = Vec::new();

    for modality in &fused.missing_modalities {
        factors.push(match modality {
            ModalityId::Spatial => "No usable drone imagery; structural features not assessed".to_string(),
            other => format!("{} model produced no usable score", other),
        });
    }
    if !imputed_features.is_empty() {
        factors.push(format!(
            "{} feature(s) imputed with defaults: {}",
            imputed_features.len(),
            imputed_features.join(", ")
        ));
    }
    if model_agreement < AGREEMENT_FLOOR {
        factors.push("Models show some disagreement - manual verification recommended".to_string());
    }

    ConfidenceAnalysis {
        level: confidence_level(fused.confidence),
        model_agreement,
        factors,
    }
}
