//! Tier 2: Weighted fusion of modality scores
//!
//! ```text
//! w'_m        = w_m / Σ_{present} w_k           (redistribution)
//! probability = Σ w'_m · p_m
//! confidence  = Σ w'_m · c_m · penalty^(missing)
//! ```
//!
//! `missing` counts modalities that are absent or void (zero confidence).
//! The spatial modality carries no probability weight: it reaches the
//! result through the snapshot's spatial adjustment, so it only affects
//! the penalty here. Scores are always visited in canonical modality
//! order, which makes the result bit-identical for identical inputs
//! regardless of the order the scores arrived in.

use crate::config::FusionConfig;
use crate::error::FusionError;
use crate::types::{FusedResult, ModalityId, ModalityScore};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FusionEngine {
    weights: BTreeMap<ModalityId, f64>,
    missing_modality_penalty: f64,
}

impl FusionEngine {
    pub fn new(config: &FusionConfig) -> Self {
        let weights = ModalityId::ALL
            .iter()
            .map(|&m| (m, config.weight(m)))
            .collect();
        Self {
            weights,
            missing_modality_penalty: config.missing_modality_penalty,
        }
    }

    fn weight(&self, modality: ModalityId) -> f64 {
        self.weights.get(&modality).copied().unwrap_or(0.0)
    }

    /// Configured weights renormalised over the present modalities
    ///
    /// Only modalities with a positive configured weight appear. The
    /// returned weights sum to 1 whenever any appear.
    pub fn effective_weights(&self, present: &[ModalityId]) -> BTreeMap<ModalityId, f64> {
        let weighted: Vec<ModalityId> = ModalityId::ALL
            .iter()
            .copied()
            .filter(|m| present.contains(m) && self.weight(*m) > 0.0)
            .collect();
        let total: f64 = weighted.iter().map(|m| self.weight(*m)).sum();
        if total <= 0.0 {
            return BTreeMap::new();
        }
        weighted
            .into_iter()
            .map(|m| (m, self.weight(m) / total))
            .collect()
    }

    /// Fuse the scores actually produced for one request
    ///
    /// # Errors
    /// - `FusionError::InvalidScore` for a duplicated modality or a
    ///   probability/confidence outside [0, 1]
    /// - `FusionError::NoModalities` when no weighted modality is present
    pub fn fuse(&self, scores: &[ModalityScore]) -> Result<FusedResult, FusionError> {
        let mut by_modality: BTreeMap<ModalityId, ModalityScore> = BTreeMap::new();
        for score in scores {
            validate(score)?;
            if by_modality.insert(score.modality_id, *score).is_some() {
                return Err(FusionError::InvalidScore {
                    modality: score.modality_id,
                    reason: "duplicate score".to_string(),
                });
            }
        }

        let present: Vec<ModalityId> = by_modality.keys().copied().collect();
        let effective_weights = self.effective_weights(&present);
        if effective_weights.is_empty() {
            return Err(FusionError::NoModalities);
        }

        let (mut probability, mut confidence) = (0.0, 0.0);
        for modality in ModalityId::ALL {
            if let (Some(w), Some(score)) = (effective_weights.get(&modality), by_modality.get(&modality)) {
                probability += w * score.probability;
                confidence += w * score.confidence;
            }
        }

        let missing_modalities: Vec<ModalityId> = ModalityId::ALL
            .iter()
            .copied()
            .filter(|m| by_modality.get(m).map(|s| s.is_void()).unwrap_or(true))
            .collect();
        confidence *= self.missing_modality_penalty.powi(missing_modalities.len() as i32);

        let contributing_modalities: Vec<ModalityScore> = ModalityId::ALL
            .iter()
            .filter_map(|m| by_modality.get(m).copied())
            .collect();

        debug!(
            probability,
            confidence,
            present = contributing_modalities.len(),
            missing = ?missing_modalities,
            "Fused modality scores"
        );

        Ok(FusedResult {
            probability: probability.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            contributing_modalities,
            effective_weights,
            missing_modalities,
        })
    }
}

fn validate(score: &ModalityScore) -> Result<(), FusionError> {
    let check = |value: f64, what: &str| {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(FusionError::InvalidScore {
                modality: score.modality_id,
                reason: format!("{} {} outside [0, 1]", what, value),
            })
        }
    };
    check(score.probability, "probability")?;
    check(score.confidence, "confidence")
}
