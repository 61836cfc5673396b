//! Spatial predictor: structural risk from image-derived features
//!
//! Weighted mean of feature stress over the image features actually
//! observed. Confidence is the upstream processing confidence, reduced by
//! the share of weighted features that had to be imputed. Without imagery
//! the score is neutral (0.5) with zero confidence.

use super::{require, require_all, ModalityPredictor};
use crate::error::PredictorError;
use crate::features::names::*;
use crate::features::FeatureFrame;
use crate::types::{ModalityId, ModalityScore};

/// (feature, weight); weights sum to 1
const STRUCTURE_WEIGHTS: [(&str, f64); 5] = [
    (SLOPE_ANGLE, 0.3),
    (CRACK_DENSITY, 0.3),
    (SURFACE_DISPLACEMENT, 0.2),
    (CRACK_WIDTH_MAX, 0.1),
    (SURFACE_ROUGHNESS, 0.1),
];

const REQUIRED: [&str; 6] = [
    SLOPE_ANGLE,
    CRACK_DENSITY,
    SURFACE_DISPLACEMENT,
    CRACK_WIDTH_MAX,
    SURFACE_ROUGHNESS,
    IMAGE_CONFIDENCE,
];

#[derive(Debug, Clone, Default)]
pub struct SpatialPredictor;

impl SpatialPredictor {
    pub fn new() -> Self {
        Self
    }
}

impl ModalityPredictor for SpatialPredictor {
    fn modality(&self) -> ModalityId {
        ModalityId::Spatial
    }

    fn required_features(&self) -> &[&'static str] {
        &REQUIRED
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<ModalityScore, PredictorError> {
        let modality = self.modality();
        let vector = &frame.spatial;
        require_all(vector, &REQUIRED, modality)?;

        let image_confidence = require(vector, IMAGE_CONFIDENCE, modality)?;
        if image_confidence.imputed || image_confidence.raw <= 0.0 {
            return Ok(ModalityScore::neutral(modality));
        }

        let (mut score, mut observed_weight) = (0.0, 0.0);
        for (name, weight) in STRUCTURE_WEIGHTS {
            let value = require(vector, name, modality)?;
            if !value.imputed {
                score += weight * value.stress;
                observed_weight += weight;
            }
        }
        if observed_weight <= 0.0 {
            return Ok(ModalityScore::neutral(modality));
        }

        Ok(ModalityScore::new(
            modality,
            score / observed_weight,
            image_confidence.raw * observed_weight,
        ))
    }
}
