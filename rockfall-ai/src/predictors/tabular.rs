//! Tabular predictors over the snapshot vector
//!
//! Both read the snapshot after the spatial adjustment has been folded in.
//! An adjustment above 0.5 means imagery indicates elevated structural risk
//! and pushes both scores up; below 0.5 pulls the regressor down.
//!
//! Classifier:
//! ```text
//! p = noisy_or(w_f · stress_f) ⊕ 0.6 · max(0, 2·adj - 1)
//! ```
//!
//! Regressor (logistic over the same stresses):
//! ```text
//! p = σ(-2.5 + Σ β_f · stress_f + 1.5 · (2·adj - 1))
//! ```

use super::{noisy_or, require, require_all, ModalityPredictor};
use crate::error::PredictorError;
use crate::features::names::*;
use crate::features::{FeatureFrame, FeatureVector};
use crate::types::{ModalityId, ModalityScore};

const CLASSIFIER_CONFIDENCE: f64 = 0.88;
const REGRESSOR_CONFIDENCE: f64 = 0.85;

const CLASSIFIER_WEIGHTS: [(&str, f64); 10] = [
    (PORE_PRESSURE_AVG, 0.9),
    (DISPLACEMENT_RATE, 0.7),
    (STABILITY_INDEX, 0.6),
    (ACCELERATION_MAX, 0.6),
    (PORE_PRESSURE_MAX, 0.5),
    (SEISMIC_MAGNITUDE_MAX, 0.5),
    (SEISMIC_EVENT_COUNT, 0.4),
    (WEATHER_SEVERITY_INDEX, 0.4),
    (RAINFALL_TOTAL, 0.3),
    (PORE_PRESSURE_TREND, 0.3),
];
const CLASSIFIER_SPATIAL_WEIGHT: f64 = 0.6;

const REGRESSOR_INTERCEPT: f64 = -2.5;
const REGRESSOR_COEFFICIENTS: [(&str, f64); 7] = [
    (PORE_PRESSURE_AVG, 4.0),
    (STABILITY_INDEX, 1.5),
    (DISPLACEMENT_RATE, 1.5),
    (ACCELERATION_MAX, 1.0),
    (SEISMIC_MAGNITUDE_MAX, 1.0),
    (WEATHER_SEVERITY_INDEX, 0.8),
    (PORE_PRESSURE_TREND, 0.8),
];
const REGRESSOR_SPATIAL_COEFFICIENT: f64 = 1.5;

const CLASSIFIER_REQUIRED: [&str; 11] = [
    PORE_PRESSURE_AVG,
    DISPLACEMENT_RATE,
    STABILITY_INDEX,
    ACCELERATION_MAX,
    PORE_PRESSURE_MAX,
    SEISMIC_MAGNITUDE_MAX,
    SEISMIC_EVENT_COUNT,
    WEATHER_SEVERITY_INDEX,
    RAINFALL_TOTAL,
    PORE_PRESSURE_TREND,
    SPATIAL_ADJUSTMENT,
];

const REGRESSOR_REQUIRED: [&str; 8] = [
    PORE_PRESSURE_AVG,
    STABILITY_INDEX,
    DISPLACEMENT_RATE,
    ACCELERATION_MAX,
    SEISMIC_MAGNITUDE_MAX,
    WEATHER_SEVERITY_INDEX,
    PORE_PRESSURE_TREND,
    SPATIAL_ADJUSTMENT,
];

#[derive(Debug, Clone, Default)]
pub struct TabularClassifier;

impl TabularClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl ModalityPredictor for TabularClassifier {
    fn modality(&self) -> ModalityId {
        ModalityId::TabularClassifier
    }

    fn required_features(&self) -> &[&'static str] {
        &CLASSIFIER_REQUIRED
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<ModalityScore, PredictorError> {
        let modality = self.modality();
        let snapshot = &frame.snapshot;
        require_all(snapshot, &CLASSIFIER_REQUIRED, modality)?;

        let mut terms = CLASSIFIER_WEIGHTS
            .iter()
            .map(|(name, w)| require(snapshot, name, modality).map(|v| (*w, v.stress)))
            .collect::<Result<Vec<_>, _>>()?;
        let adjustment = require(snapshot, SPATIAL_ADJUSTMENT, modality)?.raw;
        terms.push((CLASSIFIER_SPATIAL_WEIGHT, (2.0 * adjustment - 1.0).max(0.0)));

        Ok(ModalityScore::new(
            modality,
            noisy_or(terms),
            CLASSIFIER_CONFIDENCE * sensor_coverage(snapshot),
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TabularRegressor;

impl TabularRegressor {
    pub fn new() -> Self {
        Self
    }
}

impl ModalityPredictor for TabularRegressor {
    fn modality(&self) -> ModalityId {
        ModalityId::TabularRegressor
    }

    fn required_features(&self) -> &[&'static str] {
        &REGRESSOR_REQUIRED
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<ModalityScore, PredictorError> {
        let modality = self.modality();
        let snapshot = &frame.snapshot;
        require_all(snapshot, &REGRESSOR_REQUIRED, modality)?;

        let mut z = REGRESSOR_INTERCEPT;
        for (name, beta) in REGRESSOR_COEFFICIENTS {
            z += beta * require(snapshot, name, modality)?.stress;
        }
        let adjustment = require(snapshot, SPATIAL_ADJUSTMENT, modality)?.raw;
        z += REGRESSOR_SPATIAL_COEFFICIENT * (2.0 * adjustment - 1.0);

        Ok(ModalityScore::new(
            modality,
            sigmoid(z),
            REGRESSOR_CONFIDENCE * sensor_coverage(snapshot),
        ))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Observed fraction of sensor-derived snapshot features
///
/// The spatial adjustment is excluded: its presence reflects imagery, which
/// the fusion penalty already accounts for.
fn sensor_coverage(snapshot: &FeatureVector) -> f64 {
    let (mut observed, mut total) = (0usize, 0usize);
    for (name, value) in snapshot.iter() {
        if name == SPATIAL_ADJUSTMENT {
            continue;
        }
        total += 1;
        if !value.imputed {
            observed += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        observed as f64 / total as f64
    }
}
