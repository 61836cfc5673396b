//! Temporal predictor: hazard trajectory over the recent sample sequence
//!
//! ```text
//! hazard_i   = noisy_or(w_f · stress_f(sample_i))
//! level      = Σ decay^(n-1-i) · hazard_i / Σ decay^(n-1-i)
//! momentum   = slope(second half) · n/2
//! accel      = (slope(second half) - slope(first half)) · n/2
//! p          = clamp(level + 0.5·momentum + 0.25·accel)
//! confidence = 0.9 · min(1, n / window_len) · observed fraction
//! ```
//!
//! Momentum terms need at least four samples.

use super::{noisy_or, require, require_all, ModalityPredictor};
use crate::config::TemporalConfig;
use crate::error::PredictorError;
use crate::features::composite::ols_slope;
use crate::features::names::*;
use crate::features::FeatureFrame;
use crate::types::{ModalityId, ModalityScore};

const BASE_CONFIDENCE: f64 = 0.9;
const MOMENTUM_WEIGHT: f64 = 0.5;
const ACCELERATION_WEIGHT: f64 = 0.25;
const MIN_TREND_SAMPLES: usize = 4;

/// (feature, hazard weight)
const HAZARD_WEIGHTS: [(&str, f64); 6] = [
    (PORE_PRESSURE, 0.85),
    (STABILITY_INDEX, 0.7),
    (DISPLACEMENT_RATE, 0.6),
    (ACCELERATION, 0.6),
    (SEISMIC_ACTIVITY, 0.6),
    (WEATHER_SEVERITY_INDEX, 0.5),
];

const REQUIRED: [&str; 6] = [
    PORE_PRESSURE,
    STABILITY_INDEX,
    DISPLACEMENT_RATE,
    ACCELERATION,
    SEISMIC_ACTIVITY,
    WEATHER_SEVERITY_INDEX,
];

#[derive(Debug, Clone)]
pub struct TemporalPredictor {
    window_len: usize,
    recency_decay: f64,
}

impl TemporalPredictor {
    pub fn new(config: &TemporalConfig) -> Self {
        Self {
            window_len: config.window_len.max(1),
            recency_decay: config.recency_decay,
        }
    }
}

impl ModalityPredictor for TemporalPredictor {
    fn modality(&self) -> ModalityId {
        ModalityId::Temporal
    }

    fn required_features(&self) -> &[&'static str] {
        &REQUIRED
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<ModalityScore, PredictorError> {
        let modality = self.modality();
        if frame.temporal.is_empty() {
            return Err(PredictorError::ModalityUnavailable {
                modality,
                reason: "no samples in the temporal window".to_string(),
            });
        }

        let mut hazards = Vec::with_capacity(frame.temporal.len());
        for vector in &frame.temporal {
            require_all(vector, &REQUIRED, modality)?;
            let terms = HAZARD_WEIGHTS
                .iter()
                .map(|(name, w)| require(vector, name, modality).map(|v| (*w, v.stress)))
                .collect::<Result<Vec<_>, _>>()?;
            hazards.push(noisy_or(terms));
        }

        let n = hazards.len();
        let (mut weighted, mut total) = (0.0, 0.0);
        for (i, h) in hazards.iter().enumerate() {
            let age = i32::try_from(n - 1 - i).unwrap_or(i32::MAX);
            let w = self.recency_decay.powi(age);
            weighted += w * h;
            total += w;
        }
        let level = if total > 0.0 { weighted / total } else { 0.0 };

        let (momentum, acceleration) = if n >= MIN_TREND_SAMPLES {
            let half = n / 2;
            let slope_first = index_slope(&hazards[..half]);
            let slope_second = index_slope(&hazards[half..]);
            let scale = n as f64 / 2.0;
            (slope_second * scale, (slope_second - slope_first) * scale)
        } else {
            (0.0, 0.0)
        };

        let probability = level + MOMENTUM_WEIGHT * momentum + ACCELERATION_WEIGHT * acceleration;

        let coverage = (n as f64 / self.window_len as f64).min(1.0);
        let observed = frame.temporal.iter().map(|v| v.observed_fraction()).sum::<f64>() / n as f64;
        let confidence = BASE_CONFIDENCE * coverage * observed;

        Ok(ModalityScore::new(modality, probability, confidence))
    }
}

fn index_slope(values: &[f64]) -> f64 {
    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64, *v))
        .collect();
    ols_slope(&points)
}
