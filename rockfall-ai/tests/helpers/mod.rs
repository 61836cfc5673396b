//! Test Helper Utilities
//!
//! Request builders and stub predictors shared by the rockfall-ai suites

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use rockfall_ai::error::PredictorError;
use rockfall_ai::features::FeatureFrame;
use rockfall_ai::predictors::ModalityPredictor;
use rockfall_ai::types::{
    ImageFeatureSet, ModalityId, ModalityScore, PredictionRequest, SensorChannel, SensorReading, TimeWindow,
};
use rockfall_ai::ModelConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const SITE: &str = "pit-north";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

/// Hourly reading with every channel at its safe baseline
pub fn baseline_reading(device: &str, hour: i64) -> SensorReading {
    SensorReading::new(device, t0() + Duration::hours(hour))
        .with(SensorChannel::PorePressure, 30.0)
        .with(SensorChannel::Displacement, 2.0)
        .with(SensorChannel::Acceleration, 0.0)
        .with(SensorChannel::Rainfall, 0.0)
        .with(SensorChannel::Temperature, 20.0)
        .with(SensorChannel::SeismicActivity, 0.0)
}

/// Request spanning `hours` hourly samples from one piezometer
pub fn request_with(hours: i64, reading: impl Fn(i64) -> SensorReading) -> PredictionRequest {
    PredictionRequest {
        site_id: SITE.to_string(),
        window: TimeWindow {
            start: t0(),
            end: t0() + Duration::hours(hours),
        },
        sensor_batches: vec![(0..hours).map(reading).collect()],
        image_batches: vec![],
    }
}

pub fn baseline_request(hours: i64) -> PredictionRequest {
    request_with(hours, |h| baseline_reading("pz-01", h))
}

/// 96 hourly samples with pore pressure held at `kpa`, no imagery
pub fn pore_pressure_request(kpa: f64) -> PredictionRequest {
    request_with(96, move |h| baseline_reading("pz-01", h).with(SensorChannel::PorePressure, kpa))
}

/// Pore pressure held at 55 kPa: scores Critical with default config
pub fn high_pore_pressure_request() -> PredictionRequest {
    pore_pressure_request(55.0)
}

/// Drone batch over a stable, lightly cracked face
pub fn stable_imagery() -> ImageFeatureSet {
    ImageFeatureSet {
        batch_id: Some("survey-0301".to_string()),
        captured_at: Some(t0()),
        slope_angle: Some(40.0),
        bench_height: Some(10.0),
        bench_width: Some(8.0),
        surface_roughness: Some(0.2),
        crack_count: Some(1),
        crack_density: Some(0.1),
        max_crack_width: Some(1.0),
        displacement_vectors: vec![],
        processing_confidence: 0.9,
    }
}

pub fn default_config() -> Arc<ModelConfig> {
    Arc::new(ModelConfig::default())
}

/// Fixed-output predictor standing in for a trained model
pub struct FixedPredictor {
    pub modality: ModalityId,
    pub probability: f64,
    pub confidence: f64,
}

impl ModalityPredictor for FixedPredictor {
    fn modality(&self) -> ModalityId {
        self.modality
    }

    fn required_features(&self) -> &[&'static str] {
        &[]
    }

    fn predict(&self, _frame: &FeatureFrame) -> Result<ModalityScore, PredictorError> {
        Ok(ModalityScore::new(self.modality, self.probability, self.confidence))
    }
}

/// Predictor whose model is offline
pub struct OfflinePredictor(pub ModalityId);

impl ModalityPredictor for OfflinePredictor {
    fn modality(&self) -> ModalityId {
        self.0
    }

    fn required_features(&self) -> &[&'static str] {
        &[]
    }

    fn predict(&self, _frame: &FeatureFrame) -> Result<ModalityScore, PredictorError> {
        Err(PredictorError::ModalityUnavailable {
            modality: self.0,
            reason: "model server offline".to_string(),
        })
    }
}

/// Scores normally but requests cancellation while running
pub struct CancellingPredictor {
    pub modality: ModalityId,
    pub token: CancellationToken,
}

impl ModalityPredictor for CancellingPredictor {
    fn modality(&self) -> ModalityId {
        self.modality
    }

    fn required_features(&self) -> &[&'static str] {
        &[]
    }

    fn predict(&self, _frame: &FeatureFrame) -> Result<ModalityScore, PredictorError> {
        self.token.cancel();
        Ok(ModalityScore::new(self.modality, 0.3, 0.8))
    }
}

/// Blocks its worker thread for `delay` before scoring
pub struct SlowPredictor {
    pub modality: ModalityId,
    pub delay: std::time::Duration,
}

impl ModalityPredictor for SlowPredictor {
    fn modality(&self) -> ModalityId {
        self.modality
    }

    fn required_features(&self) -> &[&'static str] {
        &[]
    }

    fn predict(&self, _frame: &FeatureFrame) -> Result<ModalityScore, PredictorError> {
        std::thread::sleep(self.delay);
        Ok(ModalityScore::new(self.modality, 0.5, 0.5))
    }
}

/// Model trained on a snapshot feature this layout does not provide
pub struct MissingFeaturePredictor {
    pub modality: ModalityId,
    pub feature: &'static str,
}

impl ModalityPredictor for MissingFeaturePredictor {
    fn modality(&self) -> ModalityId {
        self.modality
    }

    fn required_features(&self) -> &[&'static str] {
        std::slice::from_ref(&self.feature)
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<ModalityScore, PredictorError> {
        let value = frame.snapshot.get(self.feature).ok_or_else(|| PredictorError::FeatureMissing {
            modality: self.modality,
            feature: self.feature.to_string(),
        })?;
        Ok(ModalityScore::new(self.modality, value.scaled, 0.8))
    }
}
