//! Tier 2: Per-modality predictors
//!
//! Each predictor maps its slice of the `FeatureFrame` to a `ModalityScore`.
//! Predictors are pure and deterministic: identical frames yield identical
//! scores. They are CPU-bound and run on the blocking pool, in parallel,
//! from the `ml_prediction` stage.
//!
//! The built-in scoring functions are documented analytic models over the
//! per-feature stress values produced by the scaler. Trained models plug in
//! through `Predictor::External`.

pub mod spatial;
pub mod tabular;
pub mod temporal;

pub use spatial::SpatialPredictor;
pub use tabular::{TabularClassifier, TabularRegressor};
pub use temporal::TemporalPredictor;

use crate::config::ModelConfig;
use crate::error::PredictorError;
use crate::features::{FeatureFrame, FeatureValue, FeatureVector};
use crate::types::{ModalityId, ModalityScore};
use std::fmt;
use std::sync::Arc;

/// A scoring model for one modality
pub trait ModalityPredictor: Send + Sync {
    fn modality(&self) -> ModalityId;

    /// Features this predictor reads; all must be present in its input vector
    fn required_features(&self) -> &[&'static str];

    /// Score the frame
    ///
    /// # Errors
    /// `PredictorError::FeatureMissing` when a required feature is absent,
    /// `PredictorError::ModalityUnavailable` when the predictor cannot run.
    fn predict(&self, frame: &FeatureFrame) -> Result<ModalityScore, PredictorError>;
}

/// The closed set of built-in predictors plus an extension point
#[derive(Clone)]
pub enum Predictor {
    Temporal(TemporalPredictor),
    Spatial(SpatialPredictor),
    TabularClassifier(TabularClassifier),
    TabularRegressor(TabularRegressor),
    External(Arc<dyn ModalityPredictor>),
}

impl Predictor {
    /// One built-in predictor per modality, in canonical order
    pub fn default_set(config: &ModelConfig) -> Vec<Predictor> {
        vec![
            Predictor::Temporal(TemporalPredictor::new(&config.temporal)),
            Predictor::Spatial(SpatialPredictor::new()),
            Predictor::TabularClassifier(TabularClassifier::new()),
            Predictor::TabularRegressor(TabularRegressor::new()),
        ]
    }

    fn inner(&self) -> &dyn ModalityPredictor {
        match self {
            Predictor::Temporal(p) => p,
            Predictor::Spatial(p) => p,
            Predictor::TabularClassifier(p) => p,
            Predictor::TabularRegressor(p) => p,
            Predictor::External(p) => p.as_ref(),
        }
    }
}

impl ModalityPredictor for Predictor {
    fn modality(&self) -> ModalityId {
        self.inner().modality()
    }

    fn required_features(&self) -> &[&'static str] {
        self.inner().required_features()
    }

    fn predict(&self, frame: &FeatureFrame) -> Result<ModalityScore, PredictorError> {
        self.inner().predict(frame)
    }
}

impl fmt::Debug for Predictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Predictor::External(_) => "External",
            _ => "BuiltIn",
        };
        write!(f, "Predictor::{}({})", kind, self.modality())
    }
}

/// Look up a required feature or report it missing
pub(crate) fn require<'a>(
    vector: &'a FeatureVector,
    name: &str,
    modality: ModalityId,
) -> Result<&'a FeatureValue, PredictorError> {
    vector.get(name).ok_or_else(|| PredictorError::FeatureMissing {
        modality,
        feature: name.to_string(),
    })
}

/// Check every required feature before scoring
pub(crate) fn require_all(
    vector: &FeatureVector,
    names: &[&'static str],
    modality: ModalityId,
) -> Result<(), PredictorError> {
    names
        .iter()
        .try_for_each(|name| require(vector, name, modality).map(|_| ()))
}

/// Noisy-OR combination: `1 - Π(1 - w·s)`
///
/// Each term is a (weight, stress) pair with both values in [0, 1].
pub(crate) fn noisy_or(terms: impl IntoIterator<Item = (f64, f64)>) -> f64 {
    let survive: f64 = terms
        .into_iter()
        .map(|(w, s)| 1.0 - (w * s).clamp(0.0, 1.0))
        .product();
    (1.0 - survive).clamp(0.0, 1.0)
}
