//! Tier 1: Feature engineering
//!
//! Turns raw sensor readings and image feature batches into named, bounded
//! numeric features:
//! - `cleaning`: per-device ordering, IQR outlier capping, imputation
//! - `geometry`: confidence-weighted aggregation of image batches
//! - `extraction`: per-sample and snapshot features, composite indices
//! - `validation`: sensor data quality report
//! - `scaler`: versioned min-max scaling into `FeatureVector`s

pub mod cleaning;
pub mod composite;
pub mod extraction;
pub mod geometry;
pub mod layout;
pub mod scaler;
pub mod validation;

pub use cleaning::{preprocess, CleanSample, CleanedWindow, ChannelCleaning};
pub use extraction::{extract_features, ExtractedFeatures, RawFeatures};
pub use geometry::{aggregate_images, ImageAggregate};
pub use layout::{names, LAYOUT_VERSION};
pub use scaler::Scaler;
pub use validation::{validate_sensors, ChannelQuality, DataQuality, SensorValidationReport};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which predictor input a vector belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSubset {
    /// One sample of the temporal window
    Temporal,
    /// Tabular snapshot over the whole window
    Snapshot,
    /// Image-derived structural features
    Spatial,
}

/// One feature after scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureValue {
    /// Value in raw units
    pub raw: f64,
    /// Scaled value in [0, 1]
    pub scaled: f64,
    /// Scaled "safe" baseline
    pub baseline: f64,
    /// Progress from baseline toward the critical reference point, in [0, 1]
    pub stress: f64,
    /// True when the raw value is a documented default rather than data
    pub imputed: bool,
}

impl FeatureValue {
    /// Signed deviation of the scaled value from its baseline
    pub fn deviation(&self) -> f64 {
        self.scaled - self.baseline
    }
}

/// Named numeric features for one predictor input
///
/// Built only by the `Scaler`, which guarantees every layout feature of the
/// subset is present and every scaled value lies in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub subset: FeatureSubset,
    pub scaler_version: String,
    values: BTreeMap<String, FeatureValue>,
}

impl FeatureVector {
    pub(crate) fn new(
        subset: FeatureSubset,
        scaler_version: impl Into<String>,
        values: BTreeMap<String, FeatureValue>,
    ) -> Self {
        Self {
            subset,
            scaler_version: scaler_version.into(),
            values,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name)
    }

    /// Scaled value, if present
    pub fn scaled(&self, name: &str) -> Option<f64> {
        self.get(name).map(|v| v.scaled)
    }

    pub fn raw(&self, name: &str) -> Option<f64> {
        self.get(name).map(|v| v.raw)
    }

    pub fn is_imputed(&self, name: &str) -> bool {
        self.get(name).map(|v| v.imputed).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Names of imputed features, sorted
    pub fn imputed_features(&self) -> Vec<String> {
        self.values
            .iter()
            .filter(|(_, v)| v.imputed)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Fraction of features backed by data rather than defaults
    pub fn observed_fraction(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let observed = self.values.values().filter(|v| !v.imputed).count();
        observed as f64 / self.values.len() as f64
    }

    /// Copy of this vector with one feature replaced
    pub fn with_value(&self, name: &str, value: FeatureValue) -> Self {
        let mut values = self.values.clone();
        values.insert(name.to_string(), value);
        Self {
            subset: self.subset,
            scaler_version: self.scaler_version.clone(),
            values,
        }
    }

    /// Copy of this vector without `name` (used to exercise missing-feature paths)
    pub fn without(&self, name: &str) -> Self {
        let mut values = self.values.clone();
        values.remove(name);
        Self {
            subset: self.subset,
            scaler_version: self.scaler_version.clone(),
            values,
        }
    }
}

/// Every predictor input for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    /// Most recent samples, oldest first, at most `temporal.window_len`
    pub temporal: Vec<FeatureVector>,
    pub snapshot: FeatureVector,
    pub spatial: FeatureVector,
}

impl FeatureFrame {
    /// Names of imputed snapshot and spatial features, placeholder slots excluded
    pub fn imputed_features(&self) -> Vec<String> {
        self.snapshot
            .imputed_features()
            .into_iter()
            .chain(self.spatial.imputed_features())
            .filter(|name| !layout::is_placeholder(name))
            .collect()
    }

    /// True when at least one image batch contributed to the spatial vector
    pub fn has_imagery(&self) -> bool {
        self.spatial.iter().any(|(_, v)| !v.imputed)
    }
}
