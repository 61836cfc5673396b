//! Versioned min-max scaler
//!
//! Maps raw feature values onto [0, 1] using the configured ranges, then
//! derives each feature's stress: progress from its "safe" baseline toward
//! its critical reference point. Out-of-range raw values are clamped, so no
//! scaled value ever leaves [0, 1].

use super::extraction::{ExtractedFeatures, RawFeatures};
use super::layout::{self, names::SPATIAL_ADJUSTMENT, LAYOUT_VERSION};
use super::{FeatureFrame, FeatureSubset, FeatureValue, FeatureVector};
use crate::config::{ScaleRange, ScalerConfig};
use crate::error::FeatureError;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Scaler {
    version: String,
    ranges: BTreeMap<&'static str, ScaleRange>,
}

impl Scaler {
    /// Resolve a range for every layout feature
    ///
    /// # Errors
    /// `FeatureError::Configuration` when the scaler version does not match
    /// the feature layout or a range is empty or non-finite.
    pub fn new(config: &ScalerConfig) -> Result<Self, FeatureError> {
        if config.version != LAYOUT_VERSION {
            return Err(FeatureError::Configuration(format!(
                "scaler version '{}' does not match feature layout '{}'",
                config.version, LAYOUT_VERSION
            )));
        }

        let mut ranges = BTreeMap::new();
        for def in layout::FEATURES {
            let range = config.range(def.name).ok_or_else(|| {
                FeatureError::Configuration(format!("no scale range for '{}'", def.name))
            })?;
            if !(range.min.is_finite() && range.max.is_finite() && range.min < range.max) {
                return Err(FeatureError::Configuration(format!(
                    "invalid scale range for '{}': [{}, {}]",
                    def.name, range.min, range.max
                )));
            }
            ranges.insert(def.name, range);
        }

        Ok(Self {
            version: config.version.clone(),
            ranges,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Scale one raw value into [0, 1]
    pub fn scale(&self, name: &str, raw: f64) -> Result<f64, FeatureError> {
        let range = self
            .ranges
            .get(name)
            .ok_or_else(|| FeatureError::Configuration(format!("unknown feature '{}'", name)))?;
        Ok(unit((raw - range.min) / (range.max - range.min)))
    }

    /// Scale one raw value and derive its baseline and stress
    pub fn value(&self, name: &str, raw: f64, imputed: bool) -> Result<FeatureValue, FeatureError> {
        let def = layout::feature(name)
            .ok_or_else(|| FeatureError::Configuration(format!("unknown feature '{}'", name)))?;
        let scaled = self.scale(name, raw)?;
        let baseline = self.scale(name, def.baseline)?;
        let critical = self.scale(name, def.critical)?;
        let span = critical - baseline;
        let stress = if span.abs() <= f64::EPSILON {
            0.0
        } else {
            unit((scaled - baseline) / span)
        };

        Ok(FeatureValue {
            raw,
            scaled,
            baseline,
            stress,
            imputed,
        })
    }

    /// Build the vector for one subset
    ///
    /// A layout feature absent from `features`, or carrying a non-finite
    /// value, takes its layout default and is flagged imputed.
    pub fn vector(&self, subset: FeatureSubset, features: &RawFeatures) -> Result<FeatureVector, FeatureError> {
        let mut values = BTreeMap::new();
        for &name in layout::subset_features(subset) {
            let (raw, imputed) = match features.get(name).filter(|v| v.is_finite()) {
                Some(v) => (v, features.is_imputed(name)),
                None => {
                    let def = layout::feature(name).ok_or_else(|| {
                        FeatureError::Configuration(format!("unknown feature '{}'", name))
                    })?;
                    debug!(feature = name, default = def.default, "Feature absent; using layout default");
                    (def.default, true)
                }
            };
            values.insert(name.to_string(), self.value(name, raw, imputed)?);
        }
        Ok(FeatureVector::new(subset, self.version.clone(), values))
    }

    /// Scale all extracted features into predictor inputs
    ///
    /// Only the most recent `window_len` samples enter the temporal sequence.
    pub fn assemble(&self, features: &ExtractedFeatures, window_len: usize) -> Result<FeatureFrame, FeatureError> {
        let skip = features.samples.len().saturating_sub(window_len);
        let temporal = features.samples[skip..]
            .iter()
            .map(|sample| self.vector(FeatureSubset::Temporal, sample))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeatureFrame {
            temporal,
            snapshot: self.vector(FeatureSubset::Snapshot, &features.snapshot)?,
            spatial: self.vector(FeatureSubset::Spatial, &features.spatial)?,
        })
    }

    /// New frame whose snapshot carries the spatial adjustment
    ///
    /// The input frame is left untouched.
    pub fn fold_spatial_adjustment(&self, frame: &FeatureFrame, adjustment: f64) -> Result<FeatureFrame, FeatureError> {
        let value = self.value(SPATIAL_ADJUSTMENT, unit(adjustment), false)?;
        Ok(FeatureFrame {
            temporal: frame.temporal.clone(),
            snapshot: frame.snapshot.with_value(SPATIAL_ADJUSTMENT, value),
            spatial: frame.spatial.clone(),
        })
    }
}

fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::names::*;

    fn scaler() -> Scaler {
        Scaler::new(&ScalerConfig::default()).expect("default scaler")
    }

    #[test]
    fn test_version_mismatch_is_configuration_error() {
        let config = ScalerConfig {
            version: "rockfall-features-v0".into(),
            ..ScalerConfig::default()
        };
        assert!(matches!(Scaler::new(&config), Err(FeatureError::Configuration(_))));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let mut config = ScalerConfig::default();
        config.ranges.insert(PORE_PRESSURE.into(), ScaleRange { min: 50.0, max: 10.0 });
        assert!(matches!(Scaler::new(&config), Err(FeatureError::Configuration(_))));
    }

    #[test]
    fn test_scale_clamps_to_unit_interval() {
        let s = scaler();
        assert_eq!(s.scale(PORE_PRESSURE, -10.0).unwrap(), 0.0);
        assert_eq!(s.scale(PORE_PRESSURE, 250.0).unwrap(), 1.0);
        assert!((s.scale(PORE_PRESSURE, 55.0).unwrap() - 0.55).abs() < 1e-12);
        assert_eq!(s.scale(PORE_PRESSURE, f64::NAN).unwrap(), 0.0);
    }

    #[test]
    fn test_range_override_applies() {
        let mut config = ScalerConfig::default();
        config.ranges.insert(PORE_PRESSURE.into(), ScaleRange { min: 0.0, max: 200.0 });
        let s = Scaler::new(&config).unwrap();
        assert!((s.scale(PORE_PRESSURE, 50.0).unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_stress_follows_reference_direction() {
        let s = scaler();
        // Baseline 30, critical 60
        let pore = s.value(PORE_PRESSURE_AVG, 45.0, false).unwrap();
        assert!((pore.stress - 0.5).abs() < 1e-9);
        // Inverted reference: stability falls from 1.0 toward 0.4
        let stable = s.value(STABILITY_INDEX, 1.0, false).unwrap();
        assert_eq!(stable.stress, 0.0);
        let unstable = s.value(STABILITY_INDEX, 0.4, false).unwrap();
        assert!((unstable.stress - 1.0).abs() < 1e-9);
        let below_baseline = s.value(PORE_PRESSURE_AVG, 10.0, false).unwrap();
        assert_eq!(below_baseline.stress, 0.0);
        assert!(below_baseline.deviation() < 0.0);
    }

    #[test]
    fn test_vector_fills_absent_features() {
        let s = scaler();
        let mut raw = RawFeatures::default();
        raw.set(SLOPE_ANGLE, 70.0, false);
        let v = s.vector(FeatureSubset::Spatial, &raw).unwrap();
        assert_eq!(v.len(), layout::SPATIAL_FEATURES.len());
        assert!(!v.is_imputed(SLOPE_ANGLE));
        assert!(v.is_imputed(CRACK_DENSITY));
        assert_eq!(v.raw(BENCH_HEIGHT), Some(10.0));
        assert_eq!(v.scaler_version, LAYOUT_VERSION);
        for (_, value) in v.iter() {
            assert!((0.0..=1.0).contains(&value.scaled));
            assert!((0.0..=1.0).contains(&value.stress));
        }
    }

    #[test]
    fn test_assemble_keeps_most_recent_samples() {
        let s = scaler();
        let samples: Vec<RawFeatures> = (0..10)
            .map(|i| {
                let mut f = RawFeatures::default();
                f.set(PORE_PRESSURE, 30.0 + i as f64, false);
                f
            })
            .collect();
        let extracted = ExtractedFeatures {
            samples,
            snapshot: RawFeatures::default(),
            spatial: RawFeatures::default(),
        };
        let frame = s.assemble(&extracted, 4).unwrap();
        assert_eq!(frame.temporal.len(), 4);
        assert_eq!(frame.temporal[0].raw(PORE_PRESSURE), Some(36.0));
        assert_eq!(frame.temporal[3].raw(PORE_PRESSURE), Some(39.0));
        assert!(!frame.has_imagery());
    }

    #[test]
    fn test_fold_spatial_adjustment_returns_new_frame() {
        let s = scaler();
        let extracted = ExtractedFeatures {
            samples: vec![],
            snapshot: RawFeatures::default(),
            spatial: RawFeatures::default(),
        };
        let frame = s.assemble(&extracted, 96).unwrap();
        let folded = s.fold_spatial_adjustment(&frame, 0.8).unwrap();
        assert_eq!(frame.snapshot.raw(SPATIAL_ADJUSTMENT), Some(0.5));
        assert!(frame.snapshot.is_imputed(SPATIAL_ADJUSTMENT));
        assert_eq!(folded.snapshot.raw(SPATIAL_ADJUSTMENT), Some(0.8));
        assert!(!folded.snapshot.is_imputed(SPATIAL_ADJUSTMENT));
    }
}
