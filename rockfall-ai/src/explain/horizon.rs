//! Short-term outlook
//!
//! Projects the fused probability forward using the scaled pore pressure
//! trend, where 0.5 is a flat trend:
//!
//! ```text
//! projected = clamp(p + (trend - 0.5) · hours / 6)
//! ```

use crate::classifier::RiskClassifier;
use crate::features::names::PORE_PRESSURE_TREND;
use crate::features::FeatureFrame;
use crate::types::TimeHorizon;

use super::trends;

const NEUTRAL_TREND: f64 = 0.5;
const REFERENCE_HOURS: f64 = 6.0;

pub fn project(
    frame: &FeatureFrame,
    probability: f64,
    hours: u32,
    classifier: &RiskClassifier,
) -> TimeHorizon {
    let trend = frame
        .snapshot
        .get(PORE_PRESSURE_TREND)
        .filter(|v| !v.imputed)
        .map(|v| v.scaled)
        .unwrap_or(NEUTRAL_TREND);

    let delta = (trend - NEUTRAL_TREND) * f64::from(hours) / REFERENCE_HOURS;
    let projected_probability = (probability + delta).clamp(0.0, 1.0);

    TimeHorizon {
        hours,
        projected_probability,
        projected_level: classifier.classify(projected_probability),
        trend: trends::direction(delta),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RiskThresholds, ScalerConfig};
    use crate::features::{FeatureSubset, RawFeatures, Scaler};
    use crate::types::{RiskLevel, TrendDirection};

    fn frame(trend: Option<f64>) -> FeatureFrame {
        let scaler = Scaler::new(&ScalerConfig::default()).unwrap();
        let mut snapshot = RawFeatures::default();
        if let Some(t) = trend {
            snapshot.set(PORE_PRESSURE_TREND, t, false);
        }
        FeatureFrame {
            temporal: vec![],
            snapshot: scaler.vector(FeatureSubset::Snapshot, &snapshot).unwrap(),
            spatial: scaler.vector(FeatureSubset::Spatial, &RawFeatures::default()).unwrap(),
        }
    }

    fn classifier() -> RiskClassifier {
        RiskClassifier::new(&RiskThresholds::default())
    }

    #[test]
    fn test_rising_pressure_projects_higher() {
        // +2 kPa/h scales to 0.7
        let horizon = project(&frame(Some(2.0)), 0.55, 6, &classifier());
        assert!((horizon.projected_probability - 0.75).abs() < 1e-9);
        assert_eq!(horizon.projected_level, RiskLevel::High);
        assert_eq!(horizon.trend, TrendDirection::Rising);
        assert_eq!(horizon.hours, 6);
    }

    #[test]
    fn test_unknown_trend_is_stable() {
        let horizon = project(&frame(None), 0.3, 6, &classifier());
        assert_eq!(horizon.projected_probability, 0.3);
        assert_eq!(horizon.trend, TrendDirection::Stable);
    }

    #[test]
    fn test_falling_pressure_is_clamped() {
        let horizon = project(&frame(Some(-5.0)), 0.1, 12, &classifier());
        assert_eq!(horizon.projected_probability, 0.0);
        assert_eq!(horizon.trend, TrendDirection::Falling);
    }
}
