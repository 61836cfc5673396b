//! Tier 3: Risk classification
//!
//! Pure, total mapping from fused probability to risk level. Each
//! threshold is the inclusive lower bound of its level:
//!
//! ```text
//! p >= critical          -> Critical (evacuation)
//! high <= p < critical   -> High     (urgent)
//! medium <= p < high     -> Medium   (caution)
//! p < medium             -> Low      (monitoring)
//! ```

use crate::config::RiskThresholds;
use crate::types::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskClassifier {
    medium: f64,
    high: f64,
    critical: f64,
}

impl RiskClassifier {
    pub fn new(thresholds: &RiskThresholds) -> Self {
        Self {
            medium: thresholds.medium,
            high: thresholds.high,
            critical: thresholds.critical,
        }
    }

    /// Classify a fused probability
    ///
    /// A non-finite probability is treated as the worst case.
    pub fn classify(&self, probability: f64) -> RiskLevel {
        if !probability.is_finite() || probability >= self.critical {
            RiskLevel::Critical
        } else if probability >= self.high {
            RiskLevel::High
        } else if probability >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionUrgency;

    #[test]
    fn test_boundaries_inclusive_on_lower_bound() {
        let c = RiskClassifier::new(&RiskThresholds::default());
        let table = [
            (0.0, RiskLevel::Low),
            (0.39999, RiskLevel::Low),
            (0.4, RiskLevel::Medium),
            (0.59999, RiskLevel::Medium),
            (0.6, RiskLevel::High),
            (0.79999, RiskLevel::High),
            (0.8, RiskLevel::Critical),
            (1.0, RiskLevel::Critical),
        ];
        for (p, expected) in table {
            assert_eq!(c.classify(p), expected, "p = {}", p);
        }
    }

    #[test]
    fn test_levels_map_to_actions() {
        let c = RiskClassifier::new(&RiskThresholds::default());
        assert_eq!(c.classify(0.1).action(), ActionUrgency::Monitoring);
        assert_eq!(c.classify(0.95).action(), ActionUrgency::Evacuation);
    }

    #[test]
    fn test_non_finite_is_critical() {
        let c = RiskClassifier::new(&RiskThresholds::default());
        assert_eq!(c.classify(f64::NAN), RiskLevel::Critical);
    }

    #[test]
    fn test_monotonic() {
        let c = RiskClassifier::new(&RiskThresholds::default());
        let mut previous = RiskLevel::Low;
        for i in 0..=1000 {
            let level = c.classify(i as f64 / 1000.0);
            assert!(level >= previous);
            previous = level;
        }
    }
}
