//! Model configuration
//!
//! Fusion weights, risk thresholds, explainability rules and scaler
//! parameters are data, not code. `ModelConfig` is loaded once at startup,
//! validated, wrapped in `Arc` and threaded through every stage.
//!
//! Every section has compiled defaults, so an empty or missing TOML file
//! yields the canonical configuration.

use crate::features::layout::{self, SNAPSHOT_FEATURES, SPATIAL_FEATURES};
use crate::types::{ModalityId, SensorChannel, ThresholdStatus};
use rockfall_common::config::{ConfigResolver, ConfigSource, LoggingConfig};
use rockfall_common::events::StageName;
use rockfall_common::time::millis_to_duration;
use rockfall_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Application name used for config file discovery (`~/.config/rockfall/config.toml`)
pub const APP_NAME: &str = "rockfall";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Reported in every assessment
    pub model_version: String,
    pub scaler: ScalerConfig,
    pub channels: ChannelDefaults,
    pub fusion: FusionConfig,
    pub risk: RiskThresholds,
    pub explain: ExplainConfig,
    pub temporal: TemporalConfig,
    pub pipeline: StageTimeouts,
    pub logging: LoggingConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_version: "v2.1.3".to_string(),
            scaler: ScalerConfig::default(),
            channels: ChannelDefaults::default(),
            fusion: FusionConfig::default(),
            risk: RiskThresholds::default(),
            explain: ExplainConfig::default(),
            temporal: TemporalConfig::default(),
            pipeline: StageTimeouts::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ModelConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the config file (CLI, `ROCKFALL_CONFIG`, platform file, defaults) and load it
    pub fn load(cli_path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        ConfigResolver::new(APP_NAME).load(cli_path)
    }

    /// Reject configurations that would make predictions meaningless
    ///
    /// Runs once at startup; a failure here is fatal and never surfaces
    /// per-request.
    pub fn validate(&self) -> Result<()> {
        if self.model_version.trim().is_empty() {
            return Err(config_err("model_version must not be empty"));
        }

        // Scaler
        if self.scaler.version != layout::LAYOUT_VERSION {
            return Err(config_err(format!(
                "scaler version '{}' does not match feature layout version '{}'",
                self.scaler.version,
                layout::LAYOUT_VERSION
            )));
        }
        for name in self.scaler.ranges.keys() {
            if layout::feature(name).is_none() {
                return Err(config_err(format!("scaler range for unknown feature '{}'", name)));
            }
        }
        for def in layout::FEATURES {
            let range = self
                .scaler
                .range(def.name)
                .ok_or_else(|| config_err(format!("no scaler range for feature '{}'", def.name)))?;
            if !(range.min.is_finite() && range.max.is_finite()) || range.min >= range.max {
                return Err(config_err(format!(
                    "invalid scaler range for '{}': min {} must be below max {}",
                    def.name, range.min, range.max
                )));
            }
        }

        // Channels
        for channel in SensorChannel::ALL {
            if !self.channels.get(channel).is_finite() {
                return Err(config_err(format!("channel default for {} is not finite", channel)));
            }
        }

        // Fusion
        let weights = [
            self.fusion.temporal,
            self.fusion.tabular_classifier,
            self.fusion.tabular_regressor,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(config_err("fusion weights must be finite and non-negative"));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(config_err("fusion weights must not sum to zero"));
        }
        let penalty = self.fusion.missing_modality_penalty;
        if !(penalty > 0.0 && penalty <= 1.0) {
            return Err(config_err(format!(
                "missing_modality_penalty {} must be in (0, 1]",
                penalty
            )));
        }

        // Risk thresholds
        let r = &self.risk;
        if !(0.0 < r.medium && r.medium < r.high && r.high < r.critical && r.critical < 1.0) {
            return Err(config_err(format!(
                "risk thresholds must satisfy 0 < medium < high < critical < 1 (got {}, {}, {})",
                r.medium, r.high, r.critical
            )));
        }
        if r.horizon_hours == 0 {
            return Err(config_err("risk.horizon_hours must be at least 1"));
        }

        // Explainability
        if self.explain.top_factors == 0 || self.explain.max_recommendations == 0 {
            return Err(config_err("explain.top_factors and explain.max_recommendations must be at least 1"));
        }
        for rule in &self.explain.rules {
            let known = SNAPSHOT_FEATURES.contains(&rule.feature.as_str())
                || SPATIAL_FEATURES.contains(&rule.feature.as_str());
            if !known {
                return Err(config_err(format!("explain rule names unknown feature '{}'", rule.feature)));
            }
            if !rule.threshold.is_finite() {
                return Err(config_err(format!("explain rule for '{}' has a non-finite threshold", rule.feature)));
            }
            if rule.recommendation.trim().is_empty() {
                return Err(config_err(format!("explain rule for '{}' has no recommendation", rule.feature)));
            }
        }
        for limit in &self.explain.thresholds {
            let known = SNAPSHOT_FEATURES.contains(&limit.feature.as_str())
                || SPATIAL_FEATURES.contains(&limit.feature.as_str());
            if !known {
                return Err(config_err(format!("explain threshold names unknown feature '{}'", limit.feature)));
            }
            if !limit.is_ordered() {
                return Err(config_err(format!(
                    "explain thresholds for '{}' must be finite and strictly ordered medium, high, critical",
                    limit.feature
                )));
            }
        }

        // Temporal
        let window_len = self.temporal.window_len;
        if window_len == 0 || window_len > MAX_WINDOW_LEN {
            return Err(config_err(format!(
                "temporal.window_len {} must be between 1 and {}",
                window_len, MAX_WINDOW_LEN
            )));
        }
        let decay = self.temporal.recency_decay;
        if !(decay > 0.0 && decay <= 1.0) {
            return Err(config_err(format!("temporal.recency_decay {} must be in (0, 1]", decay)));
        }

        // Pipeline
        for stage in StageName::ALL {
            if self.pipeline.millis(stage) == 0 {
                return Err(config_err(format!("timeout for stage {} must be positive", stage)));
            }
        }

        Ok(())
    }
}

fn config_err(msg: impl Into<String>) -> Error {
    Error::Config(msg.into())
}

// ============================================================================
// Sections
// ============================================================================

/// Inclusive min-max scaling range in raw units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleRange {
    pub min: f64,
    pub max: f64,
}

/// `[scaler]`: versioned scaling parameters
///
/// `ranges` holds overrides; features without an override use the layout's
/// default range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerConfig {
    pub version: String,
    pub ranges: BTreeMap<String, ScaleRange>,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            version: layout::LAYOUT_VERSION.to_string(),
            ranges: BTreeMap::new(),
        }
    }
}

impl ScalerConfig {
    /// Effective range for `name`
    pub fn range(&self, name: &str) -> Option<ScaleRange> {
        self.ranges.get(name).copied().or_else(|| {
            layout::feature(name).map(|def| ScaleRange {
                min: def.min,
                max: def.max,
            })
        })
    }
}

/// `[channels]`: imputation defaults used when a channel has no data in the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelDefaults {
    pub pore_pressure: f64,
    pub displacement: f64,
    pub acceleration: f64,
    pub rainfall: f64,
    pub temperature: f64,
    pub seismic_activity: f64,
}

impl Default for ChannelDefaults {
    fn default() -> Self {
        Self {
            pore_pressure: 30.0,
            displacement: 0.0,
            acceleration: 0.0,
            rainfall: 0.0,
            temperature: 20.0,
            seismic_activity: 0.0,
        }
    }
}

impl ChannelDefaults {
    pub fn get(&self, channel: SensorChannel) -> f64 {
        match channel {
            SensorChannel::PorePressure => self.pore_pressure,
            SensorChannel::Displacement => self.displacement,
            SensorChannel::Acceleration => self.acceleration,
            SensorChannel::Rainfall => self.rainfall,
            SensorChannel::Temperature => self.temperature,
            SensorChannel::SeismicActivity => self.seismic_activity,
        }
    }
}

/// `[fusion]`: per-modality weights and the missing-modality penalty
///
/// The spatial modality has no probability weight: its output is folded
/// into the snapshot vector before tabular scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub temporal: f64,
    pub tabular_classifier: f64,
    pub tabular_regressor: f64,
    /// Confidence multiplier applied once per missing modality
    pub missing_modality_penalty: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            temporal: 0.4,
            tabular_classifier: 0.3,
            tabular_regressor: 0.3,
            missing_modality_penalty: 0.9,
        }
    }
}

impl FusionConfig {
    pub fn weight(&self, modality: ModalityId) -> f64 {
        match modality {
            ModalityId::Temporal => self.temporal,
            ModalityId::TabularClassifier => self.tabular_classifier,
            ModalityId::TabularRegressor => self.tabular_regressor,
            ModalityId::Spatial => 0.0,
        }
    }
}

/// `[risk]`: lower bounds (inclusive) of each risk level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
    /// Projection horizon for the short-term outlook
    pub horizon_hours: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 0.4,
            high: 0.6,
            critical: 0.8,
            horizon_hours: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    #[default]
    Above,
    Below,
}

/// One domain threshold rule: a breach maps to a fixed recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRule {
    /// Snapshot or spatial feature name
    pub feature: String,
    #[serde(default)]
    pub comparison: Comparison,
    /// Threshold in raw units
    pub threshold: f64,
    pub recommendation: String,
}

impl DomainRule {
    pub fn new(feature: &str, threshold: f64, recommendation: &str) -> Self {
        Self {
            feature: feature.to_string(),
            comparison: Comparison::Above,
            threshold,
            recommendation: recommendation.to_string(),
        }
    }

    pub fn is_breached(&self, raw: f64) -> bool {
        match self.comparison {
            Comparison::Above => raw > self.threshold,
            Comparison::Below => raw < self.threshold,
        }
    }
}

/// Graded safety limits for one monitored feature, in raw units
///
/// With `comparison = "below"` the limits descend (lower is worse).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedThreshold {
    pub feature: String,
    #[serde(default)]
    pub comparison: Comparison,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl GradedThreshold {
    pub fn above(feature: &str, medium: f64, high: f64, critical: f64) -> Self {
        Self {
            feature: feature.to_string(),
            comparison: Comparison::Above,
            medium,
            high,
            critical,
        }
    }

    pub fn below(feature: &str, medium: f64, high: f64, critical: f64) -> Self {
        Self {
            comparison: Comparison::Below,
            ..Self::above(feature, medium, high, critical)
        }
    }

    /// Status of `raw`; each limit is inclusive
    pub fn grade(&self, raw: f64) -> ThresholdStatus {
        let reached = |limit: f64| match self.comparison {
            Comparison::Above => raw >= limit,
            Comparison::Below => raw <= limit,
        };
        if reached(self.critical) {
            ThresholdStatus::CriticalExceeded
        } else if reached(self.high) {
            ThresholdStatus::HighExceeded
        } else if reached(self.medium) {
            ThresholdStatus::MediumExceeded
        } else {
            ThresholdStatus::WithinSafeLimits
        }
    }

    fn is_ordered(&self) -> bool {
        let limits = [self.medium, self.high, self.critical];
        if limits.iter().any(|l| !l.is_finite()) {
            return false;
        }
        match self.comparison {
            Comparison::Above => self.medium < self.high && self.high < self.critical,
            Comparison::Below => self.medium > self.high && self.high > self.critical,
        }
    }
}

/// `[explain]`: factor ranking and recommendation limits, domain rules and
/// graded safety limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    pub top_factors: usize,
    pub max_recommendations: usize,
    pub rules: Vec<DomainRule>,
    pub thresholds: Vec<GradedThreshold>,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        use crate::features::names::*;
        Self {
            top_factors: 8,
            max_recommendations: 6,
            rules: vec![
                DomainRule::new(SLOPE_ANGLE, 65.0, "Consider slope angle reduction through controlled blasting"),
                DomainRule::new(CRACK_DENSITY, 2.0, "Install precision crack monitoring with automated alerts"),
                DomainRule::new(PORE_PRESSURE_AVG, 45.0, "Implement drainage improvements to reduce pore pressure"),
                DomainRule::new(RAINFALL_TOTAL, 50.0, "Enhance surface drainage and water management systems"),
                DomainRule::new(SEISMIC_EVENT_COUNT, 3.0, "Correlate seismic data with slope stability measurements"),
                DomainRule::new(ACCELERATION_MAX, 0.1, "Install vibration dampening systems"),
                DomainRule::new(
                    WEATHER_SEVERITY_INDEX,
                    0.6,
                    "Monitor weather forecasts and postpone operations if conditions worsen",
                ),
            ],
            thresholds: vec![
                GradedThreshold::above(PORE_PRESSURE_AVG, 40.0, 45.0, 55.0),
                GradedThreshold::above(PORE_PRESSURE_MAX, 45.0, 55.0, 65.0),
                GradedThreshold::above(DISPLACEMENT_RATE, 0.5, 1.0, 2.0),
                GradedThreshold::above(ACCELERATION_MAX, 0.05, 0.1, 0.2),
                GradedThreshold::above(RAINFALL_TOTAL, 25.0, 50.0, 80.0),
                GradedThreshold::above(SEISMIC_MAGNITUDE_MAX, 2.0, 3.0, 4.0),
                GradedThreshold::above(WEATHER_SEVERITY_INDEX, 0.4, 0.6, 0.8),
                GradedThreshold::below(STABILITY_INDEX, 0.7, 0.55, 0.4),
                GradedThreshold::above(SLOPE_ANGLE, 55.0, 65.0, 75.0),
                GradedThreshold::above(CRACK_DENSITY, 1.0, 2.0, 3.0),
            ],
        }
    }
}

/// Upper bound on `temporal.window_len`: one week of minute samples
pub const MAX_WINDOW_LEN: usize = 10_080;

/// `[temporal]`: sequence window for the temporal predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    /// Number of most recent samples considered
    pub window_len: usize,
    /// Per-sample weight decay going back in time
    pub recency_decay: f64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            window_len: 96,
            recency_decay: 0.97,
        }
    }
}

/// `[pipeline]`: per-stage timeouts in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTimeouts {
    pub preprocessing_ms: u64,
    pub geometry_extraction_ms: u64,
    pub feature_extraction_ms: u64,
    pub sensor_validation_ms: u64,
    pub fusion_input_assembly_ms: u64,
    pub ml_prediction_ms: u64,
    pub finalization_ms: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            preprocessing_ms: 5_000,
            geometry_extraction_ms: 30_000,
            feature_extraction_ms: 10_000,
            sensor_validation_ms: 5_000,
            fusion_input_assembly_ms: 5_000,
            ml_prediction_ms: 20_000,
            finalization_ms: 5_000,
        }
    }
}

impl StageTimeouts {
    pub fn millis(&self, stage: StageName) -> u64 {
        match stage {
            StageName::Preprocessing => self.preprocessing_ms,
            StageName::GeometryExtraction => self.geometry_extraction_ms,
            StageName::FeatureExtraction => self.feature_extraction_ms,
            StageName::SensorValidation => self.sensor_validation_ms,
            StageName::FusionInputAssembly => self.fusion_input_assembly_ms,
            StageName::MlPrediction => self.ml_prediction_ms,
            StageName::Finalization => self.finalization_ms,
        }
    }

    pub fn for_stage(&self, stage: StageName) -> Duration {
        millis_to_duration(self.millis(stage))
    }
}
