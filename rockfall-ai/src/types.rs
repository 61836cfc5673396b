//! Core data contracts for the rockfall risk pipeline
//!
//! Raw inputs (sensor readings, image feature batches) flow forward into
//! per-modality scores, a fused result and finally a `RiskAssessment`.
//! Every value here is created fresh per prediction request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Raw inputs
// ============================================================================

/// Numeric sensor channels understood by the feature layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorChannel {
    /// Piezometer reading (kPa)
    PorePressure,
    /// Cumulative extensometer/prism displacement (mm)
    Displacement,
    /// Peak ground acceleration (g)
    Acceleration,
    /// Rainfall since previous reading (mm)
    Rainfall,
    /// Air temperature (°C)
    Temperature,
    /// Local seismic magnitude
    SeismicActivity,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; 6] = [
        SensorChannel::PorePressure,
        SensorChannel::Displacement,
        SensorChannel::Acceleration,
        SensorChannel::Rainfall,
        SensorChannel::Temperature,
        SensorChannel::SeismicActivity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorChannel::PorePressure => "pore_pressure",
            SensorChannel::Displacement => "displacement",
            SensorChannel::Acceleration => "acceleration",
            SensorChannel::Rainfall => "rainfall",
            SensorChannel::Temperature => "temperature",
            SensorChannel::SeismicActivity => "seismic_activity",
        }
    }

    /// Parse a channel name as it appears in a reading's value map
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One time-stamped vector of named channel values from one device
///
/// Channels may be absent (or non-finite); they are imputed during
/// preprocessing. Unknown channel names are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl SensorReading {
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style helper for setting one channel value
    pub fn with(mut self, channel: SensorChannel, value: f64) -> Self {
        self.values.insert(channel.as_str().to_string(), value);
        self
    }

    /// Finite value for `channel`, if present
    pub fn value(&self, channel: SensorChannel) -> Option<f64> {
        self.values
            .get(channel.as_str())
            .copied()
            .filter(|v| v.is_finite())
    }
}

/// Planar displacement vector measured between two imagery epochs (metres)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplacementVector {
    pub dx: f64,
    pub dy: f64,
}

impl DisplacementVector {
    pub fn magnitude(&self) -> f64 {
        self.dx.hypot(self.dy)
    }
}

/// Numeric output of upstream drone-imagery analysis for one batch
///
/// Produced once per imagery batch. Any geometric or structural field may
/// be absent when the upstream analysis could not derive it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFeatureSet {
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    // Geometric
    #[serde(default)]
    pub slope_angle: Option<f64>,
    #[serde(default)]
    pub bench_height: Option<f64>,
    #[serde(default)]
    pub bench_width: Option<f64>,
    #[serde(default)]
    pub surface_roughness: Option<f64>,
    // Structural
    #[serde(default)]
    pub crack_count: Option<u32>,
    #[serde(default)]
    pub crack_density: Option<f64>,
    #[serde(default)]
    pub max_crack_width: Option<f64>,
    #[serde(default)]
    pub displacement_vectors: Vec<DisplacementVector>,
    /// Upstream processing confidence in [0, 1]
    pub processing_confidence: f64,
}

/// Inclusive time window for one prediction request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Input to one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub site_id: String,
    pub window: TimeWindow,
    #[serde(default)]
    pub sensor_batches: Vec<Vec<SensorReading>>,
    #[serde(default)]
    pub image_batches: Vec<ImageFeatureSet>,
}

impl PredictionRequest {
    pub fn reading_count(&self) -> usize {
        self.sensor_batches.iter().map(Vec::len).sum()
    }
}

// ============================================================================
// Predictor and fusion outputs
// ============================================================================

/// Predictor modality identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalityId {
    Temporal,
    Spatial,
    TabularClassifier,
    TabularRegressor,
}

impl ModalityId {
    /// Canonical order; fusion always iterates in this order
    pub const ALL: [ModalityId; 4] = [
        ModalityId::Temporal,
        ModalityId::Spatial,
        ModalityId::TabularClassifier,
        ModalityId::TabularRegressor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModalityId::Temporal => "temporal",
            ModalityId::Spatial => "spatial",
            ModalityId::TabularClassifier => "tabular_classifier",
            ModalityId::TabularRegressor => "tabular_regressor",
        }
    }
}

impl fmt::Display for ModalityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one predictor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModalityScore {
    pub modality_id: ModalityId,
    pub probability: f64,
    pub confidence: f64,
}

impl ModalityScore {
    /// Create a score with probability and confidence clamped to [0, 1]
    pub fn new(modality_id: ModalityId, probability: f64, confidence: f64) -> Self {
        Self {
            modality_id,
            probability: probability.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// "No contribution" score: neutral probability, zero confidence
    pub fn neutral(modality_id: ModalityId) -> Self {
        Self::new(modality_id, 0.5, 0.0)
    }

    /// True when the score carries no information
    pub fn is_void(&self) -> bool {
        self.confidence <= 0.0
    }
}

/// Single fused probability and confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub probability: f64,
    pub confidence: f64,
    /// Every score handed to fusion, in canonical modality order
    pub contributing_modalities: Vec<ModalityScore>,
    /// Weight each probability-bearing modality actually received
    pub effective_weights: BTreeMap<ModalityId, f64>,
    /// Modalities absent or void, which triggered the confidence penalty
    pub missing_modalities: Vec<ModalityId>,
}

impl FusedResult {
    pub fn score(&self, modality: ModalityId) -> Option<&ModalityScore> {
        self.contributing_modalities
            .iter()
            .find(|s| s.modality_id == modality)
    }
}

// ============================================================================
// External-facing assessment
// ============================================================================

/// Discrete risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// Ordinal index (low = 0 .. critical = 3)
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Recommended action urgency for this level
    pub fn action(&self) -> ActionUrgency {
        match self {
            RiskLevel::Low => ActionUrgency::Monitoring,
            RiskLevel::Medium => ActionUrgency::Caution,
            RiskLevel::High => ActionUrgency::Urgent,
            RiskLevel::Critical => ActionUrgency::Evacuation,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action urgency associated with a risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionUrgency {
    Monitoring,
    Caution,
    Urgent,
    Evacuation,
}

/// One ranked contributing factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub name: String,
    /// Normalized share of the total explained deviation (weights sum to 1)
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Stable,
    Falling,
}

/// Short-term projection of the fused probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeHorizon {
    pub hours: u32,
    pub projected_probability: f64,
    pub projected_level: RiskLevel,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAnalysis {
    pub level: ConfidenceLevel,
    /// 1 - variance of per-modality risk-level indices / 2, floored at 0
    pub model_agreement: f64,
    pub factors: Vec<String>,
}

/// Where a monitored feature stands against its graded safety limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdStatus {
    WithinSafeLimits,
    MediumExceeded,
    HighExceeded,
    CriticalExceeded,
}

impl ThresholdStatus {
    pub fn is_exceeded(self) -> bool {
        self != ThresholdStatus::WithinSafeLimits
    }
}

/// Direction of one channel feature over the temporal window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTrend {
    pub feature: String,
    pub direction: TrendDirection,
    /// Fitted change across the window, in scaled units
    pub change: f64,
    /// Observed samples the fit used
    pub samples: usize,
}

/// Ordered most urgent first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightPriority {
    Critical,
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    ImmediateAction,
    Monitoring,
    Environmental,
    Geological,
    Hydrogeological,
}

/// An observation paired with the action it calls for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionableInsight {
    pub priority: InsightPriority,
    pub category: InsightCategory,
    pub insight: String,
    pub action: String,
}

/// The external-facing artifact of one prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub run_id: Uuid,
    pub site_id: String,
    pub model_version: String,
    pub risk_probability: f64,
    pub risk_level: RiskLevel,
    pub action: ActionUrgency,
    pub confidence: f64,
    pub top_factors: Vec<ContributingFactor>,
    pub recommendations: Vec<String>,
    /// Features whose domain rule fired, in recommendation order
    pub breached_rules: Vec<String>,
    /// Graded status of every data-backed monitored feature
    pub threshold_status: BTreeMap<String, ThresholdStatus>,
    pub channel_trends: Vec<ChannelTrend>,
    pub insights: Vec<ActionableInsight>,
    pub time_horizon: TimeHorizon,
    pub summary: String,
    pub confidence_analysis: ConfidenceAnalysis,
    pub modality_scores: Vec<ModalityScore>,
    pub imputed_features: Vec<String>,
    pub generated_at: DateTime<Utc>,
}
