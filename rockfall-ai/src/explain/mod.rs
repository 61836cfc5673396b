//! Tier 3: Explainability
//!
//! Explains an already-fused result. Nothing here recomputes or alters
//! the fused probability: every function takes the `FusedResult` by shared
//! reference and only reads it.

pub mod confidence;
pub mod horizon;
pub mod insights;
pub mod ranking;
pub mod rules;
pub mod thresholds;
pub mod trends;

pub use rules::{EVACUATION_DIRECTIVE, ROUTINE_MONITORING};

use crate::classifier::RiskClassifier;
use crate::config::ExplainConfig;
use crate::features::FeatureFrame;
use crate::types::{
    ActionableInsight, ChannelTrend, ConfidenceAnalysis, ContributingFactor, FusedResult, RiskLevel,
    ThresholdStatus, TimeHorizon,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Everything the explainability tier adds to an assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub top_factors: Vec<ContributingFactor>,
    pub recommendations: Vec<String>,
    pub breached_rules: Vec<String>,
    pub threshold_status: BTreeMap<String, ThresholdStatus>,
    pub channel_trends: Vec<ChannelTrend>,
    pub insights: Vec<ActionableInsight>,
    pub summary: String,
    pub confidence_analysis: ConfidenceAnalysis,
    pub time_horizon: TimeHorizon,
}

#[derive(Debug, Clone)]
pub struct Explainer {
    config: ExplainConfig,
    classifier: RiskClassifier,
    horizon_hours: u32,
}

impl Explainer {
    pub fn new(config: &ExplainConfig, classifier: RiskClassifier, horizon_hours: u32) -> Self {
        Self {
            config: config.clone(),
            classifier,
            horizon_hours,
        }
    }

    pub fn explain(&self, frame: &FeatureFrame, fused: &FusedResult, level: RiskLevel) -> Explanation {
        let top_factors = ranking::rank_factors(frame, self.config.top_factors);
        let breached = rules::ranked_breaches(frame, &top_factors, &self.config.rules);
        let recommendations = rules::recommendations_for(level, &breached, self.config.max_recommendations);
        let threshold_status = thresholds::analyze(frame, &self.config.thresholds);
        let channel_trends = trends::channel_trends(frame);
        let insights = insights::actionable_insights(level, &threshold_status, &channel_trends);
        let imputed = frame.imputed_features();
        let confidence_analysis = confidence::analyze(fused, &self.classifier, &imputed);
        let time_horizon = horizon::project(frame, fused.probability, self.horizon_hours, &self.classifier);

        debug!(
            factors = top_factors.len(),
            recommendations = recommendations.len(),
            breached = breached.len(),
            insights = insights.len(),
            agreement = confidence_analysis.model_agreement,
            "Explanation built"
        );

        Explanation {
            summary: rules::summary(level, fused.probability),
            breached_rules: breached.iter().map(|rule| rule.feature.clone()).collect(),
            top_factors,
            recommendations,
            threshold_status,
            channel_trends,
            insights,
            confidence_analysis,
            time_horizon,
        }
    }
}
