//! Recommendations and risk summary
//!
//! Recommendation order: the fixed directives of the risk level first
//! (critical always opens with evacuation), then domain-rule
//! recommendations. Rules whose feature ranks as a contributing factor
//! come first, in factor order; the rest follow in configured order.

use crate::config::{DomainRule, ExplainConfig};
use crate::features::FeatureFrame;
use crate::types::{ContributingFactor, RiskLevel};
use tracing::debug;

pub const EVACUATION_DIRECTIVE: &str = "IMMEDIATE EVACUATION of personnel from high-risk zones";

const CRITICAL_DIRECTIVES: [&str; 3] = [
    EVACUATION_DIRECTIVE,
    "Deploy emergency response teams",
    "Implement continuous real-time monitoring",
];

const HIGH_DIRECTIVES: [&str; 3] = [
    "Increase monitoring frequency to every 15 minutes",
    "Restrict access to identified risk areas",
    "Prepare evacuation procedures",
];

const MEDIUM_DIRECTIVES: [&str; 3] = [
    "Enhance monitoring to hourly intervals",
    "Review and update safety protocols",
    "Conduct detailed geological assessment",
];

/// Used when neither the level nor any rule produces a recommendation
pub const ROUTINE_MONITORING: [&str; 3] = [
    "Continue routine monitoring protocols",
    "Maintain current safety measures",
    "Schedule next detailed inspection within standard timeframe",
];

pub fn level_directives(level: RiskLevel) -> &'static [&'static str] {
    match level {
        RiskLevel::Critical => &CRITICAL_DIRECTIVES,
        RiskLevel::High => &HIGH_DIRECTIVES,
        RiskLevel::Medium => &MEDIUM_DIRECTIVES,
        RiskLevel::Low => &[],
    }
}

/// Rules breached by data-backed snapshot or spatial features
pub fn breached_rules<'a>(frame: &FeatureFrame, rules: &'a [DomainRule]) -> Vec<&'a DomainRule> {
    rules
        .iter()
        .filter(|rule| {
            let value = frame
                .snapshot
                .get(&rule.feature)
                .or_else(|| frame.spatial.get(&rule.feature));
            match value {
                Some(v) if !v.imputed => rule.is_breached(v.raw),
                _ => false,
            }
        })
        .collect()
}

/// Breached rules, those whose feature ranks as a contributing factor first
/// (in factor order), the rest in configured order
pub fn ranked_breaches<'a>(
    frame: &FeatureFrame,
    factors: &[ContributingFactor],
    rules: &'a [DomainRule],
) -> Vec<&'a DomainRule> {
    let mut breached = breached_rules(frame, rules);
    let rank = |rule: &DomainRule| {
        factors
            .iter()
            .position(|f| f.name == rule.feature)
            .unwrap_or(usize::MAX)
    };
    // Stable: unranked rules keep configured order
    breached.sort_by_key(|rule| rank(*rule));
    breached
}

pub fn recommend(
    frame: &FeatureFrame,
    factors: &[ContributingFactor],
    level: RiskLevel,
    config: &ExplainConfig,
) -> Vec<String> {
    let breached = ranked_breaches(frame, factors, &config.rules);
    recommendations_for(level, &breached, config.max_recommendations)
}

/// Level directives followed by the recommendations of `breached`, deduplicated
pub fn recommendations_for(level: RiskLevel, breached: &[&DomainRule], max: usize) -> Vec<String> {
    let mut recommendations: Vec<String> = Vec::new();
    let mut push = |text: &str| {
        if !recommendations.iter().any(|r| r == text) {
            recommendations.push(text.to_string());
        }
    };

    for directive in level_directives(level) {
        push(*directive);
    }
    for rule in breached {
        debug!(feature = %rule.feature, threshold = rule.threshold, "Domain rule breached");
        push(rule.recommendation.as_str());
    }

    if recommendations.is_empty() {
        recommendations = ROUTINE_MONITORING.iter().map(|s| s.to_string()).collect();
    }
    recommendations.truncate(max.max(1));
    recommendations
}

/// One-sentence summary of the assessment
pub fn summary(level: RiskLevel, probability: f64) -> String {
    let pct = probability * 100.0;
    match level {
        RiskLevel::Low => format!(
            "Low rockfall risk detected ({:.1}% probability). Current conditions are stable with minimal threat indicators.",
            pct
        ),
        RiskLevel::Medium => format!(
            "Medium rockfall risk identified ({:.1}% probability). Some concerning indicators detected - increased monitoring recommended.",
            pct
        ),
        RiskLevel::High => format!(
            "High rockfall risk warning ({:.1}% probability). Multiple risk factors present - immediate safety measures required.",
            pct
        ),
        RiskLevel::Critical => format!(
            "CRITICAL rockfall risk alert ({:.1}% probability). Imminent danger detected - IMMEDIATE EVACUATION recommended.",
            pct
        ),
    }
}
