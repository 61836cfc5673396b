//! Actionable insights
//!
//! Each insight pairs an observation with an action and is tagged with a
//! priority and a category. Insights come from the risk level and from the
//! graded limits and channel trends computed alongside. Output is ordered
//! most urgent first; ties keep the order below.

use super::thresholds::any_at_least;
use super::trends;
use crate::features::names::*;
use crate::types::{
    ActionableInsight, ChannelTrend, InsightCategory, InsightPriority, RiskLevel, ThresholdStatus,
};
use std::collections::BTreeMap;

const VIBRATION_FEATURES: [&str; 2] = [ACCELERATION_MAX, SEISMIC_MAGNITUDE_MAX];
const WEATHER_FEATURES: [&str; 2] = [WEATHER_SEVERITY_INDEX, RAINFALL_TOTAL];
const STABILITY_FEATURES: [&str; 4] = [STABILITY_INDEX, DISPLACEMENT_RATE, CRACK_DENSITY, SLOPE_ANGLE];
const PORE_PRESSURE_FEATURES: [&str; 2] = [PORE_PRESSURE_AVG, PORE_PRESSURE_MAX];

fn insight(priority: InsightPriority, category: InsightCategory, insight: &str, action: &str) -> ActionableInsight {
    ActionableInsight {
        priority,
        category,
        insight: insight.to_string(),
        action: action.to_string(),
    }
}

pub fn actionable_insights(
    level: RiskLevel,
    statuses: &BTreeMap<String, ThresholdStatus>,
    channel_trends: &[ChannelTrend],
) -> Vec<ActionableInsight> {
    let exceeded = |features: &[&str]| any_at_least(statuses, features, ThresholdStatus::HighExceeded);
    let mut insights = Vec::new();

    if level >= RiskLevel::High {
        insights.push(insight(
            InsightPriority::Critical,
            InsightCategory::ImmediateAction,
            "Immediate safety measures required - restrict access to danger zones",
            "Implement emergency protocols and evacuate personnel if necessary",
        ));
    }
    if exceeded(&PORE_PRESSURE_FEATURES) {
        insights.push(insight(
            InsightPriority::High,
            InsightCategory::Hydrogeological,
            "Elevated pore pressure is reducing effective stress in the slope",
            "Verify piezometer readings and assess drainage capacity",
        ));
    }
    if exceeded(&VIBRATION_FEATURES) {
        insights.push(insight(
            InsightPriority::High,
            InsightCategory::Monitoring,
            "Excessive ground vibration detected - potential blasting or geological source",
            "Investigate vibration source and consider increasing monitoring frequency",
        ));
    }
    if exceeded(&STABILITY_FEATURES) {
        insights.push(insight(
            InsightPriority::High,
            InsightCategory::Geological,
            "Slope stability concerns detected through displacement, crack or geometry measurements",
            "Consider geotechnical assessment and additional stabilization measures",
        ));
    }
    if exceeded(&WEATHER_FEATURES) {
        insights.push(insight(
            InsightPriority::Medium,
            InsightCategory::Environmental,
            "Adverse weather conditions increasing rockfall risk",
            "Monitor weather forecasts and consider operational adjustments",
        ));
    }

    let rising = trends::rising(channel_trends);
    if !rising.is_empty() {
        insights.push(insight(
            InsightPriority::Medium,
            InsightCategory::Monitoring,
            &format!("Rising trend over the window: {}", rising.join(", ")),
            "Shorten the reporting interval for the rising channels",
        ));
    }

    insights.sort_by_key(|i| i.priority);
    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrendDirection;

    fn statuses(entries: &[(&str, ThresholdStatus)]) -> BTreeMap<String, ThresholdStatus> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn rising(feature: &str) -> ChannelTrend {
        ChannelTrend {
            feature: feature.to_string(),
            direction: TrendDirection::Rising,
            change: 0.2,
            samples: 24,
        }
    }

    #[test]
    fn test_calm_site_has_no_insights() {
        let s = statuses(&[
            (PORE_PRESSURE_AVG, ThresholdStatus::WithinSafeLimits),
            (ACCELERATION_MAX, ThresholdStatus::MediumExceeded),
        ]);
        assert!(actionable_insights(RiskLevel::Low, &s, &[]).is_empty());
    }

    #[test]
    fn test_high_risk_leads_with_immediate_action() {
        let s = statuses(&[(PORE_PRESSURE_AVG, ThresholdStatus::HighExceeded)]);
        let insights = actionable_insights(RiskLevel::High, &s, &[]);

        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].priority, InsightPriority::Critical);
        assert_eq!(insights[0].category, InsightCategory::ImmediateAction);
        assert_eq!(insights[1].category, InsightCategory::Hydrogeological);
        assert!(insights[1].action.contains("drainage"));
    }

    #[test]
    fn test_insights_are_ordered_by_priority() {
        let s = statuses(&[
            (WEATHER_SEVERITY_INDEX, ThresholdStatus::CriticalExceeded),
            (SEISMIC_MAGNITUDE_MAX, ThresholdStatus::HighExceeded),
            (CRACK_DENSITY, ThresholdStatus::HighExceeded),
        ]);
        let insights = actionable_insights(RiskLevel::Medium, &s, &[rising(PORE_PRESSURE)]);

        let categories: Vec<InsightCategory> = insights.iter().map(|i| i.category).collect();
        assert_eq!(
            categories,
            vec![
                InsightCategory::Monitoring,
                InsightCategory::Geological,
                InsightCategory::Environmental,
                InsightCategory::Monitoring,
            ]
        );
        assert!(insights.windows(2).all(|w| w[0].priority <= w[1].priority));
        assert!(insights[3].insight.contains(PORE_PRESSURE));
    }

    #[test]
    fn test_insight_serializes_with_snake_case_tags() {
        let insights = actionable_insights(RiskLevel::Critical, &BTreeMap::new(), &[]);
        let json = serde_json::to_value(&insights[0]).unwrap();
        assert_eq!(json["priority"], "critical");
        assert_eq!(json["category"], "immediate_action");
    }
}
