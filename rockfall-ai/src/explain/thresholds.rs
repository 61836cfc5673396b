//! Graded safety limits per monitored feature
//!
//! Only data-backed snapshot and spatial features are graded. An imputed
//! default says nothing about the slope, so it gets no status at all.

use crate::config::GradedThreshold;
use crate::features::FeatureFrame;
use crate::types::ThresholdStatus;
use std::collections::BTreeMap;

pub fn analyze(frame: &FeatureFrame, limits: &[GradedThreshold]) -> BTreeMap<String, ThresholdStatus> {
    let mut statuses: BTreeMap<String, ThresholdStatus> = BTreeMap::new();
    for limit in limits {
        let value = match frame
            .snapshot
            .get(&limit.feature)
            .or_else(|| frame.spatial.get(&limit.feature))
        {
            Some(v) if !v.imputed => v,
            _ => continue,
        };

        // A feature listed twice keeps its worst grade
        let status = limit.grade(value.raw);
        statuses
            .entry(limit.feature.clone())
            .and_modify(|s| *s = (*s).max(status))
            .or_insert(status);
    }
    statuses
}

/// True when any of `features` reached at least `floor`
pub fn any_at_least(statuses: &BTreeMap<String, ThresholdStatus>, features: &[&str], floor: ThresholdStatus) -> bool {
    features
        .iter()
        .filter_map(|f| statuses.get(*f))
        .any(|s| *s >= floor)
}
