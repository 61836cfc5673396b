//! Contributing factor ranking
//!
//! A factor's score is its absolute scaled deviation from the safe
//! baseline times the feature's relevance weight. Only data-backed snapshot
//! and spatial features are ranked: an imputed default says nothing about
//! this site.

use crate::features::{layout, FeatureFrame};
use crate::types::ContributingFactor;
use std::cmp::Ordering;

/// Top `limit` factors, highest score first, weights normalised to sum to 1
pub fn rank_factors(frame: &FeatureFrame, limit: usize) -> Vec<ContributingFactor> {
    let mut scored: Vec<(&str, f64)> = frame
        .snapshot
        .iter()
        .chain(frame.spatial.iter())
        .filter(|(_, value)| !value.imputed)
        .filter_map(|(name, value)| {
            let relevance = layout::feature(name).map(|def| def.relevance)?;
            let score = value.deviation().abs() * relevance;
            (score > 0.0).then_some((name, score))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    scored.truncate(limit);

    let total: f64 = scored.iter().map(|(_, s)| s).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    scored
        .into_iter()
        .map(|(name, score)| ContributingFactor {
            name: name.to_string(),
            weight: score / total,
        })
        .collect()
}
