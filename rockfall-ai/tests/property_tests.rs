//! Invariant tests for the scaler, classifier and fusion engine

use rockfall_ai::config::{FusionConfig, RiskThresholds, ScalerConfig};
use rockfall_ai::features::layout::{FEATURES, SNAPSHOT_FEATURES};
use rockfall_ai::features::{FeatureSubset, RawFeatures, Scaler};
use rockfall_ai::types::{ModalityId, ModalityScore, RiskLevel};
use rockfall_ai::{FusionEngine, RiskClassifier};

const EXTREMES: [f64; 10] = [
    f64::NEG_INFINITY,
    -1e9,
    -1.0,
    0.0,
    0.25,
    1.0,
    42.0,
    1e9,
    f64::INFINITY,
    f64::NAN,
];

fn in_unit(v: f64) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

#[test]
fn test_scaled_values_are_bounded_for_every_feature() {
    let scaler = Scaler::new(&ScalerConfig::default()).expect("default scaler");
    for def in FEATURES {
        for raw in EXTREMES.iter().copied().chain([def.min, def.max, def.default]) {
            let value = scaler.value(def.name, raw, false).expect("known feature");
            assert!(in_unit(value.scaled), "{} raw {} scaled to {}", def.name, raw, value.scaled);
            assert!(in_unit(value.stress), "{} raw {} stress {}", def.name, raw, value.stress);
            assert!(in_unit(value.baseline), "{} baseline {}", def.name, value.baseline);
        }
    }
}

#[test]
fn test_snapshot_vector_is_bounded_and_complete() {
    let scaler = Scaler::new(&ScalerConfig::default()).unwrap();
    for raw in EXTREMES {
        let mut features = RawFeatures::default();
        for name in SNAPSHOT_FEATURES {
            features.set(name, raw, false);
        }
        let vector = scaler.vector(FeatureSubset::Snapshot, &features).unwrap();
        assert_eq!(vector.len(), SNAPSHOT_FEATURES.len());
        assert_eq!(vector.scaler_version, scaler.version());
        for (name, value) in vector.iter() {
            assert!(in_unit(value.scaled), "{} raw {} scaled to {}", name, raw, value.scaled);
        }
    }
}

#[test]
fn test_classification_boundary_table() {
    let classifier = RiskClassifier::new(&RiskThresholds::default());
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
        assert_eq!(classifier.classify(p), expected, "p = {}", p);
    }
}

#[test]
fn test_classification_is_total_over_unit_interval() {
    let classifier = RiskClassifier::new(&RiskThresholds::default());
    let mut previous = RiskLevel::Low;
    for i in 0..=10_000 {
        let p = i as f64 / 10_000.0;
        let level = classifier.classify(p);
        assert!(level >= previous, "classification must not decrease at p = {}", p);
        previous = level;
    }
    assert_eq!(previous, RiskLevel::Critical);
}

fn sample_scores() -> Vec<ModalityScore> {
    vec![
        ModalityScore::new(ModalityId::TabularRegressor, 0.71, 0.85),
        ModalityScore::new(ModalityId::Temporal, 0.64, 0.9),
        ModalityScore::new(ModalityId::Spatial, 0.42, 0.7),
        ModalityScore::new(ModalityId::TabularClassifier, 0.58, 0.88),
    ]
}

#[test]
fn test_fusion_is_idempotent() {
    let engine = FusionEngine::new(&FusionConfig::default());
    let scores = sample_scores();
    let first = engine.fuse(&scores).unwrap();
    for _ in 0..10 {
        let again = engine.fuse(&scores).unwrap();
        assert_eq!(again, first);
        assert_eq!(again.probability.to_bits(), first.probability.to_bits());
        assert_eq!(again.confidence.to_bits(), first.confidence.to_bits());
    }

    // Arrival order does not matter either
    let mut reversed = scores.clone();
    reversed.reverse();
    let from_reversed = engine.fuse(&reversed).unwrap();
    assert_eq!(from_reversed.probability.to_bits(), first.probability.to_bits());
    assert_eq!(from_reversed.confidence.to_bits(), first.confidence.to_bits());
}

#[test]
fn test_effective_weights_sum_to_one_for_every_subset() {
    let engine = FusionEngine::new(&FusionConfig::default());
    let config = FusionConfig::default();

    for mask in 1u8..16 {
        let present: Vec<ModalityId> = ModalityId::ALL
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, m)| *m)
            .collect();
        let weights = engine.effective_weights(&present);

        // Spatial alone carries no probability weight
        if present.iter().all(|m| config.weight(*m) <= 0.0) {
            assert!(weights.is_empty(), "{:?}", present);
            continue;
        }

        let sum: f64 = weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-12, "{:?} sums to {}", present, sum);
        assert!(weights.keys().all(|m| present.contains(m)));
    }
}

#[test]
fn test_missing_imagery_never_raises_confidence() {
    let engine = FusionEngine::new(&FusionConfig::default());
    let all = sample_scores();
    let without_spatial: Vec<ModalityScore> = all
        .iter()
        .copied()
        .filter(|s| s.modality_id != ModalityId::Spatial)
        .collect();

    let full = engine.fuse(&all).unwrap();
    let partial = engine.fuse(&without_spatial).unwrap();

    assert!(partial.confidence <= full.confidence);
    assert!(partial.confidence < full.confidence);
    assert_eq!(partial.missing_modalities, vec![ModalityId::Spatial]);
    assert!(full.missing_modalities.is_empty());
}

#[test]
fn test_void_spatial_score_counts_as_missing() {
    let engine = FusionEngine::new(&FusionConfig::default());
    let mut scores = sample_scores();
    scores.retain(|s| s.modality_id != ModalityId::Spatial);
    scores.push(ModalityScore::neutral(ModalityId::Spatial));

    let fused = engine.fuse(&scores).unwrap();
    assert_eq!(fused.missing_modalities, vec![ModalityId::Spatial]);
    assert!(fused.score(ModalityId::Spatial).is_some());
}
