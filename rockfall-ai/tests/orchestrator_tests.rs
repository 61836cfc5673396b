//! Orchestrator behaviour: cancellation, timeouts, degraded modalities, events

mod helpers;

use helpers::*;
use rockfall_ai::error::FailureKind;
use rockfall_ai::predictors::{Predictor, SpatialPredictor, TabularClassifier, TabularRegressor, TemporalPredictor};
use rockfall_ai::types::ModalityId;
use rockfall_ai::workflow::RunStatus;
use rockfall_ai::{ModelConfig, PipelineError, RiskPipeline};
use rockfall_common::events::{EventBus, RiskEvent, StageName, StageStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn built_in(config: &ModelConfig, modality: ModalityId) -> Predictor {
    match modality {
        ModalityId::Temporal => Predictor::Temporal(TemporalPredictor::new(&config.temporal)),
        ModalityId::Spatial => Predictor::Spatial(SpatialPredictor::new()),
        ModalityId::TabularClassifier => Predictor::TabularClassifier(TabularClassifier::new()),
        ModalityId::TabularRegressor => Predictor::TabularRegressor(TabularRegressor::new()),
    }
}

#[tokio::test]
async fn test_cancellation_stops_before_next_stage() {
    let config = default_config();
    let cancel = CancellationToken::new();
    let predictors = vec![
        Predictor::External(Arc::new(CancellingPredictor {
            modality: ModalityId::Temporal,
            token: cancel.clone(),
        })),
        built_in(&config, ModalityId::Spatial),
        built_in(&config, ModalityId::TabularClassifier),
        built_in(&config, ModalityId::TabularRegressor),
    ];
    let pipeline = RiskPipeline::new(config).unwrap().with_predictors(predictors);

    let report = pipeline.run(baseline_request(48), cancel).await;

    assert_eq!(
        report.outcome.as_ref().unwrap_err(),
        &PipelineError::Cancelled {
            stage: StageName::Finalization
        }
    );
    assert_eq!(report.state.status, RunStatus::Cancelled);
    assert!(report.state.ended_at.is_some());

    // The stage in flight completed; nothing after it started
    assert_eq!(report.state.record(StageName::MlPrediction).status, StageStatus::Done);
    assert_eq!(report.state.record(StageName::Finalization).status, StageStatus::Pending);
    assert!(report.state.outputs.prediction.is_some());
    assert!(report.state.outputs.assessment.is_none());

    let failure = report.failure().expect("cancellation is reported");
    assert_eq!(failure.kind, FailureKind::Cancelled);
    assert_eq!(failure.stage, StageName::Finalization);
    assert_eq!(report.state.cancelled_before, Some(StageName::Finalization));
}

#[tokio::test]
async fn test_stage_timeout_fails_run_and_keeps_prior_outputs() {
    let mut config = ModelConfig::default();
    config.pipeline.ml_prediction_ms = 50;
    let config = Arc::new(config);
    let predictors = vec![
        Predictor::External(Arc::new(SlowPredictor {
            modality: ModalityId::Temporal,
            delay: Duration::from_millis(500),
        })),
        built_in(&config, ModalityId::TabularClassifier),
    ];
    let pipeline = RiskPipeline::new(config).unwrap().with_predictors(predictors);

    let report = pipeline.run(baseline_request(24), CancellationToken::new()).await;

    assert_eq!(
        report.outcome.as_ref().unwrap_err(),
        &PipelineError::StageTimeout {
            stage: StageName::MlPrediction,
            timeout_ms: 50
        }
    );
    assert_eq!(report.state.status, RunStatus::Failed);
    let failure = report.failure().unwrap();
    assert_eq!(failure.stage, StageName::MlPrediction);
    assert_eq!(failure.kind, FailureKind::StageTimeout);

    let record = report.state.record(StageName::MlPrediction);
    assert_eq!(record.status, StageStatus::Failed);
    assert!(record.error.as_deref().unwrap_or_default().contains("50 ms"));

    // Everything up to fusion input assembly survives for audit
    assert!(report.state.outputs.cleaned.is_some());
    assert!(report.state.outputs.validation.is_some());
    assert!(report.state.outputs.frame.is_some());
    assert!(report.state.outputs.prediction.is_none());
    assert_eq!(report.state.progress().completed_stages, 5);
}

#[tokio::test]
async fn test_failed_predictor_is_treated_as_absent() {
    let config = default_config();
    let predictors = vec![
        built_in(&config, ModalityId::Temporal),
        built_in(&config, ModalityId::Spatial),
        built_in(&config, ModalityId::TabularClassifier),
        Predictor::External(Arc::new(OfflinePredictor(ModalityId::TabularRegressor))),
    ];
    let pipeline = RiskPipeline::new(config).unwrap().with_predictors(predictors);

    let report = pipeline.run(high_pore_pressure_request(), CancellationToken::new()).await;
    let assessment = report.outcome.expect("degraded assessment");

    let fused = report.state.outputs.prediction.expect("prediction").fused;
    assert!(fused.missing_modalities.contains(&ModalityId::TabularRegressor));
    assert!(!fused.effective_weights.contains_key(&ModalityId::TabularRegressor));
    let sum: f64 = fused.effective_weights.values().sum();
    assert!((sum - 1.0).abs() < 1e-12);
    assert!(assessment
        .modality_scores
        .iter()
        .all(|s| s.modality_id != ModalityId::TabularRegressor));
}

#[tokio::test]
async fn test_no_usable_modality_fails_prediction() {
    let predictors = vec![
        Predictor::External(Arc::new(OfflinePredictor(ModalityId::Temporal))),
        Predictor::External(Arc::new(OfflinePredictor(ModalityId::TabularClassifier))),
        Predictor::External(Arc::new(OfflinePredictor(ModalityId::TabularRegressor))),
    ];
    let pipeline = RiskPipeline::new(default_config()).unwrap().with_predictors(predictors);

    let report = pipeline.run(baseline_request(24), CancellationToken::new()).await;

    let failure = report.failure().expect("failure");
    assert_eq!(failure.stage, StageName::MlPrediction);
    assert_eq!(failure.kind, FailureKind::ModalityUnavailable);
    assert!(failure.reason.contains("offline"));
}

#[tokio::test]
async fn test_predictors_missing_a_feature_fail_prediction_and_keep_prior_outputs() {
    let missing = |modality| {
        Predictor::External(Arc::new(MissingFeaturePredictor {
            modality,
            feature: "piezometer_gradient",
        }))
    };
    let predictors = vec![
        missing(ModalityId::Temporal),
        missing(ModalityId::TabularClassifier),
        missing(ModalityId::TabularRegressor),
    ];
    let pipeline = RiskPipeline::new(default_config()).unwrap().with_predictors(predictors);

    let report = pipeline.run(baseline_request(24), CancellationToken::new()).await;

    assert_eq!(
        report.outcome.as_ref().unwrap_err(),
        &PipelineError::FeatureMissing {
            modality: ModalityId::Temporal,
            feature: "piezometer_gradient".to_string(),
        }
    );
    let failure = report.failure().expect("failure");
    assert_eq!(failure.stage, StageName::MlPrediction);
    assert_eq!(failure.kind, FailureKind::FeatureMissing);
    assert!(failure.reason.contains("piezometer_gradient"), "{}", failure.reason);
    assert_eq!(report.state.status, RunStatus::Failed);
    assert_eq!(report.state.record(StageName::MlPrediction).status, StageStatus::Failed);

    // Everything before prediction stays on the run for audit
    assert!(report.state.outputs.cleaned.is_some());
    assert!(report.state.outputs.features.is_some());
    assert!(report.state.outputs.validation.is_some());
    assert!(report.state.outputs.frame.is_some());
    assert!(report.state.outputs.prediction.is_none());
    assert!(report.state.outputs.assessment.is_none());
    assert_eq!(report.state.progress().completed_stages, 5);
    assert!(report.state.cancelled_before.is_none());
}

#[tokio::test]
async fn test_one_predictor_missing_a_feature_is_tolerated() {
    let config = default_config();
    let predictors = vec![
        built_in(&config, ModalityId::Temporal),
        built_in(&config, ModalityId::TabularClassifier),
        Predictor::External(Arc::new(MissingFeaturePredictor {
            modality: ModalityId::TabularRegressor,
            feature: "piezometer_gradient",
        })),
    ];
    let pipeline = RiskPipeline::new(config).unwrap().with_predictors(predictors);

    let report = pipeline.run(baseline_request(24), CancellationToken::new()).await;
    assert!(report.outcome.is_ok());
    let fused = report.state.outputs.prediction.expect("prediction").fused;
    assert!(fused.missing_modalities.contains(&ModalityId::TabularRegressor));
}

#[tokio::test]
async fn test_external_scores_flow_through_fusion() {
    let predictors = vec![
        Predictor::External(Arc::new(FixedPredictor {
            modality: ModalityId::Temporal,
            probability: 0.9,
            confidence: 0.9,
        })),
        Predictor::External(Arc::new(FixedPredictor {
            modality: ModalityId::TabularClassifier,
            probability: 0.9,
            confidence: 0.9,
        })),
        Predictor::External(Arc::new(FixedPredictor {
            modality: ModalityId::TabularRegressor,
            probability: 0.9,
            confidence: 0.9,
        })),
    ];
    let pipeline = RiskPipeline::new(default_config()).unwrap().with_predictors(predictors);

    let assessment = pipeline.assess(baseline_request(24)).await.unwrap();
    assert!((assessment.risk_probability - 0.9).abs() < 1e-12);
    // Spatial absent: one penalty step
    assert!((assessment.confidence - 0.81).abs() < 1e-12);
}

#[tokio::test]
async fn test_event_bus_sees_full_stage_sequence() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let pipeline = RiskPipeline::new(default_config()).unwrap().with_event_bus(bus);

    let report = pipeline.run(baseline_request(24), CancellationToken::new()).await;
    assert!(report.outcome.is_ok());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(RiskEvent::RunStarted { .. })));
    assert!(matches!(events.last(), Some(RiskEvent::RunCompleted { .. })));
    let transitions: Vec<(StageName, StageStatus)> = events
        .iter()
        .filter_map(|e| match e {
            RiskEvent::StageProgress { stage, status, .. } => Some((*stage, *status)),
            _ => None,
        })
        .collect();
    let expected: Vec<(StageName, StageStatus)> = StageName::ALL
        .iter()
        .flat_map(|s| [(*s, StageStatus::Running), (*s, StageStatus::Done)])
        .collect();
    assert_eq!(transitions, expected);
    assert!(events.iter().all(|e| e.run_id() == report.state.run_id));
}

#[tokio::test]
async fn test_failed_run_emits_failure_event() {
    let (tx, mut rx) = mpsc::channel(64);
    let pipeline = RiskPipeline::with_events(default_config(), tx).unwrap();
    let mut request = baseline_request(24);
    request.sensor_batches.clear();

    let report = pipeline.run(request, CancellationToken::new()).await;
    assert!(report.outcome.is_err());
    drop(pipeline);

    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event);
    }
    match last {
        Some(RiskEvent::RunFailed { stage, reason, .. }) => {
            assert_eq!(stage, StageName::Preprocessing);
            assert!(reason.contains("Insufficient data"));
        }
        other => panic!("expected RunFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_concurrent_runs_share_one_pipeline() {
    let pipeline = Arc::new(RiskPipeline::new(default_config()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                let request = if i % 2 == 0 {
                    high_pore_pressure_request()
                } else {
                    baseline_request(48)
                };
                pipeline.run(request, CancellationToken::new()).await
            })
        })
        .collect();

    let mut run_ids = Vec::new();
    for handle in handles {
        let report = handle.await.expect("task");
        assert_eq!(report.state.status, RunStatus::Completed);
        run_ids.push(report.state.run_id);
    }
    run_ids.sort();
    run_ids.dedup();
    assert_eq!(run_ids.len(), 4);

    // Identical requests produce identical probabilities
    let a = pipeline.assess(high_pore_pressure_request()).await.unwrap();
    let b = pipeline.assess(high_pore_pressure_request()).await.unwrap();
    assert_eq!(a.risk_probability.to_bits(), b.risk_probability.to_bits());
}
