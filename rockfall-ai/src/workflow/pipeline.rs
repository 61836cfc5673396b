//! Pipeline Orchestrator
//!
//! Runs the seven named stages strictly in order:
//!
//! ```text
//! preprocessing → geometry_extraction → feature_extraction → sensor_validation
//!   → fusion_input_assembly → ml_prediction → finalization
//! ```
//!
//! # Stage contract
//! - Cancellation is checked between stages, never mid-stage
//! - Every stage runs under its configured timeout; exceeding it fails the stage
//! - A failed stage fails the run; outputs of earlier stages stay on `RunState`
//! - No automatic retry: the caller receives a `StageFailure` and owns retry policy
//!
//! # Modality policy
//! Missing imagery is tolerated: the spatial score is neutral with zero
//! confidence and fusion redistributes weights. A predictor that fails is
//! logged and left out of fusion. Only when no weighted modality produced a
//! score does the run fail. Missing sensor data is always fatal.
//!
//! # Example
//! ```rust,ignore
//! let pipeline = RiskPipeline::new(Arc::new(config))?;
//! let report = pipeline.run(request, CancellationToken::new()).await;
//! ```

use super::progress::ProgressReporter;
use super::run_state::{PredictionOutput, RunState};
use crate::classifier::RiskClassifier;
use crate::config::ModelConfig;
use crate::error::{FusionError, PipelineError, PredictorError, StageFailure};
use crate::explain::Explainer;
use crate::features::{aggregate_images, extract_features, preprocess, validate_sensors, FeatureFrame, Scaler};
use crate::fusion::FusionEngine;
use crate::predictors::{ModalityPredictor, Predictor};
use crate::types::{ModalityId, ModalityScore, PredictionRequest, RiskAssessment};
use chrono::Utc;
use rockfall_common::events::{EventBus, RiskEvent, StageName, StageStatus};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one run: the final state plus the assessment or the error
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub outcome: Result<RiskAssessment, PipelineError>,
}

impl RunReport {
    /// Structured failure for a run that did not complete, cancellation included
    pub fn failure(&self) -> Option<StageFailure> {
        match (&self.state.failure, &self.outcome) {
            (Some(failure), _) => Some(failure.clone()),
            (None, Err(err @ PipelineError::Cancelled { stage })) => Some(err.at_stage(*stage)),
            (None, Err(err)) => Some(err.at_stage(StageName::Preprocessing)),
            (None, Ok(_)) => None,
        }
    }
}

/// Risk pipeline; holds only read-only configuration and is shared freely
/// across concurrent requests
#[derive(Clone)]
pub struct RiskPipeline {
    config: Arc<ModelConfig>,
    scaler: Arc<Scaler>,
    fusion: FusionEngine,
    classifier: RiskClassifier,
    explainer: Explainer,
    predictors: Vec<Predictor>,
    event_tx: Option<mpsc::Sender<RiskEvent>>,
    event_bus: Option<EventBus>,
}

impl RiskPipeline {
    /// Create a pipeline with the built-in predictors
    ///
    /// # Errors
    /// `PipelineError::Configuration` when the configuration does not validate.
    pub fn new(config: Arc<ModelConfig>) -> Result<Self, PipelineError> {
        config.validate()?;
        let scaler = Scaler::new(&config.scaler)?;
        let classifier = RiskClassifier::new(&config.risk);
        Ok(Self {
            scaler: Arc::new(scaler),
            fusion: FusionEngine::new(&config.fusion),
            explainer: Explainer::new(&config.explain, classifier, config.risk.horizon_hours),
            classifier,
            predictors: Predictor::default_set(&config),
            event_tx: None,
            event_bus: None,
            config,
        })
    }

    /// Create pipeline with event channel for progress reporting
    pub fn with_events(config: Arc<ModelConfig>, event_tx: mpsc::Sender<RiskEvent>) -> Result<Self, PipelineError> {
        let mut pipeline = Self::new(config)?;
        pipeline.event_tx = Some(event_tx);
        Ok(pipeline)
    }

    /// Also broadcast events to every `EventBus` subscriber
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Replace the predictor set (e.g. with trained external models)
    pub fn with_predictors(mut self, predictors: Vec<Predictor>) -> Self {
        self.predictors = predictors;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Run all stages and return the assessment or the error
    pub async fn assess(&self, request: PredictionRequest) -> Result<RiskAssessment, PipelineError> {
        self.run(request, CancellationToken::new()).await.outcome
    }

    /// Run all stages, returning the full run state for audit
    pub async fn run(&self, request: PredictionRequest, cancel: CancellationToken) -> RunReport {
        let mut state = RunState::new(request.site_id.clone());
        let reporter = ProgressReporter::new(state.run_id, self.event_tx.clone(), self.event_bus.clone());

        info!(
            run_id = %state.run_id,
            site_id = %request.site_id,
            readings = request.reading_count(),
            image_batches = request.image_batches.len(),
            "Risk assessment started"
        );
        reporter
            .emit(RiskEvent::RunStarted {
                run_id: state.run_id,
                site_id: request.site_id.clone(),
                timestamp: Utc::now(),
            })
            .await;

        let outcome = self.execute(Arc::new(request), &mut state, &reporter, &cancel).await;

        match &outcome {
            Ok(assessment) => {
                state.complete();
                info!(
                    run_id = %state.run_id,
                    risk_level = %assessment.risk_level,
                    probability = assessment.risk_probability,
                    confidence = assessment.confidence,
                    "Risk assessment completed"
                );
                reporter
                    .emit(RiskEvent::RunCompleted {
                        run_id: state.run_id,
                        risk_level: assessment.risk_level.to_string(),
                        probability: assessment.risk_probability,
                        timestamp: Utc::now(),
                    })
                    .await;
            }
            Err(PipelineError::Cancelled { stage }) => {
                reporter
                    .emit(RiskEvent::RunCancelled {
                        run_id: state.run_id,
                        stage: *stage,
                        timestamp: Utc::now(),
                    })
                    .await;
            }
            Err(err) => {
                let stage = state.failure.as_ref().map(|f| f.stage).unwrap_or(StageName::Preprocessing);
                reporter
                    .emit(RiskEvent::RunFailed {
                        run_id: state.run_id,
                        stage,
                        reason: err.to_string(),
                        timestamp: Utc::now(),
                    })
                    .await;
            }
        }

        RunReport { state, outcome }
    }

    async fn execute(
        &self,
        request: Arc<PredictionRequest>,
        state: &mut RunState,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<RiskAssessment, PipelineError> {
        // Stage 1: preprocessing
        let cleaned = {
            let request = Arc::clone(&request);
            let defaults = self.config.channels.clone();
            self.stage(
                state,
                reporter,
                cancel,
                StageName::Preprocessing,
                blocking(move || Ok(preprocess(&request, &defaults)?)),
                |c| {
                    json!({
                        "samples": c.samples.len(),
                        "devices": c.devices,
                        "dropped_outside_window": c.dropped_outside_window,
                        "duplicates_merged": c.duplicates_merged,
                    })
                },
            )
            .await?
        };
        state.outputs.cleaned = Some(cleaned.clone());

        // Stage 2: geometry_extraction
        let images = {
            let request = Arc::clone(&request);
            self.stage(
                state,
                reporter,
                cancel,
                StageName::GeometryExtraction,
                blocking(move || Ok(aggregate_images(&request.image_batches))),
                |agg| match agg {
                    Some(agg) => json!({
                        "batches": agg.batches,
                        "contributing_batches": agg.contributing_batches,
                        "processing_confidence": agg.processing_confidence,
                    }),
                    None => json!({ "batches": 0 }),
                },
            )
            .await?
        };
        if images.as_ref().map(|agg| agg.contributing_batches == 0).unwrap_or(true) {
            warn!(run_id = %state.run_id, "No usable imagery; spatial modality will not contribute");
        }
        state.outputs.images = images.clone();

        // Stage 3: feature_extraction
        let features = {
            let cleaned = cleaned.clone();
            let images = images.clone();
            self.stage(
                state,
                reporter,
                cancel,
                StageName::FeatureExtraction,
                blocking(move || Ok(extract_features(&cleaned, images.as_ref()))),
                |f| json!({ "samples": f.samples.len(), "snapshot_features": f.snapshot.len() }),
            )
            .await?
        };
        state.outputs.features = Some(features.clone());

        // Stage 4: sensor_validation
        let validation = self
            .stage(
                state,
                reporter,
                cancel,
                StageName::SensorValidation,
                blocking(move || Ok(validate_sensors(&cleaned)?)),
                |v| json!({ "quality": v.quality, "mean_observed_fraction": v.mean_observed_fraction }),
            )
            .await?;
        state.outputs.validation = Some(validation);

        // Stage 5: fusion_input_assembly
        let frame = {
            let scaler = Arc::clone(&self.scaler);
            let window_len = self.config.temporal.window_len;
            self.stage(
                state,
                reporter,
                cancel,
                StageName::FusionInputAssembly,
                blocking(move || Ok(scaler.assemble(&features, window_len)?)),
                |f: &FeatureFrame| {
                    json!({
                        "temporal_samples": f.temporal.len(),
                        "imputed_features": f.imputed_features(),
                        "has_imagery": f.has_imagery(),
                    })
                },
            )
            .await?
        };
        state.outputs.frame = Some(frame.clone());

        // Stage 6: ml_prediction
        let (prediction, adjusted) = self
            .stage(
                state,
                reporter,
                cancel,
                StageName::MlPrediction,
                self.predict(frame),
                |(p, _): &(PredictionOutput, FeatureFrame)| {
                    json!({
                        "probability": p.fused.probability,
                        "confidence": p.fused.confidence,
                        "spatial_adjustment": p.spatial_adjustment,
                        "modalities": p.fused.contributing_modalities,
                        "missing_modalities": p.fused.missing_modalities,
                    })
                },
            )
            .await?;
        state.outputs.prediction = Some(prediction.clone());

        // Stage 7: finalization
        let assessment = {
            let run_id = state.run_id;
            let site_id = request.site_id.clone();
            let model_version = self.config.model_version.clone();
            let classifier = self.classifier;
            let explainer = self.explainer.clone();
            self.stage(
                state,
                reporter,
                cancel,
                StageName::Finalization,
                blocking(move || {
                    let fused = prediction.fused;
                    let risk_level = classifier.classify(fused.probability);
                    let explanation = explainer.explain(&adjusted, &fused, risk_level);
                    Ok(RiskAssessment {
                        run_id,
                        site_id,
                        model_version,
                        risk_probability: fused.probability,
                        risk_level,
                        action: risk_level.action(),
                        confidence: fused.confidence,
                        top_factors: explanation.top_factors,
                        recommendations: explanation.recommendations,
                        breached_rules: explanation.breached_rules,
                        threshold_status: explanation.threshold_status,
                        channel_trends: explanation.channel_trends,
                        insights: explanation.insights,
                        time_horizon: explanation.time_horizon,
                        summary: explanation.summary,
                        confidence_analysis: explanation.confidence_analysis,
                        modality_scores: fused.contributing_modalities,
                        imputed_features: adjusted.imputed_features(),
                        generated_at: Utc::now(),
                    })
                }),
                |a| json!({ "risk_level": a.risk_level, "probability": a.risk_probability }),
            )
            .await?
        };
        state.outputs.assessment = Some(assessment.clone());

        Ok(assessment)
    }

    /// Run one stage under its timeout, recording status and emitting events
    async fn stage<T, Fut>(
        &self,
        state: &mut RunState,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
        stage: StageName,
        work: Fut,
        summarize: impl FnOnce(&T) -> serde_json::Value,
    ) -> Result<T, PipelineError>
    where
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        if cancel.is_cancelled() {
            info!(run_id = %state.run_id, stage = %stage, "Cancellation requested; stopping before stage");
            state.cancel(stage);
            return Err(PipelineError::Cancelled { stage });
        }

        state.start_stage(stage);
        reporter.stage(stage, StageStatus::Running, None).await;
        let started = Instant::now();

        let budget = self.config.pipeline.for_stage(stage);
        let result = match tokio::time::timeout(budget, work).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::StageTimeout {
                stage,
                timeout_ms: self.config.pipeline.millis(stage),
            }),
        };

        match result {
            Ok(output) => {
                let partial = summarize(&output);
                info!(
                    run_id = %state.run_id,
                    stage = %stage,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Stage complete"
                );
                state.complete_stage(stage, Some(partial.clone()));
                reporter.stage(stage, StageStatus::Done, Some(partial)).await;
                Ok(output)
            }
            Err(err) => {
                let failure = err.at_stage(stage);
                error!(run_id = %state.run_id, stage = %stage, kind = ?failure.kind, reason = %failure.reason, "Stage failed");
                state.fail_stage(failure.clone());
                reporter
                    .stage(stage, StageStatus::Failed, serde_json::to_value(&failure).ok())
                    .await;
                Err(err)
            }
        }
    }

    /// Score every modality and fuse
    ///
    /// Spatial predictors run first; their score becomes the snapshot's
    /// spatial adjustment. The remaining predictors then fan out on the
    /// blocking pool and are joined before fusion.
    async fn predict(&self, frame: FeatureFrame) -> Result<(PredictionOutput, FeatureFrame), PipelineError> {
        let frame = Arc::new(frame);
        let (spatial, others): (Vec<Predictor>, Vec<Predictor>) = self
            .predictors
            .iter()
            .cloned()
            .partition(|p| p.modality() == ModalityId::Spatial);

        let mut scores: Vec<ModalityScore> = Vec::new();
        let mut first_error: Option<PredictorError> = None;

        let spatial_results = run_predictors(spatial, Arc::clone(&frame)).await;
        let mut spatial_adjustment = None;
        for result in spatial_results {
            match result {
                Ok(score) => {
                    if !score.is_void() {
                        spatial_adjustment = Some(0.5 + (score.probability - 0.5) * score.confidence);
                    }
                    scores.push(score);
                }
                Err(err) => {
                    warn!(modality = ?ModalityId::Spatial, error = %err, "Spatial predictor failed; continuing without it");
                    first_error.get_or_insert(err);
                }
            }
        }

        let adjusted = match spatial_adjustment {
            Some(adjustment) => {
                debug!(adjustment, "Folding spatial score into snapshot");
                Arc::new(self.scaler.fold_spatial_adjustment(&frame, adjustment)?)
            }
            None => frame,
        };

        for result in run_predictors(others, Arc::clone(&adjusted)).await {
            match result {
                Ok(score) => {
                    debug!(
                        modality = ?score.modality_id,
                        probability = score.probability,
                        confidence = score.confidence,
                        "Modality scored"
                    );
                    scores.push(score);
                }
                Err(err) => {
                    warn!(error = %err, "Predictor failed; its modality is treated as absent");
                    first_error.get_or_insert(err);
                }
            }
        }

        let fused = match self.fusion.fuse(&scores) {
            Ok(fused) => fused,
            Err(FusionError::NoModalities) => {
                // Report why the modalities are missing rather than that they are
                return Err(match first_error {
                    Some(err) => err.into(),
                    None => FusionError::NoModalities.into(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let adjusted = Arc::try_unwrap(adjusted).unwrap_or_else(|shared| (*shared).clone());
        Ok((
            PredictionOutput {
                spatial_adjustment: spatial_adjustment.unwrap_or(0.5),
                fused,
            },
            adjusted,
        ))
    }
}

/// Evaluate predictors concurrently on the blocking pool
async fn run_predictors(
    predictors: Vec<Predictor>,
    frame: Arc<FeatureFrame>,
) -> Vec<Result<ModalityScore, PredictorError>> {
    let tasks = predictors.into_iter().map(|predictor| {
        let frame = Arc::clone(&frame);
        let modality = predictor.modality();
        async move {
            match tokio::task::spawn_blocking(move || predictor.predict(&frame)).await {
                Ok(result) => result,
                Err(join_err) => Err(PredictorError::ModalityUnavailable {
                    modality,
                    reason: format!("predictor task failed: {}", join_err),
                }),
            }
        }
    });
    futures::future::join_all(tasks).await
}

/// Run synchronous stage work on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| PipelineError::Internal(format!("stage task failed: {}", e)))?
}
