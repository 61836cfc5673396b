//! Staged pipeline orchestration
//!
//! One prediction request runs through seven stages in a fixed order:
//! 1. `preprocessing`: clean and impute sensor readings
//! 2. `geometry_extraction`: aggregate drone-imagery batches
//! 3. `feature_extraction`: per-sample and snapshot features
//! 4. `sensor_validation`: data quality report
//! 5. `fusion_input_assembly`: scale into predictor inputs
//! 6. `ml_prediction`: score every modality and fuse
//! 7. `finalization`: classify and explain
//!
//! Uses the 3-tier architecture (features → predictors/fusion → explain).

pub mod pipeline;
pub mod progress;
pub mod run_state;

pub use pipeline::{RiskPipeline, RunReport};
pub use progress::ProgressReporter;
pub use run_state::{PredictionOutput, RunProgress, RunState, RunStatus, StageOutputs, StageRecord};
