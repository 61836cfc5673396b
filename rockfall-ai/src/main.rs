//! rockfall-ai - Rockfall risk assessment
//!
//! Reads one prediction request (JSON), runs the staged pipeline and prints
//! the `RiskAssessment` to stdout. On failure the structured `StageFailure`
//! is printed instead and the process exits with status 1.
//!
//! Logs and (with `--events`) stage events go to stderr so stdout stays
//! machine-readable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rockfall_ai::{ModelConfig, PredictionRequest, RiskPipeline};
use rockfall_common::events::RiskEvent;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("ROCKFALL_BUILD"), ")");

/// Log level used until the configuration has been read
const BOOTSTRAP_LOG_LEVEL: &str = "info";

/// Command-line arguments for rockfall-ai
#[derive(Parser, Debug)]
#[command(name = "rockfall-ai")]
#[command(about = "Multi-modal rockfall risk assessment")]
#[command(version, long_version = LONG_VERSION)]
struct Args {
    /// Model configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assess one prediction request
    Assess {
        /// Prediction request (JSON)
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Stream stage events to stderr as JSON lines
        #[arg(long)]
        events: bool,
    },
    /// Load and validate the model configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging comes up first so configuration discovery is logged
    let rust_log = std::env::var("RUST_LOG").ok();
    let (filter, filter_handle) = reload::Layer::new(EnvFilter::new(filter_directive(
        rust_log.as_deref(),
        BOOTSTRAP_LOG_LEVEL,
    )));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), build = env!("ROCKFALL_BUILD"), "Starting rockfall-ai");

    let (config, _) = ModelConfig::load(args.config.as_deref()).context("Failed to load model configuration")?;
    let directive = filter_directive(rust_log.as_deref(), &config.logging.level);
    filter_handle
        .reload(EnvFilter::new(directive))
        .context("Failed to apply configured log level")?;

    match args.command {
        Command::CheckConfig => {
            config.validate().context("Invalid model configuration")?;
            info!(model_version = %config.model_version, "Configuration is valid");
            println!("ok");
            Ok(())
        }
        Command::Assess { input, events } => assess(config, &input, events).await,
    }
}

/// `RUST_LOG` wins over the configured level when it is set and non-empty
fn filter_directive(rust_log: Option<&str>, configured: &str) -> String {
    match rust_log.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ => configured.to_string(),
    }
}

async fn assess(config: ModelConfig, input: &Path, stream_events: bool) -> Result<()> {
    let content = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let request: PredictionRequest =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", input.display()))?;

    let config = Arc::new(config);
    let (pipeline, printer) = if stream_events {
        let (tx, rx) = mpsc::channel(64);
        let pipeline = RiskPipeline::with_events(config, tx).context("Invalid model configuration")?;
        (pipeline, Some(tokio::spawn(print_events(rx))))
    } else {
        (RiskPipeline::new(config).context("Invalid model configuration")?, None)
    };

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Received Ctrl+C, cancelling after the current stage");
                cancel.cancel();
            }
        })
    };

    let report = pipeline.run(request, cancel).await;
    ctrl_c.abort();

    // Closing the last sender lets the printer drain and finish
    drop(pipeline);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if let Some(failure) = report.failure() {
        println!("{}", serde_json::to_string_pretty(&failure)?);
        std::process::exit(1);
    }
    if let Ok(assessment) = &report.outcome {
        println!("{}", serde_json::to_string_pretty(assessment)?);
    }
    Ok(())
}

async fn print_events(mut rx: mpsc::Receiver<RiskEvent>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => eprintln!("{}", line),
            Err(e) => warn!(error = %e, "Failed to serialize event"),
        }
    }
}
