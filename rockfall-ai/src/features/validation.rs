//! Sensor validation: per-channel data quality for the cleaned window

use super::cleaning::CleanedWindow;
use crate::error::FeatureError;
use crate::types::SensorChannel;
use rockfall_common::time::hours_between;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Mean observed fraction at or above which data quality is good
const GOOD_OBSERVED_FRACTION: f64 = 0.9;
/// Mean observed fraction at or above which data quality is degraded (else poor)
const DEGRADED_OBSERVED_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Good,
    Degraded,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelQuality {
    pub channel: SensorChannel,
    /// Observed cells / samples
    pub observed_fraction: f64,
    pub outliers_capped: usize,
    pub imputed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorValidationReport {
    pub samples: usize,
    pub devices: usize,
    /// Hours between first and last sample
    pub span_hours: f64,
    pub channels: Vec<ChannelQuality>,
    pub mean_observed_fraction: f64,
    pub quality: DataQuality,
}

/// Build the quality report
///
/// # Errors
/// `FeatureError::InsufficientData` when every channel is entirely imputed:
/// readings exist but none carries a usable value.
pub fn validate_sensors(window: &CleanedWindow) -> Result<SensorValidationReport, FeatureError> {
    let samples = window.samples.len();
    let denom = samples.max(1) as f64;

    let channels: Vec<ChannelQuality> = SensorChannel::ALL
        .iter()
        .map(|&channel| {
            let audit = window.channel(channel);
            let observed = audit.map(|a| a.observed).unwrap_or(0);
            ChannelQuality {
                channel,
                observed_fraction: observed as f64 / denom,
                outliers_capped: audit.map(|a| a.outliers_capped).unwrap_or(0),
                imputed: audit
                    .map(|a| a.filled_from_data + a.filled_default)
                    .unwrap_or(samples),
            }
        })
        .collect();

    if channels.iter().all(|c| c.observed_fraction == 0.0) {
        return Err(FeatureError::InsufficientData(format!(
            "{} readings in window but no channel carries a usable value",
            samples
        )));
    }

    let mean_observed_fraction =
        channels.iter().map(|c| c.observed_fraction).sum::<f64>() / channels.len() as f64;
    let quality = if mean_observed_fraction >= GOOD_OBSERVED_FRACTION {
        DataQuality::Good
    } else if mean_observed_fraction >= DEGRADED_OBSERVED_FRACTION {
        DataQuality::Degraded
    } else {
        DataQuality::Poor
    };

    let span_hours = match (window.samples.first(), window.samples.last()) {
        (Some(first), Some(last)) => hours_between(first.timestamp, last.timestamp),
        _ => 0.0,
    };

    if quality != DataQuality::Good {
        warn!(
            quality = ?quality,
            mean_observed_fraction,
            "Sensor data quality below good; predictions rely on imputed values"
        );
    }

    Ok(SensorValidationReport {
        samples,
        devices: window.devices,
        span_hours,
        channels,
        mean_observed_fraction,
        quality,
    })
}
