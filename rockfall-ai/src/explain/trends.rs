//! Per-channel trends over the temporal window
//!
//! Each channel feature gets a least-squares fit of its scaled value
//! against sample position, using observed samples only. The fitted change
//! across the window sets the direction.

use crate::features::composite::ols_slope;
use crate::features::names::*;
use crate::features::FeatureFrame;
use crate::types::{ChannelTrend, TrendDirection};

const TREND_FEATURES: [&str; 6] = [
    PORE_PRESSURE,
    DISPLACEMENT_RATE,
    ACCELERATION,
    RAINFALL,
    TEMPERATURE,
    SEISMIC_ACTIVITY,
];

/// Fewer observed samples than this give no trend for the channel
const MIN_TREND_SAMPLES: usize = 3;

/// Change (scaled units) below this magnitude reads as stable
pub const STABLE_BAND: f64 = 0.05;

pub fn direction(change: f64) -> TrendDirection {
    if change > STABLE_BAND {
        TrendDirection::Rising
    } else if change < -STABLE_BAND {
        TrendDirection::Falling
    } else {
        TrendDirection::Stable
    }
}

pub fn channel_trends(frame: &FeatureFrame) -> Vec<ChannelTrend> {
    TREND_FEATURES
        .iter()
        .filter_map(|&name| {
            let points: Vec<(f64, f64)> = frame
                .temporal
                .iter()
                .enumerate()
                .filter_map(|(i, vector)| {
                    vector
                        .get(name)
                        .filter(|v| !v.imputed)
                        .map(|v| (i as f64, v.scaled))
                })
                .collect();
            if points.len() < MIN_TREND_SAMPLES {
                return None;
            }

            let span = points[points.len() - 1].0 - points[0].0;
            let change = ols_slope(&points) * span;
            Some(ChannelTrend {
                feature: name.to_string(),
                direction: direction(change),
                change,
                samples: points.len(),
            })
        })
        .collect()
}

/// Names of channels trending upward
pub fn rising(trends: &[ChannelTrend]) -> Vec<&str> {
    trends
        .iter()
        .filter(|t| t.direction == TrendDirection::Rising)
        .map(|t| t.feature.as_str())
        .collect()
}
