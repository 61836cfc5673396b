//! Feature extraction: per-sample features, snapshot aggregates, spatial features
//!
//! Works in raw units. Each feature records whether it is backed by data
//! or by a documented default.

use super::cleaning::{CleanSample, CleanedWindow};
use super::composite::{ols_slope, stability_index, weather_severity};
use super::geometry::ImageAggregate;
use super::layout::{self, names::*};
use crate::types::SensorChannel;
use rockfall_common::time::hours_between;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Seismic readings above this magnitude count as events
pub const SEISMIC_EVENT_MAGNITUDE: f64 = 2.0;

/// Named raw feature values with imputation flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFeatures {
    values: BTreeMap<String, f64>,
    imputed: BTreeSet<String>,
}

impl RawFeatures {
    pub fn set(&mut self, name: &str, value: f64, imputed: bool) {
        self.values.insert(name.to_string(), value);
        if imputed {
            self.imputed.insert(name.to_string());
        } else {
            self.imputed.remove(name);
        }
    }

    /// Set `name` to its layout default, flagged as imputed
    pub fn set_default(&mut self, name: &str) {
        let default = layout::feature(name).map(|d| d.default).unwrap_or(0.0);
        self.set(name, default, true);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn is_imputed(&self, name: &str) -> bool {
        self.imputed.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64, bool)> {
        self.values
            .iter()
            .map(|(k, v)| (k.as_str(), *v, self.imputed.contains(k)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Output of the feature extraction stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFeatures {
    /// One entry per cleaned sample, oldest first
    pub samples: Vec<RawFeatures>,
    pub snapshot: RawFeatures,
    pub spatial: RawFeatures,
}

pub fn extract_features(window: &CleanedWindow, images: Option<&ImageAggregate>) -> ExtractedFeatures {
    let samples = sample_features(window);
    let snapshot = snapshot_features(window, &samples);
    let spatial = spatial_features(images);

    debug!(
        samples = samples.len(),
        snapshot = snapshot.len(),
        spatial_imputed = spatial.iter().filter(|(_, _, imputed)| *imputed).count(),
        "Features extracted"
    );

    ExtractedFeatures {
        samples,
        snapshot,
        spatial,
    }
}

fn sample_features(window: &CleanedWindow) -> Vec<RawFeatures> {
    // device -> its previous sample
    let mut previous: BTreeMap<&str, &CleanSample> = BTreeMap::new();
    let mut out = Vec::with_capacity(window.samples.len());

    for sample in &window.samples {
        let mut f = RawFeatures::default();
        let observed = |c: SensorChannel| sample.is_observed(c);

        let pore = sample.value(SensorChannel::PorePressure);
        let rain = sample.value(SensorChannel::Rainfall);
        let temp = sample.value(SensorChannel::Temperature);
        f.set(PORE_PRESSURE, pore, !observed(SensorChannel::PorePressure));
        f.set(ACCELERATION, sample.value(SensorChannel::Acceleration), !observed(SensorChannel::Acceleration));
        f.set(RAINFALL, rain, !observed(SensorChannel::Rainfall));
        f.set(TEMPERATURE, temp, !observed(SensorChannel::Temperature));
        f.set(
            SEISMIC_ACTIVITY,
            sample.value(SensorChannel::SeismicActivity),
            !observed(SensorChannel::SeismicActivity),
        );

        let (rate, rate_imputed) = match previous.get(sample.device_id.as_str()) {
            Some(prev) => {
                let hours = hours_between(prev.timestamp, sample.timestamp);
                let delta = sample.value(SensorChannel::Displacement) - prev.value(SensorChannel::Displacement);
                let rate = if hours > 0.0 { (delta / hours).abs() } else { 0.0 };
                let imputed = !(observed(SensorChannel::Displacement)
                    && prev.is_observed(SensorChannel::Displacement));
                (rate, imputed)
            }
            None => (0.0, true),
        };
        f.set(DISPLACEMENT_RATE, rate, rate_imputed);

        f.set(
            WEATHER_SEVERITY_INDEX,
            weather_severity(rain, temp),
            f.is_imputed(RAINFALL) && f.is_imputed(TEMPERATURE),
        );
        f.set(
            STABILITY_INDEX,
            stability_index(pore, rate),
            f.is_imputed(PORE_PRESSURE) && rate_imputed,
        );

        previous.insert(sample.device_id.as_str(), sample);
        out.push(f);
    }
    out
}

fn snapshot_features(window: &CleanedWindow, samples: &[RawFeatures]) -> RawFeatures {
    let mut f = RawFeatures::default();
    let unobserved = |c: SensorChannel| window.channel(c).map(|a| a.observed == 0).unwrap_or(true);
    let values = |c: SensorChannel| window.samples.iter().map(move |s| s.value(c));
    let n = window.samples.len().max(1) as f64;

    // Pore pressure
    let pore_missing = unobserved(SensorChannel::PorePressure);
    f.set(PORE_PRESSURE_AVG, values(SensorChannel::PorePressure).sum::<f64>() / n, pore_missing);
    f.set(PORE_PRESSURE_MAX, max_of(values(SensorChannel::PorePressure)), pore_missing);
    f.set(
        PORE_PRESSURE_TREND,
        mean_device_slope(window, SensorChannel::PorePressure),
        pore_missing,
    );

    // Displacement
    let disp_missing = unobserved(SensorChannel::Displacement);
    let mut displacement_max: f64 = 0.0;
    let mut displacement_rate: f64 = 0.0;
    for device in window.device_ids() {
        let series: Vec<&CleanSample> = window.device_samples(device).collect();
        let disp = series.iter().map(|s| s.value(SensorChannel::Displacement));
        let span = max_of(disp.clone()) - min_of(disp);
        displacement_max = displacement_max.max(span);
        let points: Vec<(f64, f64)> = series
            .iter()
            .map(|s| (hours_between(window.window_start, s.timestamp), s.value(SensorChannel::Displacement)))
            .collect();
        displacement_rate = displacement_rate.max(ols_slope(&points).abs());
    }
    f.set(DISPLACEMENT_MAX, displacement_max, disp_missing);
    f.set(DISPLACEMENT_RATE, displacement_rate, disp_missing);

    // Acceleration
    f.set(
        ACCELERATION_MAX,
        max_of(values(SensorChannel::Acceleration)),
        unobserved(SensorChannel::Acceleration),
    );

    // Rainfall: observed amounts only, per device, wettest device
    let mut rainfall_total: f64 = 0.0;
    for device in window.device_ids() {
        let total: f64 = window
            .device_samples(device)
            .filter(|s| s.is_observed(SensorChannel::Rainfall))
            .map(|s| s.value(SensorChannel::Rainfall).max(0.0))
            .sum();
        rainfall_total = rainfall_total.max(total);
    }
    f.set(RAINFALL_TOTAL, rainfall_total, unobserved(SensorChannel::Rainfall));

    // Temperature
    let temp_missing = unobserved(SensorChannel::Temperature);
    f.set(TEMPERATURE_AVG, values(SensorChannel::Temperature).sum::<f64>() / n, temp_missing);
    f.set(
        TEMPERATURE_RANGE,
        max_of(values(SensorChannel::Temperature)) - min_of(values(SensorChannel::Temperature)),
        temp_missing,
    );

    // Seismic: events counted on observed readings only
    let seismic_missing = unobserved(SensorChannel::SeismicActivity);
    let events = window
        .samples
        .iter()
        .filter(|s| s.is_observed(SensorChannel::SeismicActivity))
        .filter(|s| s.value(SensorChannel::SeismicActivity) > SEISMIC_EVENT_MAGNITUDE)
        .count();
    f.set(SEISMIC_EVENT_COUNT, events as f64, seismic_missing);
    f.set(SEISMIC_MAGNITUDE_MAX, max_of(values(SensorChannel::SeismicActivity)), seismic_missing);

    // Composites
    let weather = samples
        .iter()
        .filter_map(|s| s.get(WEATHER_SEVERITY_INDEX))
        .fold(0.0, f64::max);
    f.set(
        WEATHER_SEVERITY_INDEX,
        weather,
        unobserved(SensorChannel::Rainfall) && temp_missing,
    );
    let pore_avg = f.get(PORE_PRESSURE_AVG).unwrap_or(0.0);
    f.set(
        STABILITY_INDEX,
        stability_index(pore_avg, displacement_rate),
        pore_missing && disp_missing,
    );

    // Neutral until the spatial score is folded in
    f.set_default(SPATIAL_ADJUSTMENT);
    f
}

fn spatial_features(images: Option<&ImageAggregate>) -> RawFeatures {
    let mut f = RawFeatures::default();
    let fields: [(&str, Option<f64>); 8] = match images {
        Some(agg) => [
            (SLOPE_ANGLE, agg.slope_angle),
            (BENCH_HEIGHT, agg.bench_height),
            (BENCH_WIDTH, agg.bench_width),
            (SURFACE_ROUGHNESS, agg.surface_roughness),
            (CRACK_COUNT, agg.crack_count),
            (CRACK_DENSITY, agg.crack_density),
            (CRACK_WIDTH_MAX, agg.crack_width_max),
            (SURFACE_DISPLACEMENT, agg.surface_displacement),
        ],
        None => [
            (SLOPE_ANGLE, None),
            (BENCH_HEIGHT, None),
            (BENCH_WIDTH, None),
            (SURFACE_ROUGHNESS, None),
            (CRACK_COUNT, None),
            (CRACK_DENSITY, None),
            (CRACK_WIDTH_MAX, None),
            (SURFACE_DISPLACEMENT, None),
        ],
    };
    for (name, value) in fields {
        match value {
            Some(v) => f.set(name, v, false),
            None => f.set_default(name),
        }
    }

    match images.filter(|agg| agg.contributing_batches > 0) {
        Some(agg) => f.set(IMAGE_CONFIDENCE, agg.processing_confidence, false),
        None => f.set_default(IMAGE_CONFIDENCE),
    }
    f
}

/// Mean over devices of the OLS slope (units per hour) of one channel
fn mean_device_slope(window: &CleanedWindow, channel: SensorChannel) -> f64 {
    let slopes: Vec<f64> = window
        .device_ids()
        .into_iter()
        .map(|device| {
            let points: Vec<(f64, f64)> = window
                .device_samples(device)
                .map(|s| (hours_between(window.window_start, s.timestamp), s.value(channel)))
                .collect();
            ols_slope(&points)
        })
        .collect();
    if slopes.is_empty() {
        0.0
    } else {
        slopes.iter().sum::<f64>() / slopes.len() as f64
    }
}

fn max_of(values: impl Iterator<Item = f64>) -> f64 {
    let m = values.fold(f64::NEG_INFINITY, f64::max);
    if m.is_finite() { m } else { 0.0 }
}

fn min_of(values: impl Iterator<Item = f64>) -> f64 {
    let m = values.fold(f64::INFINITY, f64::min);
    if m.is_finite() { m } else { 0.0 }
}
