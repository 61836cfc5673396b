//! Preprocessing: ordering, outlier capping and imputation of sensor readings
//!
//! Readings outside the request window are dropped. Within each device the
//! stream is ordered by timestamp and duplicate timestamps are merged (the
//! later reading wins per channel). Outliers are capped with the IQR rule,
//! then gaps are imputed. Missing values are never an error; an empty
//! window is.

use crate::config::ChannelDefaults;
use crate::error::FeatureError;
use crate::types::{PredictionRequest, SensorChannel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Minimum observations per channel before the IQR rule is applied
const MIN_IQR_SAMPLES: usize = 4;
const IQR_FENCE: f64 = 1.5;

/// One cleaned reading: every channel has a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanSample {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<SensorChannel, f64>,
    /// Channels that carried data (possibly capped) rather than imputed values
    pub observed: BTreeSet<SensorChannel>,
}

impl CleanSample {
    pub fn value(&self, channel: SensorChannel) -> f64 {
        self.values.get(&channel).copied().unwrap_or(0.0)
    }

    pub fn is_observed(&self, channel: SensorChannel) -> bool {
        self.observed.contains(&channel)
    }
}

/// Per-channel preprocessing audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelCleaning {
    pub channel: SensorChannel,
    pub observed: usize,
    /// Filled from neighbouring observations
    pub filled_from_data: usize,
    /// Filled with the configured channel default
    pub filled_default: usize,
    pub outliers_capped: usize,
    /// IQR fences, when enough observations existed
    pub bounds: Option<(f64, f64)>,
}

impl ChannelCleaning {
    fn new(channel: SensorChannel) -> Self {
        Self {
            channel,
            observed: 0,
            filled_from_data: 0,
            filled_default: 0,
            outliers_capped: 0,
            bounds: None,
        }
    }
}

/// Output of the preprocessing stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedWindow {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// All samples ordered by (timestamp, device)
    pub samples: Vec<CleanSample>,
    pub channels: Vec<ChannelCleaning>,
    pub devices: usize,
    pub dropped_outside_window: usize,
    pub duplicates_merged: usize,
}

impl CleanedWindow {
    pub fn channel(&self, channel: SensorChannel) -> Option<&ChannelCleaning> {
        self.channels.iter().find(|c| c.channel == channel)
    }

    /// Samples of one device, in time order
    pub fn device_samples<'a>(&'a self, device_id: &'a str) -> impl Iterator<Item = &'a CleanSample> + 'a {
        self.samples.iter().filter(move |s| s.device_id == device_id)
    }

    pub fn device_ids(&self) -> BTreeSet<&str> {
        self.samples.iter().map(|s| s.device_id.as_str()).collect()
    }
}

/// Clean the request's sensor readings
///
/// # Errors
/// `FeatureError::InsufficientData` when no reading falls inside the window.
pub fn preprocess(
    request: &PredictionRequest,
    defaults: &ChannelDefaults,
) -> Result<CleanedWindow, FeatureError> {
    let window = request.window;

    // device -> timestamp -> channel -> value
    let mut streams: BTreeMap<String, BTreeMap<DateTime<Utc>, BTreeMap<SensorChannel, f64>>> =
        BTreeMap::new();
    let mut dropped_outside_window = 0;
    let mut duplicates_merged = 0;

    for reading in request.sensor_batches.iter().flatten() {
        if !window.contains(reading.timestamp) {
            dropped_outside_window += 1;
            continue;
        }
        let stream = streams.entry(reading.device_id.clone()).or_default();
        if stream.contains_key(&reading.timestamp) {
            duplicates_merged += 1;
        }
        let slot = stream.entry(reading.timestamp).or_default();
        for channel in SensorChannel::ALL {
            if let Some(v) = reading.value(channel) {
                slot.insert(channel, v);
            }
        }
        for name in reading.values.keys() {
            if SensorChannel::from_name(name).is_none() {
                debug!(device = %reading.device_id, channel = %name, "Ignoring unknown sensor channel");
            }
        }
    }

    let total: usize = streams.values().map(BTreeMap::len).sum();
    if total == 0 {
        return Err(FeatureError::InsufficientData(format!(
            "no sensor readings for site '{}' between {} and {}",
            request.site_id, window.start, window.end
        )));
    }

    if dropped_outside_window > 0 {
        warn!(
            dropped = dropped_outside_window,
            "Dropped readings outside the request window"
        );
    }

    let mut samples: Vec<CleanSample> = streams
        .into_iter()
        .flat_map(|(device_id, stream)| {
            stream.into_iter().map(move |(timestamp, values)| CleanSample {
                device_id: device_id.clone(),
                timestamp,
                observed: values.keys().copied().collect(),
                values,
            })
        })
        .collect();
    // Device-major order for per-device imputation
    samples.sort_by(|a, b| (&a.device_id, a.timestamp).cmp(&(&b.device_id, b.timestamp)));

    let mut channels = Vec::with_capacity(SensorChannel::ALL.len());
    for channel in SensorChannel::ALL {
        let mut audit = ChannelCleaning::new(channel);
        cap_outliers(&mut samples, channel, &mut audit);
        impute(&mut samples, channel, defaults.get(channel), &mut audit);
        if audit.observed == 0 {
            warn!(channel = %channel, default = defaults.get(channel), "Channel has no data in window; using default");
        }
        channels.push(audit);
    }

    samples.sort_by(|a, b| (a.timestamp, &a.device_id).cmp(&(b.timestamp, &b.device_id)));
    let devices = samples
        .iter()
        .map(|s| s.device_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    debug!(
        samples = samples.len(),
        devices,
        duplicates_merged,
        "Preprocessing complete"
    );

    Ok(CleanedWindow {
        window_start: window.start,
        window_end: window.end,
        samples,
        channels,
        devices,
        dropped_outside_window,
        duplicates_merged,
    })
}

/// Cap observed values to `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`
fn cap_outliers(samples: &mut [CleanSample], channel: SensorChannel, audit: &mut ChannelCleaning) {
    let mut observed: Vec<f64> = samples
        .iter()
        .filter_map(|s| s.values.get(&channel).copied())
        .collect();
    audit.observed = observed.len();
    if observed.len() < MIN_IQR_SAMPLES {
        return;
    }

    observed.sort_by(f64::total_cmp);
    let q1 = quantile(&observed, 0.25);
    let q3 = quantile(&observed, 0.75);
    let iqr = q3 - q1;
    let (lower, upper) = (q1 - IQR_FENCE * iqr, q3 + IQR_FENCE * iqr);
    audit.bounds = Some((lower, upper));

    for sample in samples.iter_mut() {
        if let Some(v) = sample.values.get_mut(&channel) {
            let capped = v.clamp(lower, upper);
            if capped != *v {
                audit.outliers_capped += 1;
                *v = capped;
            }
        }
    }
    if audit.outliers_capped > 0 {
        debug!(channel = %channel, capped = audit.outliers_capped, lower, upper, "Capped outliers");
    }
}

/// Fill gaps in device-major ordered samples
///
/// Within a device: last known value, or the first known value for leading
/// gaps. A device without any value for the channel takes the window median
/// of other devices; only when the whole window lacks data is the default used.
fn impute(samples: &mut [CleanSample], channel: SensorChannel, default: f64, audit: &mut ChannelCleaning) {
    let mut observed: Vec<f64> = samples
        .iter()
        .filter_map(|s| s.values.get(&channel).copied())
        .collect();
    let window_fill = if observed.is_empty() {
        None
    } else {
        observed.sort_by(f64::total_cmp);
        Some(quantile(&observed, 0.5))
    };

    let mut start = 0;
    while start < samples.len() {
        let mut end = start;
        while end < samples.len() && samples[end].device_id == samples[start].device_id {
            end += 1;
        }
        let device = &mut samples[start..end];

        let first_known = device.iter().find_map(|s| s.values.get(&channel).copied());
        let mut last_known = first_known;
        for sample in device.iter_mut() {
            match sample.values.get(&channel) {
                Some(v) => last_known = Some(*v),
                None => {
                    let (value, from_data) = match last_known.or(window_fill) {
                        Some(v) => (v, true),
                        None => (default, false),
                    };
                    sample.values.insert(channel, value);
                    if from_data {
                        audit.filled_from_data += 1;
                    } else {
                        audit.filled_default += 1;
                    }
                }
            }
        }
        start = end;
    }
}

/// Linear-interpolated quantile of sorted values
pub(crate) fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SensorReading, TimeWindow};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn request(readings: Vec<SensorReading>) -> PredictionRequest {
        PredictionRequest {
            site_id: "pit-north".into(),
            window: TimeWindow {
                start: t0(),
                end: t0() + Duration::hours(24),
            },
            sensor_batches: vec![readings],
            image_batches: vec![],
        }
    }

    #[test]
    fn test_empty_window_is_insufficient_data() {
        let err = preprocess(&request(vec![]), &ChannelDefaults::default()).unwrap_err();
        assert!(matches!(err, FeatureError::InsufficientData(_)));
    }

    #[test]
    fn test_readings_outside_window_are_dropped() {
        let readings = vec![
            SensorReading::new("pz-01", t0() - Duration::hours(1)).with(SensorChannel::PorePressure, 31.0),
            SensorReading::new("pz-01", t0() + Duration::hours(1)).with(SensorChannel::PorePressure, 32.0),
        ];
        let cleaned = preprocess(&request(readings), &ChannelDefaults::default()).expect("clean");
        assert_eq!(cleaned.samples.len(), 1);
        assert_eq!(cleaned.dropped_outside_window, 1);
    }

    #[test]
    fn test_duplicate_timestamps_merge_later_wins() {
        let ts = t0() + Duration::hours(2);
        let readings = vec![
            SensorReading::new("pz-01", ts)
                .with(SensorChannel::PorePressure, 31.0)
                .with(SensorChannel::Rainfall, 1.0),
            SensorReading::new("pz-01", ts).with(SensorChannel::PorePressure, 35.0),
        ];
        let cleaned = preprocess(&request(readings), &ChannelDefaults::default()).expect("clean");
        assert_eq!(cleaned.samples.len(), 1);
        assert_eq!(cleaned.duplicates_merged, 1);
        let sample = &cleaned.samples[0];
        assert_eq!(sample.value(SensorChannel::PorePressure), 35.0);
        assert_eq!(sample.value(SensorChannel::Rainfall), 1.0);
    }

    #[test]
    fn test_imputation_uses_last_known_then_default() {
        let readings = vec![
            SensorReading::new("pz-01", t0() + Duration::hours(1)).with(SensorChannel::PorePressure, 40.0),
            SensorReading::new("pz-01", t0() + Duration::hours(2)),
            SensorReading::new("pz-01", t0() + Duration::hours(3)),
        ];
        let cleaned = preprocess(&request(readings), &ChannelDefaults::default()).expect("clean");

        for sample in &cleaned.samples {
            assert_eq!(sample.value(SensorChannel::PorePressure), 40.0);
            // Temperature never observed: channel default
            assert_eq!(sample.value(SensorChannel::Temperature), 20.0);
            assert!(!sample.is_observed(SensorChannel::Temperature));
        }
        let pore = cleaned.channel(SensorChannel::PorePressure).unwrap();
        assert_eq!(pore.observed, 1);
        assert_eq!(pore.filled_from_data, 2);
        let temp = cleaned.channel(SensorChannel::Temperature).unwrap();
        assert_eq!(temp.filled_default, 3);
    }

    #[test]
    fn test_leading_gap_uses_first_known() {
        let readings = vec![
            SensorReading::new("pz-01", t0() + Duration::hours(1)),
            SensorReading::new("pz-01", t0() + Duration::hours(2)).with(SensorChannel::PorePressure, 42.0),
        ];
        let cleaned = preprocess(&request(readings), &ChannelDefaults::default()).expect("clean");
        assert_eq!(cleaned.samples[0].value(SensorChannel::PorePressure), 42.0);
    }

    #[test]
    fn test_outliers_are_capped_not_dropped() {
        let mut readings: Vec<_> = (0..10)
            .map(|i| {
                SensorReading::new("pz-01", t0() + Duration::hours(i))
                    .with(SensorChannel::PorePressure, 30.0 + (i % 3) as f64)
            })
            .collect();
        readings.push(
            SensorReading::new("pz-01", t0() + Duration::hours(12)).with(SensorChannel::PorePressure, 500.0),
        );

        let cleaned = preprocess(&request(readings), &ChannelDefaults::default()).expect("clean");
        assert_eq!(cleaned.samples.len(), 11);

        let audit = cleaned.channel(SensorChannel::PorePressure).unwrap();
        assert_eq!(audit.outliers_capped, 1);
        let (_, upper) = audit.bounds.unwrap();
        let last = cleaned.samples.last().unwrap();
        assert_eq!(last.value(SensorChannel::PorePressure), upper);
        assert!(upper < 40.0);
    }

    #[test]
    fn test_samples_sorted_across_devices() {
        let readings = vec![
            SensorReading::new("b", t0() + Duration::hours(3)).with(SensorChannel::Rainfall, 0.0),
            SensorReading::new("a", t0() + Duration::hours(2)).with(SensorChannel::Rainfall, 0.0),
            SensorReading::new("b", t0() + Duration::hours(1)).with(SensorChannel::Rainfall, 0.0),
        ];
        let cleaned = preprocess(&request(readings), &ChannelDefaults::default()).expect("clean");
        let order: Vec<_> = cleaned.samples.iter().map(|s| s.timestamp).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
        assert_eq!(cleaned.devices, 2);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
        assert!((quantile(&values, 0.25) - 1.75).abs() < 1e-12);
        assert!((quantile(&values, 0.5) - 2.5).abs() < 1e-12);
    }
}
