//! Feature layout: the named, bounded features every predictor may reference
//!
//! Each feature has a default scale range, an imputation default, a "safe"
//! baseline and a critical reference point (both in raw units), and a
//! relevance weight used when ranking contributing factors.

use super::FeatureSubset;

/// Version of this layout. The configured scaler must carry the same version.
pub const LAYOUT_VERSION: &str = "rockfall-features-v1";

pub mod names {
    // Per-sample (temporal) channel features
    pub const PORE_PRESSURE: &str = "pore_pressure";
    pub const DISPLACEMENT_RATE: &str = "displacement_rate";
    pub const ACCELERATION: &str = "acceleration";
    pub const RAINFALL: &str = "rainfall";
    pub const TEMPERATURE: &str = "temperature";
    pub const SEISMIC_ACTIVITY: &str = "seismic_activity";

    // Composite indices (per-sample and snapshot)
    pub const WEATHER_SEVERITY_INDEX: &str = "weather_severity_index";
    pub const STABILITY_INDEX: &str = "stability_index";

    // Snapshot aggregates
    pub const PORE_PRESSURE_AVG: &str = "pore_pressure_avg";
    pub const PORE_PRESSURE_MAX: &str = "pore_pressure_max";
    pub const PORE_PRESSURE_TREND: &str = "pore_pressure_trend";
    pub const DISPLACEMENT_MAX: &str = "displacement_max";
    pub const ACCELERATION_MAX: &str = "acceleration_max";
    pub const RAINFALL_TOTAL: &str = "rainfall_total";
    pub const TEMPERATURE_AVG: &str = "temperature_avg";
    pub const TEMPERATURE_RANGE: &str = "temperature_range";
    pub const SEISMIC_EVENT_COUNT: &str = "seismic_event_count";
    pub const SEISMIC_MAGNITUDE_MAX: &str = "seismic_magnitude_max";
    pub const SPATIAL_ADJUSTMENT: &str = "spatial_adjustment";

    // Image-derived
    pub const SLOPE_ANGLE: &str = "slope_angle";
    pub const BENCH_HEIGHT: &str = "bench_height";
    pub const BENCH_WIDTH: &str = "bench_width";
    pub const SURFACE_ROUGHNESS: &str = "surface_roughness";
    pub const CRACK_COUNT: &str = "crack_count";
    pub const CRACK_DENSITY: &str = "crack_density";
    pub const CRACK_WIDTH_MAX: &str = "crack_width_max";
    pub const SURFACE_DISPLACEMENT: &str = "surface_displacement";
    pub const IMAGE_CONFIDENCE: &str = "image_confidence";
}

use names::*;

/// Static definition of one feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureDef {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub baseline: f64,
    pub critical: f64,
    pub relevance: f64,
}

const fn def(
    name: &'static str,
    range: (f64, f64),
    default: f64,
    reference: (f64, f64),
    relevance: f64,
) -> FeatureDef {
    FeatureDef {
        name,
        min: range.0,
        max: range.1,
        default,
        baseline: reference.0,
        critical: reference.1,
        relevance,
    }
}

/// Every feature in the layout
pub const FEATURES: &[FeatureDef] = &[
    def(PORE_PRESSURE, (0.0, 100.0), 30.0, (30.0, 60.0), 0.9),
    def(DISPLACEMENT_RATE, (0.0, 5.0), 0.0, (0.0, 2.0), 0.7),
    def(ACCELERATION, (0.0, 1.0), 0.0, (0.0, 0.2), 0.6),
    def(RAINFALL, (0.0, 50.0), 0.0, (0.0, 20.0), 0.4),
    def(TEMPERATURE, (-20.0, 50.0), 20.0, (20.0, 50.0), 0.1),
    def(SEISMIC_ACTIVITY, (0.0, 6.0), 0.0, (0.0, 4.0), 0.5),
    def(WEATHER_SEVERITY_INDEX, (0.0, 1.0), 0.0, (0.0, 1.0), 0.4),
    def(STABILITY_INDEX, (0.0, 1.0), 1.0, (1.0, 0.4), 0.6),
    def(PORE_PRESSURE_AVG, (0.0, 100.0), 30.0, (30.0, 60.0), 0.9),
    def(PORE_PRESSURE_MAX, (0.0, 100.0), 30.0, (30.0, 60.0), 0.5),
    def(PORE_PRESSURE_TREND, (-5.0, 5.0), 0.0, (0.0, 2.0), 0.4),
    def(DISPLACEMENT_MAX, (0.0, 50.0), 0.0, (0.0, 25.0), 0.3),
    def(ACCELERATION_MAX, (0.0, 1.0), 0.0, (0.0, 0.2), 0.6),
    def(RAINFALL_TOTAL, (0.0, 200.0), 0.0, (0.0, 80.0), 0.4),
    def(TEMPERATURE_AVG, (-20.0, 50.0), 20.0, (20.0, 45.0), 0.1),
    def(TEMPERATURE_RANGE, (0.0, 40.0), 0.0, (0.0, 30.0), 0.1),
    def(SEISMIC_EVENT_COUNT, (0.0, 20.0), 0.0, (0.0, 8.0), 0.4),
    def(SEISMIC_MAGNITUDE_MAX, (0.0, 6.0), 0.0, (0.0, 4.0), 0.5),
    def(SPATIAL_ADJUSTMENT, (0.0, 1.0), 0.5, (0.5, 1.0), 0.0),
    def(SLOPE_ANGLE, (30.0, 90.0), 45.0, (45.0, 75.0), 0.5),
    def(BENCH_HEIGHT, (0.0, 30.0), 10.0, (10.0, 25.0), 0.1),
    def(BENCH_WIDTH, (0.0, 40.0), 8.0, (8.0, 3.0), 0.1),
    def(SURFACE_ROUGHNESS, (0.0, 1.0), 0.5, (0.3, 1.0), 0.2),
    def(CRACK_COUNT, (0.0, 50.0), 0.0, (0.0, 30.0), 0.3),
    def(CRACK_DENSITY, (0.0, 5.0), 0.0, (0.0, 3.0), 0.6),
    def(CRACK_WIDTH_MAX, (0.0, 100.0), 0.0, (0.0, 50.0), 0.3),
    def(SURFACE_DISPLACEMENT, (0.0, 0.5), 0.0, (0.0, 0.3), 0.4),
    def(IMAGE_CONFIDENCE, (0.0, 1.0), 0.0, (1.0, 0.0), 0.0),
];

/// Features of each per-sample vector in the temporal window
pub const TEMPORAL_FEATURES: &[&str] = &[
    PORE_PRESSURE,
    DISPLACEMENT_RATE,
    ACCELERATION,
    RAINFALL,
    TEMPERATURE,
    SEISMIC_ACTIVITY,
    WEATHER_SEVERITY_INDEX,
    STABILITY_INDEX,
];

/// Features of the tabular snapshot vector
pub const SNAPSHOT_FEATURES: &[&str] = &[
    PORE_PRESSURE_AVG,
    PORE_PRESSURE_MAX,
    PORE_PRESSURE_TREND,
    DISPLACEMENT_MAX,
    DISPLACEMENT_RATE,
    ACCELERATION_MAX,
    RAINFALL_TOTAL,
    TEMPERATURE_AVG,
    TEMPERATURE_RANGE,
    SEISMIC_EVENT_COUNT,
    SEISMIC_MAGNITUDE_MAX,
    WEATHER_SEVERITY_INDEX,
    STABILITY_INDEX,
    SPATIAL_ADJUSTMENT,
];

/// Image-derived features
pub const SPATIAL_FEATURES: &[&str] = &[
    SLOPE_ANGLE,
    BENCH_HEIGHT,
    BENCH_WIDTH,
    SURFACE_ROUGHNESS,
    CRACK_COUNT,
    CRACK_DENSITY,
    CRACK_WIDTH_MAX,
    SURFACE_DISPLACEMENT,
    IMAGE_CONFIDENCE,
];

/// Slots the pipeline fills itself (the spatial score fold). They start at
/// their default until filled and are never reported as imputed data.
pub const PLACEHOLDER_FEATURES: &[&str] = &[SPATIAL_ADJUSTMENT];

pub fn is_placeholder(name: &str) -> bool {
    PLACEHOLDER_FEATURES.contains(&name)
}

pub fn feature(name: &str) -> Option<&'static FeatureDef> {
    FEATURES.iter().find(|f| f.name == name)
}

pub fn subset_features(subset: FeatureSubset) -> &'static [&'static str] {
    match subset {
        FeatureSubset::Temporal => TEMPORAL_FEATURES,
        FeatureSubset::Snapshot => SNAPSHOT_FEATURES,
        FeatureSubset::Spatial => SPATIAL_FEATURES,
    }
}
