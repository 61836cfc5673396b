//! Composite indices derived from raw channels
//!
//! Fixed formulas with documented constants, not learned parameters:
//!
//! ```text
//! weather_severity = clamp(0.7 * min(rain / 20 mm, 1) + 0.3 * min(|temp - 20 °C| / 30, 1))
//! pore_stress      = clamp((pore_pressure - 30 kPa) / 40 kPa)
//! disp_stress      = clamp(displacement_rate / 2 mm/h)
//! stability        = 1 - clamp(0.6 * pore_stress + 0.4 * disp_stress)
//! ```
//!
//! A stability of 1 means fully stable.

const RAIN_SATURATION_MM: f64 = 20.0;
const TEMPERATURE_NEUTRAL_C: f64 = 20.0;
const TEMPERATURE_SPAN_C: f64 = 30.0;
const RAIN_WEIGHT: f64 = 0.7;
const TEMPERATURE_WEIGHT: f64 = 0.3;

const PORE_NEUTRAL_KPA: f64 = 30.0;
const PORE_SPAN_KPA: f64 = 40.0;
const DISPLACEMENT_RATE_SPAN_MM_H: f64 = 2.0;
const PORE_WEIGHT: f64 = 0.6;
const DISPLACEMENT_WEIGHT: f64 = 0.4;

fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Weather severity in [0, 1] from rainfall (mm) and temperature (°C)
pub fn weather_severity(rainfall_mm: f64, temperature_c: f64) -> f64 {
    let rain = (rainfall_mm.max(0.0) / RAIN_SATURATION_MM).min(1.0);
    let temp = ((temperature_c - TEMPERATURE_NEUTRAL_C).abs() / TEMPERATURE_SPAN_C).min(1.0);
    unit(RAIN_WEIGHT * rain + TEMPERATURE_WEIGHT * temp)
}

/// Stability index in [0, 1] from pore pressure (kPa) and displacement rate (mm/h)
pub fn stability_index(pore_pressure_kpa: f64, displacement_rate_mm_h: f64) -> f64 {
    let pore_stress = unit((pore_pressure_kpa - PORE_NEUTRAL_KPA) / PORE_SPAN_KPA);
    let disp_stress = unit(displacement_rate_mm_h.abs() / DISPLACEMENT_RATE_SPAN_MM_H);
    1.0 - unit(PORE_WEIGHT * pore_stress + DISPLACEMENT_WEIGHT * disp_stress)
}

/// Ordinary least squares slope of `y` over `x`; 0 for fewer than two distinct x
pub fn ols_slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    if points.len() < 2 {
        return 0.0;
    }
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (x, y) in points {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }
    if sxx <= f64::EPSILON {
        0.0
    } else {
        sxy / sxx
    }
}
