//! Geometry extraction: combine image feature batches
//!
//! Batches are averaged field by field, weighted by upstream processing
//! confidence. A batch with zero confidence contributes nothing. The
//! maximum crack width is the maximum over contributing batches.

use crate::types::ImageFeatureSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAggregate {
    pub batches: usize,
    pub contributing_batches: usize,
    pub slope_angle: Option<f64>,
    pub bench_height: Option<f64>,
    pub bench_width: Option<f64>,
    pub surface_roughness: Option<f64>,
    pub crack_count: Option<f64>,
    pub crack_density: Option<f64>,
    pub crack_width_max: Option<f64>,
    /// Mean displacement-vector magnitude (m)
    pub surface_displacement: Option<f64>,
    /// Mean processing confidence of contributing batches
    pub processing_confidence: f64,
}

#[derive(Default)]
struct Weighted {
    sum: f64,
    weight: f64,
}

impl Weighted {
    fn add(&mut self, value: Option<f64>, weight: f64) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v * weight;
            self.weight += weight;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.weight > 0.0).then(|| self.sum / self.weight)
    }
}

/// Aggregate all batches; `None` when no imagery was submitted
pub fn aggregate_images(batches: &[ImageFeatureSet]) -> Option<ImageAggregate> {
    if batches.is_empty() {
        return None;
    }

    let mut slope = Weighted::default();
    let mut height = Weighted::default();
    let mut width = Weighted::default();
    let mut roughness = Weighted::default();
    let mut count = Weighted::default();
    let mut density = Weighted::default();
    let mut displacement = Weighted::default();
    let mut crack_width_max: Option<f64> = None;
    let mut confidence_sum = 0.0;
    let mut contributing = 0;

    for batch in batches {
        let w = if batch.processing_confidence.is_finite() {
            batch.processing_confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if w <= 0.0 {
            debug!(batch = ?batch.batch_id, "Skipping image batch with zero processing confidence");
            continue;
        }
        contributing += 1;
        confidence_sum += w;

        slope.add(batch.slope_angle, w);
        height.add(batch.bench_height, w);
        width.add(batch.bench_width, w);
        roughness.add(batch.surface_roughness, w);
        count.add(batch.crack_count.map(f64::from), w);
        density.add(batch.crack_density, w);

        if !batch.displacement_vectors.is_empty() {
            let mean = batch.displacement_vectors.iter().map(|v| v.magnitude()).sum::<f64>()
                / batch.displacement_vectors.len() as f64;
            displacement.add(Some(mean), w);
        }

        if let Some(cw) = batch.max_crack_width.filter(|v| v.is_finite()) {
            crack_width_max = Some(crack_width_max.map_or(cw, |m: f64| m.max(cw)));
        }
    }

    let processing_confidence = if contributing > 0 {
        confidence_sum / contributing as f64
    } else {
        0.0
    };

    Some(ImageAggregate {
        batches: batches.len(),
        contributing_batches: contributing,
        slope_angle: slope.mean(),
        bench_height: height.mean(),
        bench_width: width.mean(),
        surface_roughness: roughness.mean(),
        crack_count: count.mean(),
        crack_density: density.mean(),
        crack_width_max,
        surface_displacement: displacement.mean(),
        processing_confidence,
    })
}
