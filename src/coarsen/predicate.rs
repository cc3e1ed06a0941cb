//! Merge predicates for sibling groups.
//!
//! A predicate sees four sibling leaves and decides whether they collapse
//! into their parent. The threshold family reduces the sibling values of
//! one tracer at a layer selection and compares; the error-tolerance
//! criterion simulates the mass-weighted interpolation and admits the
//! merge only when every (layer, tracer) stays within tolerance; custom
//! predicates get the raw values and coordinates.

use crate::coarsen::config::{
    CoarsenConfig, CoarsenCriterion, CustomContext, Reduction, Relation, ZLayerSelect,
};
use crate::data::TracerChunk;
use crate::error::CouplerError;
use crate::forest::QuadCell;

/// Arithmetic mean of `values`.
///
/// The simple reductions do not exclude the missing-value sentinel; only
/// the mass-weighted path does.
#[inline]
pub(crate) fn get_mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Largest of `values`.
#[inline]
pub(crate) fn get_max(values: &[f64]) -> f64 {
    values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b))
}

/// Smallest of `values`.
#[inline]
pub(crate) fn get_min(values: &[f64]) -> f64 {
    values.iter().fold(f64::INFINITY, |a, &b| a.min(b))
}

/// Sum of `values`, skipping entries equal to `missing`.
#[inline]
pub(crate) fn sum_excluding(values: &[f64], missing: f64) -> f64 {
    values
        .iter()
        .filter(|&&v| v != missing)
        .sum()
}

/// Dot product of `a` and `b`, skipping pairs where either side equals
/// `missing`.
#[inline]
pub(crate) fn weighted_sum_excluding(a: &[f64], b: &[f64], missing: f64) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(&v, &w)| v != missing && w != missing)
        .map(|(&v, &w)| v * w)
        .sum()
}

/// Relative error of `value` against `interpolated`; missing or zero
/// values contribute nothing.
#[inline]
pub(crate) fn error_ratio(value: f64, interpolated: f64, missing: f64) -> f64 {
    if value == missing || value == 0.0 {
        0.0
    } else {
        ((value - interpolated) / value).abs()
    }
}

/// A coarsen criterion with its tracer reference resolved against the
/// chunk, ready to be called once per sibling group.
pub(crate) struct CoarsenPredicate<'a> {
    config: &'a CoarsenConfig,
    /// Resolved index of `config.tracer`; unused by the error-tolerance
    /// criterion.
    tracer: usize,
}

impl<'a> CoarsenPredicate<'a> {
    /// Resolve the configured tracer.
    ///
    /// # Errors
    /// `UnknownTracer` when a threshold or custom criterion names a
    /// tracer that was never registered, `InvalidDimension` when a fixed
    /// z-layer is out of range.
    pub fn new(config: &'a CoarsenConfig, chunk: &TracerChunk) -> Result<Self, CouplerError> {
        let tracer = match config.criterion {
            CoarsenCriterion::ErrorTolerance { .. } => 0,
            _ => chunk
                .lookup_tracer(&config.tracer)
                .ok_or_else(|| CouplerError::UnknownTracer(config.tracer.clone()))?,
        };
        if let ZLayerSelect::Layer(z) = config.z_layer {
            if !matches!(config.criterion, CoarsenCriterion::ErrorTolerance { .. })
                && z >= chunk.z_length()
            {
                return Err(CouplerError::InvalidDimension {
                    name: "z_layer",
                    value: z as i64,
                });
            }
        }
        Ok(Self { config, tracer })
    }

    /// Decide whether the four sibling leaves starting at record `first`
    /// merge into their parent.
    pub fn should_merge(&self, chunk: &TracerChunk, first: usize, cells: &[QuadCell; 4]) -> bool {
        match &self.config.criterion {
            CoarsenCriterion::Threshold {
                reduction,
                relation,
                threshold,
            } => {
                let values = self.select_values(chunk, first);
                let value = match reduction {
                    Reduction::Min => get_min(&values),
                    Reduction::Max => get_max(&values),
                    Reduction::Mean => get_mean(&values),
                };
                match relation {
                    Relation::Lower => value < *threshold,
                    Relation::Higher => value > *threshold,
                }
            }
            CoarsenCriterion::ErrorTolerance { tolerance } => {
                self.within_error_tolerance(chunk, first, *tolerance)
            }
            CoarsenCriterion::Custom(func) => {
                let values = self.select_values(chunk, first);
                let coords: Vec<(u32, u32)> = cells.iter().map(|c| (c.x, c.y)).collect();
                func(&CustomContext {
                    tracer: &self.config.tracer,
                    z_layer: self.config.z_layer,
                    values: &values,
                    coords: &coords,
                })
            }
        }
    }

    /// Per-sibling values of the configured tracer under the layer
    /// selection.
    fn select_values(&self, chunk: &TracerChunk, first: usize) -> [f64; 4] {
        let mut values = [0.0; 4];
        for (e, value) in values.iter_mut().enumerate() {
            *value = match self.config.z_layer {
                ZLayerSelect::Layer(z) => chunk.value(first + e, z, self.tracer),
                select => {
                    let column: Vec<f64> = (0..chunk.z_length())
                        .map(|z| chunk.value(first + e, z, self.tracer))
                        .collect();
                    match select {
                        ZLayerSelect::Mean => get_mean(&column),
                        ZLayerSelect::Max => get_max(&column),
                        ZLayerSelect::Min => get_min(&column),
                        ZLayerSelect::Layer(_) => unreachable!(),
                    }
                }
            };
        }
        values
    }

    /// Simulate the mass-weighted interpolation and check every
    /// (layer, tracer) against the tolerance.
    fn within_error_tolerance(&self, chunk: &TracerChunk, first: usize, tolerance: f64) -> bool {
        let missing = chunk.missing_value();
        let mass_index = chunk.num_tracers() - 1;
        for z in 0..chunk.z_length() {
            let mass: Vec<f64> = (0..4).map(|e| chunk.value(first + e, z, mass_index)).collect();
            let total_mass = sum_excluding(&mass, missing);
            for tracer in 0..mass_index {
                let values: Vec<f64> =
                    (0..4).map(|e| chunk.value(first + e, z, tracer)).collect();
                let interpolated = if total_mass == 0.0 {
                    0.0
                } else {
                    weighted_sum_excluding(&values, &mass, missing) / total_mass
                };
                let worst = values
                    .iter()
                    .map(|&v| error_ratio(v, interpolated, missing))
                    .fold(0.0, f64::max);
                if worst > tolerance {
                    return false;
                }
            }
        }
        true
    }
}
