//! Interpolation of merged sibling groups and error propagation.
//!
//! When four leaves collapse into their parent, every (layer, tracer)
//! value of the parent record is produced here, together with the two
//! error metrics: the local maximum relative error of the merge and the
//! lineage-accumulated global error.

use crate::coarsen::config::{CustomContext, InterpolateMethod, ZLayerSelect};
use crate::coarsen::predicate::{
    error_ratio, get_max, get_mean, get_min, sum_excluding, weighted_sum_excluding,
};
use crate::data::TracerChunk;
use crate::forest::{MortonId, QuadCell};

/// Double-buffered outputs of one coarsening round.
///
/// Written leaf by leaf while the old buffers are still being read; the
/// driver swaps them in wholesale at round end.
#[derive(Debug)]
pub(crate) struct AdaptBuffers {
    /// New leaf records.
    pub data: Vec<f64>,
    /// New leaf ids.
    pub ids: Vec<MortonId>,
    /// New per-leaf local error maxima (non-mass tracers).
    pub errors: Vec<f64>,
    /// New per-leaf accumulated global errors.
    pub errors_global: Vec<f64>,
}

impl AdaptBuffers {
    pub fn new(num_leaves: usize, record_len: usize, num_error_tracers: usize) -> Self {
        Self {
            data: vec![0.0; num_leaves * record_len],
            ids: vec![0; num_leaves],
            errors: vec![0.0; num_leaves * num_error_tracers],
            errors_global: vec![0.0; num_leaves * num_error_tracers],
        }
    }
}

/// Applies the configured interpolation rule to replacement groups.
pub(crate) struct Interpolator<'a> {
    method: &'a InterpolateMethod,
    missing: f64,
    num_tracers: usize,
    z_length: usize,
}

impl<'a> Interpolator<'a> {
    pub fn new(method: &'a InterpolateMethod, chunk: &TracerChunk) -> Self {
        Self {
            method,
            missing: chunk.missing_value(),
            num_tracers: chunk.num_tracers(),
            z_length: chunk.z_length(),
        }
    }

    /// Number of tracers carrying error metrics (all but the mass tracer).
    #[inline]
    fn num_error_tracers(&self) -> usize {
        self.num_tracers - 1
    }

    /// Carry one unchanged leaf over to the new buffers.
    pub fn copy_record(
        &self,
        chunk: &TracerChunk,
        errors: &[f64],
        errors_global: &[f64],
        old_index: usize,
        new_index: usize,
        out: &mut AdaptBuffers,
    ) {
        let record_len = chunk.record_len();
        out.data[new_index * record_len..(new_index + 1) * record_len]
            .copy_from_slice(chunk.record(old_index));
        let n = self.num_error_tracers();
        out.errors[new_index * n..(new_index + 1) * n]
            .copy_from_slice(&errors[old_index * n..(old_index + 1) * n]);
        out.errors_global[new_index * n..(new_index + 1) * n]
            .copy_from_slice(&errors_global[old_index * n..(old_index + 1) * n]);
    }

    /// Merge four outgoing sibling records into one incoming record and
    /// update both error metrics.
    ///
    /// Mass-weighted rule: the mass tracer (last registered) becomes the
    /// plain sum of the four, everything else the mass-weighted mean;
    /// entries equal to the missing value drop out of both sums, and a
    /// zero mass denominator produces 0.0. The simple reductions and the
    /// custom callback apply per tracer and layer without mass weighting
    /// and without missing-value exclusion.
    pub fn merge_group(
        &self,
        chunk: &TracerChunk,
        errors_global: &[f64],
        first_old: usize,
        new_index: usize,
        cells: &[QuadCell],
        out: &mut AdaptBuffers,
    ) {
        let record_len = chunk.record_len();
        let t_count = self.num_tracers;
        let mass_index = t_count - 1;
        let n = self.num_error_tracers();
        let mut local = vec![0.0f64; n];

        for z in 0..self.z_length {
            let sibling = |e: usize, t: usize| chunk.value(first_old + e, z, t);
            let out_slot = new_index * record_len + z * t_count;

            match self.method {
                InterpolateMethod::MassWeighted => {
                    let mass: Vec<f64> = (0..4).map(|e| sibling(e, mass_index)).collect();
                    let total_mass = sum_excluding(&mass, self.missing);
                    out.data[out_slot + mass_index] = total_mass;
                    for t in 0..mass_index {
                        let values: Vec<f64> = (0..4).map(|e| sibling(e, t)).collect();
                        let interpolated = if total_mass == 0.0 {
                            0.0
                        } else {
                            weighted_sum_excluding(&values, &mass, self.missing) / total_mass
                        };
                        out.data[out_slot + t] = interpolated;
                        self.fold_errors(&mut local[t], &values, interpolated);
                    }
                }
                InterpolateMethod::Mean | InterpolateMethod::Min | InterpolateMethod::Max => {
                    for t in 0..t_count {
                        let values: Vec<f64> = (0..4).map(|e| sibling(e, t)).collect();
                        let value = match self.method {
                            InterpolateMethod::Mean => get_mean(&values),
                            InterpolateMethod::Min => get_min(&values),
                            _ => get_max(&values),
                        };
                        out.data[out_slot + t] = value;
                        if t < mass_index {
                            self.fold_errors(&mut local[t], &values, value);
                        }
                    }
                }
                InterpolateMethod::Custom(func) => {
                    let coords: Vec<(u32, u32)> = cells.iter().map(|c| (c.x, c.y)).collect();
                    for t in 0..t_count {
                        let values: Vec<f64> = (0..4).map(|e| sibling(e, t)).collect();
                        let tracer = chunk
                            .tracer_names()
                            .get(t)
                            .map(String::as_str)
                            .unwrap_or("");
                        let value = func(&CustomContext {
                            tracer,
                            z_layer: ZLayerSelect::Layer(z),
                            values: &values,
                            coords: &coords,
                        });
                        out.data[out_slot + t] = value;
                        if t < mass_index {
                            self.fold_errors(&mut local[t], &values, value);
                        }
                    }
                }
            }
        }

        for t in 0..n {
            let inherited = (0..4)
                .map(|e| errors_global[(first_old + e) * n + t])
                .fold(0.0, f64::max);
            out.errors[new_index * n + t] = local[t];
            out.errors_global[new_index * n + t] = inherited + local[t];
        }
    }

    /// Fold the relative errors of one (layer, tracer) into the running
    /// local maximum.
    fn fold_errors(&self, local: &mut f64, values: &[f64], interpolated: f64) {
        for &v in values {
            *local = local.max(error_ratio(v, interpolated, self.missing));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coarsen::config::InterpolateFn;
    use crate::data::AxisMap;
    use std::sync::Arc;

    const MISSING: f64 = -1e34;

    fn morton_chunk(records: &[(f64, f64)]) -> TracerChunk {
        let (axes, lengths) = AxisMap::parse("XYZ", [2, 2, 1]).unwrap();
        let mut chunk = TracerChunk::new(
            "interp",
            axes,
            lengths,
            [2, 2, 1],
            0,
            0,
            2,
            MISSING,
            1,
        )
        .unwrap();
        chunk.register_tracer("q").unwrap();
        chunk.register_tracer("mass").unwrap();
        let mut data = Vec::new();
        for &(q, m) in records {
            data.push(q);
            data.push(m);
        }
        chunk.install_morton_order(data, (0..records.len() as u64).collect());
        chunk
    }

    fn cells() -> [QuadCell; 4] {
        QuadCell::ROOT.children()
    }

    #[test]
    fn mass_weighted_merge_conserves_mass() {
        let chunk = morton_chunk(&[(2.0, 1.0), (4.0, 3.0), (6.0, 2.0), (8.0, 2.0)]);
        let method = InterpolateMethod::MassWeighted;
        let interp = Interpolator::new(&method, &chunk);
        let mut out = AdaptBuffers::new(1, 2, 1);
        let errors_global = vec![0.0; 4];
        interp.merge_group(&chunk, &errors_global, 0, 0, &cells(), &mut out);

        // mass: 1+3+2+2 = 8, q: (2+12+12+16)/8 = 5.25
        assert_eq!(out.data[1], 8.0);
        assert!((out.data[0] - 5.25).abs() < 1e-12);
        // worst relative error: |2 - 5.25| / 2 = 1.625
        assert!((out.errors[0] - 1.625).abs() < 1e-12);
        assert_eq!(out.errors[0], out.errors_global[0]);
    }

    #[test]
    fn missing_values_drop_out_of_both_sums() {
        let chunk = morton_chunk(&[(2.0, 1.0), (MISSING, 1.0), (4.0, MISSING), (6.0, 1.0)]);
        let method = InterpolateMethod::MassWeighted;
        let interp = Interpolator::new(&method, &chunk);
        let mut out = AdaptBuffers::new(1, 2, 1);
        interp.merge_group(&chunk, &[0.0; 4], 0, 0, &cells(), &mut out);

        // mass skips the sentinel: 1+1+1 = 3
        assert_eq!(out.data[1], 3.0);
        // weighted sum skips pairs with a missing side: (2*1 + 6*1)/3
        assert!((out.data[0] - 8.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn all_missing_group_produces_zero_value_and_error() {
        let chunk = morton_chunk(&[(MISSING, MISSING); 4]);
        let method = InterpolateMethod::MassWeighted;
        let interp = Interpolator::new(&method, &chunk);
        let mut out = AdaptBuffers::new(1, 2, 1);
        interp.merge_group(&chunk, &[0.0; 4], 0, 0, &cells(), &mut out);
        assert_eq!(out.data[0], 0.0);
        assert_eq!(out.errors[0], 0.0);
        assert_eq!(out.errors_global[0], 0.0);
    }

    #[test]
    fn global_error_accumulates_over_the_worst_child() {
        let chunk = morton_chunk(&[(5.0, 1.0); 4]);
        let method = InterpolateMethod::MassWeighted;
        let interp = Interpolator::new(&method, &chunk);
        let mut out = AdaptBuffers::new(1, 2, 1);
        let inherited = vec![0.1, 0.4, 0.2, 0.3];
        interp.merge_group(&chunk, &inherited, 0, 0, &cells(), &mut out);
        // Equal values interpolate exactly: local error 0, global carries
        // the worst child forward.
        assert_eq!(out.errors[0], 0.0);
        assert!((out.errors_global[0] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn simple_mean_covers_every_tracer_including_mass() {
        let chunk = morton_chunk(&[(1.0, 4.0), (2.0, 4.0), (3.0, 4.0), (6.0, 4.0)]);
        let method = InterpolateMethod::Mean;
        let interp = Interpolator::new(&method, &chunk);
        let mut out = AdaptBuffers::new(1, 2, 1);
        interp.merge_group(&chunk, &[0.0; 4], 0, 0, &cells(), &mut out);
        assert_eq!(out.data[0], 3.0);
        assert_eq!(out.data[1], 4.0);
        // |1 - 3| / 1 = 2
        assert_eq!(out.errors[0], 2.0);
    }

    #[test]
    fn custom_interpolation_drives_every_slot() {
        let chunk = morton_chunk(&[(1.0, 1.0); 4]);
        let func: InterpolateFn = Arc::new(|ctx: &CustomContext<'_>| {
            assert_eq!(ctx.values.len(), 4);
            match ctx.tracer {
                "q" => 42.0,
                _ => 7.0,
            }
        });
        let method = InterpolateMethod::Custom(func);
        let interp = Interpolator::new(&method, &chunk);
        let mut out = AdaptBuffers::new(1, 2, 1);
        interp.merge_group(&chunk, &[0.0; 4], 0, 0, &cells(), &mut out);
        assert_eq!(out.data[0], 42.0);
        assert_eq!(out.data[1], 7.0);
    }

    #[test]
    fn copy_record_preserves_values_and_errors() {
        let chunk = morton_chunk(&[(1.0, 2.0), (3.0, 4.0), (5.0, 6.0), (7.0, 8.0)]);
        let method = InterpolateMethod::MassWeighted;
        let interp = Interpolator::new(&method, &chunk);
        let mut out = AdaptBuffers::new(4, 2, 1);
        let errors = vec![0.1, 0.2, 0.3, 0.4];
        let errors_global = vec![1.0, 2.0, 3.0, 4.0];
        interp.copy_record(&chunk, &errors, &errors_global, 2, 0, &mut out);
        assert_eq!(&out.data[0..2], &[5.0, 6.0]);
        assert_eq!(out.errors[0], 0.3);
        assert_eq!(out.errors_global[0], 3.0);
    }
}
