//! The coupler facade: the public surface of the crate.
//!
//! A [`Coupler`] owns one tracer chunk, one forest, the two adapt
//! configurations and the per-leaf error arrays, and drives them through
//! the fixed lifecycle: `initialize` → `set_tracer_values`* →
//! `apply_sfc` → `coarsen` → `write_tracer_values`*. Each operation runs
//! to completion on the caller's thread; there is no internal
//! concurrency and no retry logic.

use crate::coarsen::driver;
use crate::coarsen::{CoarsenConfig, CoarsenReport, InterpolateConfig};
use crate::data::{apply_morton_order, AxisMap, Numbering, TracerChunk};
use crate::error::CouplerError;
use crate::forest::{build_forest, AdaptContext, GridMode, QuadForest};

/// The adaptive-mesh coupler for one rectangular data chunk.
#[derive(Debug)]
pub struct Coupler {
    chunk: TracerChunk,
    forest: QuadForest,
    context: AdaptContext,
    coarsen_config: CoarsenConfig,
    interpolate_config: InterpolateConfig,
    /// Max relative error per (leaf, non-mass tracer) of the last merge.
    errors: Vec<f64>,
    /// Lineage-accumulated error per (leaf, non-mass tracer).
    errors_global: Vec<f64>,
}

impl Coupler {
    /// Create a coupler for a chunk of the given shape.
    ///
    /// `axis` names the logical axes of incoming buffers ("XYZ", "ZYX",
    /// …), `shape` their raw storage shape with slot 0 fastest;
    /// `x_start`/`y_start` locate the chunk in the source grid. The
    /// enclosing forest is built immediately; data arrives later through
    /// [`set_tracer_values`](Self::set_tracer_values).
    ///
    /// # Errors
    /// Axis-string, dimension, and sentinel validation errors; see
    /// [`CouplerError`].
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        description: &str,
        axis: &str,
        shape: [usize; 3],
        x_start: i64,
        y_start: i64,
        num_tracers: usize,
        missing_value: f64,
        coarsen_config: CoarsenConfig,
        interpolate_config: InterpolateConfig,
    ) -> Result<Self, CouplerError> {
        let (axes, lengths) = AxisMap::parse(axis, shape)?;
        let [x_length, y_length, _] = lengths;
        let (forest, context) = build_forest(
            x_length as u32,
            y_length as u32,
            x_start,
            y_start,
            GridMode::Coarsen,
        )?;
        let chunk = TracerChunk::new(
            description,
            axes,
            lengths,
            shape,
            x_start,
            y_start,
            num_tracers,
            missing_value,
            context.level,
        )?;
        log::info!(
            "initialized coupler `{}`: {}x{}x{} cells, {} tracers, level {}",
            description,
            x_length,
            y_length,
            lengths[2],
            num_tracers,
            context.level
        );
        Ok(Self {
            chunk,
            forest,
            context,
            coarsen_config,
            interpolate_config,
            errors: Vec::new(),
            errors_global: Vec::new(),
        })
    }

    /// Register a tracer name without supplying data.
    pub fn add_dimension(&mut self, name: &str) -> Result<usize, CouplerError> {
        self.chunk.register_tracer(name)
    }

    /// Register `name` if new and scatter `buffer` into the dense store.
    pub fn set_tracer_values(&mut self, name: &str, buffer: &[f64]) -> Result<(), CouplerError> {
        self.chunk.set_tracer_values(name, buffer)
    }

    /// Reorder the chunk into forest-leaf (Morton) order. One-way.
    pub fn apply_sfc(&mut self) -> Result<(), CouplerError> {
        apply_morton_order(&self.forest, &self.context, &mut self.chunk)
    }

    /// Run the adaptive coarsening loop.
    ///
    /// # Errors
    /// `CoarsenBeforeSfc` unless [`apply_sfc`](Self::apply_sfc) ran
    /// first, plus tracer-resolution errors from the configured
    /// criterion.
    pub fn coarsen(&mut self) -> Result<CoarsenReport, CouplerError> {
        if self.chunk.numbering() != Numbering::Morton {
            return Err(CouplerError::CoarsenBeforeSfc);
        }
        driver::run(
            &mut self.forest,
            &mut self.chunk,
            &mut self.errors,
            &mut self.errors_global,
            &self.coarsen_config,
            &self.interpolate_config,
        )
    }

    /// Current number of forest leaves (post-coarsen element count).
    pub fn get_max_num_elements(&self) -> usize {
        self.forest.num_leaves()
    }

    /// Emit the per-leaf values of one tracer in z-major order.
    pub fn write_tracer_values(&self, name: &str, out: &mut [f64]) -> Result<(), CouplerError> {
        self.chunk.write_tracer_values(name, out)
    }

    /// Discard the coarsened state and return to an empty dense chunk on
    /// the initial uniform forest, keeping tracer registrations.
    pub fn reset(&mut self) -> Result<(), CouplerError> {
        let (forest, context) = build_forest(
            self.context.x_length,
            self.context.y_length,
            self.context.x_start,
            self.context.y_start,
            self.context.mode,
        )?;
        self.forest = forest;
        self.context = context;
        self.chunk.reset();
        self.errors = Vec::new();
        self.errors_global = Vec::new();
        Ok(())
    }

    /// Write the current forest and data as a legacy ASCII VTK file
    /// (debug mode).
    pub fn write_vtk<W: std::io::Write>(&self, writer: W) -> Result<(), CouplerError> {
        crate::io::write_debug_vtk(writer, &self.forest, &self.chunk, &self.errors, &self.errors_global)
    }

    /// The tracer chunk.
    pub fn chunk(&self) -> &TracerChunk {
        &self.chunk
    }

    /// The current forest.
    pub fn forest(&self) -> &QuadForest {
        &self.forest
    }

    /// Geometry of the enclosing forest.
    pub fn context(&self) -> &AdaptContext {
        &self.context
    }

    /// Per-leaf local error maxima, `num_tracers - 1` values per leaf.
    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    /// Per-leaf lineage-accumulated errors.
    pub fn errors_global(&self) -> &[f64] {
        &self.errors_global
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_coupler(x: usize, y: usize, method: &str, threshold: f64) -> Coupler {
        Coupler::initialize(
            "test",
            "XYZ",
            [x, y, 1],
            0,
            0,
            2,
            -1e34,
            CoarsenConfig::parse(method, "q", 0, threshold, None).unwrap(),
            InterpolateConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn coarsen_before_apply_sfc_is_rejected() {
        let mut coupler = uniform_coupler(4, 4, "mean_lower", 10.0);
        assert_eq!(coupler.coarsen().unwrap_err(), CouplerError::CoarsenBeforeSfc);
    }

    #[test]
    fn lifecycle_runs_through() {
        let mut coupler = uniform_coupler(4, 4, "mean_lower", 10.0);
        coupler.set_tracer_values("q", &[5.0; 16]).unwrap();
        coupler.set_tracer_values("mass", &[1.0; 16]).unwrap();
        coupler.apply_sfc().unwrap();
        assert_eq!(coupler.get_max_num_elements(), 16);
        let report = coupler.coarsen().unwrap();
        assert_eq!(report.num_elements, 1);
        assert_eq!(coupler.get_max_num_elements(), 1);
    }

    #[test]
    fn reset_restores_the_initial_grid() {
        let mut coupler = uniform_coupler(4, 4, "mean_lower", 10.0);
        coupler.set_tracer_values("q", &[5.0; 16]).unwrap();
        coupler.set_tracer_values("mass", &[1.0; 16]).unwrap();
        coupler.apply_sfc().unwrap();
        coupler.coarsen().unwrap();
        assert_eq!(coupler.get_max_num_elements(), 1);

        coupler.reset().unwrap();
        assert_eq!(coupler.get_max_num_elements(), 16);
        assert!(coupler.errors().is_empty());

        // A fresh ingest behaves like a new coupler.
        coupler.set_tracer_values("q", &[3.0; 16]).unwrap();
        coupler.set_tracer_values("mass", &[1.0; 16]).unwrap();
        coupler.apply_sfc().unwrap();
        let report = coupler.coarsen().unwrap();
        assert_eq!(report.num_elements, 1);
        let mut out = vec![0.0; 1];
        coupler.write_tracer_values("q", &mut out).unwrap();
        assert_eq!(out[0], 3.0);
    }

    #[test]
    fn invalid_axis_fails_initialization() {
        let err = Coupler::initialize(
            "bad",
            "XXY",
            [4, 4, 1],
            0,
            0,
            1,
            -1e34,
            CoarsenConfig::error_tolerance(0.1),
            InterpolateConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CouplerError::InvalidAxisString(_)));
    }
}
