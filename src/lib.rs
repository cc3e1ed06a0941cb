//! # latlon-amr
//!
//! latlon-amr is an adaptive mesh refinement coupler for Earth-system-model
//! tracer data on rectangular longitude/latitude/altitude grids. It ingests a
//! dense 4D chunk (X × Y × Z × tracers), reorders it along the Morton
//! space-filling curve of the smallest enclosing quad forest, and then
//! iteratively merges geographically adjacent cells whose tracer values are
//! locally similar, producing a content-adaptive forest with per-cell tracer
//! values and per-tracer interpolation error estimates.
//!
//! ## Features
//! - Quad-forest construction for arbitrary rectangles with Morton-ordered
//!   traversal guarantees
//! - Dense-to-SFC data reordering with axis permutation and north-up input
//!   handling
//! - Configurable coarsening criteria (threshold family, interpolation-error
//!   tolerance, custom predicates) and interpolation rules (mass-weighted,
//!   reductions, custom)
//! - Local and lineage-accumulated error tracking per tracer
//! - Legacy ASCII VTK debug output
//!
//! ## Usage
//! ```rust
//! use latlon_amr::prelude::*;
//!
//! # fn try_main() -> Result<(), latlon_amr::error::CouplerError> {
//! let mut coupler = Coupler::initialize(
//!     "demo",
//!     "XYZ",
//!     [4, 4, 1],
//!     0,
//!     0,
//!     2,
//!     -1e34,
//!     CoarsenConfig::error_tolerance(0.10),
//!     InterpolateConfig::default(),
//! )?;
//! coupler.set_tracer_values("vapour", &[5.0; 16])?;
//! coupler.set_tracer_values("mass", &[1.0; 16])?;
//! coupler.apply_sfc()?;
//! let report = coupler.coarsen()?;
//! assert_eq!(report.num_elements, coupler.get_max_num_elements());
//! # Ok(())
//! # }
//! # try_main().unwrap();
//! ```
//!
//! The coarsening loop is single-threaded and deterministic: sibling groups
//! are presented in Morton order, adapt buffers are double-buffered within a
//! round, and a round that changes nothing is a fixed point.

// Re-export our major subsystems:
pub mod coarsen;
pub mod coupler;
pub mod data;
pub mod debug_invariants;
pub mod error;
pub mod forest;
pub mod io;

/// A convenient prelude to import the most-used types:
pub mod prelude {
    pub use crate::coarsen::{
        CoarsenConfig, CoarsenCriterion, CoarsenReport, CustomContext, InterpolateConfig,
        InterpolateMethod, Reduction, Relation, ZLayerSelect,
    };
    pub use crate::coupler::Coupler;
    pub use crate::data::{AxisMap, Numbering, TracerChunk};
    pub use crate::error::CouplerError;
    pub use crate::forest::{build_forest, AdaptContext, GridMode, MortonId, QuadCell, QuadForest};
    pub use crate::io::write_debug_vtk;
}
