//! The adaptive coarsening subsystem: configuration, merge predicates,
//! interpolation, and the round loop.

pub mod config;
pub mod driver;
pub mod interpolate;
pub mod predicate;

pub use config::{
    CoarsenConfig, CoarsenCriterion, CoarsenFn, CustomContext, InterpolateConfig,
    InterpolateFn, InterpolateMethod, Reduction, Relation, ZLayerSelect,
    DEFAULT_ERROR_TOLERANCE,
};
pub use driver::{CoarsenReport, MAX_COARSEN_ROUNDS};
