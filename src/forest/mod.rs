//! The lat/lon refinement kernel: quad cells, Morton indices, forest
//! construction and the coarsening/replacement primitives.

pub mod builder;
pub mod cell;
pub mod forest;
pub mod morton;

pub use builder::{build_forest, AdaptContext, GridMode};
pub use cell::QuadCell;
pub use forest::{iterate_replace, QuadForest, Replacement};
pub use morton::MortonId;
