//! Coarsening and interpolation configuration.
//!
//! Method choice is a tagged sum type; the `custom` variants carry the
//! user callback directly, so a custom method without a function is
//! unrepresentable. [`CoarsenConfig::parse`] and
//! [`InterpolateConfig::parse`] accept the textual method names used by
//! the host model interface.

use std::fmt;
use std::sync::Arc;

use crate::error::CouplerError;

/// Tolerance used by the error-tolerance criterion when none is supplied.
pub const DEFAULT_ERROR_TOLERANCE: f64 = 0.10;

/// Reduction over the values of a sibling group or a z-column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Reduction {
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// Arithmetic mean.
    Mean,
}

/// Which side of the threshold triggers a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Relation {
    /// Merge when the reduction is strictly below the threshold.
    Lower,
    /// Merge when the reduction is strictly above the threshold.
    Higher,
}

/// Altitude-layer selection for the threshold and custom criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ZLayerSelect {
    /// A single z-layer.
    Layer(usize),
    /// Per-sibling mean over all layers.
    Mean,
    /// Per-sibling maximum over all layers.
    Max,
    /// Per-sibling minimum over all layers.
    Min,
}

impl ZLayerSelect {
    /// Decode the host convention: `k ≥ 0` selects layer k, `-1` the
    /// layer mean, `-2` the layer maximum, `-3` the layer minimum.
    pub fn from_code(code: i64) -> Result<Self, CouplerError> {
        match code {
            k if k >= 0 => Ok(ZLayerSelect::Layer(k as usize)),
            -1 => Ok(ZLayerSelect::Mean),
            -2 => Ok(ZLayerSelect::Max),
            -3 => Ok(ZLayerSelect::Min),
            _ => Err(CouplerError::InvalidDimension {
                name: "z_layer",
                value: code,
            }),
        }
    }
}

/// Inputs handed to a custom coarsening or interpolation callback.
///
/// `values` holds one entry per sibling, `coords` the matching cell
/// anchors on the reference grid.
#[derive(Debug)]
pub struct CustomContext<'a> {
    /// Name of the tracer the values belong to.
    pub tracer: &'a str,
    /// The layer (or layer reduction) the values were taken from.
    pub z_layer: ZLayerSelect,
    /// One value per sibling.
    pub values: &'a [f64],
    /// (x, y) anchor of each sibling.
    pub coords: &'a [(u32, u32)],
}

/// User-supplied merge predicate: true merges the sibling group.
pub type CoarsenFn = Arc<dyn Fn(&CustomContext<'_>) -> bool + Send + Sync>;

/// User-supplied interpolation: produces the merged value.
pub type InterpolateFn = Arc<dyn Fn(&CustomContext<'_>) -> f64 + Send + Sync>;

/// The merge criterion of the adaptive coarsener.
#[derive(Clone)]
pub enum CoarsenCriterion {
    /// Reduce the sibling values and compare against a threshold.
    Threshold {
        /// Reduction over the four sibling values.
        reduction: Reduction,
        /// Merge side of the comparison.
        relation: Relation,
        /// Comparison value.
        threshold: f64,
    },
    /// Merge only when the would-be interpolation error stays within
    /// tolerance for every layer and tracer.
    ErrorTolerance {
        /// Maximum admissible relative error.
        tolerance: f64,
    },
    /// User-supplied predicate.
    Custom(CoarsenFn),
}

impl fmt::Debug for CoarsenCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoarsenCriterion::Threshold {
                reduction,
                relation,
                threshold,
            } => f
                .debug_struct("Threshold")
                .field("reduction", reduction)
                .field("relation", relation)
                .field("threshold", threshold)
                .finish(),
            CoarsenCriterion::ErrorTolerance { tolerance } => f
                .debug_struct("ErrorTolerance")
                .field("tolerance", tolerance)
                .finish(),
            CoarsenCriterion::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Full coarsening configuration.
#[derive(Debug, Clone)]
pub struct CoarsenConfig {
    /// The merge criterion.
    pub criterion: CoarsenCriterion,
    /// Tracer driving threshold and custom criteria.
    pub tracer: String,
    /// Layer selection for threshold and custom criteria.
    pub z_layer: ZLayerSelect,
}

impl CoarsenConfig {
    /// Build a config from the textual method names of the host
    /// interface: `mean_lower`, `mean_higher`, `min_lower`, `min_higher`,
    /// `max_lower`, `max_higher`, `custom`, `error_tol`.
    ///
    /// For `error_tol` the `threshold` argument is the error tolerance;
    /// a non-finite value selects [`DEFAULT_ERROR_TOLERANCE`].
    ///
    /// # Errors
    /// `UnknownMethod` for unrecognised names, `MissingCustomFunction`
    /// for `custom` without a callback, plus z-layer code errors.
    pub fn parse(
        method: &str,
        tracer: &str,
        z_layer: i64,
        threshold: f64,
        func: Option<CoarsenFn>,
    ) -> Result<Self, CouplerError> {
        let z_layer = ZLayerSelect::from_code(z_layer)?;
        let threshold_criterion = |reduction, relation| CoarsenCriterion::Threshold {
            reduction,
            relation,
            threshold,
        };
        let criterion = match method {
            "mean_lower" => threshold_criterion(Reduction::Mean, Relation::Lower),
            "mean_higher" => threshold_criterion(Reduction::Mean, Relation::Higher),
            "min_lower" => threshold_criterion(Reduction::Min, Relation::Lower),
            "min_higher" => threshold_criterion(Reduction::Min, Relation::Higher),
            "max_lower" => threshold_criterion(Reduction::Max, Relation::Lower),
            "max_higher" => threshold_criterion(Reduction::Max, Relation::Higher),
            "custom" => CoarsenCriterion::Custom(func.ok_or(
                CouplerError::MissingCustomFunction { kind: "coarsen" },
            )?),
            "error_tol" => CoarsenCriterion::ErrorTolerance {
                tolerance: if threshold.is_finite() {
                    threshold
                } else {
                    DEFAULT_ERROR_TOLERANCE
                },
            },
            _ => {
                return Err(CouplerError::UnknownMethod {
                    kind: "coarsen",
                    method: method.to_string(),
                })
            }
        };
        Ok(Self {
            criterion,
            tracer: tracer.trim().to_string(),
            z_layer,
        })
    }

    /// The default quantitative criterion: error tolerance.
    pub fn error_tolerance(tolerance: f64) -> Self {
        Self {
            criterion: CoarsenCriterion::ErrorTolerance { tolerance },
            tracer: String::new(),
            z_layer: ZLayerSelect::Layer(0),
        }
    }
}

/// How merged tracer values are produced.
#[derive(Clone)]
pub enum InterpolateMethod {
    /// Mass-weighted mean, with the last tracer as the weight.
    MassWeighted,
    /// Arithmetic mean per tracer and layer.
    Mean,
    /// Minimum per tracer and layer.
    Min,
    /// Maximum per tracer and layer.
    Max,
    /// User-supplied interpolation.
    Custom(InterpolateFn),
}

impl fmt::Debug for InterpolateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpolateMethod::MassWeighted => f.write_str("MassWeighted"),
            InterpolateMethod::Mean => f.write_str("Mean"),
            InterpolateMethod::Min => f.write_str("Min"),
            InterpolateMethod::Max => f.write_str("Max"),
            InterpolateMethod::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Full interpolation configuration.
#[derive(Debug, Clone)]
pub struct InterpolateConfig {
    /// The interpolation rule.
    pub method: InterpolateMethod,
}

impl InterpolateConfig {
    /// Build a config from the textual method names: `mass_weighted`,
    /// `mean`, `min`, `max`, `custom`.
    pub fn parse(method: &str, func: Option<InterpolateFn>) -> Result<Self, CouplerError> {
        let method = match method {
            "mass_weighted" => InterpolateMethod::MassWeighted,
            "mean" => InterpolateMethod::Mean,
            "min" => InterpolateMethod::Min,
            "max" => InterpolateMethod::Max,
            "custom" => InterpolateMethod::Custom(func.ok_or(
                CouplerError::MissingCustomFunction {
                    kind: "interpolate",
                },
            )?),
            _ => {
                return Err(CouplerError::UnknownMethod {
                    kind: "interpolate",
                    method: method.to_string(),
                })
            }
        };
        Ok(Self { method })
    }
}

impl Default for InterpolateConfig {
    fn default() -> Self {
        Self {
            method: InterpolateMethod::MassWeighted,
        }
    }
}
