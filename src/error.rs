//! CouplerError: unified error type for the latlon-amr public APIs.
//!
//! Every public operation either succeeds or reports one of these
//! conditions; nothing panics across the crate boundary.

use thiserror::Error;

/// Unified error type for coupler operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CouplerError {
    /// Axis string did not contain exactly one occurrence of each used axis.
    #[error("invalid axis string `{0}`: expected at most one each of 'X', 'Y', 'Z'")]
    InvalidAxisString(String),
    /// A grid dimension was zero or negative.
    #[error("invalid grid dimension: {name} = {value} (must be positive)")]
    InvalidDimension {
        /// Which dimension was rejected.
        name: &'static str,
        /// The offending value.
        value: i64,
    },
    /// The missing-value sentinel was NaN, which never compares equal to itself.
    #[error("missing_value sentinel must not be NaN")]
    NanMissingValue,
    /// Referenced a tracer name that was never registered.
    #[error("unknown tracer `{0}`")]
    UnknownTracer(String),
    /// Tried to register more tracer names than the chunk was created for.
    #[error("tracer table full: chunk was created for {capacity} tracers")]
    TracerTableFull {
        /// `num_tracers` the chunk was created with.
        capacity: usize,
    },
    /// An input buffer did not match the expected element count.
    #[error("buffer length mismatch: expected {expected} values, got {found}")]
    BufferLengthMismatch {
        /// Required number of scalars.
        expected: usize,
        /// Number of scalars supplied.
        found: usize,
    },
    /// Operation requires the chunk in a different numbering state.
    #[error("chunk is {found} but the operation requires {required}")]
    WrongNumbering {
        /// Numbering required by the operation.
        required: &'static str,
        /// Numbering the chunk is currently in.
        found: &'static str,
    },
    /// `coarsen` was called before `apply_sfc`.
    #[error("coarsen requires apply_sfc to have run first")]
    CoarsenBeforeSfc,
    /// Coarsen or interpolate method string was not recognised.
    #[error("unknown {kind} method `{method}`")]
    UnknownMethod {
        /// "coarsen" or "interpolate".
        kind: &'static str,
        /// The rejected method string.
        method: String,
    },
    /// A `custom` method was selected without supplying a function.
    #[error("{kind} method is `custom` but no function was supplied")]
    MissingCustomFunction {
        /// "coarsen" or "interpolate".
        kind: &'static str,
    },
    /// Internal chunk invariant violated (see `DebugInvariants`).
    #[error("chunk invariant violated: {0}")]
    BrokenInvariant(String),
    /// Underlying I/O failure while writing debug output.
    #[error("vtk write failed: {0}")]
    VtkWrite(String),
}

impl From<std::io::Error> for CouplerError {
    fn from(e: std::io::Error) -> Self {
        CouplerError::VtkWrite(e.to_string())
    }
}
