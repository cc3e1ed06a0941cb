//! `TracerChunk`: the contiguous tracer store.
//!
//! A chunk holds every tracer of a rectangular lat/lon/altitude sub-grid
//! in one flat `f64` buffer. It starts in DENSE numbering, laid out
//! y-row-major with the tracer axis innermost, and is converted once into
//! MORTON numbering (one record per forest leaf, in space-filling-curve
//! order) by [`apply_morton_order`](crate::data::reorder::apply_morton_order).
//!
//! # Invariants
//!
//! - DENSE: `data.len() == x_length · y_length · z_length · num_tracers`;
//!   the element (x, y, z, t) lives at
//!   `((y·z_length·x_length + x·z_length + z)·num_tracers) + t` and
//!   `data_ids` is empty. Input row y = 0 is the *top* row (north-up): it
//!   is stored at internal row `y_length - 1`.
//! - MORTON: `data.len() == data_ids.len() · z_length · num_tracers`;
//!   record `i` is the `i`-th forest leaf's values, z-major tracer-minor;
//!   `data_ids` is strictly increasing.
//! - `tracer_names` holds at most `num_tracers` unique names; lookup is a
//!   linear scan.
//!
//! Violations are caught by [`DebugInvariants`] in debug builds and under
//! the `check-invariants` feature.

use crate::data::axes::AxisMap;
use crate::debug_invariants::DebugInvariants;
use crate::error::CouplerError;
use crate::forest::MortonId;

/// Which layout the chunk's `data` buffer currently uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Numbering {
    /// Dense input layout, indexed by (x, y, z, tracer).
    Dense,
    /// One record per forest leaf, in Morton order.
    Morton,
}

impl Numbering {
    fn name(self) -> &'static str {
        match self {
            Numbering::Dense => "DENSE",
            Numbering::Morton => "MORTON",
        }
    }
}

/// The contiguous tracer store plus the metadata describing its layout.
#[derive(Debug, Clone)]
pub struct TracerChunk {
    description: String,
    x_start: i64,
    y_start: i64,
    x_length: usize,
    y_length: usize,
    z_length: usize,
    shape: [usize; 3],
    axes: AxisMap,
    num_tracers: usize,
    missing_value: f64,
    max_level: u8,
    tracer_names: Vec<String>,
    data: Vec<f64>,
    data_ids: Vec<MortonId>,
    numbering: Numbering,
}

impl TracerChunk {
    /// Create an empty DENSE chunk.
    ///
    /// `lengths` are the canonical (x, y, z) extents already resolved from
    /// the axis string; `shape` is the raw storage shape of incoming
    /// buffers.
    ///
    /// # Errors
    /// `NanMissingValue` when the sentinel is NaN (NaN never compares
    /// equal to itself, so it could never match), `InvalidDimension` when
    /// `num_tracers` or `z_length` is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        description: &str,
        axes: AxisMap,
        lengths: [usize; 3],
        shape: [usize; 3],
        x_start: i64,
        y_start: i64,
        num_tracers: usize,
        missing_value: f64,
        max_level: u8,
    ) -> Result<Self, CouplerError> {
        if missing_value.is_nan() {
            return Err(CouplerError::NanMissingValue);
        }
        if num_tracers == 0 {
            return Err(CouplerError::InvalidDimension {
                name: "num_tracers",
                value: 0,
            });
        }
        let [x_length, y_length, z_length] = lengths;
        if z_length == 0 {
            return Err(CouplerError::InvalidDimension {
                name: "z_length",
                value: 0,
            });
        }
        // An axis string shorter than three letters requires the unused
        // storage slots to have extent 1.
        let storage = shape[0] * shape[1] * shape[2];
        if storage != x_length * y_length * z_length {
            return Err(CouplerError::BufferLengthMismatch {
                expected: x_length * y_length * z_length,
                found: storage,
            });
        }
        let chunk = Self {
            description: description.to_string(),
            x_start,
            y_start,
            x_length,
            y_length,
            z_length,
            shape,
            axes,
            num_tracers,
            missing_value,
            max_level,
            tracer_names: Vec::with_capacity(num_tracers),
            data: vec![0.0; x_length * y_length * z_length * num_tracers],
            data_ids: Vec::new(),
            numbering: Numbering::Dense,
        };
        chunk.debug_assert_invariants();
        Ok(chunk)
    }

    /// Human-readable chunk description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Global x offset of the rectangle in the source grid.
    pub fn x_start(&self) -> i64 {
        self.x_start
    }

    /// Global y offset of the rectangle in the source grid.
    pub fn y_start(&self) -> i64 {
        self.y_start
    }

    /// Rectangle width in cells.
    pub fn x_length(&self) -> usize {
        self.x_length
    }

    /// Rectangle height in cells.
    pub fn y_length(&self) -> usize {
        self.y_length
    }

    /// Number of altitude layers.
    pub fn z_length(&self) -> usize {
        self.z_length
    }

    /// Number of tracer slots (registered or not).
    pub fn num_tracers(&self) -> usize {
        self.num_tracers
    }

    /// The missing-value sentinel, compared by exact equality.
    pub fn missing_value(&self) -> f64 {
        self.missing_value
    }

    /// Refinement level of the enclosing forest.
    pub fn max_level(&self) -> u8 {
        self.max_level
    }

    /// Current layout of the data buffer.
    pub fn numbering(&self) -> Numbering {
        self.numbering
    }

    /// Registered tracer names in registration order.
    pub fn tracer_names(&self) -> &[String] {
        &self.tracer_names
    }

    /// Number of scalars in one leaf record.
    #[inline]
    pub fn record_len(&self) -> usize {
        self.z_length * self.num_tracers
    }

    /// The flat data buffer.
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Morton ids of the leaf records; empty in DENSE numbering.
    #[inline]
    pub fn data_ids(&self) -> &[MortonId] {
        &self.data_ids
    }

    /// Number of leaf records currently stored (MORTON numbering).
    #[inline]
    pub fn num_records(&self) -> usize {
        self.data_ids.len()
    }

    /// One leaf record, z-major tracer-minor.
    #[inline]
    pub fn record(&self, leaf: usize) -> &[f64] {
        let len = self.record_len();
        &self.data[leaf * len..(leaf + 1) * len]
    }

    /// Single value of a leaf record.
    #[inline]
    pub fn value(&self, leaf: usize, z: usize, tracer: usize) -> f64 {
        self.data[leaf * self.record_len() + z * self.num_tracers + tracer]
    }

    /// Offset of the (x, y) cell's record start in the DENSE buffer.
    #[inline]
    pub fn dense_record_offset(&self, x: usize, y: usize) -> usize {
        (y * self.z_length * self.x_length + x * self.z_length) * self.num_tracers
    }

    /// Index of `name` in the tracer table, registering it when absent
    /// and `register_if_missing` is set. Names are trimmed before lookup.
    ///
    /// # Errors
    /// `UnknownTracer` when absent and registration is not requested,
    /// `TracerTableFull` when registration would exceed `num_tracers`.
    pub fn tracer_index(
        &mut self,
        name: &str,
        register_if_missing: bool,
    ) -> Result<usize, CouplerError> {
        let trimmed = name.trim();
        if let Some(idx) = self.lookup_tracer(trimmed) {
            return Ok(idx);
        }
        if !register_if_missing {
            return Err(CouplerError::UnknownTracer(trimmed.to_string()));
        }
        if self.tracer_names.len() == self.num_tracers {
            return Err(CouplerError::TracerTableFull {
                capacity: self.num_tracers,
            });
        }
        self.tracer_names.push(trimmed.to_string());
        let idx = self.tracer_names.len() - 1;
        log::debug!("registered tracer `{}` at index {}", trimmed, idx);
        Ok(idx)
    }

    /// Linear scan of the tracer table.
    pub fn lookup_tracer(&self, name: &str) -> Option<usize> {
        let trimmed = name.trim();
        self.tracer_names.iter().position(|n| n == trimmed)
    }

    /// Register a tracer name without supplying data.
    pub fn register_tracer(&mut self, name: &str) -> Result<usize, CouplerError> {
        self.tracer_index(name, true)
    }

    /// Scatter a dense input buffer into the canonical layout.
    ///
    /// `buffer` is the raw model field in storage order (slot 0 fastest);
    /// it is routed through the axis permutation and the y-flip into this
    /// chunk's tracer slot for `name`, registering the name if needed.
    ///
    /// # Errors
    /// `WrongNumbering` unless the chunk is DENSE, `BufferLengthMismatch`
    /// unless `buffer.len() == shape[0]·shape[1]·shape[2]`, plus the
    /// registration errors of [`tracer_index`](Self::tracer_index).
    pub fn set_tracer_values(&mut self, name: &str, buffer: &[f64]) -> Result<(), CouplerError> {
        if self.numbering != Numbering::Dense {
            return Err(CouplerError::WrongNumbering {
                required: Numbering::Dense.name(),
                found: self.numbering.name(),
            });
        }
        let expected = self.shape[0] * self.shape[1] * self.shape[2];
        if buffer.len() != expected {
            return Err(CouplerError::BufferLengthMismatch {
                expected,
                found: buffer.len(),
            });
        }
        let tracer = self.tracer_index(name, self.tracer_names.len() < self.num_tracers)?;

        let shape = self.shape;
        let (z_len, x_len, t_count) = (self.z_length, self.x_length, self.num_tracers);
        for (i, &value) in buffer.iter().enumerate() {
            let (x, y_raw, z) = self.axes.decompose(i, shape);
            // North-up convention: input row 0 is the top row.
            let y = (self.y_length - 1) - y_raw;
            let offset = ((y * z_len * x_len + x * z_len + z) * t_count) + tracer;
            self.data[offset] = value;
        }
        self.debug_assert_invariants();
        Ok(())
    }

    /// Emit the per-leaf values of one tracer in z-major order:
    /// `out[z·N + i]` is leaf `i`'s value at layer `z`.
    ///
    /// # Errors
    /// `UnknownTracer` for unregistered names, `BufferLengthMismatch`
    /// unless `out.len() == num_records · z_length`.
    pub fn write_tracer_values(&self, name: &str, out: &mut [f64]) -> Result<(), CouplerError> {
        let tracer = self
            .lookup_tracer(name)
            .ok_or_else(|| CouplerError::UnknownTracer(name.trim().to_string()))?;
        let records = if self.numbering == Numbering::Morton {
            self.num_records()
        } else {
            self.x_length * self.y_length
        };
        let expected = records * self.z_length;
        if out.len() != expected {
            return Err(CouplerError::BufferLengthMismatch {
                expected,
                found: out.len(),
            });
        }
        let record_len = self.record_len();
        let mut index = 0;
        for z in 0..self.z_length {
            for leaf in 0..records {
                out[index] = self.data[leaf * record_len + z * self.num_tracers + tracer];
                index += 1;
            }
        }
        Ok(())
    }

    /// Replace the buffers with a Morton-ordered layout. Called once by
    /// the reorder pass; the old dense buffer is dropped here.
    pub(crate) fn install_morton_order(&mut self, data: Vec<f64>, ids: Vec<MortonId>) {
        debug_assert_eq!(data.len(), ids.len() * self.record_len());
        self.data = data;
        self.data_ids = ids;
        self.numbering = Numbering::Morton;
        self.debug_assert_invariants();
    }

    /// Swap in the buffers produced by one coarsening round.
    pub(crate) fn swap_adapted(&mut self, data: Vec<f64>, ids: Vec<MortonId>) {
        debug_assert_eq!(self.numbering, Numbering::Morton);
        debug_assert_eq!(data.len(), ids.len() * self.record_len());
        self.data = data;
        self.data_ids = ids;
        self.debug_assert_invariants();
    }

    /// Discard Morton-ordered data and return to an empty DENSE buffer so
    /// a new time step can be ingested. Tracer names stay registered.
    pub fn reset(&mut self) {
        self.data = vec![0.0; self.x_length * self.y_length * self.z_length * self.num_tracers];
        self.data_ids = Vec::new();
        self.numbering = Numbering::Dense;
        log::debug!("chunk `{}` reset to dense numbering", self.description);
        self.debug_assert_invariants();
    }
}

impl DebugInvariants for TracerChunk {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "TracerChunk invalid");
    }

    fn validate_invariants(&self) -> Result<(), CouplerError> {
        if self.tracer_names.len() > self.num_tracers {
            return Err(CouplerError::BrokenInvariant(format!(
                "{} tracer names registered but capacity is {}",
                self.tracer_names.len(),
                self.num_tracers
            )));
        }
        for (i, name) in self.tracer_names.iter().enumerate() {
            if self.tracer_names[..i].contains(name) {
                return Err(CouplerError::BrokenInvariant(format!(
                    "duplicate tracer name `{name}`"
                )));
            }
        }
        match self.numbering {
            Numbering::Dense => {
                let expected =
                    self.x_length * self.y_length * self.z_length * self.num_tracers;
                if self.data.len() != expected {
                    return Err(CouplerError::BrokenInvariant(format!(
                        "dense buffer holds {} values, layout requires {}",
                        self.data.len(),
                        expected
                    )));
                }
                if !self.data_ids.is_empty() {
                    return Err(CouplerError::BrokenInvariant(
                        "data_ids populated in dense numbering".into(),
                    ));
                }
            }
            Numbering::Morton => {
                if self.data.len() != self.data_ids.len() * self.record_len() {
                    return Err(CouplerError::BrokenInvariant(format!(
                        "morton buffer holds {} values for {} records of {}",
                        self.data.len(),
                        self.data_ids.len(),
                        self.record_len()
                    )));
                }
                if self.data_ids.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(CouplerError::BrokenInvariant(
                        "data_ids are not strictly increasing".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_4x4(num_tracers: usize) -> TracerChunk {
        let (axes, lengths) = AxisMap::parse("XYZ", [4, 4, 1]).unwrap();
        TracerChunk::new(
            "test", axes, lengths, [4, 4, 1], 0, 0, num_tracers, -1e34, 2,
        )
        .unwrap()
    }

    #[test]
    fn nan_sentinel_is_rejected() {
        let (axes, lengths) = AxisMap::parse("XYZ", [2, 2, 1]).unwrap();
        let err = TracerChunk::new("t", axes, lengths, [2, 2, 1], 0, 0, 1, f64::NAN, 1)
            .unwrap_err();
        assert_eq!(err, CouplerError::NanMissingValue);
    }

    #[test]
    fn tracer_registration_is_idempotent_and_bounded() {
        let mut chunk = chunk_4x4(2);
        assert_eq!(chunk.register_tracer("q").unwrap(), 0);
        assert_eq!(chunk.register_tracer(" q ").unwrap(), 0);
        assert_eq!(chunk.register_tracer("mass").unwrap(), 1);
        assert_eq!(
            chunk.register_tracer("extra").unwrap_err(),
            CouplerError::TracerTableFull { capacity: 2 }
        );
        assert_eq!(
            chunk.lookup_tracer("nope"),
            None,
        );
    }

    #[test]
    fn set_tracer_values_applies_the_y_flip() {
        let mut chunk = chunk_4x4(1);
        // Input row 0 (top) holds 0..4, row 3 (bottom) holds 12..16.
        let buffer: Vec<f64> = (0..16).map(|v| v as f64).collect();
        chunk.set_tracer_values("q", &buffer).unwrap();

        // Internal row 0 is the bottom row of the input.
        assert_eq!(chunk.data()[chunk.dense_record_offset(0, 0)], 12.0);
        assert_eq!(chunk.data()[chunk.dense_record_offset(3, 0)], 15.0);
        assert_eq!(chunk.data()[chunk.dense_record_offset(0, 3)], 0.0);
        assert_eq!(chunk.data()[chunk.dense_record_offset(3, 3)], 3.0);
    }

    #[test]
    fn set_tracer_values_checks_buffer_length() {
        let mut chunk = chunk_4x4(1);
        let err = chunk.set_tracer_values("q", &[0.0; 15]).unwrap_err();
        assert_eq!(
            err,
            CouplerError::BufferLengthMismatch {
                expected: 16,
                found: 15
            }
        );
    }

    #[test]
    fn second_set_overwrites_the_same_slot() {
        let mut chunk = chunk_4x4(2);
        chunk.set_tracer_values("q", &[1.0; 16]).unwrap();
        chunk.set_tracer_values("q", &[2.0; 16]).unwrap();
        chunk.set_tracer_values("mass", &[3.0; 16]).unwrap();
        // Slot 0 was overwritten, not duplicated.
        assert_eq!(chunk.tracer_names(), &["q".to_string(), "mass".to_string()]);
        assert_eq!(chunk.data()[0], 2.0);
        assert_eq!(chunk.data()[1], 3.0);
    }

    #[test]
    fn reset_returns_to_dense() {
        let mut chunk = chunk_4x4(1);
        chunk.set_tracer_values("q", &[5.0; 16]).unwrap();
        chunk.install_morton_order(vec![1.0; 16], (0..16).collect());
        assert_eq!(chunk.numbering(), Numbering::Morton);
        chunk.reset();
        assert_eq!(chunk.numbering(), Numbering::Dense);
        assert!(chunk.data().iter().all(|&v| v == 0.0));
        assert_eq!(chunk.lookup_tracer("q"), Some(0));
    }

    #[test]
    fn invariant_catches_unsorted_ids() {
        let mut chunk = chunk_4x4(1);
        chunk.data = vec![0.0; 32];
        chunk.data_ids = vec![3, 1];
        chunk.numbering = Numbering::Morton;
        // Two single-value records are required, not 32.
        assert!(chunk.validate_invariants().is_err());
        chunk.data = vec![0.0; 2];
        assert!(matches!(
            chunk.validate_invariants(),
            Err(CouplerError::BrokenInvariant(msg)) if msg.contains("strictly increasing")
        ));
    }
}
