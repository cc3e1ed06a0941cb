//! Axis-string handling for dense model input.
//!
//! Input chunks arrive as 4D arrays whose first three logical axes are
//! named by a string over {X, Y, Z} ("XYZ", "ZYX", …); the tracer axis is
//! implicit and always innermost. The string position of each letter is
//! the storage slot of that axis, with `shape[0]` (the first letter)
//! varying fastest. A letter that does not appear gets length 1 and the
//! first unused slot.

use crate::error::CouplerError;

/// Permutation from storage slots to the canonical (X, Y, Z) axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AxisMap {
    /// Storage slot of the X axis.
    pub x_axis: usize,
    /// Storage slot of the Y axis.
    pub y_axis: usize,
    /// Storage slot of the Z axis.
    pub z_axis: usize,
}

impl AxisMap {
    /// Parse an axis string and resolve the per-axis lengths from `shape`.
    ///
    /// Returns the map together with `(x_length, y_length, z_length)`.
    ///
    /// # Errors
    /// `InvalidAxisString` when the string is longer than three characters,
    /// repeats an axis letter, or contains a letter other than X, Y, Z.
    pub fn parse(axis: &str, shape: [usize; 3]) -> Result<(Self, [usize; 3]), CouplerError> {
        if axis.len() > 3 {
            return Err(CouplerError::InvalidAxisString(axis.to_string()));
        }
        let mut x = None;
        let mut y = None;
        let mut z = None;
        for (slot, letter) in axis.chars().enumerate() {
            let target = match letter {
                'X' => &mut x,
                'Y' => &mut y,
                'Z' => &mut z,
                _ => return Err(CouplerError::InvalidAxisString(axis.to_string())),
            };
            if target.is_some() {
                return Err(CouplerError::InvalidAxisString(axis.to_string()));
            }
            *target = Some(slot);
        }

        // A missing axis has length 1 and takes the slot after the used ones.
        let next_free = |a: Option<usize>, b: Option<usize>| {
            a.unwrap_or(0).max(b.unwrap_or(0)) + 1
        };
        let x_axis = x.unwrap_or_else(|| next_free(y, z));
        let y_axis = y.unwrap_or_else(|| next_free(x, z));
        let z_axis = z.unwrap_or_else(|| next_free(x, y));

        let length = |slot: Option<usize>| slot.map_or(1, |s| shape[s]);
        let lengths = [length(x), length(y), length(z)];
        Ok((
            Self {
                x_axis,
                y_axis,
                z_axis,
            },
            lengths,
        ))
    }

    /// Decompose a flat Fortran-order input index into canonical (x, y, z)
    /// coordinates. `shape` is the raw storage shape; slot 0 varies
    /// fastest.
    #[inline]
    pub fn decompose(&self, index: usize, shape: [usize; 3]) -> (usize, usize, usize) {
        let plane = shape[0] * shape[1];
        let idx = [index % shape[0], (index % plane) / shape[0], index / plane];
        (idx[self.x_axis], idx[self.y_axis], idx[self.z_axis])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_is_identity() {
        let (map, lengths) = AxisMap::parse("XYZ", [4, 5, 6]).unwrap();
        assert_eq!(map.x_axis, 0);
        assert_eq!(map.y_axis, 1);
        assert_eq!(map.z_axis, 2);
        assert_eq!(lengths, [4, 5, 6]);
    }

    #[test]
    fn reversed_order_swaps_slots() {
        let (map, lengths) = AxisMap::parse("ZYX", [2, 8, 8]).unwrap();
        assert_eq!(map.x_axis, 2);
        assert_eq!(map.y_axis, 1);
        assert_eq!(map.z_axis, 0);
        assert_eq!(lengths, [8, 8, 2]);
    }

    #[test]
    fn missing_axis_gets_length_one_and_a_free_slot() {
        let (map, lengths) = AxisMap::parse("XY", [6, 3, 1]).unwrap();
        assert_eq!(map.x_axis, 0);
        assert_eq!(map.y_axis, 1);
        assert_eq!(map.z_axis, 2);
        assert_eq!(lengths, [6, 3, 1]);
    }

    #[test]
    fn bad_strings_are_rejected() {
        assert!(AxisMap::parse("XXZ", [1, 1, 1]).is_err());
        assert!(AxisMap::parse("XYZW", [1, 1, 1]).is_err());
        assert!(AxisMap::parse("ABC", [1, 1, 1]).is_err());
    }

    #[test]
    fn decompose_walks_slot_zero_fastest() {
        let (map, _) = AxisMap::parse("XYZ", [2, 3, 4]).unwrap();
        assert_eq!(map.decompose(0, [2, 3, 4]), (0, 0, 0));
        assert_eq!(map.decompose(1, [2, 3, 4]), (1, 0, 0));
        assert_eq!(map.decompose(2, [2, 3, 4]), (0, 1, 0));
        assert_eq!(map.decompose(6, [2, 3, 4]), (0, 0, 1));
    }

    #[test]
    fn decompose_respects_permutation() {
        // "ZYX": slot 0 is Z, slot 2 is X.
        let (map, _) = AxisMap::parse("ZYX", [4, 3, 2]).unwrap();
        assert_eq!(map.decompose(1, [4, 3, 2]), (0, 0, 1));
        assert_eq!(map.decompose(4, [4, 3, 2]), (0, 1, 0));
        assert_eq!(map.decompose(12, [4, 3, 2]), (1, 0, 0));
    }
}
