//! Morton reordering: converting a DENSE chunk into forest-leaf order.
//!
//! Walks every leaf of the forest in traversal (Z-order) order, recovers
//! the leaf's anchor and level, and copies the matching
//! `z_length · num_tracers` record out of the dense buffer. Padding
//! leaves introduced by the power-of-two rounding carry no data and are
//! zero-filled. Because a uniform quad forest traverses in Morton order,
//! the recorded ids come out strictly increasing without any sort.

use crate::data::chunk::{Numbering, TracerChunk};
use crate::error::CouplerError;
use crate::forest::{AdaptContext, MortonId, QuadForest};

/// Convert `chunk` from DENSE to MORTON numbering over `forest`.
///
/// The dense buffer is released; afterwards the chunk holds one record
/// per forest leaf, keyed by the leaf's scaled Morton id.
///
/// # Errors
/// `WrongNumbering` when the chunk is already in MORTON numbering (the
/// transition is one-way).
pub fn apply_morton_order(
    forest: &QuadForest,
    context: &AdaptContext,
    chunk: &mut TracerChunk,
) -> Result<(), CouplerError> {
    if chunk.numbering() != Numbering::Dense {
        return Err(CouplerError::WrongNumbering {
            required: "DENSE",
            found: "MORTON",
        });
    }

    let record_len = chunk.record_len();
    let num_leaves = forest.num_leaves();
    let mut data = vec![0.0; num_leaves * record_len];
    let mut ids: Vec<MortonId> = Vec::with_capacity(num_leaves);

    for (i, cell) in forest.leaves().iter().enumerate() {
        ids.push(cell.scaled_morton_id(forest.level()));
        if context.cell_in_rectangle(cell) {
            let src = chunk.dense_record_offset(cell.x as usize, cell.y as usize);
            data[i * record_len..(i + 1) * record_len]
                .copy_from_slice(&chunk.data()[src..src + record_len]);
        }
        // Padding leaves keep their zero fill.
    }

    log::debug!(
        "applied morton order: {} leaves, {} data cells",
        num_leaves,
        chunk.x_length() * chunk.y_length()
    );
    chunk.install_morton_order(data, ids);
    Ok(())
}
