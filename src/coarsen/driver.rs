//! The adaptive coarsening loop.
//!
//! Each round adapts the forest under the merge predicate, transfers data
//! and errors into freshly allocated adapt buffers through the
//! replacement walk, and swaps the buffers in. The loop stops at a fixed
//! point (a round that leaves the leaf count unchanged) or after
//! [`MAX_COARSEN_ROUNDS`] rounds.

use crate::coarsen::config::{CoarsenConfig, InterpolateConfig};
use crate::coarsen::interpolate::{AdaptBuffers, Interpolator};
use crate::coarsen::predicate::CoarsenPredicate;
use crate::data::TracerChunk;
use crate::error::CouplerError;
use crate::forest::{iterate_replace, QuadForest, Replacement};

/// Hard cap on coarsening rounds per invocation.
pub const MAX_COARSEN_ROUNDS: usize = 10;

/// Summary of one `coarsen` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoarsenReport {
    /// Adapt passes executed, including the final no-change pass.
    pub rounds: usize,
    /// Leaf count after the last change.
    pub num_elements: usize,
}

/// Run the coarsening loop over `forest` and `chunk`.
///
/// `errors` and `errors_global` are reallocated to the current leaf count
/// at entry and track the merge lineage across rounds.
pub(crate) fn run(
    forest: &mut QuadForest,
    chunk: &mut TracerChunk,
    errors: &mut Vec<f64>,
    errors_global: &mut Vec<f64>,
    coarsen: &CoarsenConfig,
    interpolate: &InterpolateConfig,
) -> Result<CoarsenReport, CouplerError> {
    let predicate = CoarsenPredicate::new(coarsen, chunk)?;
    let interpolator = Interpolator::new(&interpolate.method, chunk);

    let num_error_tracers = chunk.num_tracers() - 1;
    *errors = vec![0.0; forest.num_leaves() * num_error_tracers];
    *errors_global = vec![0.0; forest.num_leaves() * num_error_tracers];

    let mut last_num_elements = 0usize;
    let mut rounds = 0usize;

    for round in 0..MAX_COARSEN_ROUNDS {
        rounds = round + 1;
        let adapted = forest
            .adapt_coarsen(|first, cells| predicate.should_merge(chunk, first, cells));
        let num_elements = adapted.num_leaves();

        if num_elements == last_num_elements {
            // Fixed point: the pass changed nothing.
            break;
        }
        last_num_elements = num_elements;

        let mut out = AdaptBuffers::new(num_elements, chunk.record_len(), num_error_tracers);
        for i in 0..num_elements {
            out.ids[i] = adapted.leaf_id(i);
        }
        iterate_replace(forest, &adapted, |replacement| match replacement {
            Replacement::Unchanged {
                old_index,
                new_index,
            } => interpolator.copy_record(chunk, errors, errors_global, old_index, new_index, &mut out),
            Replacement::Coarsened {
                first_old,
                new_index,
            } => interpolator.merge_group(
                chunk,
                errors_global,
                first_old,
                new_index,
                &forest.leaves()[first_old..first_old + 4],
                &mut out,
            ),
        });

        chunk.swap_adapted(out.data, out.ids);
        *errors = out.errors;
        *errors_global = out.errors_global;
        *forest = adapted;

        log::debug!("coarsen round {}: {} leaves", round, num_elements);
    }

    log::info!(
        "grid coarsening done: {} leaves after {} rounds",
        forest.num_leaves(),
        rounds
    );
    Ok(CoarsenReport {
        rounds,
        num_elements: forest.num_leaves(),
    })
}
