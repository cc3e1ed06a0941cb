//! Forest construction: the smallest uniform quad-forest whose root tree
//! contains an `x_length × y_length` rectangle in its lower-left corner.
//!
//! Two construction modes exist and produce the same leaf set: refining
//! from the root towards the rectangle, or starting uniform at the target
//! level and collapsing the padding outside the rectangle. In-rectangle
//! leaves always end up at the chosen level; padding leaves are as coarse
//! as the tree structure allows and never carry data.

use crate::error::CouplerError;
use crate::forest::cell::QuadCell;
use crate::forest::forest::QuadForest;

/// How to construct the initial forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GridMode {
    /// Start at level 0 and refine cells overlapping the rectangle.
    Refine,
    /// Start uniform at the target level and collapse cells outside it.
    Coarsen,
}

/// Geometry shared by the forest builder and the adapt callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AdaptContext {
    /// Chosen refinement level L with `2^L ≥ max(x_length, y_length)`.
    pub level: u8,
    /// Requested rectangle width in cells.
    pub x_length: u32,
    /// Requested rectangle height in cells.
    pub y_length: u32,
    /// Global x offset of the rectangle in the source grid.
    pub x_start: i64,
    /// Global y offset of the rectangle in the source grid.
    pub y_start: i64,
    /// Construction mode used.
    pub mode: GridMode,
}

impl AdaptContext {
    /// True when `cell` lies entirely inside the requested rectangle.
    /// Cells at the reference level are single grid cells; coarser cells
    /// cover a block of them.
    #[inline]
    pub fn cell_overlaps(&self, cell: &QuadCell) -> bool {
        let scale = 1u64 << (self.level - cell.level) as u32;
        (cell.x as u64 * scale) < self.x_length as u64
            && (cell.y as u64 * scale) < self.y_length as u64
    }

    /// True when `cell` is a data-carrying cell of the rectangle: at the
    /// reference level, with its anchor inside the rectangle.
    #[inline]
    pub fn cell_in_rectangle(&self, cell: &QuadCell) -> bool {
        cell.level == self.level && cell.x < self.x_length && cell.y < self.y_length
    }
}

/// Smallest level whose `2^L` grid spans `extent` cells.
fn level_for(extent: u32) -> u8 {
    let mut level = 0u8;
    while (1u64 << level as u32) < extent as u64 {
        level += 1;
    }
    level
}

/// Build the smallest enclosing forest for an `x_length × y_length`
/// rectangle anchored at `(x_start, y_start)` in the source grid.
///
/// # Errors
/// `InvalidDimension` when either length is zero.
pub fn build_forest(
    x_length: u32,
    y_length: u32,
    x_start: i64,
    y_start: i64,
    mode: GridMode,
) -> Result<(QuadForest, AdaptContext), CouplerError> {
    if x_length == 0 {
        return Err(CouplerError::InvalidDimension {
            name: "x_length",
            value: x_length as i64,
        });
    }
    if y_length == 0 {
        return Err(CouplerError::InvalidDimension {
            name: "y_length",
            value: y_length as i64,
        });
    }

    let level = level_for(x_length.max(y_length));
    let context = AdaptContext {
        level,
        x_length,
        y_length,
        x_start,
        y_start,
        mode,
    };

    let forest = match mode {
        GridMode::Refine => refine_towards_rectangle(&context),
        GridMode::Coarsen => coarsen_around_rectangle(&context),
    };
    log::debug!(
        "built forest: level {}, {} leaves for {}x{} rectangle",
        level,
        forest.num_leaves(),
        x_length,
        y_length
    );
    Ok((forest, context))
}

fn refine_towards_rectangle(context: &AdaptContext) -> QuadForest {
    let mut frontier = vec![QuadCell::ROOT];
    let mut leaves = Vec::new();
    while let Some(cell) = frontier.pop() {
        if cell.level < context.level && context.cell_overlaps(&cell) {
            frontier.extend(cell.children());
        } else {
            leaves.push(cell);
        }
    }
    QuadForest::from_leaves(context.level, leaves)
}

fn coarsen_around_rectangle(context: &AdaptContext) -> QuadForest {
    let mut forest = QuadForest::uniform(context.level);
    loop {
        let adapted =
            forest.adapt_coarsen(|_, group| group.iter().all(|cell| !context.cell_overlaps(cell)));
        if adapted.num_leaves() == forest.num_leaves() {
            return forest;
        }
        forest = adapted;
    }
}
