//! `QuadForest`: a single quadtree whose leaves are kept in Z-order.
//!
//! The forest is the adaptivity engine of the crate: it can be built
//! uniformly at a level, coarsened one sibling family at a time through
//! [`adapt_coarsen`](QuadForest::adapt_coarsen), and walked in lockstep
//! against an adapted copy through [`iterate_replace`] to transfer
//! per-leaf data. Leaf order is the contract here — every traversal is
//! strictly increasing in scaled Morton id, so results never depend on
//! hashing or timing.

use crate::forest::cell::QuadCell;
use crate::forest::morton::MortonId;

/// A quadtree forest over the `2^level × 2^level` grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadForest {
    /// Level of the finest (reference) grid.
    level: u8,
    /// Leaves in strictly increasing scaled-Morton order.
    leaves: Vec<QuadCell>,
}

/// One replacement reported by [`iterate_replace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    /// A leaf survived unchanged.
    Unchanged {
        /// Its index in the old forest's traversal.
        old_index: usize,
        /// Its index in the new forest's traversal.
        new_index: usize,
    },
    /// Four sibling leaves were merged into their parent.
    Coarsened {
        /// Index of the first of the four outgoing leaves in the old forest.
        first_old: usize,
        /// Index of the incoming parent leaf in the new forest.
        new_index: usize,
    },
}

impl QuadForest {
    /// Build a uniform forest holding all `4^level` cells in Morton order.
    pub fn uniform(level: u8) -> Self {
        let count = 1usize << (2 * level as u32);
        let leaves = (0..count as MortonId)
            .map(|id| QuadCell::from_morton(level, id))
            .collect();
        Self { level, leaves }
    }

    /// Build a forest from an explicit leaf set. Sorts into Z-order.
    pub(crate) fn from_leaves(level: u8, mut leaves: Vec<QuadCell>) -> Self {
        leaves.sort_unstable_by_key(|cell| cell.scaled_morton_id(level));
        Self { level, leaves }
    }

    /// Level of the reference grid.
    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Number of leaves.
    #[inline]
    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Leaves in traversal (Z-order) order.
    #[inline]
    pub fn leaves(&self) -> &[QuadCell] {
        &self.leaves
    }

    /// Scaled Morton id of the `i`-th leaf.
    #[inline]
    pub fn leaf_id(&self, i: usize) -> MortonId {
        self.leaves[i].scaled_morton_id(self.level)
    }

    /// One coarsening pass.
    ///
    /// Walks the leaves in traversal order; every complete sibling family
    /// (four consecutive leaves at the same level sharing a parent) is
    /// presented to `merge` together with the index of its first leaf.
    /// Families for which `merge` returns true are replaced by their
    /// parent; all other leaves pass through. The input forest is left
    /// untouched so the caller can run [`iterate_replace`] against it.
    pub fn adapt_coarsen<F>(&self, mut merge: F) -> QuadForest
    where
        F: FnMut(usize, &[QuadCell; 4]) -> bool,
    {
        let mut adapted = Vec::with_capacity(self.leaves.len());
        let mut i = 0;
        while i < self.leaves.len() {
            if i + 4 <= self.leaves.len() {
                let group: &[QuadCell; 4] = self.leaves[i..i + 4].try_into().expect("window of 4");
                if QuadCell::is_family(group) && merge(i, group) {
                    adapted.push(group[0].parent().expect("family has a parent"));
                    i += 4;
                    continue;
                }
            }
            adapted.push(self.leaves[i]);
            i += 1;
        }
        QuadForest {
            level: self.level,
            leaves: adapted,
        }
    }

    /// Verify the traversal-order invariant; used by tests.
    pub fn is_strictly_z_ordered(&self) -> bool {
        self.leaves
            .windows(2)
            .all(|w| w[0].scaled_morton_id(self.level) < w[1].scaled_morton_id(self.level))
    }
}

/// Walk `old` and `new` in lockstep and report every replacement in
/// traversal order.
///
/// `new` must have been produced from `old` by [`QuadForest::adapt_coarsen`]:
/// each new leaf is either identical to an old leaf or the parent of four
/// consecutive old leaves.
pub fn iterate_replace<F>(old: &QuadForest, new: &QuadForest, mut visit: F)
where
    F: FnMut(Replacement),
{
    debug_assert_eq!(old.level(), new.level());
    let mut old_index = 0;
    for (new_index, incoming) in new.leaves().iter().enumerate() {
        let outgoing = old.leaves()[old_index];
        if outgoing == *incoming {
            visit(Replacement::Unchanged {
                old_index,
                new_index,
            });
            old_index += 1;
        } else {
            debug_assert_eq!(outgoing.parent(), Some(*incoming));
            visit(Replacement::Coarsened {
                first_old: old_index,
                new_index,
            });
            old_index += 4;
        }
    }
    debug_assert_eq!(old_index, old.num_leaves());
}
