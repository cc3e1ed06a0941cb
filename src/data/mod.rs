//! The data chunk layout and Morton reordering.

pub mod axes;
pub mod chunk;
pub mod reorder;

pub use axes::AxisMap;
pub use chunk::{Numbering, TracerChunk};
pub use reorder::apply_morton_order;
