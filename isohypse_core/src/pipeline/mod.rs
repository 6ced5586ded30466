//! The cell-level pipeline: marching-squares engine, row driver and the
//! online segment merger.

mod cell;
mod merge;
mod rows;

pub use cell::{Border, Cell, Segment};
pub use merge::SegmentMerger;
pub use rows::RowSweep;
