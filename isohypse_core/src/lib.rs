//! The isohypse contouring pipeline.
//!
//! Turns a rectangular grid of elevation samples into vector isolines or
//! filled elevation bands:
//!
//! - [`levels`]: iso-value generators (interval, exponential, fixed).
//! - [`raster`]: the raster and tile-provider contracts plus an in-memory
//!   implementation.
//! - [`pipeline`]: the marching-squares cell engine, the row driver and the
//!   segment merger that stitches per-cell segments into polylines.
//! - [`polygonize`]: classification of closed rings into polygons with holes.
//! - [`stitch`]: cross-tile rejoining of polylines that end on tile seams.
//! - [`writer`]: sink traits and the cell-space → world-space adapters.
//! - [`geojson`]: a newline-delimited GeoJSON feature writer.
//! - [`generate`]: the single-raster and tiled entry points.
//!
//! The pipeline is single-threaded and synchronous; the only blocking call is
//! the row fetch on the raster collaborator.

pub mod generate;
pub mod geojson;
pub mod levels;
pub mod pipeline;
pub mod polygonize;
pub mod raster;
pub mod stitch;
pub mod writer;

pub use generate::{ContourOptions, generate, generate_tiled};
pub use levels::LevelGenerator;
pub use raster::{MemoryRaster, Raster, RasterProvider};
