//! Geometry primitives for the isohypse contouring pipeline.
//!
//! It includes modules for:
//! - `geo`: core geometry types (`Point`, `LineString`, `Ring`, `Polygon`) and the
//!   affine raster-to-world transform.
//! - `geojson`: serialization of those types into GeoJSON values.
//!
//! Coordinates are plain `f64` pairs; point equality everywhere uses the absolute
//! per-component tolerance [`geo::EPS`].

pub mod geo;
pub mod geojson;
