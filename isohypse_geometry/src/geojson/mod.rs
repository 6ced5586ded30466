//! Serialization of geometry types into GeoJSON values.
//!
//! Only the writing direction is implemented; the contouring pipeline never
//! consumes GeoJSON. An optional `z` puts the iso-value into every coordinate,
//! producing 3D geometries.

use crate::geo::{Geometry, LineString, Polygon};
use serde_json::{Value, json};

fn coord_json(x: f64, y: f64, z: Option<f64>) -> Value {
	match z {
		Some(z) => json!([x, y, z]),
		None => json!([x, y]),
	}
}

/// `[[x, y(, z)], …]` for one linestring or ring.
pub fn linestring_coords(ls: &LineString, z: Option<f64>) -> Value {
	Value::Array(ls.0.iter().map(|p| coord_json(p.x(), p.y(), z)).collect())
}

/// Nested coordinate arrays for a polygon (outer ring first, then holes).
pub fn polygon_coords(polygon: &Polygon, z: Option<f64>) -> Value {
	Value::Array(polygon.0.iter().map(|ring| linestring_coords(&ring.0, z)).collect())
}

/// A GeoJSON geometry object for the given geometry.
pub fn geometry_to_json(geometry: &Geometry, z: Option<f64>) -> Value {
	match geometry {
		Geometry::LineString(ls) => json!({
			"type": "LineString",
			"coordinates": linestring_coords(ls, z),
		}),
		Geometry::Polygon(polygon) => json!({
			"type": "Polygon",
			"coordinates": polygon_coords(polygon, z),
		}),
	}
}

/// A GeoJSON feature wrapping `geometry` with an id and properties object.
pub fn feature_to_json(id: i64, geometry: &Geometry, z: Option<f64>, properties: Value) -> Value {
	json!({
		"type": "Feature",
		"id": id,
		"geometry": geometry_to_json(geometry, z),
		"properties": properties,
	})
}
