use super::Point;

/// Affine raster-to-world transform in the GDAL layout
/// `[origin_x, pixel_w, row_rot, origin_y, col_rot, pixel_h]`:
/// `(x, y) ↦ (a₀ + a₁x + a₂y, a₃ + a₄x + a₅y)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
	pub fn apply(&self, p: &Point) -> Point {
		let a = &self.0;
		Point::new(a[0] + a[1] * p.x() + a[2] * p.y(), a[3] + a[4] * p.x() + a[5] * p.y())
	}

	/// Horizontal size of one pixel in world units. The tile stitcher uses
	/// this as its endpoint-coincidence tolerance.
	pub fn pixel_width(&self) -> f64 {
		self.0[1].abs()
	}
}

impl Default for GeoTransform {
	/// Identity: cell coordinates are world coordinates.
	fn default() -> Self {
		Self([0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
	}
}

/// Opaque spatial-reference handle, carried from raster to writer. The core
/// never reprojects; it only forwards the handle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Srs(pub Option<u32>);

impl Srs {
	pub fn epsg(code: u32) -> Self {
		Self(Some(code))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identity_maps_points_onto_themselves() {
		let gt = GeoTransform::default();
		let p = Point::new(3.5, -2.0);
		assert!(gt.apply(&p).eq_eps(&p));
	}

	#[test]
	fn north_up_transform() {
		// top-left origin, 30 m pixels, north-up (negative row height)
		let gt = GeoTransform([500_000.0, 30.0, 0.0, 4_100_000.0, 0.0, -30.0]);
		let p = gt.apply(&Point::new(2.0, 3.0));
		assert!(p.eq_eps(&Point::new(500_060.0, 4_099_910.0)));
		assert_eq!(gt.pixel_width(), 30.0);
	}
}
