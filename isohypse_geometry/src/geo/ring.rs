use super::{LineString, Point};
use anyhow::{Result, ensure};
use std::fmt::Debug;

/// A closed linestring. Building block of polygons; the first and last points
/// must coincide. Containment uses even-odd ray casting, consistent with the
/// rest of the crate.
#[derive(Clone, Default, PartialEq)]
pub struct Ring(pub LineString);

impl Ring {
	pub fn new(ls: LineString) -> Self {
		Self(ls)
	}

	pub fn points(&self) -> &[Point] {
		&self.0.0
	}

	/// Checks the ring has at least 4 points (3 unique vertices plus the
	/// closing repeat) and is closed.
	pub fn verify(&self) -> Result<()> {
		ensure!(self.0.len() >= 4, "ring must have at least 4 points");
		ensure!(self.0.is_closed(), "ring must be closed");
		Ok(())
	}

	/// Signed area by the shoelace formula. Positive for counterclockwise
	/// winding in a y-up frame.
	pub fn signed_area(&self) -> f64 {
		let coords = self.points();
		let mut sum = 0f64;
		if let Some(mut p2) = coords.last() {
			for p1 in coords {
				sum += (p2.x() - p1.x()) * (p1.y() + p2.y());
				p2 = p1;
			}
		}
		sum / 2.0
	}

	/// Even-odd crossing test. A ring with fewer than 4 points contains
	/// nothing; points on the boundary land on either side arbitrarily.
	pub fn contains_point(&self, x: f64, y: f64) -> bool {
		let coords = self.points();
		if coords.len() < 4 {
			return false;
		}

		let mut inside = false;
		let mut j = coords.len() - 1;

		for i in 0..coords.len() {
			let xi = coords[i].x();
			let yi = coords[i].y();
			let xj = coords[j].x();
			let yj = coords[j].y();

			if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
				inside = !inside;
			}
			j = i;
		}

		inside
	}
}

impl Debug for Ring {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Debug::fmt(&self.0, f)
	}
}

impl From<Vec<[f64; 2]>> for Ring {
	fn from(value: Vec<[f64; 2]>) -> Self {
		Self(LineString::from(value))
	}
}
