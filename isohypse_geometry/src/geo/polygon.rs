use super::{LineString, Ring};
use std::fmt::Debug;

/// A polygon: the first ring is the outer boundary, the rest are holes.
#[derive(Clone, Default, PartialEq)]
pub struct Polygon(pub Vec<Ring>);

impl Polygon {
	pub fn new(outer: Ring) -> Self {
		Self(vec![outer])
	}

	pub fn outer(&self) -> Option<&Ring> {
		self.0.first()
	}

	pub fn add_hole(&mut self, ring: Ring) {
		self.0.push(ring);
	}
}

impl Debug for Polygon {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(&self.0).finish()
	}
}

/// Geometry handed to feature writers.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
	LineString(LineString),
	Polygon(Polygon),
}
