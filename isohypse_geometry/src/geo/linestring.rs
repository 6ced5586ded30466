use super::{GeoTransform, Point};
use std::fmt::Debug;

/// An ordered sequence of points. The segment merger grows these from both
/// ends; a linestring is *closed* when front and back coincide under
/// [`super::EPS`].
#[derive(Clone, Default, PartialEq)]
pub struct LineString(pub Vec<Point>);

impl LineString {
	pub fn new() -> Self {
		Self(Vec::new())
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn front(&self) -> Option<&Point> {
		self.0.first()
	}

	pub fn back(&self) -> Option<&Point> {
		self.0.last()
	}

	pub fn is_front(&self, p: &Point) -> bool {
		self.front().is_some_and(|f| f.eq_eps(p))
	}

	pub fn is_back(&self, p: &Point) -> bool {
		self.back().is_some_and(|b| b.eq_eps(p))
	}

	pub fn is_closed(&self) -> bool {
		match (self.front(), self.back()) {
			(Some(f), Some(b)) if self.len() > 1 => f.eq_eps(b),
			_ => false,
		}
	}

	pub fn push(&mut self, p: Point) {
		self.0.push(p);
	}

	pub fn prepend(&mut self, p: Point) {
		self.0.insert(0, p);
	}

	pub fn reverse(&mut self) {
		self.0.reverse();
	}

	/// Appends all points of `other` except its first, which is assumed to
	/// coincide with `self.back()`.
	pub fn join_back(&mut self, other: &LineString) {
		self.0.extend_from_slice(&other.0[1..]);
	}

	/// Duplicates the front point at the back so the line forms a ring.
	/// No-op when already closed.
	pub fn close(&mut self) {
		if !self.is_closed()
			&& let Some(front) = self.front().copied()
		{
			self.0.push(front);
		}
	}

	/// Maps every point through the affine raster-to-world transform.
	pub fn transform(&self, gt: &GeoTransform) -> LineString {
		LineString(self.0.iter().map(|p| gt.apply(p)).collect())
	}
}

impl Debug for LineString {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(&self.0).finish()
	}
}

impl From<Vec<[f64; 2]>> for LineString {
	fn from(value: Vec<[f64; 2]>) -> Self {
		Self(value.into_iter().map(Point).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::geo::EPS;

	fn line(pts: &[[f64; 2]]) -> LineString {
		LineString::from(pts.to_vec())
	}

	#[test]
	fn front_back_queries() {
		let l = line(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]);
		assert!(l.is_front(&Point::new(0.0, 0.0)));
		assert!(l.is_back(&Point::new(1.0, 1.0)));
		assert!(!l.is_front(&Point::new(1.0, 1.0)));
		assert!(!l.is_back(&Point::new(0.0, 0.0)));
	}

	#[test]
	fn empty_line_has_no_ends() {
		let l = LineString::new();
		assert!(l.front().is_none());
		assert!(!l.is_front(&Point::new(0.0, 0.0)));
		assert!(!l.is_closed());
	}

	#[test]
	fn closed_under_tolerance() {
		let l = line(&[[0.0, 0.0], [1.0, 0.0], [EPS / 2.0, 0.0]]);
		assert!(l.is_closed());
	}

	#[test]
	fn single_point_is_not_closed() {
		let l = line(&[[1.0, 1.0]]);
		assert!(!l.is_closed());
	}

	#[test]
	fn join_back_drops_shared_point() {
		let mut a = line(&[[0.0, 0.0], [1.0, 0.0]]);
		let b = line(&[[1.0, 0.0], [1.0, 1.0]]);
		a.join_back(&b);
		assert_eq!(a, line(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]));
	}

	#[test]
	fn close_duplicates_front() {
		let mut l = line(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]);
		l.close();
		assert_eq!(l.len(), 4);
		assert!(l.is_closed());
		let before = l.clone();
		l.close();
		assert_eq!(l, before);
	}

	#[test]
	fn transform_applies_affine() {
		let gt = GeoTransform([100.0, 2.0, 0.0, 50.0, 0.0, -2.0]);
		let l = line(&[[1.0, 1.0], [2.0, 3.0]]).transform(&gt);
		assert_eq!(l, line(&[[102.0, 48.0], [104.0, 44.0]]));
	}
}
