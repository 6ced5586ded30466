//! The marching-squares cell engine: per-cell case table, interpolation,
//! recursive sub-cells around NaN corners and border-segment emission.

use crate::levels::{LevelGenerator, fudge};
use crate::writer::SegmentSink;
use enumset::{EnumSet, EnumSetType};
use isohypse_geometry::geo::{EPS, Point, ValuedPoint};

/// Sides of a cell that coincide with the raster boundary or a NaN interior
/// boundary. Border segments are only emitted on these sides.
#[derive(EnumSetType, Debug)]
pub enum Border {
	Left,
	Lower,
	Right,
	Upper,
}

/// An oriented contour piece inside one cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
	pub start: Point,
	pub end: Point,
}

impl Segment {
	fn new(start: Point, end: Point) -> Self {
		Self { start, end }
	}
}

// Marching-case bits: which corners lie above the (fudged) level.
const UPPER_LEFT: u8 = 1 << 0;
const LOWER_LEFT: u8 = 1 << 1;
const LOWER_RIGHT: u8 = 1 << 2;
const UPPER_RIGHT: u8 = 1 << 3;
const ALL_LOW: u8 = 0;
const ALL_HIGH: u8 = UPPER_LEFT | LOWER_LEFT | LOWER_RIGHT | UPPER_RIGHT;
const SADDLE_NW: u8 = UPPER_LEFT | LOWER_RIGHT;
const SADDLE_NE: u8 = UPPER_RIGHT | LOWER_LEFT;

/// A 2×2 sub-square of the sample grid. "Upper" is the earlier row, so upper
/// corners have the smaller y in cell coordinates.
#[derive(Clone, Copy, Debug)]
pub struct Cell {
	upper_left: ValuedPoint,
	upper_right: ValuedPoint,
	lower_left: ValuedPoint,
	lower_right: ValuedPoint,
	nan_count: u8,
	borders: EnumSet<Border>,
}

fn substitute(primary: f64, fallback: f64) -> f64 {
	// average when both corners are valid, otherwise the valid one
	if primary.is_nan() {
		fallback
	} else if fallback.is_nan() {
		primary
	} else {
		f64::midpoint(primary, fallback)
	}
}

impl Cell {
	pub fn new(
		upper_left: ValuedPoint,
		upper_right: ValuedPoint,
		lower_left: ValuedPoint,
		lower_right: ValuedPoint,
		borders: EnumSet<Border>,
	) -> Self {
		let nan_count = [&upper_left, &upper_right, &lower_left, &lower_right]
			.iter()
			.filter(|c| c.is_nan())
			.count() as u8;
		Self {
			upper_left,
			upper_right,
			lower_left,
			lower_right,
			nan_count,
			borders,
		}
	}

	// ── midpoints with NaN substitution ─────────────────────────────────

	fn center(&self) -> ValuedPoint {
		let corners = [&self.upper_left, &self.upper_right, &self.lower_left, &self.lower_right];
		let sum: f64 = corners.iter().filter(|c| !c.is_nan()).map(|c| c.value).sum();
		ValuedPoint::new(
			f64::midpoint(self.upper_left.point.x(), self.lower_right.point.x()),
			f64::midpoint(self.upper_left.point.y(), self.lower_right.point.y()),
			sum / f64::from(4 - self.nan_count),
		)
	}

	fn left_center(&self) -> ValuedPoint {
		ValuedPoint::new(
			self.upper_left.point.x(),
			f64::midpoint(self.upper_left.point.y(), self.lower_left.point.y()),
			substitute(self.upper_left.value, self.lower_left.value),
		)
	}

	fn lower_center(&self) -> ValuedPoint {
		ValuedPoint::new(
			f64::midpoint(self.lower_left.point.x(), self.lower_right.point.x()),
			self.lower_left.point.y(),
			substitute(self.lower_left.value, self.lower_right.value),
		)
	}

	fn right_center(&self) -> ValuedPoint {
		ValuedPoint::new(
			self.upper_right.point.x(),
			f64::midpoint(self.upper_right.point.y(), self.lower_right.point.y()),
			substitute(self.upper_right.value, self.lower_right.value),
		)
	}

	fn upper_center(&self) -> ValuedPoint {
		ValuedPoint::new(
			f64::midpoint(self.upper_left.point.x(), self.upper_right.point.x()),
			self.upper_left.point.y(),
			substitute(self.upper_left.value, self.upper_right.value),
		)
	}

	// ── sub-cells anchored at a valid corner ────────────────────────────
	//
	// A sub-cell inherits the NaN-facing sides as borders so polygons close
	// against the nodata boundary.

	fn upper_left_cell(&self) -> Option<Cell> {
		if self.upper_left.is_nan() {
			return None;
		}
		let mut borders = EnumSet::empty();
		if self.upper_right.is_nan() {
			borders |= Border::Right;
		}
		if self.lower_left.is_nan() {
			borders |= Border::Lower;
		}
		Some(Cell::new(
			self.upper_left,
			self.upper_center(),
			self.left_center(),
			self.center(),
			borders,
		))
	}

	fn upper_right_cell(&self) -> Option<Cell> {
		if self.upper_right.is_nan() {
			return None;
		}
		let mut borders = EnumSet::empty();
		if self.lower_right.is_nan() {
			borders |= Border::Lower;
		}
		if self.upper_left.is_nan() {
			borders |= Border::Left;
		}
		Some(Cell::new(
			self.upper_center(),
			self.upper_right,
			self.center(),
			self.right_center(),
			borders,
		))
	}

	fn lower_left_cell(&self) -> Option<Cell> {
		if self.lower_left.is_nan() {
			return None;
		}
		let mut borders = EnumSet::empty();
		if self.lower_right.is_nan() {
			borders |= Border::Right;
		}
		if self.upper_left.is_nan() {
			borders |= Border::Upper;
		}
		Some(Cell::new(
			self.left_center(),
			self.center(),
			self.lower_left,
			self.lower_center(),
			borders,
		))
	}

	fn lower_right_cell(&self) -> Option<Cell> {
		if self.lower_right.is_nan() {
			return None;
		}
		let mut borders = EnumSet::empty();
		if self.lower_left.is_nan() {
			borders |= Border::Left;
		}
		if self.upper_right.is_nan() {
			borders |= Border::Upper;
		}
		Some(Cell::new(
			self.center(),
			self.right_center(),
			self.lower_center(),
			self.lower_right,
			borders,
		))
	}

	// ── marching table ──────────────────────────────────────────────────

	fn marching_case(&self, level: f64) -> u8 {
		let mut mask = ALL_LOW;
		if level < fudge(level, self.upper_left.value) {
			mask |= UPPER_LEFT;
		}
		if level < fudge(level, self.lower_left.value) {
			mask |= LOWER_LEFT;
		}
		if level < fudge(level, self.lower_right.value) {
			mask |= LOWER_RIGHT;
		}
		if level < fudge(level, self.upper_right.value) {
			mask |= UPPER_RIGHT;
		}
		mask
	}

	fn min_value(&self) -> f64 {
		self
			.upper_left
			.value
			.min(self.upper_right.value)
			.min(self.lower_left.value.min(self.lower_right.value))
	}

	fn max_value(&self) -> f64 {
		self
			.upper_left
			.value
			.max(self.upper_right.value)
			.max(self.lower_left.value.max(self.lower_right.value))
	}

	/// The crossing point of `level` on one side. The interpolation ratio is
	/// clamped away from the corners so vertices never degenerate onto them.
	fn interpolate(&self, border: Border, level: f64) -> Point {
		match border {
			Border::Left => Point::new(
				self.upper_left.point.x(),
				interpolate_crossing(
					level,
					self.lower_left.point.y(),
					self.upper_left.point.y(),
					self.lower_left.value,
					self.upper_left.value,
				),
			),
			Border::Lower => Point::new(
				interpolate_crossing(
					level,
					self.lower_left.point.x(),
					self.lower_right.point.x(),
					self.lower_left.value,
					self.lower_right.value,
				),
				self.lower_left.point.y(),
			),
			Border::Right => Point::new(
				self.upper_right.point.x(),
				interpolate_crossing(
					level,
					self.lower_right.point.y(),
					self.upper_right.point.y(),
					self.lower_right.value,
					self.upper_right.value,
				),
			),
			Border::Upper => Point::new(
				interpolate_crossing(
					level,
					self.upper_left.point.x(),
					self.upper_right.point.x(),
					self.upper_left.value,
					self.upper_right.value,
				),
				self.upper_left.point.y(),
			),
		}
	}

	/// The corner pair of one side, ordered counterclockwise around the cell.
	fn side_corners(&self, border: Border) -> (ValuedPoint, ValuedPoint) {
		match border {
			Border::Left => (self.upper_left, self.lower_left),
			Border::Lower => (self.lower_left, self.lower_right),
			Border::Right => (self.lower_right, self.upper_right),
			Border::Upper => (self.upper_right, self.upper_left),
		}
	}

	/// Contour pieces of one level inside this cell. Both saddle cases use
	/// the connect-low convention.
	fn segments(&self, level: f64) -> Vec<Segment> {
		let interp = |border| self.interpolate(border, level);
		match self.marching_case(level) {
			ALL_LOW | ALL_HIGH => vec![],
			UPPER_LEFT => vec![Segment::new(interp(Border::Upper), interp(Border::Left))],
			LOWER_LEFT => vec![Segment::new(interp(Border::Left), interp(Border::Lower))],
			LOWER_RIGHT => vec![Segment::new(interp(Border::Lower), interp(Border::Right))],
			UPPER_RIGHT => vec![Segment::new(interp(Border::Right), interp(Border::Upper))],
			mask if mask == UPPER_LEFT | LOWER_LEFT => vec![Segment::new(interp(Border::Upper), interp(Border::Lower))],
			mask if mask == LOWER_LEFT | LOWER_RIGHT => vec![Segment::new(interp(Border::Left), interp(Border::Right))],
			mask if mask == LOWER_RIGHT | UPPER_RIGHT => vec![Segment::new(interp(Border::Lower), interp(Border::Upper))],
			mask if mask == UPPER_RIGHT | UPPER_LEFT => vec![Segment::new(interp(Border::Right), interp(Border::Left))],
			mask if mask == ALL_HIGH & !UPPER_LEFT => vec![Segment::new(interp(Border::Left), interp(Border::Upper))],
			mask if mask == ALL_HIGH & !LOWER_LEFT => vec![Segment::new(interp(Border::Lower), interp(Border::Left))],
			mask if mask == ALL_HIGH & !LOWER_RIGHT => vec![Segment::new(interp(Border::Right), interp(Border::Lower))],
			mask if mask == ALL_HIGH & !UPPER_RIGHT => vec![Segment::new(interp(Border::Upper), interp(Border::Right))],
			SADDLE_NW | SADDLE_NE => vec![
				Segment::new(interp(Border::Left), interp(Border::Lower)),
				Segment::new(interp(Border::Right), interp(Border::Upper)),
			],
			_ => unreachable!("4-bit marching mask"),
		}
	}

	/// Runs the cell: recursion around NaN corners, border segments in
	/// polygonize mode, then the level sweep with per-level double emission.
	pub fn process(&self, levels: &LevelGenerator, sink: &mut dyn SegmentSink) {
		if self.nan_count == 4 {
			return;
		}

		if self.nan_count > 0 {
			for sub in [
				self.upper_left_cell(),
				self.upper_right_cell(),
				self.lower_left_cell(),
				self.lower_right_cell(),
			]
			.into_iter()
			.flatten()
			{
				sub.process(levels, sink);
			}
			return;
		}

		if sink.polygonize() && !self.borders.is_empty() {
			for border in [Border::Upper, Border::Left, Border::Right, Border::Lower] {
				if !self.borders.contains(border) {
					continue;
				}
				self.emit_border_segments(border, levels, sink);
			}
		}

		let range = levels.range(self.min_value(), self.max_value());
		for idx in range.indices() {
			let level = levels.level(idx);
			for segment in self.segments(level) {
				sink.add_segment(idx, segment.start, segment.end);
				if sink.polygonize() {
					sink.add_segment(idx + 1, segment.start, segment.end);
				}
			}
		}
	}

	/// One border segment per level crossing the side's value span, walking
	/// from the lower-valued corner to the higher-valued one. On the upper
	/// and left sides the emitted orientation is flipped so neighbouring
	/// cells agree on direction.
	fn emit_border_segments(&self, border: Border, levels: &LevelGenerator, sink: &mut dyn SegmentSink) {
		let (first, second) = self.side_corners(border);

		let descending = first.value > second.value;
		let (mut last, end_point) = if descending {
			(second.point, first.point)
		} else {
			(first.point, second.point)
		};
		let flip = descending && (border == Border::Upper || border == Border::Left);

		let range = levels.range(first.value, second.value);
		for idx in range.indices() {
			let next = self.interpolate(border, levels.level(idx));
			if flip {
				sink.add_border_segment(idx, next, last);
			} else {
				sink.add_border_segment(idx, last, next);
			}
			last = next;
		}
		if flip {
			sink.add_border_segment(range.end, end_point, last);
		} else {
			sink.add_border_segment(range.end, last, end_point);
		}
	}
}

fn interpolate_crossing(level: f64, x1: f64, x2: f64, v1: f64, v2: f64) -> f64 {
	let f1 = fudge(level, v1);
	let f2 = fudge(level, v2);
	let ratio = ((level - f1) / (f2 - f1)).clamp(EPS, 1.0 - EPS);
	x1 * (1.0 - ratio) + x2 * ratio
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::Result;
	use rstest::rstest;

	#[derive(Default)]
	struct RecordingSink {
		polygonize: bool,
		segments: Vec<(i64, Point, Point)>,
		border_segments: Vec<(i64, Point, Point)>,
	}

	impl SegmentSink for RecordingSink {
		fn polygonize(&self) -> bool {
			self.polygonize
		}

		fn add_segment(&mut self, level_idx: i64, start: Point, end: Point) {
			self.segments.push((level_idx, start, end));
		}

		fn add_border_segment(&mut self, level_idx: i64, start: Point, end: Point) {
			self.border_segments.push((level_idx, start, end));
		}

		fn begin_row(&mut self) {}

		fn end_row(&mut self) -> Result<()> {
			Ok(())
		}
	}

	/// Unit cell with upper row at y=0 and lower row at y=1.
	fn cell(ul: f64, ur: f64, ll: f64, lr: f64, borders: EnumSet<Border>) -> Cell {
		Cell::new(
			ValuedPoint::new(0.0, 0.0, ul),
			ValuedPoint::new(1.0, 0.0, ur),
			ValuedPoint::new(0.0, 1.0, ll),
			ValuedPoint::new(1.0, 1.0, lr),
			borders,
		)
	}

	fn unit_levels(levels: Vec<f64>) -> LevelGenerator {
		LevelGenerator::fixed(levels, 1e9).unwrap()
	}

	#[test]
	fn all_low_and_all_high_emit_nothing() {
		let levels = unit_levels(vec![10.0]);
		let mut sink = RecordingSink::default();
		cell(0.0, 0.0, 0.0, 0.0, EnumSet::empty()).process(&levels, &mut sink);
		cell(20.0, 20.0, 20.0, 20.0, EnumSet::empty()).process(&levels, &mut sink);
		assert!(sink.segments.is_empty());
	}

	#[test]
	fn plateau_between_levels_emits_nothing() {
		let levels = unit_levels(vec![1.0, 2.0]);
		let mut sink = RecordingSink::default();
		cell(1.5, 1.5, 1.5, 1.5, EnumSet::empty()).process(&levels, &mut sink);
		assert!(sink.segments.is_empty());
	}

	#[test]
	fn vertical_crossing() {
		// left column low, right column high: one LOWER→UPPER segment at x=0.5
		let levels = unit_levels(vec![1.0]);
		let mut sink = RecordingSink::default();
		cell(0.0, 2.0, 0.0, 2.0, EnumSet::empty()).process(&levels, &mut sink);

		assert_eq!(sink.segments.len(), 1);
		let (idx, start, end) = sink.segments[0];
		assert_eq!(idx, 0);
		assert!(start.eq_eps(&Point::new(0.5, 1.0)));
		assert!(end.eq_eps(&Point::new(0.5, 0.0)));
	}

	#[test]
	fn horizontal_crossing() {
		// upper row low, lower row high: one LEFT→RIGHT segment at y=0.5
		let levels = unit_levels(vec![1.0]);
		let mut sink = RecordingSink::default();
		cell(0.0, 0.0, 2.0, 2.0, EnumSet::empty()).process(&levels, &mut sink);

		assert_eq!(sink.segments.len(), 1);
		let (_, start, end) = sink.segments[0];
		assert!(start.eq_eps(&Point::new(0.0, 0.5)));
		assert!(end.eq_eps(&Point::new(1.0, 0.5)));
	}

	// opposite high corners; both saddle cases yield LEFT→LOWER and
	// RIGHT→UPPER (connect-low convention)
	#[rstest]
	#[case::saddle_nw(2.0, 0.0, 0.0, 2.0)]
	#[case::saddle_ne(0.0, 2.0, 2.0, 0.0)]
	fn saddle_connects_low(#[case] ul: f64, #[case] ur: f64, #[case] ll: f64, #[case] lr: f64) {
		let levels = unit_levels(vec![1.0]);
		let mut sink = RecordingSink::default();
		cell(ul, ur, ll, lr, EnumSet::empty()).process(&levels, &mut sink);

		assert_eq!(sink.segments.len(), 2);
		let (_, s0, e0) = sink.segments[0];
		let (_, s1, e1) = sink.segments[1];
		// first piece runs between the left and lower sides
		assert_eq!(s0.x(), 0.0);
		assert_eq!(e0.y(), 1.0);
		// second piece between the right and upper sides
		assert_eq!(s1.x(), 1.0);
		assert_eq!(e1.y(), 0.0);
	}

	#[test]
	fn exact_on_level_corner_counts_as_above() {
		// lower-left corner exactly on the level: fudged above, so the cell
		// reads LL|LR and the crossing on the left side stays strictly off
		// the corner
		let levels = unit_levels(vec![1.0]);
		let mut sink = RecordingSink::default();
		cell(0.0, 0.0, 1.0, 2.0, EnumSet::empty()).process(&levels, &mut sink);

		assert_eq!(sink.segments.len(), 1);
		let (_, start, end) = sink.segments[0];
		// LEFT→RIGHT piece; the left crossing sits just above the corner
		assert_eq!(start.x(), 0.0);
		assert!(start.y() < 1.0);
		assert!(end.eq_eps(&Point::new(1.0, 0.5)));
		assert!(!start.eq_eps(&end));
	}

	#[test]
	fn multiple_levels_sweep_the_cell() {
		let levels = unit_levels(vec![1.0, 2.0, 3.0]);
		let mut sink = RecordingSink::default();
		cell(0.0, 4.0, 0.0, 4.0, EnumSet::empty()).process(&levels, &mut sink);

		let indices: Vec<i64> = sink.segments.iter().map(|s| s.0).collect();
		assert_eq!(indices, vec![0, 1, 2]);
	}

	#[test]
	fn polygonize_re_emits_under_next_level() {
		let levels = unit_levels(vec![1.0, 2.0]);
		let mut sink = RecordingSink {
			polygonize: true,
			..Default::default()
		};
		cell(0.0, 1.5, 0.0, 1.5, EnumSet::empty()).process(&levels, &mut sink);

		let indices: Vec<i64> = sink.segments.iter().map(|s| s.0).collect();
		assert_eq!(indices, vec![0, 1]);
		assert!(sink.segments[0].1.eq_eps(&sink.segments[1].1));
	}

	#[test]
	fn nan_corner_splits_into_sub_cells() {
		// one NaN corner: three sub-cells survive, and the NaN-facing sides
		// become borders (visible as border segments in polygonize mode)
		let levels = unit_levels(vec![1.0]);
		let mut sink = RecordingSink {
			polygonize: true,
			..Default::default()
		};
		cell(f64::NAN, 2.0, 0.0, 2.0, EnumSet::empty()).process(&levels, &mut sink);

		assert!(!sink.segments.is_empty());
		assert!(!sink.border_segments.is_empty());
		// everything stays inside the unit cell
		for (_, start, end) in sink.segments.iter().chain(&sink.border_segments) {
			for p in [start, end] {
				assert!(p.x() >= 0.0 && p.x() <= 1.0);
				assert!(p.y() >= 0.0 && p.y() <= 1.0);
			}
		}
	}

	#[test]
	fn all_nan_emits_nothing() {
		let levels = unit_levels(vec![1.0]);
		let mut sink = RecordingSink {
			polygonize: true,
			..Default::default()
		};
		let nan = f64::NAN;
		cell(nan, nan, nan, nan, EnumSet::all()).process(&levels, &mut sink);
		assert!(sink.segments.is_empty());
		assert!(sink.border_segments.is_empty());
	}

	#[test]
	fn border_segments_chain_along_each_side() {
		// left column 0, right column 1, level 0.5, all sides are borders
		let levels = unit_levels(vec![0.5]);
		let mut sink = RecordingSink {
			polygonize: true,
			..Default::default()
		};
		cell(0.0, 1.0, 0.0, 1.0, EnumSet::all()).process(&levels, &mut sink);

		// LEFT: constant 0 → one uncrossed piece; RIGHT: constant 1 → one;
		// LOWER and UPPER: crossed once → two pieces each
		assert_eq!(sink.border_segments.len(), 6);

		// pieces on the lower side chain through the crossing at x=0.5
		let lower: Vec<_> = sink
			.border_segments
			.iter()
			.filter(|(_, s, e)| s.y() == 1.0 && e.y() == 1.0)
			.collect();
		assert_eq!(lower.len(), 2);
		assert!(lower[0].2.eq_eps(&lower[1].1));

		// interior crossing present exactly once per emitted level index
		assert_eq!(sink.segments.len(), 2);
	}

	#[test]
	fn border_orientation_is_deterministic_between_neighbours() {
		// two horizontally adjacent cells sharing the seam at x=1: the shared
		// upper border pieces of both runs must use identical coordinates
		let levels = unit_levels(vec![0.5]);

		let mut left_sink = RecordingSink {
			polygonize: true,
			..Default::default()
		};
		let left = Cell::new(
			ValuedPoint::new(0.0, 0.0, 0.0),
			ValuedPoint::new(1.0, 0.0, 0.4),
			ValuedPoint::new(0.0, 1.0, 0.0),
			ValuedPoint::new(1.0, 1.0, 0.4),
			Border::Upper | Border::Lower,
		);
		left.process(&levels, &mut left_sink);

		let mut right_sink = RecordingSink {
			polygonize: true,
			..Default::default()
		};
		let right = Cell::new(
			ValuedPoint::new(1.0, 0.0, 0.4),
			ValuedPoint::new(2.0, 0.0, 1.0),
			ValuedPoint::new(1.0, 1.0, 0.4),
			ValuedPoint::new(2.0, 1.0, 1.0),
			Border::Upper | Border::Lower,
		);
		right.process(&levels, &mut right_sink);

		// the right cell's upper chain starts where the left cell's ends
		let left_upper: Vec<_> = left_sink
			.border_segments
			.iter()
			.filter(|(_, s, _)| s.y() == 0.0)
			.collect();
		let right_upper: Vec<_> = right_sink
			.border_segments
			.iter()
			.filter(|(_, s, _)| s.y() == 0.0)
			.collect();
		assert!(!left_upper.is_empty() && !right_upper.is_empty());
		let seam = Point::new(1.0, 0.0);
		assert!(left_upper.iter().any(|(_, s, e)| s.eq_eps(&seam) || e.eq_eps(&seam)));
		assert!(right_upper.iter().any(|(_, s, e)| s.eq_eps(&seam) || e.eq_eps(&seam)));
	}
}
