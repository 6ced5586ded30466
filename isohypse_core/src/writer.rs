//! Sink traits between the pipeline stages, and the thin adapters that move
//! geometry from cell space into world space before it reaches the feature
//! writer.

use anyhow::Result;
use isohypse_geometry::geo::{GeoTransform, Geometry, LineString, Point, Polygon, Ring, Srs};

/// Receives per-cell segment events from the cell engine. Implemented by the
/// segment merger.
pub trait SegmentSink {
	/// Whether the run produces filled bands. Controls border-segment
	/// emission and the double emission of interior segments.
	fn polygonize(&self) -> bool;

	fn add_segment(&mut self, level_idx: i64, start: Point, end: Point);

	/// A segment known to lie on the raster boundary. Merged exactly like an
	/// interior segment.
	fn add_border_segment(&mut self, level_idx: i64, start: Point, end: Point);

	/// Row framing, used for lazy flushing in line mode.
	fn begin_row(&mut self);
	fn end_row(&mut self) -> Result<()>;
}

/// Receives finished polylines from the segment merger.
pub trait LineSink {
	/// `closed` is true iff front and back coincide under the tolerance.
	fn add_line(&mut self, level: f64, line: LineString, closed: bool) -> Result<()>;
}

/// Polygon assembly state machine:
/// `start_polygon → (add_part (add_interior_ring)*)* → end_polygon`.
pub trait PolygonSink {
	fn start_polygon(&mut self, level: f64);
	fn add_part(&mut self, part: &LineString);
	fn add_interior_ring(&mut self, ring: &LineString);
	fn end_polygon(&mut self) -> Result<()>;
}

/// The single outward contract. `prev_level == curr_level` denotes a line,
/// `prev_level < curr_level` a filled band between the two.
pub trait FeatureSink {
	fn write(&mut self, prev_level: f64, curr_level: f64, geometry: Geometry, srs: Srs) -> Result<()>;
	fn flush(&mut self) -> Result<()>;
	fn close(&mut self) -> Result<()>;
}

/// Line-mode adapter: transforms each polyline to world coordinates and
/// writes it directly.
pub struct LineContourWriter<'a> {
	sink: &'a mut dyn FeatureSink,
	geo_transform: GeoTransform,
	srs: Srs,
}

impl<'a> LineContourWriter<'a> {
	pub fn new(sink: &'a mut dyn FeatureSink, geo_transform: GeoTransform, srs: Srs) -> Self {
		Self {
			sink,
			geo_transform,
			srs,
		}
	}
}

impl LineSink for LineContourWriter<'_> {
	fn add_line(&mut self, level: f64, line: LineString, _closed: bool) -> Result<()> {
		let world = line.transform(&self.geo_transform);
		self.sink.write(level, level, Geometry::LineString(world), self.srs)
	}
}

/// Polygon-mode adapter. Tracks the previously started polygon's level so a
/// band carries `(floor, ceiling)`; the first floor is the raster range
/// minimum.
pub struct PolygonContourWriter<'a> {
	sink: &'a mut dyn FeatureSink,
	geo_transform: GeoTransform,
	srs: Srs,
	previous_level: f64,
	current_level: f64,
	finished: Vec<Polygon>,
	current: Option<Polygon>,
}

impl<'a> PolygonContourWriter<'a> {
	pub fn new(sink: &'a mut dyn FeatureSink, geo_transform: GeoTransform, srs: Srs, range_min: f64) -> Self {
		Self {
			sink,
			geo_transform,
			srs,
			previous_level: range_min,
			current_level: range_min,
			finished: Vec::new(),
			current: None,
		}
	}

	fn to_world(&self, ls: &LineString) -> Ring {
		Ring(ls.transform(&self.geo_transform))
	}
}

impl PolygonSink for PolygonContourWriter<'_> {
	fn start_polygon(&mut self, level: f64) {
		self.previous_level = self.current_level;
		self.current_level = level;
		self.finished.clear();
		self.current = None;
	}

	fn add_part(&mut self, part: &LineString) {
		if let Some(done) = self.current.take() {
			self.finished.push(done);
		}
		self.current = Some(Polygon::new(self.to_world(part)));
	}

	fn add_interior_ring(&mut self, ring: &LineString) {
		let hole = self.to_world(ring);
		if let Some(current) = &mut self.current {
			current.add_hole(hole);
		}
	}

	fn end_polygon(&mut self) -> Result<()> {
		if let Some(done) = self.current.take() {
			self.finished.push(done);
		}
		for polygon in self.finished.drain(..) {
			self
				.sink
				.write(self.previous_level, self.current_level, Geometry::Polygon(polygon), self.srs)?;
		}
		Ok(())
	}
}


#[cfg(test)]
mod tests {
	use super::test_support::CollectingSink;
	use super::*;

	fn ring(points: Vec<[f64; 2]>) -> LineString {
		LineString::from(points)
	}

	#[test]
	fn line_writer_transforms_and_repeats_level() {
		let mut sink = CollectingSink::default();
		let gt = GeoTransform([10.0, 2.0, 0.0, 0.0, 0.0, 2.0]);
		let mut writer = LineContourWriter::new(&mut sink, gt, Srs::default());
		writer
			.add_line(100.0, ring(vec![[0.0, 0.0], [1.0, 0.0]]), false)
			.unwrap();

		let (prev, curr, geometry) = &sink.features[0];
		assert_eq!((*prev, *curr), (100.0, 100.0));
		match geometry {
			Geometry::LineString(ls) => {
				assert!(ls.front().unwrap().eq_eps(&Point::new(10.0, 0.0)));
				assert!(ls.back().unwrap().eq_eps(&Point::new(12.0, 0.0)));
			}
			Geometry::Polygon(_) => panic!("expected a linestring"),
		}
	}

	#[test]
	fn polygon_writer_tracks_band_floors() {
		let mut sink = CollectingSink::default();
		let mut writer = PolygonContourWriter::new(&mut sink, GeoTransform::default(), Srs::default(), 7.0);

		let square = ring(vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]]);
		writer.start_polygon(10.0);
		writer.add_part(&square);
		writer.end_polygon().unwrap();

		writer.start_polygon(20.0);
		writer.add_part(&square);
		writer.end_polygon().unwrap();

		assert_eq!(sink.features.len(), 2);
		assert_eq!((sink.features[0].0, sink.features[0].1), (7.0, 10.0));
		assert_eq!((sink.features[1].0, sink.features[1].1), (10.0, 20.0));
	}

	#[test]
	fn polygon_writer_groups_holes_with_their_part() {
		let mut sink = CollectingSink::default();
		let mut writer = PolygonContourWriter::new(&mut sink, GeoTransform::default(), Srs::default(), 0.0);

		let outer = ring(vec![[0.0, 0.0], [8.0, 0.0], [8.0, 8.0], [0.0, 8.0], [0.0, 0.0]]);
		let hole = ring(vec![[2.0, 2.0], [3.0, 2.0], [3.0, 3.0], [2.0, 3.0], [2.0, 2.0]]);
		let lone = ring(vec![[20.0, 0.0], [24.0, 0.0], [24.0, 4.0], [20.0, 4.0], [20.0, 0.0]]);

		writer.start_polygon(5.0);
		writer.add_part(&outer);
		writer.add_interior_ring(&hole);
		writer.add_part(&lone);
		writer.end_polygon().unwrap();

		assert_eq!(sink.features.len(), 2);
		match &sink.features[0].2 {
			Geometry::Polygon(p) => assert_eq!(p.0.len(), 2),
			Geometry::LineString(_) => panic!("expected a polygon"),
		}
		match &sink.features[1].2 {
			Geometry::Polygon(p) => assert_eq!(p.0.len(), 1),
			Geometry::LineString(_) => panic!("expected a polygon"),
		}
	}
}
