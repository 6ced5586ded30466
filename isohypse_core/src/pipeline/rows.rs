//! The row driver: walks the raster top to bottom with a one-row window and
//! feeds 2×2 cells to the cell engine.

use super::cell::Cell;
use crate::levels::LevelGenerator;
use crate::raster::Raster;
use crate::writer::SegmentSink;
use anyhow::{Context, Result};
use enumset::EnumSet;
use isohypse_geometry::geo::ValuedPoint;

/// Sweeps rows over a raster. Sample `(i, j)` sits at cell coordinates
/// `(i + ½, j + ½)`; one synthetic NaN row beyond each edge closes contours
/// against the raster boundary through the cell engine's NaN handling.
pub struct RowSweep {
	width: usize,
	height: usize,
	nodata: Option<f64>,
	framed: bool,
	row_idx: usize,
	previous: Vec<f64>,
}

impl RowSweep {
	pub fn new(width: usize, height: usize, nodata: Option<f64>) -> Self {
		Self {
			width,
			height,
			nodata,
			framed: true,
			row_idx: 0,
			previous: vec![f64::NAN; width],
		}
	}

	/// A sweep without the NaN frame: only cells whose four corners are real
	/// samples are processed, so contours reaching the raster edge end there
	/// as open lines. Tiled polygon mode runs this way and leaves the seam
	/// endpoints for the tile stitcher to rejoin.
	pub fn open_boundary(width: usize, height: usize, nodata: Option<f64>) -> Self {
		Self {
			framed: false,
			..Self::new(width, height, nodata)
		}
	}

	fn sample(&self, row: Option<&[f64]>, idx: isize) -> f64 {
		let Some(row) = row else {
			return f64::NAN;
		};
		if idx < 0 || idx as usize >= row.len() {
			return f64::NAN;
		}
		let value = row[idx as usize];
		if self.nodata == Some(value) { f64::NAN } else { value }
	}

	/// One cell-row sweep: cells for `x ∈ [-1, width-1]`, columns out of
	/// range contributing NaN. `None` is the synthetic trailing row.
	fn sweep(&mut self, row: Option<&[f64]>, levels: &LevelGenerator, sink: &mut dyn SegmentSink) -> Result<()> {
		sink.begin_row();

		let columns = if self.framed {
			-1..self.width as isize
		} else {
			0..self.width as isize - 1
		};

		let y = self.row_idx as f64;
		for col in columns {
			let x = col as f64;
			let previous = Some(self.previous.as_slice());
			let upper_left = ValuedPoint::new(x + 0.5, y - 0.5, self.sample(previous, col));
			let upper_right = ValuedPoint::new(x + 1.5, y - 0.5, self.sample(previous, col + 1));
			let lower_left = ValuedPoint::new(x + 0.5, y + 0.5, self.sample(row, col));
			let lower_right = ValuedPoint::new(x + 1.5, y + 0.5, self.sample(row, col + 1));

			Cell::new(upper_left, upper_right, lower_left, lower_right, EnumSet::empty()).process(levels, sink);
		}

		if let Some(row) = row {
			self.previous.copy_from_slice(row);
		}
		self.row_idx += 1;

		sink.end_row()
	}

	/// Feeds one raster row; after the last one, appends the synthetic NaN
	/// row so the sweep count is `height + 1`.
	pub fn feed_row(&mut self, row: &[f64], levels: &LevelGenerator, sink: &mut dyn SegmentSink) -> Result<()> {
		if self.row_idx > self.height {
			return Ok(());
		}
		if !self.framed && self.row_idx == 0 {
			// no frame: the first row only primes the window
			self.previous.copy_from_slice(row);
			self.row_idx += 1;
			return Ok(());
		}
		self.sweep(Some(row), levels, sink)?;
		if self.framed && self.row_idx == self.height {
			self.sweep(None, levels, sink)?;
		}
		Ok(())
	}

	/// Pulls every row out of the raster and runs the full sweep.
	pub fn process(&mut self, raster: &mut dyn Raster, levels: &LevelGenerator, sink: &mut dyn SegmentSink) -> Result<()> {
		let (width, height) = raster.size();
		let mut row = vec![0f64; width];
		for y in 0..height {
			raster
				.fetch_line(y, &mut row)
				.with_context(|| format!("fetching raster row {y}"))?;
			self.feed_row(&row, levels, sink)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::raster::MemoryRaster;
	use isohypse_geometry::geo::Point;

	#[derive(Default)]
	struct RecordingSink {
		segments: Vec<(i64, Point, Point)>,
		rows_begun: usize,
		rows_ended: usize,
	}

	impl SegmentSink for RecordingSink {
		fn polygonize(&self) -> bool {
			false
		}

		fn add_segment(&mut self, level_idx: i64, start: Point, end: Point) {
			self.segments.push((level_idx, start, end));
		}

		fn add_border_segment(&mut self, level_idx: i64, start: Point, end: Point) {
			self.segments.push((level_idx, start, end));
		}

		fn begin_row(&mut self) {
			self.rows_begun += 1;
		}

		fn end_row(&mut self) -> Result<()> {
			self.rows_ended += 1;
			Ok(())
		}
	}

	fn run(rows: &[Vec<f64>]) -> RecordingSink {
		let mut raster = MemoryRaster::from_rows(rows).unwrap();
		let levels = LevelGenerator::interval(0.0, 1.0).unwrap();
		let mut sink = RecordingSink::default();
		let (w, h) = raster.size();
		RowSweep::new(w, h, raster.nodata())
			.process(&mut raster, &levels, &mut sink)
			.unwrap();
		sink
	}

	#[test]
	fn emits_height_plus_one_row_events() {
		let sink = run(&[vec![0.5, 0.5], vec![0.5, 0.5], vec![0.5, 0.5]]);
		assert_eq!(sink.rows_begun, 4);
		assert_eq!(sink.rows_ended, 4);
	}

	#[test]
	fn single_sample_grid_produces_no_segments() {
		// W = H = 1: no interior crossings exist
		let sink = run(&[vec![0.5]]);
		assert!(sink.segments.is_empty());
	}

	#[test]
	fn all_nan_rows_produce_no_events() {
		let sink = run(&[vec![f64::NAN, f64::NAN], vec![f64::NAN, f64::NAN]]);
		assert!(sink.segments.is_empty());
	}

	#[test]
	fn nodata_sentinel_is_treated_as_nan() {
		let mut raster = MemoryRaster::new(2, 2, vec![-9999.0; 4], Some(-9999.0)).unwrap();
		let levels = LevelGenerator::interval(0.0, 1.0).unwrap();
		let mut sink = RecordingSink::default();
		RowSweep::new(2, 2, raster.nodata())
			.process(&mut raster, &levels, &mut sink)
			.unwrap();
		assert!(sink.segments.is_empty());
	}

	#[test]
	fn crossing_between_columns() {
		// constant columns 0 and 2: one vertical contour at the level 1
		// crossing, assembled from the full cell between the two samples
		let sink = run(&[vec![0.0, 2.0], vec![0.0, 2.0]]);
		let crossing: Vec<_> = sink
			.segments
			.iter()
			.filter(|(idx, _, _)| *idx == 1)
			.collect();
		assert!(!crossing.is_empty());
		// the full cell contributes the piece between the sample rows
		assert!(
			crossing
				.iter()
				.any(|(_, s, e)| s.eq_eps(&Point::new(1.0, 1.5)) && e.eq_eps(&Point::new(1.0, 0.5)))
		);
	}

	#[test]
	fn open_boundary_processes_only_full_cells() {
		// same gradient as crossing_between_columns, without the NaN frame:
		// only the single full cell runs, so exactly one segment per level
		let mut raster = MemoryRaster::from_rows(&[vec![0.0, 2.0], vec![0.0, 2.0]]).unwrap();
		let levels = LevelGenerator::interval(0.0, 1.0).unwrap();
		let mut sink = RecordingSink::default();
		RowSweep::open_boundary(2, 2, None)
			.process(&mut raster, &levels, &mut sink)
			.unwrap();

		assert_eq!(sink.rows_begun, 1);
		assert_eq!(sink.segments.len(), 2);
		assert!(
			sink.segments
				.iter()
				.any(|(idx, s, e)| *idx == 1 && s.eq_eps(&Point::new(1.0, 1.5)) && e.eq_eps(&Point::new(1.0, 0.5)))
		);
	}

	#[test]
	fn fetch_error_aborts() {
		struct FailingRaster;
		impl Raster for FailingRaster {
			fn size(&self) -> (usize, usize) {
				(2, 2)
			}
			fn fetch_line(&mut self, _y: usize, _row: &mut [f64]) -> Result<()> {
				anyhow::bail!("read failure")
			}
			fn nodata(&self) -> Option<f64> {
				None
			}
			fn range(&self) -> (f64, f64) {
				(0.0, 1.0)
			}
			fn geo_transform(&self) -> isohypse_geometry::geo::GeoTransform {
				isohypse_geometry::geo::GeoTransform::default()
			}
			fn srs(&self) -> isohypse_geometry::geo::Srs {
				isohypse_geometry::geo::Srs::default()
			}
		}

		let levels = LevelGenerator::interval(0.0, 1.0).unwrap();
		let mut sink = RecordingSink::default();
		let err = RowSweep::new(2, 2, None)
			.process(&mut FailingRaster, &levels, &mut sink)
			.unwrap_err();
		assert!(err.to_string().contains("row 0"));
	}
}
