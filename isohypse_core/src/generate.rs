//! Entry points: contour a single raster, or a stream of abutting tiles.

use crate::levels::LevelGenerator;
use crate::pipeline::{RowSweep, SegmentMerger};
use crate::polygonize::RingPolygonizer;
use crate::raster::{Raster, RasterProvider};
use crate::stitch::TileStitcher;
use crate::writer::{FeatureSink, LineContourWriter, PolygonContourWriter};
use anyhow::Result;

/// What to extract and at which levels. When several level modes are set,
/// fixed levels win over the exponential base, which wins over the interval.
#[derive(Clone, Debug, Default)]
pub struct ContourOptions {
	/// Emit filled bands between consecutive levels instead of lines.
	pub polygonize: bool,
	/// Interval mode: distance between levels.
	pub interval: f64,
	/// Interval mode: offset of the level ladder.
	pub base: f64,
	/// Exponential mode, enabled when > 0: levels are powers of this base.
	pub exp_base: f64,
	/// Fixed mode, enabled when non-empty: explicit sorted levels.
	pub fixed_levels: Vec<f64>,
	/// Overrides the raster's own nodata sentinel.
	pub nodata: Option<f64>,
}

impl ContourOptions {
	/// Builds the level generator for one raster, applying the mode
	/// precedence. The raster's value maximum becomes fixed mode's terminal
	/// level.
	pub fn level_generator(&self, range: (f64, f64)) -> Result<LevelGenerator> {
		if !self.fixed_levels.is_empty() {
			LevelGenerator::fixed(self.fixed_levels.clone(), range.1)
		} else if self.exp_base > 0.0 {
			LevelGenerator::exponential(self.exp_base)
		} else {
			LevelGenerator::interval(self.base, self.interval)
		}
	}
}

/// Contours one raster into `sink`.
pub fn generate(raster: &mut dyn Raster, sink: &mut dyn FeatureSink, options: &ContourOptions) -> Result<()> {
	let (width, height) = raster.size();
	let levels = options.level_generator(raster.range())?;
	let nodata = options.nodata.or(raster.nodata());
	let geo_transform = raster.geo_transform();
	let srs = raster.srs();
	let range_min = raster.range().0;

	if options.polygonize {
		let mut polygonizer = RingPolygonizer::new(true);
		{
			let mut merger = SegmentMerger::new(&levels, &mut polygonizer, true, true);
			RowSweep::new(width, height, nodata).process(raster, &levels, &mut merger)?;
			merger.close()?;
		}
		let mut writer = PolygonContourWriter::new(sink, geo_transform, srs, range_min);
		polygonizer.flush(&mut writer)?;
	} else {
		let mut writer = LineContourWriter::new(sink, geo_transform, srs);
		let mut merger = SegmentMerger::new(&levels, &mut writer, false, true);
		RowSweep::new(width, height, nodata).process(raster, &levels, &mut merger)?;
		merger.close()?;
	}
	Ok(())
}

/// Contours every tile of a provider. In line mode each tile stands alone;
/// in polygon mode open contours are stitched across tile seams before
/// anything is emitted.
pub fn generate_tiled(
	provider: &mut dyn RasterProvider,
	sink: &mut dyn FeatureSink,
	options: &ContourOptions,
) -> Result<()> {
	if !options.polygonize {
		while provider.has_next() {
			let raster = provider.next_raster()?;
			generate(raster, sink, options)?;
		}
		return Ok(());
	}

	let mut stitcher = TileStitcher::new(sink);
	while provider.has_next() {
		let raster = provider.next_raster()?;
		let (width, height) = raster.size();
		let levels = options.level_generator(raster.range())?;
		let nodata = options.nodata.or(raster.nodata());
		log::debug!("contouring {width}x{height} tile");

		let mut appender = stitcher.begin_tile(&*raster);
		{
			// no NaN frame here: contours reaching a tile edge stay open for
			// the stitcher to claim, so the per-tile merger must not warn
			// about them either
			let mut merger = SegmentMerger::new(&levels, &mut appender, true, false);
			RowSweep::open_boundary(width, height, nodata).process(raster, &levels, &mut merger)?;
			merger.close()?;
		}
		stitcher.end_tile(appender)?;
	}
	stitcher.close()
}
