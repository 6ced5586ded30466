//! The raster collaborator contracts and an in-memory implementation.
//!
//! Decoding actual raster formats (GeoTIFF, DEM tiles, …) is the caller's
//! business; the pipeline only ever pulls rows through [`Raster`].

use anyhow::{Result, bail, ensure};
use isohypse_geometry::geo::{GeoTransform, Srs};
use itertools::Itertools;

/// A grid of scalar samples the pipeline can read row by row.
pub trait Raster {
	/// `(width, height)` in samples.
	fn size(&self) -> (usize, usize);

	/// Copies row `y` into `row` (`row.len() == width`). A failed fetch
	/// aborts the whole generate call.
	fn fetch_line(&mut self, y: usize, row: &mut [f64]) -> Result<()>;

	/// The sentinel value to treat as NaN, if any.
	fn nodata(&self) -> Option<f64>;

	/// `(min, max)` over valid samples. Fixed-level mode uses the maximum as
	/// its terminal level; polygon mode seeds the first band floor with the
	/// minimum.
	fn range(&self) -> (f64, f64);

	/// Affine cell-to-world transform.
	fn geo_transform(&self) -> GeoTransform;

	/// Spatial reference of the raster, forwarded untouched to the writer.
	fn srs(&self) -> Srs;
}

/// A sequence of abutting rasters ("tiles"). Order is the provider's
/// contract; the tile stitcher derives its seam tolerance from the first
/// tile's pixel size.
pub trait RasterProvider {
	fn has_next(&self) -> bool;

	/// The next tile. Calling it when `has_next()` is false is an error.
	fn next_raster(&mut self) -> Result<&mut dyn Raster>;

	/// Rewinds to the first tile.
	fn reset(&mut self);
}

/// A raster fully resident in memory, in row-major order. Doubles as the
/// test grid helper.
#[derive(Clone, Debug)]
pub struct MemoryRaster {
	width: usize,
	height: usize,
	grid: Vec<f64>,
	nodata: Option<f64>,
	geo_transform: GeoTransform,
	srs: Srs,
	min: f64,
	max: f64,
}

impl MemoryRaster {
	/// Builds a raster from row-major values, scanning the value range while
	/// skipping NaN (and the nodata sentinel, when given).
	pub fn new(width: usize, height: usize, grid: Vec<f64>, nodata: Option<f64>) -> Result<Self> {
		ensure!(
			grid.len() == width * height,
			"grid has {} values, expected {width}x{height}",
			grid.len()
		);
		let mut min = f64::INFINITY;
		let mut max = f64::NEG_INFINITY;
		for &v in &grid {
			if v.is_nan() || nodata == Some(v) {
				continue;
			}
			min = min.min(v);
			max = max.max(v);
		}
		Ok(Self {
			width,
			height,
			grid,
			nodata,
			geo_transform: GeoTransform::default(),
			srs: Srs::default(),
			min,
			max,
		})
	}

	/// Builds a raster from rows of equal length.
	pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
		ensure!(!rows.is_empty(), "raster needs at least one row");
		let width = rows[0].len();
		ensure!(rows.iter().all(|r| r.len() == width), "rows differ in length");
		Self::new(width, rows.len(), rows.concat(), None)
	}

	pub fn with_geo_transform(mut self, geo_transform: GeoTransform) -> Self {
		self.geo_transform = geo_transform;
		self
	}

	pub fn with_srs(mut self, srs: Srs) -> Self {
		self.srs = srs;
		self
	}

	pub fn value(&self, x: usize, y: usize) -> f64 {
		self.grid[y * self.width + x]
	}

	/// Picks `count` levels at equal pixel-count quantiles of the value
	/// distribution. Handy as input to fixed-level mode when the value range
	/// is unevenly populated.
	pub fn quantile_levels(&self, count: usize) -> Vec<f64> {
		let sorted: Vec<f64> = self
			.grid
			.iter()
			.copied()
			.filter(|v| !v.is_nan() && self.nodata != Some(*v))
			.sorted_by(f64::total_cmp)
			.collect();
		if sorted.is_empty() {
			return Vec::new();
		}
		(0..count)
			.map(|i| {
				let t = (i as f64 + 0.5) / count as f64;
				let pos = ((t * sorted.len() as f64) as usize).min(sorted.len() - 1);
				sorted[pos]
			})
			.collect()
	}
}

impl Raster for MemoryRaster {
	fn size(&self) -> (usize, usize) {
		(self.width, self.height)
	}

	fn fetch_line(&mut self, y: usize, row: &mut [f64]) -> Result<()> {
		if y >= self.height || row.len() != self.width {
			bail!("row {y} out of bounds for {}x{} raster", self.width, self.height);
		}
		row.copy_from_slice(&self.grid[y * self.width..(y + 1) * self.width]);
		Ok(())
	}

	fn nodata(&self) -> Option<f64> {
		self.nodata
	}

	fn range(&self) -> (f64, f64) {
		(self.min, self.max)
	}

	fn geo_transform(&self) -> GeoTransform {
		self.geo_transform
	}

	fn srs(&self) -> Srs {
		self.srs
	}
}

/// A provider over pre-built in-memory tiles.
pub struct SliceRasterProvider {
	tiles: Vec<MemoryRaster>,
	index: usize,
}

impl SliceRasterProvider {
	pub fn new(tiles: Vec<MemoryRaster>) -> Self {
		Self { tiles, index: 0 }
	}
}

impl RasterProvider for SliceRasterProvider {
	fn has_next(&self) -> bool {
		self.index < self.tiles.len()
	}

	fn next_raster(&mut self) -> Result<&mut dyn Raster> {
		if self.index >= self.tiles.len() {
			bail!("tile provider exhausted after {} tiles", self.tiles.len());
		}
		let tile = &mut self.tiles[self.index];
		self.index += 1;
		Ok(tile)
	}

	fn reset(&mut self) {
		self.index = 0;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn range_skips_nan_and_nodata() {
		let r = MemoryRaster::new(2, 2, vec![1.0, f64::NAN, -9999.0, 5.0], Some(-9999.0)).unwrap();
		assert_eq!(r.range(), (1.0, 5.0));
	}

	#[test]
	fn new_rejects_wrong_grid_size() {
		assert!(MemoryRaster::new(2, 2, vec![0.0; 3], None).is_err());
	}

	#[test]
	fn fetch_line_copies_rows() {
		let mut r = MemoryRaster::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
		let mut row = vec![0.0; 2];
		r.fetch_line(1, &mut row).unwrap();
		assert_eq!(row, vec![3.0, 4.0]);
		assert!(r.fetch_line(2, &mut row).is_err());
	}

	#[test]
	fn quantile_levels_hit_distribution() {
		let grid: Vec<f64> = (0..100).map(f64::from).collect();
		let r = MemoryRaster::new(10, 10, grid, None).unwrap();
		let levels = r.quantile_levels(4);
		assert_eq!(levels, vec![12.0, 37.0, 62.0, 87.0]);
	}

	#[test]
	fn provider_iterates_and_resets() {
		let tile = MemoryRaster::from_rows(&[vec![0.0]]).unwrap();
		let mut provider = SliceRasterProvider::new(vec![tile.clone(), tile]);
		let mut n = 0;
		while provider.has_next() {
			provider.next_raster().unwrap();
			n += 1;
		}
		assert_eq!(n, 2);
		assert!(provider.next_raster().is_err());
		provider.reset();
		assert!(provider.has_next());
	}
}
