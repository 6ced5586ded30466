//! ESRI ASCII-grid reader: the thin raster collaborator behind the CLI.
//! Heavier formats (GeoTIFF, DEM tiles) stay outside this repository.

use anyhow::{Context, Result, bail, ensure};
use isohypse_core::MemoryRaster;
use isohypse_geometry::geo::GeoTransform;
use std::path::Path;

#[derive(Default)]
struct Header {
	ncols: Option<usize>,
	nrows: Option<usize>,
	xll: Option<f64>,
	yll: Option<f64>,
	/// True when the lower-left keys name the cell centre, not its corner.
	centered: bool,
	cellsize: Option<f64>,
	nodata: Option<f64>,
}

/// Parses the text of an `.asc` file. The first data row is the
/// northernmost one, matching the derived north-up geotransform.
pub fn parse_asc(text: &str) -> Result<MemoryRaster> {
	let mut header = Header::default();
	let mut values: Vec<f64> = Vec::new();
	let mut in_header = true;

	for (line_no, line) in text.lines().enumerate() {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		if in_header {
			let mut parts = line.split_whitespace();
			let key = parts.next().unwrap_or_default().to_ascii_lowercase();
			if let Some(raw) = parts.next()
				&& parse_header_field(&mut header, &key, raw)
					.with_context(|| format!("line {}: bad header value {raw:?}", line_no + 1))?
			{
				continue;
			}
			in_header = false;
		}

		for token in line.split_whitespace() {
			let value: f64 = token
				.parse()
				.with_context(|| format!("line {}: bad sample {token:?}", line_no + 1))?;
			values.push(value);
		}
	}

	let ncols = header.ncols.context("missing ncols header")?;
	let nrows = header.nrows.context("missing nrows header")?;
	let cellsize = header.cellsize.context("missing cellsize header")?;
	ensure!(cellsize > 0.0, "cellsize must be positive, got {cellsize}");
	ensure!(
		values.len() == ncols * nrows,
		"expected {} samples ({ncols}x{nrows}), found {}",
		ncols * nrows,
		values.len()
	);

	let half = if header.centered { cellsize / 2.0 } else { 0.0 };
	let x_origin = header.xll.unwrap_or(0.0) - half;
	let y_top = header.yll.unwrap_or(0.0) - half + nrows as f64 * cellsize;
	let geo_transform = GeoTransform([x_origin, cellsize, 0.0, y_top, 0.0, -cellsize]);

	Ok(MemoryRaster::new(ncols, nrows, values, header.nodata)?.with_geo_transform(geo_transform))
}

/// Returns whether the key was a known header field; unknown keys end the
/// header section.
fn parse_header_field(header: &mut Header, key: &str, raw: &str) -> Result<bool> {
	match key {
		"ncols" => header.ncols = Some(raw.parse()?),
		"nrows" => header.nrows = Some(raw.parse()?),
		"xllcorner" => header.xll = Some(raw.parse()?),
		"yllcorner" => header.yll = Some(raw.parse()?),
		"xllcenter" => {
			header.xll = Some(raw.parse()?);
			header.centered = true;
		}
		"yllcenter" => {
			header.yll = Some(raw.parse()?);
			header.centered = true;
		}
		"cellsize" => header.cellsize = Some(raw.parse()?),
		"nodata_value" => header.nodata = Some(raw.parse()?),
		_ => return Ok(false),
	}
	Ok(true)
}

/// Loads one `.asc` raster from disk.
pub fn read_asc(path: &Path) -> Result<MemoryRaster> {
	let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
	if text.trim_start().is_empty() {
		bail!("{} is empty", path.display());
	}
	parse_asc(&text).with_context(|| format!("parsing {}", path.display()))
}
