//! The reference feature writer: newline-delimited GeoJSON features, or a
//! single FeatureCollection document.

use crate::writer::FeatureSink;
use anyhow::{Result, anyhow};
use isohypse_geometry::geo::{Geometry, Srs};
use isohypse_geometry::geojson::feature_to_json;
use serde_json::json;
use std::io::Write;
use std::sync::Mutex;

/// Property names on emitted features.
#[derive(Clone, Debug)]
pub struct FieldNames {
	/// Line features: the iso-value.
	pub elevation: String,
	/// Band features: the floor of the band.
	pub elevation_min: String,
	/// Band features: the ceiling of the band.
	pub elevation_max: String,
}

impl Default for FieldNames {
	fn default() -> Self {
		Self {
			elevation: "Elevation".to_string(),
			elevation_min: "ElevationMin".to_string(),
			elevation_max: "ElevationMax".to_string(),
		}
	}
}

/// Output document shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GeoJsonLayout {
	/// One feature per line (NDJSON).
	#[default]
	NewlineDelimited,
	/// A `FeatureCollection` wrapping every feature.
	FeatureCollection,
}

struct WriterState<W: Write> {
	output: W,
	next_id: i64,
	feature_count: u64,
}

/// Writes contour features as GeoJSON. Feature ids increment per write; the
/// inner state sits behind a mutex so a future multi-tile batcher can share
/// the writer.
pub struct GeoJsonWriter<W: Write> {
	state: Mutex<WriterState<W>>,
	layout: GeoJsonLayout,
	fields: FieldNames,
	/// Put the iso-value into every coordinate as z.
	elevation_as_z: bool,
}

impl<W: Write> GeoJsonWriter<W> {
	pub fn new(output: W, layout: GeoJsonLayout) -> Self {
		Self {
			state: Mutex::new(WriterState {
				output,
				next_id: 0,
				feature_count: 0,
			}),
			layout,
			fields: FieldNames::default(),
			elevation_as_z: false,
		}
	}

	pub fn with_fields(mut self, fields: FieldNames) -> Self {
		self.fields = fields;
		self
	}

	pub fn with_elevation_as_z(mut self, enabled: bool) -> Self {
		self.elevation_as_z = enabled;
		self
	}

	/// Finishes the document and hands the output back.
	pub fn into_inner(self) -> Result<W> {
		let mut state = self
			.state
			.into_inner()
			.map_err(|_| anyhow!("geojson writer mutex poisoned"))?;
		if self.layout == GeoJsonLayout::FeatureCollection {
			if state.feature_count == 0 {
				state.output.write_all(b"{\"type\": \"FeatureCollection\", \"features\": [")?;
			}
			state.output.write_all(b"]}\n")?;
		}
		state.output.flush()?;
		Ok(state.output)
	}

	fn lock(&self) -> Result<std::sync::MutexGuard<'_, WriterState<W>>> {
		self.state.lock().map_err(|_| anyhow!("geojson writer mutex poisoned"))
	}
}

impl<W: Write> FeatureSink for GeoJsonWriter<W> {
	fn write(&mut self, prev_level: f64, curr_level: f64, geometry: Geometry, _srs: Srs) -> Result<()> {
		let mut state = self.lock()?;

		let mut properties = serde_json::Map::new();
		if prev_level == curr_level {
			properties.insert(self.fields.elevation.clone(), json!(curr_level));
		} else {
			properties.insert(self.fields.elevation_min.clone(), json!(prev_level));
			properties.insert(self.fields.elevation_max.clone(), json!(curr_level));
		}
		let properties = serde_json::Value::Object(properties);

		let z = self.elevation_as_z.then_some(curr_level);
		let id = state.next_id;
		state.next_id += 1;
		let feature = feature_to_json(id, &geometry, z, properties);

		match self.layout {
			GeoJsonLayout::NewlineDelimited => {
				serde_json::to_writer(&mut state.output, &feature)?;
				state.output.write_all(b"\n")?;
			}
			GeoJsonLayout::FeatureCollection => {
				if state.feature_count == 0 {
					state.output.write_all(b"{\"type\": \"FeatureCollection\", \"features\": [")?;
				} else {
					state.output.write_all(b",")?;
				}
				serde_json::to_writer(&mut state.output, &feature)?;
			}
		}
		state.feature_count += 1;
		Ok(())
	}

	fn flush(&mut self) -> Result<()> {
		self.lock()?.output.flush()?;
		Ok(())
	}

	fn close(&mut self) -> Result<()> {
		let mut state = self.lock()?;
		if self.layout == GeoJsonLayout::FeatureCollection {
			if state.feature_count == 0 {
				state.output.write_all(b"{\"type\": \"FeatureCollection\", \"features\": [")?;
			}
			state.output.write_all(b"]}\n")?;
			// a second close must not duplicate the footer
			state.feature_count = 0;
		}
		state.output.flush()?;
		Ok(())
	}
}
