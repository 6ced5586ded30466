//! Cross-tile stitching: open contour lines whose endpoints meet on a shared
//! tile seam are rejoined into one line, using an R-tree over open-line
//! endpoints in world coordinates.

use crate::polygonize::RingPolygonizer;
use crate::raster::Raster;
use crate::writer::{FeatureSink, LineSink, PolygonContourWriter};
use anyhow::Result;
use isohypse_geometry::geo::{GeoTransform, LineString, Point, Srs};
use rstar::{AABB, PointDistance, RTree, RTreeObject};
use std::collections::{BTreeMap, HashMap};

/// Appends `other` to `target`, keeping every vertex of both lines. Only an
/// exactly coincident joint point is deduplicated; seam endpoints that differ
/// by up to the tolerance both stay in the output.
fn concat_lines(target: &mut LineString, other: &LineString) {
	let duplicate_joint = match (target.back(), other.front()) {
		(Some(back), Some(front)) => back.eq_eps(front),
		_ => false,
	};
	if duplicate_joint {
		target.0.extend_from_slice(&other.0[1..]);
	} else {
		target.0.extend_from_slice(&other.0);
	}
}

/// One open-line endpoint in the spatial index.
#[derive(Clone, Debug, PartialEq)]
struct EndpointEntry {
	position: [f64; 2],
	line_id: u64,
	level_bits: u64,
	is_front: bool,
}

impl RTreeObject for EndpointEntry {
	type Envelope = AABB<[f64; 2]>;

	fn envelope(&self) -> Self::Envelope {
		AABB::from_point(self.position)
	}
}

impl PointDistance for EndpointEntry {
	fn distance_2(&self, point: &[f64; 2]) -> f64 {
		let dx = self.position[0] - point[0];
		let dy = self.position[1] - point[1];
		dx * dx + dy * dy
	}
}

struct OpenLine {
	level: f64,
	line: LineString,
}

/// Collects one tile's finished lines in world coordinates. Closed rings and
/// open lines part ways in [`TileStitcher::end_tile`].
pub struct TileAppender {
	geo_transform: GeoTransform,
	closed: Vec<(f64, LineString)>,
	open: Vec<(f64, LineString)>,
}

impl TileAppender {
	fn new(geo_transform: GeoTransform) -> Self {
		Self {
			geo_transform,
			closed: Vec::new(),
			open: Vec::new(),
		}
	}
}

impl LineSink for TileAppender {
	fn add_line(&mut self, level: f64, line: LineString, closed: bool) -> Result<()> {
		let world = line.transform(&self.geo_transform);
		if closed {
			self.closed.push((level, world));
		} else {
			self.open.push((level, world));
		}
		Ok(())
	}
}

/// Stitches polylines across tile seams and emits polygons. Active only in
/// tiled polygon mode.
pub struct TileStitcher<'a> {
	sink: &'a mut dyn FeatureSink,
	srs: Srs,
	/// Seam tolerance: one pixel of the first tile, in world units. Two
	/// endpoints closer than this are the same point.
	dist_error: f64,
	index: RTree<EndpointEntry>,
	open: HashMap<u64, OpenLine>,
	next_line_id: u64,
	assembler: RingPolygonizer,
	/// Floor for the lowest band, from the first tile's value range.
	band_floor: f64,
	started: bool,
}

impl<'a> TileStitcher<'a> {
	pub fn new(sink: &'a mut dyn FeatureSink) -> Self {
		Self {
			sink,
			srs: Srs::default(),
			dist_error: 0.0,
			index: RTree::new(),
			open: HashMap::new(),
			next_line_id: 0,
			assembler: RingPolygonizer::new(false),
			band_floor: 0.0,
			started: false,
		}
	}

	/// Starts a tile: the first one fixes the seam tolerance, the band floor
	/// and the output SRS. Returns the appender the tile's pipeline writes
	/// into.
	pub fn begin_tile(&mut self, raster: &dyn Raster) -> TileAppender {
		let geo_transform = raster.geo_transform();
		if !self.started {
			self.started = true;
			self.dist_error = geo_transform.pixel_width();
			self.band_floor = raster.range().0;
			self.srs = raster.srs();
		}
		TileAppender::new(geo_transform)
	}

	/// Finishes a tile: closed rings go straight to polygon assembly, open
	/// lines run the seam-merge cases, then every fully-closed assembly is
	/// flushed to the writer.
	pub fn end_tile(&mut self, appender: TileAppender) -> Result<()> {
		for (level, ring) in appender.closed {
			self.assembler.add_line(level, ring, true)?;
		}
		for (level, line) in appender.open {
			self.stitch_line(level, line)?;
		}
		self.flush_assemblies()
	}

	/// Emits whatever is still open. In polygon mode an open line is closed
	/// by repeating its first point, so the output stays polygonal.
	pub fn close(&mut self) -> Result<()> {
		let mut per_level: BTreeMap<u64, usize> = BTreeMap::new();
		for open in self.open.values() {
			*per_level.entry(open.level.to_bits()).or_default() += 1;
		}
		for (bits, count) in per_level {
			log::warn!(
				"{count} contour line(s) still open at level {} after the last tile; closing them",
				f64::from_bits(bits)
			);
		}

		let mut ids: Vec<u64> = self.open.keys().copied().collect();
		ids.sort_unstable();
		for id in ids {
			let Some(mut open) = self.open.remove(&id) else {
				continue;
			};
			open.line.close();
			self.assembler.add_line(open.level, open.line, true)?;
		}
		self.index = RTree::new();
		self.flush_assemblies()
	}

	fn flush_assemblies(&mut self) -> Result<()> {
		let mut writer = PolygonContourWriter::new(self.sink, GeoTransform::default(), self.srs, self.band_floor);
		self.assembler.flush(&mut writer)
	}

	/// The endpoint entry of the same level nearest to `point`, if any lies
	/// strictly within the seam tolerance.
	fn nearest(&self, point: &Point, level_bits: u64) -> Option<EndpointEntry> {
		let p = [point.x(), point.y()];
		self
			.index
			.locate_within_distance(p, self.dist_error * self.dist_error)
			.filter(|e| e.level_bits == level_bits && e.distance_2(&p) < self.dist_error * self.dist_error)
			.min_by(|a, b| a.distance_2(&p).total_cmp(&b.distance_2(&p)))
			.cloned()
	}

	fn link(&mut self, line_id: u64, level_bits: u64, line: &LineString) {
		if let (Some(front), Some(back)) = (line.front(), line.back()) {
			self.index.insert(EndpointEntry {
				position: [front.x(), front.y()],
				line_id,
				level_bits,
				is_front: true,
			});
			self.index.insert(EndpointEntry {
				position: [back.x(), back.y()],
				line_id,
				level_bits,
				is_front: false,
			});
		}
	}

	fn unlink(&mut self, line_id: u64, level_bits: u64, line: &LineString) {
		if let (Some(front), Some(back)) = (line.front(), line.back()) {
			self.index.remove(&EndpointEntry {
				position: [front.x(), front.y()],
				line_id,
				level_bits,
				is_front: true,
			});
			self.index.remove(&EndpointEntry {
				position: [back.x(), back.y()],
				line_id,
				level_bits,
				is_front: false,
			});
		}
	}

	fn seam_closed(&self, line: &LineString) -> bool {
		match (line.front(), line.back()) {
			(Some(front), Some(back)) => {
				let dx = front.x() - back.x();
				let dy = front.y() - back.y();
				(dx * dx + dy * dy).sqrt() < self.dist_error
			}
			_ => false,
		}
	}

	fn stitch_line(&mut self, level: f64, line: LineString) -> Result<()> {
		let level_bits = level.to_bits();
		let (Some(front), Some(back)) = (line.front().copied(), line.back().copied()) else {
			return Ok(());
		};

		let match_front = self.nearest(&front, level_bits);
		let match_back = self.nearest(&back, level_bits);

		match (match_front, match_back) {
			// both ends touch the same line, even through a single shared
			// endpoint: the loop is complete
			(Some(f), Some(b)) if f.line_id == b.line_id => self.close_loop(level, &f, line),
			(Some(f), Some(b)) => self.splice_three(level, &f, &b, line),
			(Some(f), None) => self.attach(level, &f, line, true),
			(None, Some(b)) => self.attach(level, &b, line, false),
			(None, None) => {
				let id = self.next_line_id;
				self.next_line_id += 1;
				self.link(id, level_bits, &line);
				self.open.insert(id, OpenLine { level, line });
				Ok(())
			}
		}
	}

	fn close_loop(&mut self, level: f64, matched: &EndpointEntry, mut line: LineString) -> Result<()> {
		let Some(host) = self.open.remove(&matched.line_id) else {
			return Ok(());
		};
		self.unlink(matched.line_id, level.to_bits(), &host.line);

		let mut ring = if matched.is_front {
			// host.front ≈ line.front: walk the new line backwards first
			line.reverse();
			concat_lines(&mut line, &host.line);
			line
		} else {
			let mut ring = host.line;
			concat_lines(&mut ring, &line);
			ring
		};
		ring.close();
		self.assembler.add_line(level, ring, true)
	}

	fn attach(&mut self, level: f64, matched: &EndpointEntry, mut line: LineString, matched_front: bool) -> Result<()> {
		let level_bits = level.to_bits();
		let Some(host) = self.open.remove(&matched.line_id) else {
			return Ok(());
		};
		self.unlink(matched.line_id, level_bits, &host.line);

		let merged = match (matched.is_front, matched_front) {
			// host.back ≈ line.front: plain continuation
			(false, true) => {
				let mut merged = host.line;
				concat_lines(&mut merged, &line);
				merged
			}
			// host.back ≈ line.back: reverse the new line, then continue
			(false, false) => {
				line.reverse();
				let mut merged = host.line;
				concat_lines(&mut merged, &line);
				merged
			}
			// host.front ≈ line.front: reverse the new line, host follows it
			(true, true) => {
				line.reverse();
				concat_lines(&mut line, &host.line);
				line
			}
			// host.front ≈ line.back: host follows the new line
			(true, false) => {
				concat_lines(&mut line, &host.line);
				line
			}
		};

		if self.seam_closed(&merged) {
			let mut ring = merged;
			ring.close();
			return self.assembler.add_line(level, ring, true);
		}

		self.link(matched.line_id, level_bits, &merged);
		self.open.insert(
			matched.line_id,
			OpenLine {
				level,
				line: merged,
			},
		);
		Ok(())
	}

	fn splice_three(
		&mut self,
		level: f64,
		front_match: &EndpointEntry,
		back_match: &EndpointEntry,
		line: LineString,
	) -> Result<()> {
		let level_bits = level.to_bits();
		let Some(first) = self.open.remove(&front_match.line_id) else {
			return Ok(());
		};
		self.unlink(front_match.line_id, level_bits, &first.line);
		let Some(second) = self.open.remove(&back_match.line_id) else {
			return Ok(());
		};
		self.unlink(back_match.line_id, level_bits, &second.line);

		// orient the leading piece to end at line.front
		let mut merged = first.line;
		if front_match.is_front {
			merged.reverse();
		}
		concat_lines(&mut merged, &line);

		// orient the trailing piece to start at line.back
		let mut trailing = second.line;
		if !back_match.is_front {
			trailing.reverse();
		}
		concat_lines(&mut merged, &trailing);

		if self.seam_closed(&merged) {
			let mut ring = merged;
			ring.close();
			return self.assembler.add_line(level, ring, true);
		}

		self.link(front_match.line_id, level_bits, &merged);
		self.open.insert(
			front_match.line_id,
			OpenLine {
				level,
				line: merged,
			},
		);
		Ok(())
	}
}
