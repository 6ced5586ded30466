//! Assembly of closed rings into polygons with holes.
//!
//! Rings accumulate per level; at flush time every ring learns its tightest
//! enclosing ring, rings at odd nesting depth become holes of that ring, and
//! the rest are emitted as polygon parts in insertion order.

use crate::writer::{LineSink, PolygonSink};
use anyhow::Result;
use isohypse_geometry::geo::{LineString, Ring};
use std::collections::HashMap;

struct RingNode {
	ring: Ring,
	/// Index of the tightest enclosing ring in the same bucket.
	closest_exterior: Option<usize>,
	interior: Vec<usize>,
}

struct LevelBucket {
	level: f64,
	rings: Vec<RingNode>,
	open_count: usize,
}

/// Collects closed rings per level and turns each level into polygons.
pub struct RingPolygonizer {
	warn_unclosed: bool,
	buckets: Vec<LevelBucket>,
	bucket_by_level: HashMap<u64, usize>,
}

impl RingPolygonizer {
	pub fn new(warn_unclosed: bool) -> Self {
		Self {
			warn_unclosed,
			buckets: Vec::new(),
			bucket_by_level: HashMap::new(),
		}
	}

	fn bucket_mut(&mut self, level: f64) -> &mut LevelBucket {
		let index = *self.bucket_by_level.entry(level.to_bits()).or_insert_with(|| {
			self.buckets.push(LevelBucket {
				level,
				rings: Vec::new(),
				open_count: 0,
			});
			self.buckets.len() - 1
		});
		&mut self.buckets[index]
	}

	/// `a ⊂ b` iff a's first vertex lies strictly inside b. Degenerate rings
	/// contain nothing.
	fn is_inside(a: &Ring, b: &Ring) -> bool {
		match a.points().first() {
			Some(front) => b.contains_point(front.x(), front.y()),
			None => false,
		}
	}

	/// Whether ring `i` sits at odd nesting depth (a hole).
	fn is_inner(rings: &[RingNode], i: usize) -> bool {
		let mut depth = 0usize;
		let mut cursor = rings[i].closest_exterior;
		while let Some(next) = cursor {
			depth += 1;
			cursor = rings[next].closest_exterior;
		}
		depth % 2 == 1
	}

	/// Classifies and emits every bucket, ascending by level, then resets.
	pub fn flush(&mut self, sink: &mut dyn PolygonSink) -> Result<()> {
		let mut buckets = std::mem::take(&mut self.buckets);
		self.bucket_by_level.clear();
		buckets.sort_by(|a, b| a.level.total_cmp(&b.level));

		for bucket in &mut buckets {
			if self.warn_unclosed && bucket.open_count > 0 {
				log::warn!(
					"dropping {} open line(s) at level {}: polygon output needs closed rings",
					bucket.open_count,
					bucket.level
				);
			}

			// tightest-exterior search over all ordered pairs
			for current in 0..bucket.rings.len() {
				for other in 0..bucket.rings.len() {
					if current == other || !Self::is_inside(&bucket.rings[current].ring, &bucket.rings[other].ring) {
						continue;
					}
					match bucket.rings[current].closest_exterior {
						None => bucket.rings[current].closest_exterior = Some(other),
						Some(closest) => {
							// replace when the new candidate lies inside the
							// recorded one, i.e. is tighter
							if Self::is_inside(&bucket.rings[other].ring, &bucket.rings[closest].ring) {
								bucket.rings[current].closest_exterior = Some(other);
							}
						}
					}
				}
			}

			for i in 0..bucket.rings.len() {
				if Self::is_inner(&bucket.rings, i)
					&& let Some(exterior) = bucket.rings[i].closest_exterior
				{
					bucket.rings[exterior].interior.push(i);
				}
			}

			sink.start_polygon(bucket.level);
			for i in 0..bucket.rings.len() {
				if Self::is_inner(&bucket.rings, i) {
					continue;
				}
				sink.add_part(&bucket.rings[i].ring.0);
				for &hole in &bucket.rings[i].interior {
					sink.add_interior_ring(&bucket.rings[hole].ring.0);
				}
			}
			sink.end_polygon()?;
		}
		Ok(())
	}
}

impl LineSink for RingPolygonizer {
	/// Only closed lines take part in polygon assembly; open ones are
	/// counted for the flush-time warning and dropped.
	fn add_line(&mut self, level: f64, line: LineString, closed: bool) -> Result<()> {
		let bucket = self.bucket_mut(level);
		if closed {
			bucket.rings.push(RingNode {
				ring: Ring(line),
				closest_exterior: None,
				interior: Vec::new(),
			});
		} else {
			bucket.open_count += 1;
		}
		Ok(())
	}
}
