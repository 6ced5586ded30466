//! Online stitching of per-cell segments into maximal polylines.
//!
//! Per level the merger keeps two endpoint indices, `start_of` and `end_of`,
//! keyed by rounded integer coordinates. Every incoming segment either grows
//! an existing line at one end, joins two lines, or starts a new one. Closed
//! lines are emitted immediately in polygonize mode; in line mode everything
//! rests until the per-row flush or the final close.

use crate::levels::LevelGenerator;
use crate::writer::{LineSink, SegmentSink};
use anyhow::Result;
use isohypse_geometry::geo::{LineString, Point};
use std::collections::{BTreeMap, HashMap};

/// Quantized endpoint coordinates; 10⁻⁶ grid units resolution.
type EndpointKey = (i64, i64);

fn endpoint_key(p: &Point) -> EndpointKey {
	((p.x() * 1e6).round() as i64, (p.y() * 1e6).round() as i64)
}

struct OpenLine {
	line: LineString,
	merged: bool,
}

#[derive(Default)]
struct LevelLines {
	entries: HashMap<u64, OpenLine>,
	/// Insertion order of line ids; ids of consumed lines stay behind and
	/// are skipped on emission.
	order: Vec<u64>,
	start_of: HashMap<EndpointKey, u64>,
	end_of: HashMap<EndpointKey, u64>,
}

impl LevelLines {
	/// Removes the line's endpoint keys. Must run before any mutation of the
	/// line, while front/back still match the indexed keys.
	fn unlink(&mut self, id: u64, line: &LineString) {
		if let Some(front) = line.front()
			&& self.start_of.get(&endpoint_key(front)) == Some(&id)
		{
			self.start_of.remove(&endpoint_key(front));
		}
		if let Some(back) = line.back()
			&& self.end_of.get(&endpoint_key(back)) == Some(&id)
		{
			self.end_of.remove(&endpoint_key(back));
		}
	}

	fn link(&mut self, id: u64, line: &LineString) {
		if let Some(front) = line.front() {
			self.start_of.insert(endpoint_key(front), id);
		}
		if let Some(back) = line.back() {
			self.end_of.insert(endpoint_key(back), id);
		}
	}
}

/// How an incoming segment attached to an existing line.
enum Attachment {
	/// `line.back == start`: push `end`.
	AppendEnd,
	/// `line.front == end`: prepend `start`.
	PrependStart,
	/// `line.front == start`: head-to-head, reverse then push `end`.
	ReverseAppend,
	/// `line.back == end`: tail-to-tail, push `start`.
	AppendStart,
}

/// Groups `(level_idx, segment)` events into the longest possible polylines
/// and forwards them as `add_line` events.
pub struct SegmentMerger<'a> {
	polygonize: bool,
	warn_unclosed: bool,
	levels: &'a LevelGenerator,
	sink: &'a mut dyn LineSink,
	state: BTreeMap<i64, LevelLines>,
	next_id: u64,
	pending_error: Option<anyhow::Error>,
}

impl<'a> SegmentMerger<'a> {
	pub fn new(levels: &'a LevelGenerator, sink: &'a mut dyn LineSink, polygonize: bool, warn_unclosed: bool) -> Self {
		Self {
			polygonize,
			warn_unclosed,
			levels,
			sink,
			state: BTreeMap::new(),
			next_id: 0,
			pending_error: None,
		}
	}

	fn merge_segment(&mut self, level_idx: i64, start: Point, end: Point) {
		if start.eq_eps(&end) {
			// degenerate piece, typically from a corner sitting on a level
			return;
		}

		let lines = self.state.entry(level_idx).or_default();
		let start_key = endpoint_key(&start);
		let end_key = endpoint_key(&end);

		let found = if let Some(&id) = lines.end_of.get(&start_key) {
			Some((id, Attachment::AppendEnd))
		} else if let Some(&id) = lines.start_of.get(&end_key) {
			Some((id, Attachment::PrependStart))
		} else if let Some(&id) = lines.start_of.get(&start_key) {
			Some((id, Attachment::ReverseAppend))
		} else if let Some(&id) = lines.end_of.get(&end_key) {
			Some((id, Attachment::AppendStart))
		} else {
			None
		};

		let Some((id, attachment)) = found else {
			let id = self.next_id;
			self.next_id += 1;
			let line = LineString(vec![start, end]);
			lines.link(id, &line);
			lines.order.push(id);
			lines.entries.insert(id, OpenLine { line, merged: true });
			return;
		};

		let Some(mut entry) = lines.entries.remove(&id) else {
			return;
		};
		lines.unlink(id, &entry.line);

		let grew_back = match attachment {
			Attachment::AppendEnd => {
				entry.line.push(end);
				true
			}
			Attachment::PrependStart => {
				entry.line.prepend(start);
				false
			}
			Attachment::ReverseAppend => {
				entry.line.reverse();
				entry.line.push(end);
				true
			}
			Attachment::AppendStart => {
				entry.line.push(start);
				true
			}
		};

		// The grown end may now touch another line; splice the two into one.
		// Stale keys are already gone, so a hit here is always a second line.
		if grew_back {
			if let Some(back) = entry.line.back().copied() {
				let back_key = endpoint_key(&back);
				if let Some(&other_id) = lines.start_of.get(&back_key).filter(|&&o| o != id) {
					if let Some(other) = lines.entries.remove(&other_id) {
						lines.unlink(other_id, &other.line);
						entry.line.join_back(&other.line);
					}
				} else if let Some(&other_id) = lines.end_of.get(&back_key).filter(|&&o| o != id)
					&& let Some(mut other) = lines.entries.remove(&other_id)
				{
					lines.unlink(other_id, &other.line);
					other.line.reverse();
					entry.line.join_back(&other.line);
				}
			}
		} else if let Some(front) = entry.line.front().copied() {
			let front_key = endpoint_key(&front);
			if let Some(&other_id) = lines.end_of.get(&front_key).filter(|&&o| o != id) {
				if let Some(mut other) = lines.entries.remove(&other_id) {
					lines.unlink(other_id, &other.line);
					other.line.join_back(&entry.line);
					entry.line = other.line;
				}
			} else if let Some(&other_id) = lines.start_of.get(&front_key).filter(|&&o| o != id)
				&& let Some(mut other) = lines.entries.remove(&other_id)
			{
				lines.unlink(other_id, &other.line);
				other.line.reverse();
				other.line.join_back(&entry.line);
				entry.line = other.line;
			}
		}

		entry.merged = true;

		if self.polygonize && entry.line.is_closed() {
			let level = self.levels.level(level_idx);
			if let Err(err) = self.sink.add_line(level, entry.line, true) {
				self.pending_error.get_or_insert(err);
			}
			return;
		}

		lines.link(id, &entry.line);
		lines.entries.insert(id, entry);
	}

	fn take_pending(&mut self) -> Result<()> {
		match self.pending_error.take() {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}

	/// Flushes everything still open, level buckets in ascending order. In
	/// polygonize mode leftover open lines are reported (they may still be
	/// claimed by the tile stitcher) but never dropped.
	pub fn close(&mut self) -> Result<()> {
		self.take_pending()?;
		while let Some((level_idx, mut lines)) = self.state.pop_first() {
			let level = self.levels.level(level_idx);
			if self.polygonize && self.warn_unclosed {
				let open = lines
					.order
					.iter()
					.filter(|id| lines.entries.get(id).is_some_and(|e| !e.line.is_closed()))
					.count();
				if open > 0 {
					log::warn!("{open} contour line(s) left open at level {level}");
				}
			}
			for id in std::mem::take(&mut lines.order) {
				let Some(entry) = lines.entries.remove(&id) else {
					continue;
				};
				let closed = entry.line.is_closed();
				self.sink.add_line(level, entry.line, closed)?;
			}
		}
		Ok(())
	}
}

impl SegmentSink for SegmentMerger<'_> {
	fn polygonize(&self) -> bool {
		self.polygonize
	}

	fn add_segment(&mut self, level_idx: i64, start: Point, end: Point) {
		self.merge_segment(level_idx, start, end);
	}

	fn add_border_segment(&mut self, level_idx: i64, start: Point, end: Point) {
		self.merge_segment(level_idx, start, end);
	}

	fn begin_row(&mut self) {
		if self.polygonize {
			return;
		}
		for lines in self.state.values_mut() {
			for entry in lines.entries.values_mut() {
				entry.merged = false;
			}
		}
	}

	/// In line mode, lines untouched during the row that just finished can
	/// never grow again (all later segments lie at least one row below), so
	/// they are emitted now to bound memory.
	fn end_row(&mut self) -> Result<()> {
		self.take_pending()?;
		if self.polygonize {
			return Ok(());
		}

		let level_idxs: Vec<i64> = self.state.keys().copied().collect();
		for level_idx in level_idxs {
			let Some(lines) = self.state.get_mut(&level_idx) else {
				continue;
			};
			let stale: Vec<u64> = lines
				.order
				.iter()
				.copied()
				.filter(|id| lines.entries.get(id).is_some_and(|e| !e.merged))
				.collect();
			if stale.is_empty() {
				continue;
			}
			let level = self.levels.level(level_idx);
			for id in stale {
				let Some(entry) = lines.entries.remove(&id) else {
					continue;
				};
				lines.unlink(id, &entry.line);
				let closed = entry.line.is_closed();
				self.sink.add_line(level, entry.line, closed)?;
			}
			let LevelLines { entries, order, .. } = lines;
			order.retain(|id| entries.contains_key(id));
		}
		Ok(())
	}
}
