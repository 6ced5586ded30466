//! Iso-value generators: the mapping between integer level indices and
//! z-values, and the half-open index range of levels crossing a value span.

use anyhow::{Result, ensure};
use isohypse_geometry::geo::EPS;

/// Tie-break: a value within [`EPS`] of a level is nudged just above it, so a
/// cell corner exactly on a level counts as strictly above and never produces
/// a zero-length segment. NaN stays NaN.
pub fn fudge(level: f64, value: f64) -> f64 {
	if value.is_nan() {
		return f64::NAN;
	}
	if (level - value).abs() < EPS {
		value + EPS
	} else {
		value
	}
}

/// Half-open index interval `[begin, end)` of levels crossing a value span.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelRange {
	pub begin: i64,
	pub end: i64,
}

impl LevelRange {
	pub fn is_empty(&self) -> bool {
		self.begin >= self.end
	}

	pub fn indices(&self) -> std::ops::Range<i64> {
		self.begin..self.end
	}
}

/// Maps level indices to z-values. All variants are monotone non-decreasing
/// in the index.
#[derive(Clone, Debug)]
pub enum LevelGenerator {
	/// `level(i) = base + i · interval`.
	Interval { base: f64, interval: f64 },
	/// `level(0) = 0`, `level(i) = base^(i-1)` for `i ≥ 1`.
	Exponential { base: f64 },
	/// Explicit sorted levels; indices past the end yield `max_level`.
	Fixed { levels: Vec<f64>, max_level: f64 },
}

impl LevelGenerator {
	pub fn interval(base: f64, interval: f64) -> Result<Self> {
		ensure!(
			interval > 0.0,
			"contour interval must be positive, got {interval}"
		);
		Ok(Self::Interval { base, interval })
	}

	pub fn exponential(base: f64) -> Result<Self> {
		ensure!(base > 1.0, "exponential base must be greater than 1, got {base}");
		Ok(Self::Exponential { base })
	}

	pub fn fixed(levels: Vec<f64>, max_level: f64) -> Result<Self> {
		ensure!(!levels.is_empty(), "fixed level list must not be empty");
		ensure!(
			levels.windows(2).all(|w| w[0] <= w[1]),
			"fixed levels must be sorted ascending"
		);
		Ok(Self::Fixed { levels, max_level })
	}

	/// The z-value at `idx`. Exponential growth that overflows is clamped to
	/// a finite value.
	pub fn level(&self, idx: i64) -> f64 {
		match self {
			Self::Interval { base, interval } => base + idx as f64 * interval,
			Self::Exponential { base } => {
				if idx <= 0 {
					0.0
				} else {
					let level = base.powf((idx - 1) as f64);
					if level.is_finite() { level } else { f64::MAX }
				}
			}
			Self::Fixed { levels, max_level } => usize::try_from(idx)
				.ok()
				.and_then(|i| levels.get(i).copied())
				.unwrap_or(*max_level),
		}
	}

	/// The half-open index range covering every level `ℓ` with
	/// `min ≤ ℓ ≤ max` after fudging. Swaps out-of-order inputs; `min == max`
	/// collapses to an empty range at the lower bound.
	pub fn range(&self, min: f64, max: f64) -> LevelRange {
		let (min, max) = if min > max { (max, min) } else { (min, max) };
		match self {
			Self::Interval { base, interval } => {
				let mut begin = ((min - base) / interval).ceil() as i64;
				if fudge(self.level(begin), min) > min {
					begin = ((fudge(self.level(begin), min) - base) / interval).ceil() as i64;
				}
				if min == max {
					return LevelRange { begin, end: begin };
				}
				let mut end = ((max - base) / interval).floor() as i64 + 1;
				if fudge(self.level(end), max) > max {
					end = ((fudge(self.level(end), max) - base) / interval).floor() as i64 + 1;
				}
				LevelRange { begin, end }
			}
			Self::Exponential { base } => {
				let index_above = |value: f64| {
					if value < 1.0 {
						1
					} else {
						(value.ln() / base.ln()).ceil() as i64 + 1
					}
				};
				let index_below = |value: f64| {
					if value < 1.0 {
						0
					} else {
						(value.ln() / base.ln()).floor() as i64 + 2
					}
				};

				let mut begin = index_above(min);
				if fudge(self.level(begin), min) > min {
					begin = index_above(fudge(self.level(begin), min));
				}
				if min == max {
					return LevelRange { begin, end: begin };
				}
				let mut end = index_below(max);
				if fudge(self.level(end), max) > max {
					end = index_below(fudge(self.level(end), max));
				}
				LevelRange { begin, end }
			}
			Self::Fixed { levels, .. } => {
				let mut begin = 0usize;
				while begin < levels.len() && levels[begin] < fudge(levels[begin], min) {
					begin += 1;
				}
				let begin = begin as i64;
				if min == max {
					return LevelRange { begin, end: begin };
				}
				let mut end = begin;
				while (end as usize) < levels.len() && levels[end as usize] <= fudge(levels[end as usize], max) {
					end += 1;
				}
				LevelRange { begin, end }
			}
		}
	}
}
