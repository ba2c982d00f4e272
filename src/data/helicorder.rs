//! Decimated min/max summaries backing one helicorder refresh.
//!
//! A [`HelicorderDataset`] is a gapless grid of fixed-width intervals. Intervals
//! the source had no samples for are kept as explicit "no data" entries so
//! that `index = (t - start) / interval` is valid everywhere in the grid.
//! Datasets are immutable once built; a view swaps in a whole new one on each
//! successful gulp.

use crate::data::time_span::TimeSpan;
use crate::data::wave::WaveSamples;
use crate::layout::RowLayout;

/// Sentinel stored in `min`/`max` of intervals without samples.
pub const NO_DATA: f64 = f64::NAN;

// Absorbs float noise when a boundary time lands exactly on a grid line.
const INDEX_EPSILON: f64 = 1e-9;

/// One decimated interval: the extremes of all samples in
/// `[start, start + interval)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeliInterval {
    pub start: f64,
    pub min: f64,
    pub max: f64,
}

impl HeliInterval {
    pub fn new(start: f64, min: f64, max: f64) -> Self {
        Self { start, min, max }
    }

    pub fn no_data(start: f64) -> Self {
        Self {
            start,
            min: NO_DATA,
            max: NO_DATA,
        }
    }

    #[inline]
    pub fn has_data(&self) -> bool {
        !self.min.is_nan() && !self.max.is_nan()
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) * 0.5
    }

    /// Largest excursion of the interval away from `bias`.
    pub fn magnitude(&self, bias: f64) -> f64 {
        (self.max - bias).abs().max((self.min - bias).abs())
    }
}

#[derive(Debug, Clone)]
pub struct HelicorderDataset {
    start: f64,
    interval: f64,
    intervals: Vec<HeliInterval>,
}

impl Default for HelicorderDataset {
    fn default() -> Self {
        Self::empty()
    }
}

impl HelicorderDataset {
    /// The dataset a view starts with before its first gulp.
    pub fn empty() -> Self {
        Self {
            start: 0.0,
            interval: 1.0,
            intervals: Vec::new(),
        }
    }

    /// Build a gapless grid over `span` from possibly sparse intervals.
    ///
    /// Each input interval is placed in the grid cell its start time falls in;
    /// cells nobody provided stay "no data". Inputs outside `span` are dropped.
    pub fn from_intervals<I>(span: TimeSpan, interval: f64, intervals: I) -> Self
    where
        I: IntoIterator<Item = HeliInterval>,
    {
        if interval <= 0.0 || !interval.is_finite() {
            return Self::empty();
        }
        let mut grid = Self::sentinel_grid(span, interval);
        for iv in intervals {
            if !iv.has_data() {
                continue;
            }
            if let Some(i) = grid.index_of(iv.start) {
                let cell = &mut grid.intervals[i];
                if cell.has_data() {
                    cell.min = cell.min.min(iv.min);
                    cell.max = cell.max.max(iv.max);
                } else {
                    cell.min = iv.min;
                    cell.max = iv.max;
                }
            }
        }
        grid
    }

    /// Decimate raw samples into min/max intervals covering `span`.
    pub fn from_wave(span: TimeSpan, interval: f64, wave: &WaveSamples) -> Self {
        if interval <= 0.0 || !interval.is_finite() {
            return Self::empty();
        }
        let mut grid = Self::sentinel_grid(span, interval);
        for cell in grid.intervals.iter_mut() {
            let range = wave.index_range(cell.start, cell.start + interval);
            let mut values = wave.samples[range].iter().copied().filter(|v| !v.is_nan());
            if let Some(first) = values.next() {
                let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
                cell.min = min;
                cell.max = max;
            }
        }
        grid
    }

    fn sentinel_grid(span: TimeSpan, interval: f64) -> Self {
        let count = (span.duration() / interval).ceil() as usize;
        let intervals = (0..count)
            .map(|i| HeliInterval::no_data(span.start() + i as f64 * interval))
            .collect();
        Self {
            start: span.start(),
            interval,
            intervals,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.start + self.intervals.len() as f64 * self.interval
    }

    pub fn interval_seconds(&self) -> f64 {
        self.interval
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn intervals(&self) -> &[HeliInterval] {
        &self.intervals
    }

    /// Intervals that carry samples.
    pub fn data(&self) -> impl Iterator<Item = &HeliInterval> {
        self.intervals.iter().filter(|iv| iv.has_data())
    }

    pub fn has_data(&self) -> bool {
        self.intervals.iter().any(HeliInterval::has_data)
    }

    pub fn index_of(&self, t: f64) -> Option<usize> {
        if t < self.start {
            return None;
        }
        let i = ((t - self.start) / self.interval + INDEX_EPSILON).floor() as usize;
        (i < self.intervals.len()).then_some(i)
    }

    /// Intervals whose start lies in `[t0, t1)`, clamped to the grid.
    pub fn slice(&self, t0: f64, t1: f64) -> &[HeliInterval] {
        if self.intervals.is_empty() || t1 <= t0 {
            return &[];
        }
        let to_index = |t: f64| {
            let i = ((t - self.start) / self.interval - INDEX_EPSILON).ceil();
            if i <= 0.0 {
                0
            } else {
                (i as usize).min(self.intervals.len())
            }
        };
        let (a, b) = (to_index(t0), to_index(t1));
        &self.intervals[a..b.max(a)]
    }

    /// A copy holding only the intervals that start in `[t0, t1)`.
    pub fn restricted(&self, t0: f64, t1: f64) -> HelicorderDataset {
        let intervals = self.slice(t0, t1).to_vec();
        match intervals.first() {
            Some(first) => Self {
                start: first.start,
                interval: self.interval,
                intervals,
            },
            None => Self::empty(),
        }
    }

    /// The intervals drawn on `row` of `layout`.
    pub fn row(&self, layout: &RowLayout, row: i64) -> &[HeliInterval] {
        let row_start = layout.row_start(row);
        self.slice(row_start, row_start + layout.row_duration())
    }

    /// Central tendency of the signal: mean interval midpoint.
    pub fn bias(&self) -> Option<f64> {
        let (sum, n) = self
            .data()
            .fold((0.0, 0usize), |(sum, n), iv| (sum + iv.midpoint(), n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Mean peak magnitude about `bias`; zero when there is no data.
    pub fn mean_max(&self, bias: f64) -> f64 {
        let (sum, n) = self
            .data()
            .fold((0.0, 0usize), |(sum, n), iv| (sum + iv.magnitude(bias), n + 1));
        if n == 0 {
            0.0
        } else {
            sum / n as f64
        }
    }
}
