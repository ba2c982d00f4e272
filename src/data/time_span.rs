//! Half-open absolute time ranges.

use crate::error::SpanError;

/// A `[start, end)` range in absolute seconds since the UNIX epoch.
///
/// The constructor enforces `end > start`, so every `TimeSpan` in the engine
/// has a positive duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    start: f64,
    end: f64,
}

impl TimeSpan {
    pub fn new(start: f64, end: f64) -> Result<Self, SpanError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(SpanError::NotFinite);
        }
        if end <= start {
            return Err(SpanError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn start(&self) -> f64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> f64 {
        self.end
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }

    /// Widen the span by `by` seconds on each side.
    pub fn padded(&self, by: f64) -> Self {
        let by = by.max(0.0);
        Self {
            start: self.start - by,
            end: self.end + by,
        }
    }
}

impl std::fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.3}, {:.3})", self.start, self.end)
    }
}
