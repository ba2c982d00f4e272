//! Row layout: the coordinate transform between absolute time and the strip
//! chart's (row, x-pixel) grid.
//!
//! Row 0 is the oldest row and is drawn at the top of the pixel rectangle; the
//! last row holds the newest data and ends at the "anchor end time". The
//! layout is a plain parameter bundle: reconfiguring it never invalidates
//! anything else, consumers simply ask it again.

use crate::data::time_span::TimeSpan;
use crate::error::NavigationError;

// Tolerates float noise when the span is an exact multiple of the row duration.
const ROW_EPSILON: f64 = 1e-9;

/// Plot area in host pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// True when there is no area to map time onto.
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }
}

impl From<egui::Rect> for PixelRect {
    fn from(r: egui::Rect) -> Self {
        Self {
            x: r.min.x as f64,
            y: r.min.y as f64,
            width: r.width() as f64,
            height: r.height() as f64,
        }
    }
}

/// Where a time lands on the chart. `row` is not clamped: it may be negative or
/// past the last row when the time lies outside the plotted span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowPosition {
    pub row: i64,
    pub x: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowLayout {
    span: TimeSpan,
    row_duration: f64,
    rect: PixelRect,
}

impl RowLayout {
    pub fn new(span: TimeSpan, row_duration: f64, rect: PixelRect) -> Result<Self, NavigationError> {
        validate_row_duration(row_duration)?;
        Ok(Self {
            span,
            row_duration,
            rect,
        })
    }

    pub fn span(&self) -> TimeSpan {
        self.span
    }

    pub fn row_duration(&self) -> f64 {
        self.row_duration
    }

    pub fn pixel_rect(&self) -> PixelRect {
        self.rect
    }

    pub fn set_span(&mut self, span: TimeSpan) {
        self.span = span;
    }

    pub fn set_row_duration(&mut self, row_duration: f64) -> Result<(), NavigationError> {
        validate_row_duration(row_duration)?;
        self.row_duration = row_duration;
        Ok(())
    }

    pub fn set_pixel_rect(&mut self, rect: PixelRect) {
        self.rect = rect;
    }

    /// `ceil(span / row_duration)`, never less than one.
    pub fn num_rows(&self) -> i64 {
        let rows = (self.span.duration() / self.row_duration - ROW_EPSILON).ceil() as i64;
        rows.max(1)
    }

    /// End of the last row; may lie past `span.end()` when the span is not a
    /// whole number of rows.
    pub fn plotted_end(&self) -> f64 {
        self.row_start(self.num_rows())
    }

    /// The time range covered by the rows, without padding.
    pub fn plotted_span(&self) -> TimeSpan {
        TimeSpan::new(self.span.start(), self.plotted_end()).unwrap_or(self.span)
    }

    /// The plotted span plus one row of padding on each side. Used to fetch
    /// data for smooth scrolling; never used for time queries.
    pub fn padded_span(&self) -> TimeSpan {
        self.plotted_span().padded(self.row_duration)
    }

    /// Whether `t` lies in the un-padded plotted span.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.span.start() && t < self.plotted_end()
    }

    pub fn is_valid_row(&self, row: i64) -> bool {
        (0..self.num_rows()).contains(&row)
    }

    pub fn row_start(&self, row: i64) -> f64 {
        self.span.start() + row as f64 * self.row_duration
    }

    pub fn row_of(&self, t: f64) -> i64 {
        ((t - self.span.start()) / self.row_duration).floor() as i64
    }

    pub fn row_height(&self) -> Option<f64> {
        (self.rect.height > 0.0).then(|| self.rect.height / self.num_rows() as f64)
    }

    /// Top edge of `row` in pixels (zero-height rows collapse onto `rect.y`).
    pub fn row_top(&self, row: i64) -> f64 {
        self.rect.y + row as f64 * self.row_height().unwrap_or(0.0)
    }

    /// Seconds represented by one horizontal pixel.
    pub fn seconds_per_pixel(&self) -> Option<f64> {
        (self.rect.width > 0.0).then(|| self.row_duration / self.rect.width)
    }

    pub fn time_to_pixel(&self, t: f64) -> RowPosition {
        let row = self.row_of(t);
        let row_start = self.row_start(row);
        let x = self.rect.x + (t - row_start) / self.row_duration * self.rect.width;
        RowPosition { row, x }
    }

    /// Inverse of [`time_to_pixel`](Self::time_to_pixel). Returns `None` for a
    /// zero-sized rectangle. Points outside the rectangle map to times outside
    /// the plotted span; callers check with [`contains`](Self::contains).
    pub fn pixel_to_time(&self, x: f64, y: f64) -> Option<f64> {
        if self.rect.is_degenerate() {
            return None;
        }
        let row_height = self.row_height()?;
        let row = ((y - self.rect.y) / row_height).floor() as i64;
        Some(self.row_start(row) + (x - self.rect.x) / self.rect.width * self.row_duration)
    }
}

fn validate_row_duration(row_duration: f64) -> Result<(), NavigationError> {
    if row_duration > 0.0 && row_duration.is_finite() {
        Ok(())
    } else {
        Err(NavigationError::InvalidTimeChunk(row_duration))
    }
}
