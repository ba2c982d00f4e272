//! The zoom inset: a floating sub-view anchored to one point in time.
//!
//! The inset covers `2 * zoom_offset` seconds. Because that window can be
//! longer than a row, or start near the end of one, its highlight on the strip
//! chart is a list of per-row rectangles rather than a single box.

use std::sync::Arc;

use crate::data::time_span::TimeSpan;
use crate::data::wave::WaveSamples;
use crate::error::SourceError;
use crate::layout::RowLayout;

/// Inset height as a fraction of the container height.
pub const INSET_HEIGHT_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsetPlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Drawn above the anchor row (otherwise below the highlighted rows).
    pub above: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsetWindow {
    pub anchor_time: f64,
    pub zoom_offset: f64,
    /// Rows reserved for the highlight: `ceil(2 * zoom_offset / row_duration) + 1`.
    pub row_span: i64,
    /// `None` while the anchor is outside the plotted span or the plot has no area.
    pub placement: Option<InsetPlacement>,
    pub centered: bool,
    span: TimeSpan,
}

impl InsetWindow {
    fn new(anchor_time: f64, zoom_offset: f64, row_span: i64, centered: bool) -> Option<Self> {
        let start = if centered {
            anchor_time - zoom_offset
        } else {
            anchor_time
        };
        let span = TimeSpan::new(start, start + 2.0 * zoom_offset).ok()?;
        Some(Self {
            anchor_time,
            zoom_offset,
            row_span,
            placement: None,
            centered,
            span,
        })
    }

    /// Time range shown in the inset.
    pub fn time_span(&self) -> TimeSpan {
        self.span
    }
}

/// One row's share of the inset highlight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightRect {
    pub row: i64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub start_time: f64,
    pub end_time: f64,
}

impl HighlightRect {
    /// Seconds covered by this rectangle, recovered from its pixel width.
    pub fn time_width(&self, layout: &RowLayout) -> f64 {
        layout
            .seconds_per_pixel()
            .map_or(0.0, |spp| self.width * spp)
    }

    pub fn to_egui_rect(&self) -> egui::Rect {
        egui::Rect::from_min_size(
            egui::pos2(self.x as f32, self.y as f32),
            egui::vec2(self.width as f32, self.height as f32),
        )
    }
}

/// Split `span` into per-row rectangles on `layout`.
///
/// Each rectangle covers the intersection of `span` with one row, clamped to
/// the pixel rectangle. Rows outside the plot are dropped, so only the part of
/// `span` inside the plotted span is represented.
pub fn highlight_rects(layout: &RowLayout, span: TimeSpan) -> Vec<HighlightRect> {
    let rect = layout.pixel_rect();
    let Some(row_height) = layout.row_height() else {
        return Vec::new();
    };
    if rect.width <= 0.0 {
        return Vec::new();
    }
    let row_duration = layout.row_duration();
    let first = layout.row_of(span.start()).max(0);
    let last = layout.row_of(span.end()).min(layout.num_rows() - 1);

    let mut rects = Vec::new();
    for row in first..=last {
        let row_start = layout.row_start(row);
        let row_end = row_start + row_duration;
        let start = span.start().max(row_start);
        let end = span.end().min(row_end);
        if end <= start {
            continue;
        }
        let to_x = |t: f64| {
            (rect.x + (t - row_start) / row_duration * rect.width).clamp(rect.x, rect.right())
        };
        let (x0, x1) = (to_x(start), to_x(end));
        rects.push(HighlightRect {
            row,
            x: x0,
            y: layout.row_top(row),
            width: x1 - x0,
            height: row_height,
            start_time: start,
            end_time: end,
        });
    }
    rects
}

fn row_span(layout: &RowLayout, zoom_offset: f64) -> i64 {
    (2.0 * zoom_offset / layout.row_duration()).ceil() as i64 + 1
}

/// A wave fetch the view should run for the inset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsetFetch {
    pub span: TimeSpan,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct InsetController {
    window: Option<InsetWindow>,
    wave: Option<Arc<WaveSamples>>,
    // generation of the wave fetch in flight
    fetching: Option<u64>,
    generation: u64,
    zoom_offset: f64,
    force_center: bool,
    container_height: Option<f64>,
    viewport_origin: f64,
}

impl InsetController {
    pub fn new(zoom_offset: f64, force_center: bool) -> Self {
        Self {
            window: None,
            wave: None,
            fetching: None,
            generation: 0,
            zoom_offset,
            force_center,
            container_height: None,
            viewport_origin: 0.0,
        }
    }

    pub fn window(&self) -> Option<&InsetWindow> {
        self.window.as_ref()
    }

    pub fn wave(&self) -> Option<Arc<WaveSamples>> {
        self.wave.clone()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.is_some()
    }

    pub fn zoom_offset(&self) -> f64 {
        self.zoom_offset
    }

    /// Applies to the next inset; the current one keeps its window.
    pub fn set_zoom_offset(&mut self, zoom_offset: f64) {
        self.zoom_offset = zoom_offset;
    }

    pub fn set_force_center(&mut self, force_center: bool) {
        self.force_center = force_center;
    }

    /// The scrollable container the chart sits in changed size or scrolled.
    pub fn set_container(&mut self, layout: &RowLayout, height: f64, viewport_origin: f64) {
        self.container_height = (height > 0.0).then_some(height);
        self.viewport_origin = viewport_origin;
        self.relayout(layout);
    }

    /// Open an inset at `anchor_time`, replacing any current one.
    ///
    /// Rejected (returns `None`, nothing changes) when the anchor is outside
    /// the plotted span or an inset fetch is still running.
    pub fn create_inset(&mut self, layout: &RowLayout, anchor_time: f64) -> Option<InsetFetch> {
        if self.is_fetching() || !layout.contains(anchor_time) {
            return None;
        }
        let row_span = row_span(layout, self.zoom_offset);
        let mut window =
            InsetWindow::new(anchor_time, self.zoom_offset, row_span, self.force_center)?;
        window.placement = self.place(layout, &window);
        let span = window.time_span();
        self.window = Some(window);
        self.wave = None;
        Some(self.begin_fetch(span))
    }

    /// Shift the inset by one window width in `direction`. Rejected when the
    /// new anchor would leave the rows or a fetch is running.
    pub fn move_inset(&mut self, layout: &RowLayout, direction: i32) -> Option<InsetFetch> {
        if self.is_fetching() || direction == 0 {
            return None;
        }
        let window = self.window.as_ref()?;
        let anchor = window.anchor_time + 2.0 * window.zoom_offset * direction.signum() as f64;
        if !layout.is_valid_row(layout.row_of(anchor)) {
            return None;
        }
        let row_span = row_span(layout, window.zoom_offset);
        let mut moved = InsetWindow::new(anchor, window.zoom_offset, row_span, window.centered)?;
        moved.placement = self.place(layout, &moved);
        let span = moved.time_span();
        self.window = Some(moved);
        self.wave = None;
        Some(self.begin_fetch(span))
    }

    /// Close the inset. Returns whether there was one.
    pub fn remove_inset(&mut self) -> bool {
        self.wave = None;
        if self.window.take().is_some() {
            // results of a fetch still running belong to the removed inset
            self.generation += 1;
            true
        } else {
            false
        }
    }

    /// Recompute row span and placement from the current layout.
    pub fn relayout(&mut self, layout: &RowLayout) {
        let Some(mut window) = self.window.take() else {
            return;
        };
        window.row_span = row_span(layout, window.zoom_offset);
        window.placement = self.place(layout, &window);
        self.window = Some(window);
    }

    pub fn highlight(&self, layout: &RowLayout) -> Vec<HighlightRect> {
        self.window
            .as_ref()
            .map(|w| highlight_rects(layout, w.time_span()))
            .unwrap_or_default()
    }

    /// Deliver a finished wave fetch. Returns whether it was applied; results
    /// for a removed or moved inset are dropped.
    pub fn complete_fetch(
        &mut self,
        generation: u64,
        result: Result<WaveSamples, SourceError>,
    ) -> Result<bool, SourceError> {
        if self.fetching == Some(generation) {
            self.fetching = None;
        }
        if generation != self.generation || self.window.is_none() {
            return Ok(false);
        }
        let wave = result?;
        self.wave = Some(Arc::new(wave));
        Ok(true)
    }

    fn begin_fetch(&mut self, span: TimeSpan) -> InsetFetch {
        self.generation += 1;
        self.fetching = Some(self.generation);
        InsetFetch {
            span,
            generation: self.generation,
        }
    }

    fn place(&self, layout: &RowLayout, window: &InsetWindow) -> Option<InsetPlacement> {
        let rect = layout.pixel_rect();
        let row_height = layout.row_height()?;
        if rect.is_degenerate() || !layout.contains(window.anchor_time) {
            return None;
        }
        let container = self.container_height.unwrap_or(rect.bottom());
        let height = container * INSET_HEIGHT_FRACTION;
        let top_row = layout.row_of(window.time_span().start()).max(0);
        let above_y = layout.row_top(top_row) - height;
        let (y, above) = if above_y >= self.viewport_origin {
            (above_y, true)
        } else {
            (layout.row_top(top_row) + window.row_span as f64 * row_height, false)
        };
        Some(InsetPlacement {
            x: rect.x,
            y,
            width: rect.width,
            height,
            above,
        })
    }
}
