//! Per-view helicorder settings.
//!
//! The surrounding application persists this record and hands it to the
//! engine verbatim; keys are camelCase so they line up with the host's stored
//! names. All durations are in seconds.

use serde::{Deserialize, Serialize};

use crate::error::NavigationError;

/// Standard row durations offered when zooming, in seconds.
pub const TIME_CHUNK_LADDER: [f64; 13] = [
    60.0, 120.0, 180.0, 300.0, 600.0, 900.0, 1200.0, 1800.0, 3600.0, 7200.0, 10800.0, 21600.0,
    43200.0,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HelicorderSettings {
    /// Duration of one row.
    pub time_chunk: f64,
    /// Total duration of all rows.
    pub span: f64,
    /// Half-width of the inset zoom window.
    pub wave_zoom_offset: f64,
    /// Seconds between live refreshes; `0` disables them.
    pub refresh_interval: f64,
    /// Rows moved by one scroll page.
    pub scroll_size: u32,
    /// Centre the inset window on the clicked time instead of starting it there.
    pub force_center: bool,
    pub auto_scale: bool,
    /// Static bar range in counts, used when `auto_scale` is off.
    pub bar_range: f64,
    /// Static clip value in counts, used when `auto_scale` is off.
    pub clip_value: f64,
    pub show_clip: bool,
    pub alert_clip: bool,
    pub alert_clip_timeout: f64,
    /// Auto-scale bar range as a multiple of the mean peak magnitude.
    pub bar_multiplier: f64,
    /// Auto-scale clip value as a multiple of the mean peak magnitude.
    pub clip_bars: f64,
    /// Only ever widen the scale until reset.
    pub auto_scale_memory: bool,
    /// Unattended mode: return to live after this many idle seconds; `0` disables.
    pub kiosk_idle_timeout: f64,
}

impl Default for HelicorderSettings {
    fn default() -> Self {
        Self {
            time_chunk: 15.0 * 60.0,
            span: 24.0 * 60.0 * 60.0,
            wave_zoom_offset: 30.0,
            refresh_interval: 15.0,
            scroll_size: 24,
            force_center: false,
            auto_scale: true,
            bar_range: 1500.0,
            clip_value: 2999.0,
            show_clip: true,
            alert_clip: false,
            alert_clip_timeout: 5.0 * 60.0,
            bar_multiplier: 3.0,
            clip_bars: 21.0,
            auto_scale_memory: false,
            kiosk_idle_timeout: 0.0,
        }
    }
}

impl HelicorderSettings {
    /// Check every field the engine divides by or schedules with.
    pub fn validate(&self) -> Result<(), NavigationError> {
        validate_chunk_and_span(self.time_chunk, self.span)?;
        if !(self.wave_zoom_offset > 0.0 && self.wave_zoom_offset.is_finite()) {
            return Err(NavigationError::InvalidZoomOffset(self.wave_zoom_offset));
        }
        for (field, value) in [
            ("refreshInterval", self.refresh_interval),
            ("alertClipTimeout", self.alert_clip_timeout),
            ("kioskIdleTimeout", self.kiosk_idle_timeout),
            ("barMultiplier", self.bar_multiplier),
            ("clipBars", self.clip_bars),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(NavigationError::InvalidSetting { field, value });
            }
        }
        Ok(())
    }

    pub fn num_rows(&self) -> u64 {
        (self.span / self.time_chunk).ceil() as u64
    }

    /// Next standard chunk in `direction` (negative: shorter rows), if any.
    pub fn zoomed_time_chunk(&self, direction: i32) -> Option<f64> {
        if direction < 0 {
            TIME_CHUNK_LADDER
                .iter()
                .rev()
                .copied()
                .find(|c| *c < self.time_chunk)
        } else if direction > 0 {
            TIME_CHUNK_LADDER
                .iter()
                .copied()
                .find(|c| *c > self.time_chunk && *c <= self.span)
        } else {
            None
        }
    }
}

pub(crate) fn validate_chunk_and_span(time_chunk: f64, span: f64) -> Result<(), NavigationError> {
    if !(time_chunk > 0.0 && time_chunk.is_finite()) {
        return Err(NavigationError::InvalidTimeChunk(time_chunk));
    }
    if !(span.is_finite() && span >= time_chunk) {
        return Err(NavigationError::InvalidSpan { span, time_chunk });
    }
    Ok(())
}
