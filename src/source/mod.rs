//! The data-source seam.
//!
//! Fetching seismic samples (wave servers, cached archives, files) lives
//! outside this crate. A view only sees the [`DataSource`] trait, is handed an
//! implementation at construction, and calls it from background threads.

mod memory;

pub use memory::MemorySource;

use chrono::{FixedOffset, Offset, Utc};

use crate::data::helicorder::HelicorderDataset;
use crate::data::wave::WaveSamples;
use crate::error::SourceError;

/// Progress notifications for one helicorder fetch.
pub trait GulpListener: Send + Sync {
    fn started(&self) {}
    /// `fraction` runs from 0.0 to 1.0.
    fn progress(&self, _fraction: f64) {}
    fn stopped(&self) {}
}

/// Listener that ignores everything.
pub struct NullGulpListener;

impl GulpListener for NullGulpListener {}

pub trait DataSource: Send + Sync {
    /// Decimated min/max data for `channel` over `[start, end)`. May block.
    fn get_helicorder(
        &self,
        channel: &str,
        start: f64,
        end: f64,
        listener: &dyn GulpListener,
    ) -> Result<HelicorderDataset, SourceError>;

    /// Raw samples for `channel` over `[start, end)`. May block.
    fn get_wave(&self, channel: &str, start: f64, end: f64) -> Result<WaveSamples, SourceError>;

    /// Whether the source streams live data worth refreshing periodically.
    fn is_active_source(&self) -> bool;

    /// The view no longer needs data for this range; the source may free it.
    fn notify_data_not_needed(
        &self,
        _channel: &str,
        _start: f64,
        _end: f64,
        _listener: &dyn GulpListener,
    ) {
    }

    fn close(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Calibration and timezone of a channel, as resolved by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMetadata {
    pub offset: f64,
    pub multiplier: f64,
    pub timezone: FixedOffset,
}

impl Default for ChannelMetadata {
    fn default() -> Self {
        Self {
            offset: 0.0,
            multiplier: 1.0,
            timezone: utc(),
        }
    }
}

impl ChannelMetadata {
    /// Convert a value in calibrated units back to raw counts.
    pub fn to_counts(&self, value: f64) -> f64 {
        let multiplier = if self.multiplier == 0.0 || !self.multiplier.is_finite() {
            1.0
        } else {
            self.multiplier
        };
        (value - self.offset) / multiplier
    }
}

pub(crate) fn utc() -> FixedOffset {
    Utc.fix()
}
