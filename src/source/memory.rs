//! In-memory data source: channels backed by uniformly sampled buffers.
//!
//! Useful for demos, replaying a recorded segment, and driving views in tests.
//! The source remembers every request so callers can see what a view fetched.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::data::helicorder::HelicorderDataset;
use crate::data::time_span::TimeSpan;
use crate::data::wave::WaveSamples;
use crate::error::SourceError;
use crate::source::{DataSource, GulpListener};

pub struct MemorySource {
    decimation: f64,
    channels: Mutex<HashMap<String, WaveSamples>>,
    live: AtomicBool,
    fail_next: Mutex<Option<String>>,
    requests: Mutex<Vec<(String, TimeSpan)>>,
    released: Mutex<Vec<(String, TimeSpan)>>,
    closed: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemorySource {
    /// `decimation` is the helicorder interval width in seconds.
    pub fn new(decimation: f64) -> Self {
        Self {
            decimation,
            channels: Mutex::new(HashMap::new()),
            live: AtomicBool::new(false),
            fail_next: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn insert_channel(&self, channel: impl Into<String>, wave: WaveSamples) {
        lock(&self.channels).insert(channel.into(), wave);
    }

    /// Append samples to a channel; they continue at the channel's sample rate.
    pub fn append(&self, channel: &str, samples: &[f64]) {
        if let Some(wave) = lock(&self.channels).get_mut(channel) {
            wave.samples.extend_from_slice(samples);
        }
    }

    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::Relaxed);
    }

    /// Make the next helicorder request fail with a protocol error.
    pub fn fail_next(&self, message: impl Into<String>) {
        *lock(&self.fail_next) = Some(message.into());
    }

    /// Every helicorder request seen so far, in order.
    pub fn requests(&self) -> Vec<(String, TimeSpan)> {
        lock(&self.requests).clone()
    }

    /// Every range released through `notify_data_not_needed`.
    pub fn released(&self) -> Vec<(String, TimeSpan)> {
        lock(&self.released).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

impl DataSource for MemorySource {
    fn get_helicorder(
        &self,
        channel: &str,
        start: f64,
        end: f64,
        listener: &dyn GulpListener,
    ) -> Result<HelicorderDataset, SourceError> {
        if self.is_closed() {
            return Err(SourceError::Closed);
        }
        let span = TimeSpan::new(start, end).map_err(|e| SourceError::Protocol(e.to_string()))?;
        lock(&self.requests).push((channel.to_string(), span));
        if let Some(message) = lock(&self.fail_next).take() {
            return Err(SourceError::Protocol(message));
        }

        listener.started();
        let channels = lock(&self.channels);
        let wave = channels
            .get(channel)
            .ok_or_else(|| SourceError::ChannelUnavailable(channel.to_string()))?;
        let dataset = HelicorderDataset::from_wave(span, self.decimation, wave);
        listener.progress(1.0);
        listener.stopped();
        Ok(dataset)
    }

    fn get_wave(&self, channel: &str, start: f64, end: f64) -> Result<WaveSamples, SourceError> {
        if self.is_closed() {
            return Err(SourceError::Closed);
        }
        lock(&self.channels)
            .get(channel)
            .map(|wave| wave.slice(start, end))
            .ok_or_else(|| SourceError::ChannelUnavailable(channel.to_string()))
    }

    fn is_active_source(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }

    fn notify_data_not_needed(
        &self,
        channel: &str,
        start: f64,
        end: f64,
        _listener: &dyn GulpListener,
    ) {
        if let Ok(span) = TimeSpan::new(start, end) {
            lock(&self.released).push((channel.to_string(), span));
        }
    }

    fn close(&self) -> Result<(), SourceError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}
