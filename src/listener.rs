//! Notifications a helicorder view sends to its host.
//!
//! The view only talks to its host through [`HelicorderViewListener`]. Hosts
//! that prefer polling can use [`ChannelListener`], which turns each callback
//! into a [`ViewNotification`] on an mpsc channel.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Mutex;

use crate::data::time_span::TimeSpan;

pub trait HelicorderViewListener: Send + Sync {
    /// An inset opened over `[start, end)`; other views may follow it.
    fn inset_created(&self, _start: f64, _end: f64) {}
    fn inset_removed(&self) {}
    /// Operator feedback: loading, errors, time under the cursor.
    fn status(&self, _text: &str) {}
    fn clip_alert(&self, _channel: &str, _magnitude: f64) {}
    /// A new dataset is in place for `span`.
    fn dataset_updated(&self, _span: TimeSpan) {}
}

pub struct NullListener;

impl HelicorderViewListener for NullListener {}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewNotification {
    InsetCreated { start: f64, end: f64 },
    InsetRemoved,
    Status(String),
    ClipAlert { channel: String, magnitude: f64 },
    DatasetUpdated(TimeSpan),
}

/// Forwards every callback over a channel. Sends to a dropped receiver are
/// ignored.
pub struct ChannelListener {
    tx: Mutex<Sender<ViewNotification>>,
}

impl ChannelListener {
    pub fn new() -> (Self, Receiver<ViewNotification>) {
        let (tx, rx) = std::sync::mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }

    fn send(&self, n: ViewNotification) {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let _ = tx.send(n);
    }
}

impl HelicorderViewListener for ChannelListener {
    fn inset_created(&self, start: f64, end: f64) {
        self.send(ViewNotification::InsetCreated { start, end });
    }

    fn inset_removed(&self) {
        self.send(ViewNotification::InsetRemoved);
    }

    fn status(&self, text: &str) {
        self.send(ViewNotification::Status(text.to_string()));
    }

    fn clip_alert(&self, channel: &str, magnitude: f64) {
        self.send(ViewNotification::ClipAlert {
            channel: channel.to_string(),
            magnitude,
        });
    }

    fn dataset_updated(&self, span: TimeSpan) {
        self.send(ViewNotification::DatasetUpdated(span));
    }
}
