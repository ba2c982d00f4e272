//! The refresh timer: a lightweight thread that only emits ticks.
//!
//! The thread waits on a stop channel with a timeout, so stopping it wakes it
//! immediately instead of waiting out the period.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use log::debug;

pub struct RefreshTimer {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    /// Call `on_tick` every `period` until stopped or until it returns `false`.
    pub fn spawn<F>(name: &str, period: Duration, on_tick: F) -> std::io::Result<Self>
    where
        F: Fn() -> bool + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !on_tick() {
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Wake and join the timer thread. Idempotent.
    pub fn stop(&mut self) {
        // dropping the sender disconnects the channel and ends the wait
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!("refresh timer thread panicked");
            }
        }
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
