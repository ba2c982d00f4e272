//! Gulp scheduling: which helicorder fetch runs next.
//!
//! The scheduler is a plain state machine. It never spawns anything itself;
//! every method that decides a fetch should start returns the
//! [`GulpRequest`] and the owning view runs it on a background thread, then
//! reports back through [`GulpScheduler::complete`].
//!
//! ```text
//! Idle --request--> Fetching --complete(Succeeded | Failed)--> Idle
//!   \________________________ close() ________________________> Closed
//! ```
//!
//! At most one fetch is in flight. A manual request arriving while fetching
//! replaces any older pending request and starts as soon as the in-flight
//! fetch completes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::debug;

use crate::data::time_span::TimeSpan;

/// Counts fetches in flight across every view sharing it.
#[derive(Debug, Clone, Default)]
pub struct BusyCounter(Arc<AtomicUsize>);

impl BusyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement, saturating at zero.
    pub fn decrement(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_busy(&self) -> bool {
        self.count() > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GulpReason {
    /// Navigation: scroll, zoom, span or chunk change, goto time.
    Manual,
    /// Live refresh tick.
    Periodic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GulpRequest {
    /// Un-padded span the rows will show.
    pub span: TimeSpan,
    /// Row duration the span was laid out with.
    pub row_duration: f64,
    pub reason: GulpReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GulpState {
    Idle,
    Fetching,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GulpOutcome {
    Succeeded,
    Failed(String),
}

/// Facts the periodic tick needs from the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicContext {
    pub now: f64,
    /// The source streams live data.
    pub live_source: bool,
    /// The operator pinned the view to a time instead of following now.
    pub time_override: bool,
}

#[derive(Debug)]
pub struct GulpScheduler {
    state: GulpState,
    in_flight: Option<GulpRequest>,
    pending: Option<GulpRequest>,
    refresh_interval: f64,
    last_completed: Option<f64>,
    busy: BusyCounter,
}

impl GulpScheduler {
    pub fn new(refresh_interval: f64, busy: BusyCounter) -> Self {
        Self {
            state: GulpState::Idle,
            in_flight: None,
            pending: None,
            refresh_interval,
            last_completed: None,
            busy,
        }
    }

    pub fn state(&self) -> GulpState {
        self.state
    }

    pub fn is_fetching(&self) -> bool {
        self.state == GulpState::Fetching
    }

    pub fn in_flight(&self) -> Option<&GulpRequest> {
        self.in_flight.as_ref()
    }

    pub fn pending(&self) -> Option<&GulpRequest> {
        self.pending.as_ref()
    }

    pub fn last_completed(&self) -> Option<f64> {
        self.last_completed
    }

    pub fn refresh_interval(&self) -> f64 {
        self.refresh_interval
    }

    pub fn set_refresh_interval(&mut self, seconds: f64) {
        self.refresh_interval = seconds.max(0.0);
    }

    pub fn busy(&self) -> &BusyCounter {
        &self.busy
    }

    /// Navigation request. Returns the request to start now, or `None` when it
    /// was queued behind the fetch in flight (or the scheduler is closed).
    pub fn request_manual(&mut self, span: TimeSpan, row_duration: f64) -> Option<GulpRequest> {
        let request = GulpRequest {
            span,
            row_duration,
            reason: GulpReason::Manual,
        };
        match self.state {
            GulpState::Closed => None,
            GulpState::Fetching => {
                if self.pending.replace(request).is_some() {
                    debug!("gulp: pending manual request superseded");
                }
                None
            }
            GulpState::Idle => Some(self.begin(request)),
        }
    }

    /// Evaluate the live-refresh tick.
    pub fn poll_periodic(
        &mut self,
        span: TimeSpan,
        row_duration: f64,
        ctx: PeriodicContext,
    ) -> Option<GulpRequest> {
        if self.state != GulpState::Idle
            || self.refresh_interval <= 0.0
            || !ctx.live_source
            || ctx.time_override
        {
            return None;
        }
        if let Some(last) = self.last_completed {
            if ctx.now - last < self.refresh_interval {
                return None;
            }
        }
        Some(self.begin(GulpRequest {
            span,
            row_duration,
            reason: GulpReason::Periodic,
        }))
    }

    /// Record the end of the in-flight fetch. Returns the pending request,
    /// which is already marked as started.
    pub fn complete(&mut self, now: f64, outcome: GulpOutcome) -> Option<GulpRequest> {
        if self.state != GulpState::Fetching {
            debug!("gulp: ignoring completion in state {:?}", self.state);
            return None;
        }
        if let GulpOutcome::Failed(reason) = &outcome {
            debug!("gulp: fetch failed: {reason}");
        }
        self.busy.decrement();
        self.in_flight = None;
        self.last_completed = Some(now);
        self.state = GulpState::Idle;
        self.pending.take().map(|next| self.begin(next))
    }

    /// Stop for good. A fetch still in flight no longer counts as busy and its
    /// completion will be ignored.
    pub fn close(&mut self) {
        if self.state == GulpState::Fetching {
            self.busy.decrement();
        }
        self.state = GulpState::Closed;
        self.in_flight = None;
        self.pending = None;
    }

    fn begin(&mut self, request: GulpRequest) -> GulpRequest {
        debug!("gulp: start {:?} {}", request.reason, request.span);
        self.busy.increment();
        self.state = GulpState::Fetching;
        self.in_flight = Some(request);
        request
    }
}
