//! A helicorder view: one channel's strip chart and everything it owns.
//!
//! The view owns its layout, dataset snapshot, scaler, clip debouncer, gulp
//! scheduler and inset. Fetches run on background threads and post their
//! results to the view's channel; the host drains that channel from its UI
//! thread with [`HelicorderView::process_events`], which is the only place
//! results are applied. Nothing is shared between views except the
//! [`BusyCounter`] handed in through the [`ViewContext`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};

use crate::clip::{clipped_intervals, ClipAlertDebouncer};
use crate::clock::{Clock, SystemClock};
use crate::data::helicorder::HelicorderDataset;
use crate::data::time_span::TimeSpan;
use crate::data::wave::WaveSamples;
use crate::error::{NavigationError, SourceError, SpanError};
use crate::inset::{HighlightRect, InsetController, InsetFetch};
use crate::layout::{PixelRect, RowLayout};
use crate::listener::{HelicorderViewListener, NullListener};
use crate::scale::{AutoScaleEngine, AutoScaleState};
use crate::scheduler::{BusyCounter, GulpOutcome, GulpRequest, GulpScheduler, PeriodicContext};
use crate::settings::{validate_chunk_and_span, HelicorderSettings};
use crate::source::{ChannelMetadata, DataSource, GulpListener, NullGulpListener};
use crate::time::{cursor_status, parse_duration, parse_time};
use crate::timer::RefreshTimer;

/// How often the refresh timer wakes the view.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Collaborators injected into a view.
#[derive(Clone)]
pub struct ViewContext {
    pub source: Arc<dyn DataSource>,
    pub clock: Arc<dyn Clock>,
    pub busy: BusyCounter,
    pub listener: Arc<dyn HelicorderViewListener>,
}

impl ViewContext {
    /// Wall clock, a fresh busy counter and no listener.
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            clock: Arc::new(SystemClock),
            busy: BusyCounter::new(),
            listener: Arc::new(NullListener),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_busy(mut self, busy: BusyCounter) -> Self {
        self.busy = busy;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn HelicorderViewListener>) -> Self {
        self.listener = listener;
        self
    }
}

enum ViewEvent {
    Gulp {
        request: GulpRequest,
        result: Result<HelicorderDataset, SourceError>,
    },
    Wave {
        generation: u64,
        result: Result<WaveSamples, SourceError>,
    },
    Progress(f64),
    Tick,
}

/// Relays source progress to the view as status text while it is alive.
///
/// The busy counter is not driven from here: the scheduler owns it and
/// releases it when the gulp result (or failure) is applied, so `stopped` has
/// nothing left to report.
struct ProgressForwarder {
    tx: Mutex<Sender<ViewEvent>>,
    alive: Arc<AtomicBool>,
}

impl ProgressForwarder {
    fn send(&self, fraction: f64) {
        if self.alive.load(Ordering::Acquire) {
            let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
            let _ = tx.send(ViewEvent::Progress(fraction));
        }
    }
}

impl GulpListener for ProgressForwarder {
    fn started(&self) {
        self.send(0.0);
    }

    fn progress(&self, fraction: f64) {
        self.send(fraction);
    }
}

/// Span of whole rows whose last row contains `end_hint`.
pub fn aligned_span(end_hint: f64, time_chunk: f64, span: f64) -> Result<TimeSpan, SpanError> {
    let end = ((end_hint / time_chunk).floor() + 1.0) * time_chunk;
    let rows = (span / time_chunk - 1e-9).ceil().max(1.0);
    TimeSpan::new(end - rows * time_chunk, end)
}

pub struct HelicorderView {
    channel: String,
    settings: HelicorderSettings,
    metadata: ChannelMetadata,
    ctx: ViewContext,
    layout: RowLayout,
    dataset: Arc<HelicorderDataset>,
    scale: AutoScaleEngine,
    clip_alert: ClipAlertDebouncer,
    scheduler: GulpScheduler,
    inset: InsetController,
    time_override: Option<f64>,
    kiosk: bool,
    last_interaction: f64,
    started: bool,
    alive: Arc<AtomicBool>,
    tx: Sender<ViewEvent>,
    rx: Receiver<ViewEvent>,
    timer: Option<RefreshTimer>,
}

impl HelicorderView {
    pub fn new(
        channel: impl Into<String>,
        settings: HelicorderSettings,
        metadata: ChannelMetadata,
        ctx: ViewContext,
    ) -> Result<Self, NavigationError> {
        settings.validate()?;
        let now = ctx.clock.now();
        let span = aligned_span(now, settings.time_chunk, settings.span)?;
        let layout = RowLayout::new(span, settings.time_chunk, PixelRect::default())?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            channel: channel.into(),
            scale: AutoScaleEngine::new((&settings).into()),
            scheduler: GulpScheduler::new(settings.refresh_interval, ctx.busy.clone()),
            inset: InsetController::new(settings.wave_zoom_offset, settings.force_center),
            clip_alert: ClipAlertDebouncer::new(),
            dataset: Arc::new(HelicorderDataset::empty()),
            time_override: None,
            kiosk: false,
            last_interaction: now,
            started: false,
            alive: Arc::new(AtomicBool::new(true)),
            timer: None,
            settings,
            metadata,
            ctx,
            layout,
            tx,
            rx,
        })
    }

    /// Start the refresh timer (when live refresh or kiosk mode needs it) and
    /// issue the first gulp.
    pub fn start(&mut self) -> std::io::Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.started = true;
        self.ensure_timer()?;
        info!("{}: helicorder view started", self.channel);
        if let Err(e) = self.request_refresh() {
            warn!("{}: initial gulp not issued: {e}", self.channel);
        }
        Ok(())
    }

    fn ensure_timer(&mut self) -> std::io::Result<()> {
        let needed = self.settings.refresh_interval > 0.0 || self.settings.kiosk_idle_timeout > 0.0;
        if !self.started || !needed || self.timer.is_some() {
            return Ok(());
        }
        let tx = self.tx.clone();
        let name = format!("heliplot-refresh-{}", self.channel);
        let timer = RefreshTimer::spawn(&name, TICK_PERIOD, move || {
            tx.send(ViewEvent::Tick).is_ok()
        })?;
        self.timer = Some(timer);
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn settings(&self) -> &HelicorderSettings {
        &self.settings
    }

    pub fn metadata(&self) -> &ChannelMetadata {
        &self.metadata
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    /// The current snapshot. Renderers hold on to the `Arc` for a frame.
    pub fn dataset(&self) -> Arc<HelicorderDataset> {
        Arc::clone(&self.dataset)
    }

    pub fn scale_state(&self) -> Option<AutoScaleState> {
        self.scale.state()
    }

    /// Indices into [`dataset`](Self::dataset) of the plotted intervals to
    /// mark as clipped, when clip display is on.
    pub fn clipped_intervals(&self) -> Vec<usize> {
        let Some(state) = self.scale.state().filter(|_| self.settings.show_clip) else {
            return Vec::new();
        };
        let intervals = self.dataset.intervals();
        clipped_intervals(&self.dataset, &state)
            .into_iter()
            .filter(|&i| self.layout.contains(intervals[i].start))
            .collect()
    }

    pub fn inset(&self) -> &InsetController {
        &self.inset
    }

    pub fn highlight(&self) -> Vec<HighlightRect> {
        self.inset.highlight(&self.layout)
    }

    pub fn scheduler(&self) -> &GulpScheduler {
        &self.scheduler
    }

    pub fn time_override(&self) -> Option<f64> {
        self.time_override
    }

    pub fn is_closed(&self) -> bool {
        !self.alive.load(Ordering::Acquire)
    }

    // ── Event pump ─────────────────────────────────────────────────────────

    /// Apply every finished fetch and timer tick queued so far. Returns the
    /// number of events handled.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Block up to `timeout` for the next event, then drain the rest.
    pub fn wait_events(&mut self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event);
                1 + self.process_events()
            }
            Err(_) => 0,
        }
    }

    fn handle_event(&mut self, event: ViewEvent) {
        if self.is_closed() {
            return;
        }
        match event {
            ViewEvent::Gulp { request, result } => self.finish_gulp(request, result),
            ViewEvent::Wave { generation, result } => {
                if let Err(e) = self.inset.complete_fetch(generation, result) {
                    warn!("{}: inset wave fetch failed: {e}", self.channel);
                    self.status(&format!("Error loading wave for {}: {e}", self.channel));
                }
            }
            ViewEvent::Progress(fraction) => {
                let pct = (fraction.clamp(0.0, 1.0) * 100.0).round();
                self.status(&format!("Loading {}: {pct:.0}%", self.channel));
            }
            ViewEvent::Tick => self.tick(),
        }
    }

    /// Periodic evaluation: kiosk idle reset, then live refresh.
    pub fn tick(&mut self) {
        if self.is_closed() {
            return;
        }
        let now = self.ctx.clock.now();
        self.check_idle(now);
        let span = match aligned_span(
            self.time_override.unwrap_or(now),
            self.settings.time_chunk,
            self.settings.span,
        ) {
            Ok(span) => span,
            Err(e) => {
                warn!("{}: cannot compute refresh span: {e}", self.channel);
                return;
            }
        };
        let ctx = PeriodicContext {
            now,
            live_source: self.ctx.source.is_active_source(),
            time_override: self.time_override.is_some(),
        };
        if let Some(request) = self
            .scheduler
            .poll_periodic(span, self.settings.time_chunk, ctx)
        {
            self.spawn_gulp(request);
        }
    }

    fn check_idle(&mut self, now: f64) {
        let timeout = self.settings.kiosk_idle_timeout;
        if !self.kiosk || timeout <= 0.0 || now - self.last_interaction < timeout {
            return;
        }
        if self.time_override.is_none() && self.inset.window().is_none() {
            return;
        }
        info!(
            "{}: idle for {:.0} s, returning to live data",
            self.channel,
            now - self.last_interaction
        );
        self.last_interaction = now;
        self.drop_inset();
        if let Err(e) = self.navigate(None) {
            warn!("{}: kiosk reset failed: {e}", self.channel);
        }
    }

    // ── Gulps ──────────────────────────────────────────────────────────────

    /// Re-fetch the current span as a manual request.
    pub fn request_refresh(&mut self) -> Result<(), NavigationError> {
        let now = self.ctx.clock.now();
        let span = aligned_span(
            self.time_override.unwrap_or(now),
            self.settings.time_chunk,
            self.settings.span,
        )?;
        if let Some(request) = self.scheduler.request_manual(span, self.settings.time_chunk) {
            self.spawn_gulp(request);
        }
        Ok(())
    }

    fn spawn_gulp(&mut self, request: GulpRequest) {
        let fetch = request.span.padded(request.row_duration);
        let source = Arc::clone(&self.ctx.source);
        let tx = self.tx.clone();
        let alive = Arc::clone(&self.alive);
        let channel = self.channel.clone();
        let progress = ProgressForwarder {
            tx: Mutex::new(self.tx.clone()),
            alive: Arc::clone(&self.alive),
        };
        let spawned = std::thread::Builder::new()
            .name(format!("heliplot-gulp-{}", self.channel))
            .spawn(move || {
                let result = source.get_helicorder(&channel, fetch.start(), fetch.end(), &progress);
                if alive.load(Ordering::Acquire) {
                    let _ = tx.send(ViewEvent::Gulp { request, result });
                }
            });
        if let Err(e) = spawned {
            warn!("{}: could not start gulp thread: {e}", self.channel);
            self.finish_gulp(request, Err(SourceError::Io(e)));
        }
    }

    fn finish_gulp(&mut self, request: GulpRequest, result: Result<HelicorderDataset, SourceError>) {
        let now = self.ctx.clock.now();
        let outcome = match result {
            Ok(dataset) => {
                self.apply_dataset(&request, dataset, now);
                GulpOutcome::Succeeded
            }
            Err(e) => {
                warn!("{}: gulp {} failed: {e}", self.channel, request.span);
                self.status(&format!("Error loading {}: {e}", self.channel));
                GulpOutcome::Failed(e.to_string())
            }
        };
        if let Some(next) = self.scheduler.complete(now, outcome) {
            self.spawn_gulp(next);
        }
    }

    fn apply_dataset(&mut self, request: &GulpRequest, dataset: HelicorderDataset, now: f64) {
        self.dataset = Arc::new(dataset);
        if let Err(e) = self.layout.set_row_duration(request.row_duration) {
            warn!("{}: keeping row duration: {e}", self.channel);
        }
        self.layout.set_span(request.span);
        self.inset.relayout(&self.layout);

        // Padding rows are fetched for scrolling only; scale on what is drawn.
        let visible = self.visible_dataset();
        let state = self.scale.update(&visible, &self.metadata);
        if let Some(peak) = self.clip_alert.evaluate(
            self.settings.alert_clip,
            &visible,
            &state,
            now,
            self.settings.alert_clip_timeout,
        ) {
            info!("{}: clipping, peak magnitude {peak:.1}", self.channel);
            self.ctx.listener.clip_alert(&self.channel, peak);
        }
        debug!("{}: dataset of {} intervals applied", self.channel, self.dataset.len());
        self.ctx.listener.dataset_updated(request.span);
    }

    // ── Navigation ─────────────────────────────────────────────────────────

    fn touch(&mut self) {
        self.last_interaction = self.ctx.clock.now();
    }

    /// Commit a new time override and fetch for it. Overrides at or past now
    /// mean following live data.
    fn navigate(&mut self, time_override: Option<f64>) -> Result<(), NavigationError> {
        let now = self.ctx.clock.now();
        let time_override = time_override.filter(|t| *t < now);
        aligned_span(
            time_override.unwrap_or(now),
            self.settings.time_chunk,
            self.settings.span,
        )?;
        self.time_override = time_override;
        self.request_refresh()
    }

    /// Scroll by whole pages of `scroll_size` rows; negative goes back in time.
    pub fn scroll(&mut self, pages: i64) -> Result<(), NavigationError> {
        self.scroll_rows(pages.saturating_mul(self.settings.scroll_size as i64))
    }

    pub fn scroll_rows(&mut self, rows: i64) -> Result<(), NavigationError> {
        if rows == 0 {
            return Ok(());
        }
        self.touch();
        let base = self.time_override.unwrap_or_else(|| self.ctx.clock.now());
        self.navigate(Some(base + rows as f64 * self.settings.time_chunk))
    }

    /// Jump so the newest row contains `input` (`now` follows live data).
    pub fn goto_time(&mut self, input: &str) -> Result<(), NavigationError> {
        if input.trim().eq_ignore_ascii_case("now") {
            return self.follow_live();
        }
        let t = parse_time(input, self.metadata.timezone)?;
        self.touch();
        self.navigate(Some(t))
    }

    pub fn follow_live(&mut self) -> Result<(), NavigationError> {
        self.touch();
        self.navigate(None)
    }

    pub fn set_time_chunk(&mut self, seconds: f64) -> Result<(), NavigationError> {
        validate_chunk_and_span(seconds, self.settings.span)?;
        self.touch();
        self.settings.time_chunk = seconds;
        self.request_refresh()
    }

    pub fn set_span(&mut self, seconds: f64) -> Result<(), NavigationError> {
        validate_chunk_and_span(self.settings.time_chunk, seconds)?;
        self.touch();
        self.settings.span = seconds;
        self.request_refresh()
    }

    /// [`set_span`](Self::set_span) from operator text such as `12h`.
    pub fn set_span_text(&mut self, input: &str) -> Result<(), NavigationError> {
        self.set_span(parse_duration(input)?)
    }

    pub fn set_time_chunk_text(&mut self, input: &str) -> Result<(), NavigationError> {
        self.set_time_chunk(parse_duration(input)?)
    }

    /// Step the row duration along the standard ladder. Returns whether it
    /// changed.
    pub fn zoom(&mut self, direction: i32) -> Result<bool, NavigationError> {
        match self.settings.zoomed_time_chunk(direction) {
            Some(chunk) => self.set_time_chunk(chunk).map(|()| true),
            None => Ok(false),
        }
    }

    /// Replace all settings at once. Invalid settings leave the view untouched.
    pub fn set_settings(&mut self, settings: HelicorderSettings) -> Result<(), NavigationError> {
        settings.validate()?;
        self.scale.set_settings((&settings).into());
        self.scheduler.set_refresh_interval(settings.refresh_interval);
        self.inset.set_zoom_offset(settings.wave_zoom_offset);
        self.inset.set_force_center(settings.force_center);
        self.settings = settings;
        if let Err(e) = self.ensure_timer() {
            warn!("{}: could not start refresh timer: {e}", self.channel);
        }
        self.request_refresh()
    }

    pub fn set_kiosk_mode(&mut self, kiosk: bool) {
        self.kiosk = kiosk;
        self.touch();
    }

    /// Forget remembered scale ranges and rescale the current dataset.
    pub fn reset_auto_scale(&mut self) {
        self.scale.reset();
        let visible = self.visible_dataset();
        self.scale.update(&visible, &self.metadata);
    }

    /// The intervals inside the plotted rows, without the padding.
    fn visible_dataset(&self) -> HelicorderDataset {
        let plotted = self.layout.plotted_span();
        self.dataset.restricted(plotted.start(), plotted.end())
    }

    // ── Geometry and pointer input ─────────────────────────────────────────

    pub fn set_pixel_rect(&mut self, rect: PixelRect) {
        self.layout.set_pixel_rect(rect);
        self.inset.relayout(&self.layout);
    }

    /// The scroll container changed size or scroll position.
    pub fn set_container(&mut self, height: f64, viewport_origin: f64) {
        self.inset.set_container(&self.layout, height, viewport_origin);
    }

    /// Status text for the time under the pointer, if it is over the rows.
    pub fn hover(&mut self, x: f64, y: f64) -> Option<String> {
        let t = self.layout.pixel_to_time(x, y)?;
        if !self.layout.contains(t) {
            return None;
        }
        let text = cursor_status(&self.channel, t, self.metadata.timezone);
        self.status(&text);
        Some(text)
    }

    /// Open an inset where the operator clicked.
    pub fn click(&mut self, x: f64, y: f64) -> bool {
        self.touch();
        match self.layout.pixel_to_time(x, y) {
            Some(t) => self.open_inset(t),
            None => false,
        }
    }

    /// Open an inset anchored at `anchor_time`, replacing any current one.
    pub fn open_inset(&mut self, anchor_time: f64) -> bool {
        self.touch();
        match self.inset.create_inset(&self.layout, anchor_time) {
            Some(fetch) => {
                self.ctx
                    .listener
                    .inset_created(fetch.span.start(), fetch.span.end());
                self.spawn_wave(fetch);
                true
            }
            None => false,
        }
    }

    pub fn move_inset(&mut self, direction: i32) -> bool {
        self.touch();
        match self.inset.move_inset(&self.layout, direction) {
            Some(fetch) => {
                self.ctx
                    .listener
                    .inset_created(fetch.span.start(), fetch.span.end());
                self.spawn_wave(fetch);
                true
            }
            None => false,
        }
    }

    pub fn remove_inset(&mut self) -> bool {
        self.touch();
        self.drop_inset()
    }

    fn drop_inset(&mut self) -> bool {
        let removed = self.inset.remove_inset();
        if removed {
            self.ctx.listener.inset_removed();
        }
        removed
    }

    fn spawn_wave(&mut self, fetch: InsetFetch) {
        let source = Arc::clone(&self.ctx.source);
        let tx = self.tx.clone();
        let alive = Arc::clone(&self.alive);
        let channel = self.channel.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("heliplot-wave-{}", self.channel))
            .spawn(move || {
                let result = source.get_wave(&channel, fetch.span.start(), fetch.span.end());
                if alive.load(Ordering::Acquire) {
                    let _ = tx.send(ViewEvent::Wave {
                        generation: fetch.generation,
                        result,
                    });
                }
            });
        if let Err(e) = spawned {
            warn!("{}: could not start wave thread: {e}", self.channel);
            let _ = self.inset.complete_fetch(fetch.generation, Err(SourceError::Io(e)));
        }
    }

    fn status(&self, text: &str) {
        self.ctx.listener.status(text);
    }

    // ── Shutdown ───────────────────────────────────────────────────────────

    /// Stop the timer, release the data range and close the source. No fetch
    /// is started and no result is applied afterwards. Idempotent.
    pub fn close(&mut self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        self.scheduler.close();
        self.drop_inset();
        let span = self.layout.padded_span();
        self.ctx
            .source
            .notify_data_not_needed(&self.channel, span.start(), span.end(), &NullGulpListener);
        if let Err(e) = self.ctx.source.close() {
            warn!("{}: error closing data source: {e}", self.channel);
        }
        info!("{}: helicorder view closed", self.channel);
    }
}

impl Drop for HelicorderView {
    fn drop(&mut self) {
        self.close();
    }
}
