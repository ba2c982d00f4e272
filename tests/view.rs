use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use heliplot::error::{NavigationError, SourceError};
use heliplot::layout::PixelRect;
use heliplot::scheduler::GulpState;
use heliplot::source::{DataSource, GulpListener};
use heliplot::view::{aligned_span, HelicorderView, ViewContext};
use heliplot::{
    BusyCounter, ChannelListener, ChannelMetadata, HelicorderDataset, HelicorderSettings,
    ManualClock, MemorySource, TimeSpan, ViewNotification, WaveSamples,
};

const NOW: f64 = 1_700_000_000.0;
const CHANNEL: &str = "HHZ";

fn settings() -> HelicorderSettings {
    HelicorderSettings {
        time_chunk: 600.0,
        span: 3600.0,
        refresh_interval: 15.0,
        scroll_size: 2,
        ..Default::default()
    }
}

// Two hours of 1 Hz data ending at NOW.
fn memory_source(amplitude: f64) -> Arc<MemorySource> {
    let source = MemorySource::new(10.0);
    let samples = (0..7200).map(|i| amplitude * (i as f64 * 0.1).sin()).collect();
    source.insert_channel(CHANNEL, WaveSamples::new(NOW - 7200.0, 1.0, samples));
    Arc::new(source)
}

struct Harness {
    view: HelicorderView,
    clock: ManualClock,
    notes: Receiver<ViewNotification>,
}

fn harness(source: Arc<dyn DataSource>, settings: HelicorderSettings) -> Harness {
    let clock = ManualClock::new(NOW);
    let (listener, notes) = ChannelListener::new();
    let ctx = ViewContext::new(source)
        .with_clock(Arc::new(clock.clone()))
        .with_listener(Arc::new(listener));
    let view = HelicorderView::new(CHANNEL, settings, ChannelMetadata::default(), ctx).unwrap();
    Harness { view, clock, notes }
}

impl Harness {
    /// Pump events until `done` holds or a few seconds pass.
    fn pump_until(&mut self, done: impl Fn(&HelicorderView) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(&self.view) {
            assert!(Instant::now() < deadline, "timed out waiting for the view");
            self.view.wait_events(Duration::from_millis(20));
        }
    }

    fn settle(&mut self) {
        self.pump_until(|v| v.scheduler().state() == GulpState::Idle);
    }

    fn notes(&self) -> Vec<ViewNotification> {
        self.notes.try_iter().collect()
    }
}

fn statuses(notes: Vec<ViewNotification>) -> Vec<String> {
    notes
        .into_iter()
        .filter_map(|n| match n {
            ViewNotification::Status(text) => Some(text),
            _ => None,
        })
        .collect()
}

#[test]
fn aligned_span_ends_on_a_row_boundary_after_the_hint() {
    let span = aligned_span(NOW, 600.0, 3600.0).unwrap();
    assert_abs_diff_eq!(span.end(), 1_700_000_400.0);
    assert_abs_diff_eq!(span.duration(), 3600.0);
    assert!(span.contains(NOW));

    let uneven = aligned_span(NOW, 600.0, 3700.0).unwrap();
    assert_abs_diff_eq!(uneven.duration(), 4200.0);
}

#[test]
fn first_gulp_loads_the_padded_span() {
    let source = memory_source(20.0);
    let mut h = harness(source.clone(), settings());
    h.view.request_refresh().unwrap();
    assert!(h.view.scheduler().busy().is_busy());
    h.settle();

    let span = aligned_span(NOW, 600.0, 3600.0).unwrap();
    assert_eq!(h.view.layout().span(), span);
    assert_eq!(source.requests(), vec![(CHANNEL.to_string(), span.padded(600.0))]);
    assert_eq!(h.view.dataset().len(), 480);
    assert!(h.view.dataset().has_data());
    assert!(!h.view.scheduler().busy().is_busy());

    let state = h.view.scale_state().unwrap();
    assert!(state.bar_range > 0.0);
    assert!(h.view.clipped_intervals().is_empty());
    assert!(h.notes().contains(&ViewNotification::DatasetUpdated(span)));
}

#[test]
fn failed_gulp_keeps_the_previous_dataset() {
    let source = memory_source(20.0);
    let mut h = harness(source.clone(), settings());
    h.view.request_refresh().unwrap();
    h.settle();
    let before = h.view.dataset();

    source.fail_next("server went away");
    h.clock.advance(1.0);
    h.view.request_refresh().unwrap();
    h.settle();

    assert!(Arc::ptr_eq(&before, &h.view.dataset()));
    assert_eq!(h.view.scheduler().last_completed(), Some(NOW + 1.0));
    assert!(statuses(h.notes()).iter().any(|s| s.contains("server went away")));
}

#[test]
fn live_refresh_follows_the_clock() {
    let source = memory_source(20.0);
    source.set_live(true);
    let mut h = harness(source.clone(), settings());
    h.view.request_refresh().unwrap();
    h.settle();

    h.clock.advance(10.0);
    h.view.tick();
    assert_eq!(h.view.scheduler().state(), GulpState::Idle);

    h.clock.advance(10.0);
    h.view.tick();
    assert_eq!(h.view.scheduler().state(), GulpState::Fetching);
    h.settle();
    assert_eq!(source.requests().len(), 2);
}

#[test]
fn no_live_refresh_from_a_dead_source() {
    let source = memory_source(20.0);
    let mut h = harness(source.clone(), settings());
    h.view.request_refresh().unwrap();
    h.settle();
    h.clock.advance(100.0);
    h.view.tick();
    assert_eq!(h.view.scheduler().state(), GulpState::Idle);
    assert_eq!(source.requests().len(), 1);
}

#[test]
fn scrolling_back_pauses_live_refresh() {
    let source = memory_source(20.0);
    source.set_live(true);
    let mut h = harness(source.clone(), settings());
    h.view.request_refresh().unwrap();
    h.settle();

    h.view.scroll(-1).unwrap();
    assert_eq!(h.view.time_override(), Some(NOW - 1200.0));
    h.settle();
    let back = aligned_span(NOW - 1200.0, 600.0, 3600.0).unwrap();
    assert_eq!(h.view.layout().span(), back);

    h.clock.advance(100.0);
    h.view.tick();
    assert_eq!(h.view.scheduler().state(), GulpState::Idle);

    // Scrolling past now returns to live data.
    h.view.scroll_rows(5).unwrap();
    assert_eq!(h.view.time_override(), None);
    h.settle();
    assert_eq!(h.view.layout().span(), aligned_span(NOW + 100.0, 600.0, 3600.0).unwrap());
}

#[test]
fn goto_time_parses_in_the_channel_zone() {
    let source = memory_source(20.0);
    let mut h = harness(source, settings());
    let t = NOW - 3000.0;
    let text = heliplot::time::format_time(t, ChannelMetadata::default().timezone);
    h.view.goto_time(&text).unwrap();
    assert_eq!(h.view.time_override(), Some(t));
    h.settle();

    assert!(matches!(
        h.view.goto_time("not a time"),
        Err(NavigationError::InvalidTime(_))
    ));
    assert_eq!(h.view.time_override(), Some(t));

    h.view.goto_time("now").unwrap();
    assert_eq!(h.view.time_override(), None);
}

#[test]
fn invalid_navigation_changes_nothing() {
    let source = memory_source(20.0);
    let mut h = harness(source.clone(), settings());
    assert!(h.view.set_time_chunk(0.0).is_err());
    assert!(h.view.set_span(300.0).is_err());
    assert_eq!(h.view.settings().time_chunk, 600.0);
    assert_eq!(h.view.settings().span, 3600.0);
    assert_eq!(h.view.scheduler().state(), GulpState::Idle);
    assert!(source.requests().is_empty());
}

#[test]
fn zoom_changes_row_duration_after_the_gulp() {
    let source = memory_source(20.0);
    let mut h = harness(source, settings());
    assert!(h.view.zoom(-1).unwrap());
    assert_eq!(h.view.settings().time_chunk, 300.0);
    h.settle();
    assert_eq!(h.view.layout().row_duration(), 300.0);
    assert_eq!(h.view.layout().num_rows(), 12);
}

#[test]
fn clip_alerts_are_debounced() {
    let source = memory_source(100.0);
    let clip_settings = HelicorderSettings {
        auto_scale: false,
        bar_range: 10.0,
        clip_value: 50.0,
        alert_clip: true,
        ..settings()
    };
    let mut h = harness(source, clip_settings);
    let alerts = |notes: Vec<ViewNotification>| {
        notes
            .into_iter()
            .filter(|n| matches!(n, ViewNotification::ClipAlert { .. }))
            .count()
    };

    h.view.request_refresh().unwrap();
    h.settle();
    assert!(!h.view.clipped_intervals().is_empty());
    assert_eq!(alerts(h.notes()), 1);

    h.clock.advance(60.0);
    h.view.request_refresh().unwrap();
    h.settle();
    assert_eq!(alerts(h.notes()), 0);

    h.clock.advance(300.0);
    h.view.request_refresh().unwrap();
    h.settle();
    assert_eq!(alerts(h.notes()), 1);
}

#[test]
fn click_opens_an_inset_and_fetches_its_wave() {
    let source = memory_source(20.0);
    let mut h = harness(source, settings());
    h.view.request_refresh().unwrap();
    h.settle();
    h.view.set_pixel_rect(PixelRect::new(0.0, 0.0, 600.0, 600.0));

    // Row 2, halfway along.
    assert!(h.view.click(300.0, 250.0));
    let anchor = h.view.layout().row_start(2) + 300.0;
    assert_abs_diff_eq!(h.view.inset().window().unwrap().anchor_time, anchor);
    h.pump_until(|v| v.inset().wave().is_some());
    assert_eq!(h.view.inset().wave().unwrap().len(), 60);
    assert_eq!(h.view.highlight().len(), 1);

    assert!(h.view.remove_inset());
    let notes = h.notes();
    assert!(notes.contains(&ViewNotification::InsetCreated {
        start: anchor,
        end: anchor + 60.0
    }));
    assert!(notes.contains(&ViewNotification::InsetRemoved));

    // Outside the rows: nothing opens.
    assert!(!h.view.click(300.0, 900.0));
}

#[test]
fn hover_reports_the_time_under_the_pointer() {
    let source = memory_source(20.0);
    let mut h = harness(source, settings());
    h.view.set_pixel_rect(PixelRect::new(0.0, 0.0, 600.0, 600.0));
    let text = h.view.hover(0.0, 50.0).unwrap();
    assert!(text.starts_with("HHZ: "));
    assert!(text.ends_with("UTC"));
    assert!(h.view.hover(0.0, 700.0).is_none());
}

#[test]
fn kiosk_mode_returns_to_live_when_idle() {
    let source = memory_source(20.0);
    let kiosk = HelicorderSettings {
        kiosk_idle_timeout: 60.0,
        ..settings()
    };
    let mut h = harness(source, kiosk);
    h.view.set_kiosk_mode(true);
    h.view.request_refresh().unwrap();
    h.settle();
    h.view.set_pixel_rect(PixelRect::new(0.0, 0.0, 600.0, 600.0));
    h.view.scroll_rows(-3).unwrap();
    h.settle();
    assert!(h.view.click(100.0, 150.0));
    h.pump_until(|v| !v.inset().is_fetching());

    h.clock.advance(30.0);
    h.view.tick();
    assert!(h.view.time_override().is_some());

    h.clock.advance(31.0);
    h.view.tick();
    assert_eq!(h.view.time_override(), None);
    assert!(h.view.inset().window().is_none());
    h.settle();
    assert_eq!(h.view.layout().span(), aligned_span(NOW + 61.0, 600.0, 3600.0).unwrap());
}

#[test]
fn close_releases_data_and_stops_fetching() {
    let source = memory_source(20.0);
    let mut h = harness(source.clone(), settings());
    h.view.request_refresh().unwrap();
    h.settle();
    let padded = h.view.layout().padded_span();

    h.view.close();
    assert!(h.view.is_closed());
    assert!(source.is_closed());
    assert_eq!(source.released(), vec![(CHANNEL.to_string(), padded)]);

    h.view.request_refresh().unwrap();
    assert_eq!(h.view.scheduler().state(), GulpState::Closed);
    assert_eq!(source.requests().len(), 1);

    // Closing twice is harmless.
    h.view.close();
    assert_eq!(source.released().len(), 1);
}

#[test]
fn dropping_a_view_closes_it() {
    let source = memory_source(20.0);
    let h = harness(source.clone(), settings());
    drop(h);
    assert!(source.is_closed());
}

#[test]
fn timer_drives_live_refresh() {
    let source = memory_source(20.0);
    source.set_live(true);
    let fast = HelicorderSettings {
        refresh_interval: 5.0,
        ..settings()
    };
    let mut h = harness(source.clone(), fast);
    h.view.start().unwrap();
    h.settle();
    assert_eq!(source.requests().len(), 1);

    h.clock.advance(6.0);
    let src = Arc::clone(&source);
    h.pump_until(move |v| src.requests().len() >= 2 && v.scheduler().state() == GulpState::Idle);
    assert_eq!(source.requests().len(), 2);
}

/// A source whose helicorder calls block until the test opens the gate.
struct GatedSource {
    inner: Arc<MemorySource>,
    gate: Mutex<Receiver<()>>,
    calls: AtomicUsize,
    finished: AtomicUsize,
}

impl GatedSource {
    fn new(inner: Arc<MemorySource>) -> (Arc<Self>, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let source = Arc::new(Self {
            inner,
            gate: Mutex::new(rx),
            calls: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        });
        (source, tx)
    }
}

impl DataSource for GatedSource {
    fn get_helicorder(
        &self,
        channel: &str,
        start: f64,
        end: f64,
        listener: &dyn GulpListener,
    ) -> Result<HelicorderDataset, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.gate.lock().unwrap().recv();
        let result = self.inner.get_helicorder(channel, start, end, listener);
        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn get_wave(&self, channel: &str, start: f64, end: f64) -> Result<WaveSamples, SourceError> {
        self.inner.get_wave(channel, start, end)
    }

    fn is_active_source(&self) -> bool {
        self.inner.is_active_source()
    }

    fn close(&self) -> Result<(), SourceError> {
        self.inner.close()
    }
}

fn wait_for(what: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !what() {
        assert!(Instant::now() < deadline, "timed out");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn navigation_during_a_gulp_keeps_only_the_last_request() {
    let memory = memory_source(20.0);
    let (gated, gate) = GatedSource::new(memory.clone());
    let busy = BusyCounter::new();
    let clock = ManualClock::new(NOW);
    let ctx = ViewContext::new(gated.clone())
        .with_clock(Arc::new(clock))
        .with_busy(busy.clone());
    let mut view = HelicorderView::new(CHANNEL, settings(), ChannelMetadata::default(), ctx).unwrap();

    view.request_refresh().unwrap();
    wait_for(|| gated.calls.load(Ordering::SeqCst) == 1);
    view.scroll_rows(-1).unwrap();
    view.scroll_rows(-1).unwrap();
    view.scroll_rows(-1).unwrap();
    assert_eq!(busy.count(), 1);
    let last = aligned_span(NOW - 1800.0, 600.0, 3600.0).unwrap();
    assert_eq!(view.scheduler().pending().map(|r| r.span), Some(last));

    gate.send(()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while gated.calls.load(Ordering::SeqCst) < 2 {
        assert!(Instant::now() < deadline, "timed out");
        view.wait_events(Duration::from_millis(20));
    }
    // The first result is applied before the queued request starts.
    assert_eq!(gated.finished.load(Ordering::SeqCst), 1);
    assert_eq!(busy.count(), 1);

    gate.send(()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while view.scheduler().state() != GulpState::Idle {
        assert!(Instant::now() < deadline, "timed out");
        view.wait_events(Duration::from_millis(20));
    }
    assert_eq!(busy.count(), 0);
    assert_eq!(gated.calls.load(Ordering::SeqCst), 2);
    let spans: Vec<TimeSpan> = memory.requests().into_iter().map(|(_, s)| s).collect();
    assert_eq!(spans[1], last.padded(600.0));
    assert_eq!(view.layout().span(), last);
}

#[test]
fn results_arriving_after_close_are_ignored() {
    let memory = memory_source(20.0);
    let (gated, gate) = GatedSource::new(memory.clone());
    let busy = BusyCounter::new();
    let ctx = ViewContext::new(gated.clone())
        .with_clock(Arc::new(ManualClock::new(NOW)))
        .with_busy(busy.clone());
    let mut view = HelicorderView::new(CHANNEL, settings(), ChannelMetadata::default(), ctx).unwrap();
    let empty = view.dataset();

    view.request_refresh().unwrap();
    wait_for(|| gated.calls.load(Ordering::SeqCst) == 1);
    view.close();
    assert_eq!(busy.count(), 0);

    gate.send(()).unwrap();
    wait_for(|| gated.finished.load(Ordering::SeqCst) == 1);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(view.process_events(), 0);
    assert!(Arc::ptr_eq(&empty, &view.dataset()));
    assert_eq!(gated.calls.load(Ordering::SeqCst), 1);
}


#[test]
fn loud_padding_rows_do_not_drive_scale_or_alerts() {
    let span = aligned_span(NOW, 600.0, 3600.0).unwrap();
    let start = span.start() - 600.0;
    // ±1000 in the padding row before the plot, ±1 from the first plotted row on.
    let samples = (0..(NOW - start) as usize)
        .map(|i| {
            let amplitude = if i < 600 { 1000.0 } else { 1.0 };
            if i % 2 == 0 {
                amplitude
            } else {
                -amplitude
            }
        })
        .collect();
    let source = MemorySource::new(10.0);
    source.insert_channel(CHANNEL, WaveSamples::new(start, 1.0, samples));
    let quiet = HelicorderSettings {
        auto_scale: false,
        bar_range: 10.0,
        clip_value: 50.0,
        alert_clip: true,
        ..settings()
    };
    let mut h = harness(Arc::new(source), quiet);
    h.view.request_refresh().unwrap();
    h.settle();

    let state = h.view.scale_state().unwrap();
    assert_abs_diff_eq!(state.mean_max, 1.0);
    assert_abs_diff_eq!(state.bias, 0.0);
    // The padding row was fetched and is loud, but nothing visible clips.
    assert_eq!(heliplot::clip::clipped_intervals(&h.view.dataset(), &state).len(), 60);
    assert!(h.view.clipped_intervals().is_empty());
    assert!(!h
        .notes()
        .iter()
        .any(|n| matches!(n, ViewNotification::ClipAlert { .. })));
}

#[test]
fn rows_past_the_data_are_sentinel_and_scale_falls_back() {
    let two_hours = HelicorderSettings {
        span: 7200.0,
        refresh_interval: 0.0,
        ..settings()
    };
    let span = aligned_span(NOW, 600.0, 7200.0).unwrap();
    // Data for the first eight of twelve rows only.
    let source = MemorySource::new(10.0);
    let samples = (0..4800).map(|i| 20.0 * (i as f64 * 0.1).sin()).collect();
    source.insert_channel(CHANNEL, WaveSamples::new(span.start(), 1.0, samples));
    let mut h = harness(Arc::new(source), two_hours);
    h.view.request_refresh().unwrap();
    h.settle();

    let layout = h.view.layout().clone();
    assert_eq!(layout.num_rows(), 12);
    let dataset = h.view.dataset();
    assert!(dataset.row(&layout, 7).iter().all(|iv| iv.has_data()));
    let row = dataset.row(&layout, 11);
    assert_eq!(row.len(), 60);
    assert!(row.iter().all(|iv| !iv.has_data()));
    assert!(!statuses(h.notes()).iter().any(|s| s.contains("Error")));
    let before = h.view.scale_state().unwrap();
    assert!(before.mean_max > 0.0);

    // Hours before the data starts: every row is empty.
    let text = heliplot::time::format_time(NOW - 20_000.0, ChannelMetadata::default().timezone);
    h.view.goto_time(&text).unwrap();
    h.settle();
    assert!(!h.view.dataset().has_data());
    assert_eq!(h.view.dataset().row(h.view.layout(), 11).len(), 60);
    assert_eq!(h.view.scale_state(), Some(before));
    assert!(!statuses(h.notes()).iter().any(|s| s.contains("Error")));
}

#[test]
fn span_and_chunk_accept_duration_text() {
    let source = memory_source(20.0);
    let mut h = harness(source, settings());
    h.view.set_span_text("2h").unwrap();
    assert_eq!(h.view.settings().span, 7200.0);
    h.settle();
    h.view.set_time_chunk_text("5m").unwrap();
    assert_eq!(h.view.settings().time_chunk, 300.0);
    h.settle();

    assert!(matches!(
        h.view.set_span_text("two hours"),
        Err(NavigationError::InvalidDuration(_))
    ));
    assert!(h.view.set_time_chunk_text("0s").is_err());
    assert_eq!(h.view.settings().span, 7200.0);
    assert_eq!(h.view.settings().time_chunk, 300.0);
}

#[test]
fn gulp_start_is_reported_as_status() {
    let source = memory_source(20.0);
    let mut h = harness(source, settings());
    h.view.request_refresh().unwrap();
    h.settle();
    let statuses = statuses(h.notes());
    assert!(statuses.iter().any(|s| s == "Loading HHZ: 0%"));
    assert!(statuses.iter().any(|s| s == "Loading HHZ: 100%"));
}
