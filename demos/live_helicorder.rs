//! Live helicorder demo without a GUI.
//!
//! A generator thread feeds a synthetic 20 Hz signal with occasional bursts
//! into an in-memory source; a view refreshes it every few seconds and prints
//! what it would hand to a renderer.
//!
//! Run with: `RUST_LOG=debug cargo run --example live_helicorder`

use std::sync::Arc;
use std::time::{Duration, Instant};

use heliplot::{
    ChannelListener, ChannelMetadata, Clock, DataSource, HelicorderSettings, HelicorderView,
    MemorySource, PixelRect, SystemClock, ViewContext, ViewNotification, WaveSamples,
};

const CHANNEL: &str = "DEMO.HHZ";
const RATE: f64 = 20.0;

fn sample(t: f64) -> f64 {
    let base = 40.0 * (t * 2.0 * std::f64::consts::PI * 0.7).sin();
    // A loud burst every 30 s.
    if t.rem_euclid(30.0) < 2.0 {
        base * 120.0
    } else {
        base
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let clock = SystemClock;
    let now = clock.now();

    // Seed an hour of history so the first gulp has something to show.
    let history_start = (now - 3600.0).floor();
    let samples = (0..(3600.0 * RATE) as usize)
        .map(|i| sample(history_start + i as f64 / RATE))
        .collect();
    let source = Arc::new(MemorySource::new(1.0));
    source.insert_channel(CHANNEL, WaveSamples::new(history_start, RATE, samples));
    source.set_live(true);

    let feeder = Arc::clone(&source);
    std::thread::spawn(move || {
        let mut next = history_start + 3600.0;
        loop {
            std::thread::sleep(Duration::from_millis(250));
            let until = SystemClock.now();
            let count = ((until - next) * RATE).floor().max(0.0) as usize;
            let chunk: Vec<f64> = (0..count).map(|i| sample(next + i as f64 / RATE)).collect();
            feeder.append(CHANNEL, &chunk);
            next += count as f64 / RATE;
        }
    });

    let settings = HelicorderSettings {
        time_chunk: 300.0,
        span: 3600.0,
        refresh_interval: 3.0,
        alert_clip: true,
        alert_clip_timeout: 10.0,
        ..Default::default()
    };
    let (listener, notes) = ChannelListener::new();
    let source_dyn: Arc<dyn DataSource> = source;
    let ctx = ViewContext::new(source_dyn).with_listener(Arc::new(listener));
    let mut view = HelicorderView::new(CHANNEL, settings, ChannelMetadata::default(), ctx)?;
    view.set_pixel_rect(PixelRect::new(0.0, 0.0, 1200.0, 600.0));
    view.start()?;

    let deadline = Instant::now() + Duration::from_secs(15);
    let mut opened_inset = false;
    let mut shown_wave = false;
    while Instant::now() < deadline {
        view.wait_events(Duration::from_millis(200));
        for note in notes.try_iter() {
            match note {
                ViewNotification::DatasetUpdated(span) => {
                    let scale = view.scale_state().unwrap_or_default();
                    println!(
                        "updated {span}: {} rows, bar range {:.1}, {} clipped intervals",
                        view.layout().num_rows(),
                        scale.bar_range,
                        view.clipped_intervals().len()
                    );
                }
                ViewNotification::ClipAlert { channel, magnitude } => {
                    println!("CLIP on {channel}: {magnitude:.0} counts");
                }
                ViewNotification::InsetCreated { start, end } => {
                    println!("inset over [{start:.1}, {end:.1})");
                }
                other => println!("{other:?}"),
            }
        }
        if !opened_inset && view.dataset().has_data() {
            // Open an inset halfway along the newest complete row.
            let row = view.layout().num_rows() - 2;
            let t = view.layout().row_start(row) + 150.0;
            opened_inset = view.open_inset(t);
        }
        if let Some(wave) = view.inset().wave().filter(|_| !shown_wave) {
            println!("inset wave: {} samples", wave.len());
            for rect in view.highlight() {
                println!("  highlight row {}: {:?}", rect.row, rect.to_egui_rect());
            }
            shown_wave = true;
        }
    }

    view.close();
    Ok(())
}
