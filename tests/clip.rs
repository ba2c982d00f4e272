use heliplot::clip::{clipped_intervals, peak_clip, ClipAlertDebouncer};
use heliplot::scale::AutoScaleState;
use heliplot::{HeliInterval, HelicorderDataset, TimeSpan};

fn state(clip_value: f64) -> AutoScaleState {
    AutoScaleState {
        mean_max: 10.0,
        bias: 0.0,
        bar_range: 30.0,
        clip_value,
    }
}

fn dataset() -> HelicorderDataset {
    let span = TimeSpan::new(0.0, 50.0).unwrap();
    HelicorderDataset::from_intervals(
        span,
        10.0,
        [
            HeliInterval::new(0.0, -5.0, 5.0),
            HeliInterval::new(10.0, -120.0, 30.0),
            HeliInterval::new(30.0, -10.0, 250.0),
            HeliInterval::new(40.0, -99.0, 99.0),
        ],
    )
}

#[test]
fn intervals_over_the_clip_value_are_reported() {
    assert_eq!(clipped_intervals(&dataset(), &state(100.0)), vec![1, 3]);
    assert_eq!(peak_clip(&dataset(), &state(100.0)), Some(250.0));
    assert!(clipped_intervals(&dataset(), &state(1000.0)).is_empty());
    assert_eq!(peak_clip(&dataset(), &state(1000.0)), None);
}

#[test]
fn alerts_are_debounced_by_timeout() {
    let mut debouncer = ClipAlertDebouncer::new();
    let timeout = 300.0;
    let fired: Vec<f64> = [0.0, 100.0, 299.9, 300.0, 450.0, 599.0, 600.0, 601.0]
        .into_iter()
        .filter(|&now| debouncer.should_alert(now, timeout))
        .collect();
    assert_eq!(fired, vec![0.0, 300.0, 600.0]);
    assert_eq!(debouncer.last_alert_time(), Some(600.0));
}

#[test]
fn consecutive_alerts_are_at_least_a_timeout_apart() {
    let mut debouncer = ClipAlertDebouncer::new();
    let mut last: Option<f64> = None;
    let mut now = 0.0;
    while now < 5000.0 {
        if debouncer.should_alert(now, 120.0) {
            if let Some(prev) = last {
                assert!(now - prev >= 120.0);
            }
            last = Some(now);
        }
        now += 7.3;
    }
    assert!(last.is_some());
}

#[test]
fn evaluate_only_consumes_the_window_when_clipping() {
    let mut debouncer = ClipAlertDebouncer::new();
    assert_eq!(debouncer.evaluate(false, &dataset(), &state(100.0), 0.0, 300.0), None);
    assert_eq!(debouncer.evaluate(true, &dataset(), &state(1000.0), 0.0, 300.0), None);
    assert_eq!(debouncer.last_alert_time(), None);

    assert_eq!(debouncer.evaluate(true, &dataset(), &state(100.0), 10.0, 300.0), Some(250.0));
    assert_eq!(debouncer.evaluate(true, &dataset(), &state(100.0), 20.0, 300.0), None);
    debouncer.reset();
    assert_eq!(debouncer.evaluate(true, &dataset(), &state(100.0), 30.0, 300.0), Some(250.0));
}
