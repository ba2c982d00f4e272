//! Clip detection and alert rate limiting.

use crate::data::helicorder::HelicorderDataset;
use crate::scale::AutoScaleState;

/// Indices of intervals whose magnitude about the bias exceeds the clip value.
pub fn clipped_intervals(dataset: &HelicorderDataset, state: &AutoScaleState) -> Vec<usize> {
    dataset
        .intervals()
        .iter()
        .enumerate()
        .filter(|(_, iv)| iv.has_data() && iv.magnitude(state.bias) > state.clip_value)
        .map(|(i, _)| i)
        .collect()
}

/// Largest clipped magnitude in the dataset, if anything clipped.
pub fn peak_clip(dataset: &HelicorderDataset, state: &AutoScaleState) -> Option<f64> {
    dataset
        .data()
        .map(|iv| iv.magnitude(state.bias))
        .filter(|m| *m > state.clip_value)
        .fold(None, |acc: Option<f64>, m| Some(acc.map_or(m, |a| a.max(m))))
}

/// Remembers when the operator was last alerted about clipping.
#[derive(Debug, Clone, Default)]
pub struct ClipAlertDebouncer {
    last_alert: Option<f64>,
}

impl ClipAlertDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_alert_time(&self) -> Option<f64> {
        self.last_alert
    }

    /// True, recording `now`, when no alert was raised within the last
    /// `timeout` seconds. Leaves the state untouched otherwise.
    pub fn should_alert(&mut self, now: f64, timeout: f64) -> bool {
        let due = match self.last_alert {
            None => true,
            Some(last) => now - last >= timeout,
        };
        if due {
            self.last_alert = Some(now);
        }
        due
    }

    /// Run clip detection for a fresh dataset. Returns the peak clipped
    /// magnitude when an alert should be raised now.
    pub fn evaluate(
        &mut self,
        enabled: bool,
        dataset: &HelicorderDataset,
        state: &AutoScaleState,
        now: f64,
        timeout: f64,
    ) -> Option<f64> {
        if !enabled {
            return None;
        }
        let peak = peak_clip(dataset, state)?;
        self.should_alert(now, timeout).then_some(peak)
    }

    pub fn reset(&mut self) {
        self.last_alert = None;
    }
}
