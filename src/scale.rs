//! Amplitude scaling for helicorder rows.
//!
//! Every refresh derives an [`AutoScaleState`] from the new dataset. With
//! auto-scale on, the bar range and clip value follow the mean peak magnitude;
//! with it off, the operator's static values are converted to counts through
//! the channel calibration. In memory mode the range only ever grows until
//! [`AutoScaleEngine::reset`] is called.

use crate::data::helicorder::HelicorderDataset;
use crate::settings::HelicorderSettings;
use crate::source::ChannelMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AutoScaleState {
    /// Mean peak magnitude about `bias`.
    pub mean_max: f64,
    /// Central tendency of the signal, subtracted before drawing.
    pub bias: f64,
    /// Amplitude mapped to one row height.
    pub bar_range: f64,
    /// Magnitude above which an interval counts as clipped.
    pub clip_value: f64,
}

/// The subset of [`HelicorderSettings`] the scaler reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleSettings {
    pub auto_scale: bool,
    pub memory: bool,
    pub bar_range: f64,
    pub clip_value: f64,
    pub bar_multiplier: f64,
    pub clip_factor: f64,
}

impl Default for ScaleSettings {
    fn default() -> Self {
        (&HelicorderSettings::default()).into()
    }
}

impl From<&HelicorderSettings> for ScaleSettings {
    fn from(s: &HelicorderSettings) -> Self {
        Self {
            auto_scale: s.auto_scale,
            memory: s.auto_scale_memory,
            bar_range: s.bar_range,
            clip_value: s.clip_value,
            bar_multiplier: s.bar_multiplier,
            clip_factor: s.clip_bars,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutoScaleEngine {
    settings: ScaleSettings,
    state: Option<AutoScaleState>,
    last_nonzero: Option<AutoScaleState>,
}

impl AutoScaleEngine {
    pub fn new(settings: ScaleSettings) -> Self {
        Self {
            settings,
            state: None,
            last_nonzero: None,
        }
    }

    pub fn settings(&self) -> ScaleSettings {
        self.settings
    }

    /// Switching scaling mode or memory starts over; tuning changes apply on
    /// the next update.
    pub fn set_settings(&mut self, settings: ScaleSettings) {
        if settings.auto_scale != self.settings.auto_scale || settings.memory != self.settings.memory
        {
            self.reset();
        }
        self.settings = settings;
    }

    /// State produced by the most recent update.
    pub fn state(&self) -> Option<AutoScaleState> {
        self.state
    }

    /// Forget remembered ranges. This is the only way memory mode shrinks.
    pub fn reset(&mut self) {
        self.state = None;
        self.last_nonzero = None;
    }

    pub fn update(&mut self, dataset: &HelicorderDataset, metadata: &ChannelMetadata) -> AutoScaleState {
        let s = self.settings;
        let bias = dataset
            .bias()
            .or(self.state.map(|st| st.bias))
            .unwrap_or(0.0);
        let mean_max = dataset.mean_max(bias);

        let fixed = AutoScaleState {
            mean_max,
            bias,
            bar_range: metadata.to_counts(s.bar_range),
            clip_value: metadata.to_counts(s.clip_value),
        };
        let computed = if !s.auto_scale {
            fixed
        } else if mean_max > 0.0 {
            AutoScaleState {
                mean_max,
                bias,
                bar_range: mean_max * s.bar_multiplier,
                clip_value: mean_max * s.clip_factor,
            }
        } else {
            // Nothing to measure: keep the last usable scale instead of
            // collapsing rows to zero height.
            self.last_nonzero.unwrap_or(fixed)
        };

        let next = match (s.memory, self.state) {
            (true, Some(prev)) => AutoScaleState {
                bar_range: prev.bar_range.max(computed.bar_range),
                clip_value: prev.clip_value.max(computed.clip_value),
                ..computed
            },
            _ => computed,
        };

        if s.auto_scale && next.mean_max > 0.0 {
            self.last_nonzero = Some(next);
        }
        self.state = Some(next);
        next
    }
}
