//! Uniformly sampled waveform segments, as returned by a data source.

/// A contiguous run of samples at a fixed sample rate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WaveSamples {
    /// Time of the first sample (seconds since the UNIX epoch).
    pub start: f64,
    /// Samples per second.
    pub sample_rate: f64,
    pub samples: Vec<f64>,
}

impl WaveSamples {
    pub fn new(start: f64, sample_rate: f64, samples: Vec<f64>) -> Self {
        Self {
            start,
            sample_rate,
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time just past the last sample.
    pub fn end(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.start + self.samples.len() as f64 / self.sample_rate
        } else {
            self.start
        }
    }

    pub fn time_of(&self, index: usize) -> f64 {
        self.start + index as f64 / self.sample_rate
    }

    /// Index range of samples whose timestamps fall in `[t0, t1)`.
    pub fn index_range(&self, t0: f64, t1: f64) -> std::ops::Range<usize> {
        if self.sample_rate <= 0.0 || t1 <= t0 {
            return 0..0;
        }
        let len = self.samples.len();
        let to_index = |t: f64| {
            let i = ((t - self.start) * self.sample_rate - 1e-9).ceil();
            if i <= 0.0 {
                0
            } else {
                (i as usize).min(len)
            }
        };
        to_index(t0)..to_index(t1)
    }

    /// Copy of the samples in `[t0, t1)`, keeping the sample rate.
    pub fn slice(&self, t0: f64, t1: f64) -> WaveSamples {
        let range = self.index_range(t0, t1);
        let start = self.time_of(range.start);
        WaveSamples {
            start,
            sample_rate: self.sample_rate,
            samples: self.samples[range].to_vec(),
        }
    }
}
