//! Error types shared across the helicorder engine.
//!
//! Data-source failures never escape a view: they are caught at the gulp
//! boundary and turned into status text. Navigation errors are returned to the
//! caller before any state is touched.

/// Failure reported by a [`DataSource`](crate::source::DataSource).
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("request timed out")]
    Timeout,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("channel unavailable: {0}")]
    ChannelUnavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("data source closed")]
    Closed,
}

/// A time span that would violate `end > start`.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SpanError {
    #[error("span bounds must be finite")]
    NotFinite,
    #[error("span end {end} is not after start {start}")]
    Inverted { start: f64, end: f64 },
}

/// Operator input that was rejected without mutating the view.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum NavigationError {
    #[error("could not parse time '{0}'")]
    InvalidTime(String),
    #[error("could not parse duration '{0}'")]
    InvalidDuration(String),
    #[error("time chunk must be a positive number of seconds, got {0}")]
    InvalidTimeChunk(f64),
    #[error("span of {span} s must be positive and at least one time chunk ({time_chunk} s)")]
    InvalidSpan { span: f64, time_chunk: f64 },
    #[error("wave zoom offset must be positive, got {0}")]
    InvalidZoomOffset(f64),
    #[error("{field} must be a non-negative number, got {value}")]
    InvalidSetting { field: &'static str, value: f64 },
    #[error(transparent)]
    Span(#[from] SpanError),
}
