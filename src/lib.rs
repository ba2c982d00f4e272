//! Heliplot crate root: re-exports and module wiring.
//!
//! This crate is the engine behind a helicorder display: a long seismic
//! record folded into horizontal rows of equal duration, newest row at the
//! bottom. It owns the state and arithmetic; drawing is left to the host
//! (see `demos/` for an egui-free driver).
//!
//! The implementation is split into cohesive modules:
//! - `data`: time spans, raw waves and decimated helicorder datasets
//! - `layout`: row geometry and time/pixel transforms
//! - `scale`: auto-scaling with optional memory
//! - `clip`: clipped-interval detection and alert debouncing
//! - `scheduler`: the one-fetch-at-a-time gulp state machine
//! - `inset`: the zoomed waveform inset and its highlight
//! - `view`: a per-channel view tying the above to a `DataSource`

pub mod clip;
pub mod clock;
pub mod data;
pub mod error;
pub mod inset;
pub mod layout;
pub mod listener;
pub mod scale;
pub mod scheduler;
pub mod settings;
pub mod source;
pub mod time;
pub mod timer;
pub mod view;

// Public re-exports for a compact external API
pub use clip::{clipped_intervals, ClipAlertDebouncer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use data::helicorder::{HeliInterval, HelicorderDataset, NO_DATA};
pub use data::time_span::TimeSpan;
pub use data::wave::WaveSamples;
pub use error::{NavigationError, SourceError, SpanError};
pub use inset::{highlight_rects, HighlightRect, InsetController, InsetWindow};
pub use layout::{PixelRect, RowLayout, RowPosition};
pub use listener::{ChannelListener, HelicorderViewListener, NullListener, ViewNotification};
pub use scale::{AutoScaleEngine, AutoScaleState, ScaleSettings};
pub use scheduler::{BusyCounter, GulpOutcome, GulpRequest, GulpScheduler, GulpState};
pub use settings::HelicorderSettings;
pub use source::{ChannelMetadata, DataSource, GulpListener, MemorySource};
pub use view::{HelicorderView, ViewContext};
