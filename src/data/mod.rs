pub mod helicorder;
pub mod time_span;
pub mod wave;
