//! Infrastructure adapters for paperflow.
//!
//! - [`time`]: wall clock and a manually driven clock
//! - [`backend`]: in-process backend implementing the push and pull ports
//! - [`navigation`]: navigator that records and logs routes

pub mod backend;
pub mod navigation;
pub mod time;

pub use backend::InMemoryBackend;
pub use navigation::RecordingNavigator;
pub use time::{ManualClock, SystemClock};
