//! Bootstrap: configuration, logging, wiring and the headless replay.

pub mod config;
pub mod run;
pub mod tracing;
pub mod wiring;

pub use config::{load_config, resolve_config, AppConfig, LoggingConfig, ResolvedConfig};
pub use run::{run_replay, ReplayOptions, ReplayReport};
pub use self::tracing::init_tracing_subscriber;
pub use wiring::{wire_session, WiredAdapters};
