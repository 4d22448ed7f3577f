//! paperflow: processing-status synchronization for the paper translation
//! client.
//!
//! The domain lives in `pf-core`, the stores in `pf-app` and the adapters in
//! `pf-infra`; this crate only assembles them.

pub mod bootstrap;

pub use bootstrap::{
    init_tracing_subscriber, resolve_config, run_replay, wire_session, AppConfig, ReplayOptions,
    ReplayReport,
};
