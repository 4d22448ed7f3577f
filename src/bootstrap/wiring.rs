//! # Dependency Injection / 依赖注入模块
//!
//! The only place that knows the concrete adapters. It builds them, injects
//! them into [`ClientSession`] through the port traits and hands the adapters
//! back so the caller can drive the in-process backend.
//!
//! No business decisions are made here.

use std::sync::Arc;

use pf_app::{ClientSession, ClientSessionDeps};
use pf_core::ports::ClockPort;
use pf_core::SyncConfig;
use pf_infra::{InMemoryBackend, RecordingNavigator};
use tracing::debug;

/// Concrete adapters behind a wired session.
pub struct WiredAdapters {
    pub backend: Arc<InMemoryBackend>,
    pub navigator: Arc<RecordingNavigator>,
}

pub fn wire_session(config: SyncConfig, clock: Arc<dyn ClockPort>) -> (ClientSession, WiredAdapters) {
    let backend = Arc::new(InMemoryBackend::from_config(&config));
    let navigator = Arc::new(RecordingNavigator::new());

    let session = ClientSession::from_deps(
        ClientSessionDeps {
            feed: backend.clone(),
            query: backend.clone(),
            account: backend.clone(),
            navigation: navigator.clone(),
            clock,
        },
        config,
    );
    debug!("Session wired against the in-memory backend");

    (session, WiredAdapters { backend, navigator })
}
