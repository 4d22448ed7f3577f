//! paperflow application orchestration layer
//!
//! This crate contains the processing-status synchronization runtime: the
//! subscription registry, the throttled refresher and the two stores built on
//! top of them.
//!
//! ```text
//! UI ──→ PaperProcessingStore ──→ SubscriptionRegistry ──→ EntityFeedPort
//!            │       ▲                     │
//!            │       └──── SnapshotHandler ┘
//!            └──→ EntityQueryPort / NavigationPort
//!
//! UI ──→ AccountDataStore ──→ ThrottledRefresher ──→ AggregateFetchPort
//! ```

pub mod refresher;
pub mod registry;
pub mod session;
pub mod stores;

pub use refresher::{RefreshOutcome, ThrottledRefresher};
pub use registry::{
    SnapshotDelivery, SnapshotHandler, SubscriptionRegistry, SubscriptionToken, WatchOutcome,
};
pub use session::{ClientSession, ClientSessionDeps};
pub use stores::{AccountDataStore, EntityListView, PaperProcessingStore};
