//! Domain stores composing the registry, state machine, reconciler and
//! refresher.

pub mod account_data;
pub mod paper_processing;

pub use account_data::AccountDataStore;
pub use paper_processing::{
    EntityListView, ListSyncReport, PaperProcessingDeps, PaperProcessingStore,
};
