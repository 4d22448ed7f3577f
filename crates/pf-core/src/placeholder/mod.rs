//! Optimistic placeholder reconciliation.
//!
//! A placeholder is a locally synthesized [`crate::entity::TrackedEntity`]
//! shown while the backend has not yet acknowledged an upload. Each placeholder
//! occupies one [`crate::ids::SlotKey`] and is matched against authoritative entities through a
//! caller-supplied [`SlotCorrelation`], never through field equality.

mod reconciler;

pub use reconciler::{
    CreatedPlaceholder, PlaceholderReconciler, PlaceholderSeed, Reconciliation, SlotCorrelation,
    StalledPlaceholder,
};
