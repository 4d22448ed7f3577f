//! # pf-core
//!
//! Core domain models and business logic for paperflow.
//!
//! This crate contains pure business logic without any infrastructure dependencies.
//! Everything that talks to the backend is expressed as a port in [`ports`].

// Public module exports
pub mod account;
pub mod config;
pub mod entity;
pub mod ids;
pub mod job_status;
pub mod placeholder;
pub mod ports;

// Re-export commonly used types at the crate root
pub use account::{AccountProfile, RefreshableAggregate};
pub use config::SyncConfig;
pub use entity::{Artifact, EntityStatus, TrackedEntity};
pub use ids::{EntityId, SlotKey};
pub use job_status::{DiscardReason, JobEffect, JobStatusStateMachine, JobTransition};
pub use placeholder::{PlaceholderReconciler, PlaceholderSeed, SlotCorrelation};
