//! Account data models.

pub mod aggregate;
pub mod profile;

pub use aggregate::RefreshableAggregate;
pub use profile::{AccountProfile, SubscriptionPlan};
