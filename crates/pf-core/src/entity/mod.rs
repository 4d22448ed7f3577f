//! Tracked entity models.

pub mod artifact;
pub mod status;
pub mod tracked;

pub use artifact::Artifact;
pub use status::EntityStatus;
pub use tracked::TrackedEntity;
