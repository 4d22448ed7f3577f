use crate::ids::EntityId;

/// One-shot fetch failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Not signed in")]
    Unauthenticated,
}

/// Push subscription failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("Failed to open subscription for {entity_id}: {reason}")]
    OpenFailed { entity_id: EntityId, reason: String },

    #[error("Push transport closed")]
    TransportClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("Navigation to {route} failed: {reason}")]
    Failed { route: String, reason: String },
}
