use async_trait::async_trait;

use super::errors::BackendError;
use crate::entity::{Artifact, TrackedEntity};
use crate::ids::EntityId;

/// Pull capability of the backend for tracked entities.
#[async_trait]
pub trait EntityQueryPort: Send + Sync {
    async fn fetch_entity(&self, entity_id: &EntityId) -> Result<TrackedEntity, BackendError>;

    /// Entities visible to the current session, newest first.
    async fn list_entities(&self) -> Result<Vec<TrackedEntity>, BackendError>;

    /// Dependent data of a finished entity.
    async fn fetch_artifacts(&self, entity_id: &EntityId) -> Result<Vec<Artifact>, BackendError>;
}
