use serde::{Deserialize, Serialize};

use super::EntityStatus;
use crate::ids::EntityId;

/// Full snapshot of a tracked entity as pushed or fetched from the backend.
///
/// A snapshot always replaces the previous value as a whole; the core never
/// patches individual fields of a live entity.
///
/// 后端推送或拉取得到的完整实体快照，始终整体替换旧值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub id: EntityId,
    pub status: EntityStatus,

    /// 0-100, only meaningful while `status == Processing`
    #[serde(default)]
    pub progress: Option<u8>,

    /// Logical timestamp, non-decreasing per entity
    pub updated_at: u64,

    #[serde(default)]
    pub is_placeholder: bool,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub file_name: Option<String>,

    #[serde(default)]
    pub owner_id: Option<String>,

    /// Upload correlation echoed back by the backend
    #[serde(default)]
    pub client_ref: Option<String>,

    /// Surfaced to the UI when `status == Failed`
    #[serde(default)]
    pub error_message: Option<String>,

    /// Wall-clock creation time in milliseconds
    pub created_at_ms: i64,
}

impl TrackedEntity {
    /// Minimal authoritative snapshot.
    pub fn new(id: impl Into<EntityId>, status: EntityStatus, updated_at: u64) -> Self {
        Self {
            id: id.into(),
            status,
            progress: None,
            updated_at,
            is_placeholder: false,
            title: None,
            file_name: None,
            owner_id: None,
            client_ref: None,
            error_message: None,
            created_at_ms: 0,
        }
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_client_ref(mut self, client_ref: impl Into<String>) -> Self {
        self.client_ref = Some(client_ref.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn created_at(mut self, created_at_ms: i64) -> Self {
        self.created_at_ms = created_at_ms;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Drop progress values that carry no meaning for the current status.
    pub fn normalized(mut self) -> Self {
        self.progress = match self.status {
            EntityStatus::Processing => self.progress.map(|p| p.min(100)),
            _ => None,
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_clamps_progress_while_processing() {
        let entity = TrackedEntity::new("p1", EntityStatus::Processing, 3).with_progress(140);
        assert_eq!(entity.normalized().progress, Some(100));
    }

    #[test]
    fn normalized_clears_progress_outside_processing() {
        let entity = TrackedEntity::new("p1", EntityStatus::Completed, 9).with_progress(90);
        assert_eq!(entity.normalized().progress, None);
    }

    #[test]
    fn deserializes_minimal_snapshot() {
        let json = r#"{"id":"p42","status":"pending","updated_at":1,"created_at_ms":10}"#;
        let entity: TrackedEntity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.id.as_str(), "p42");
        assert!(!entity.is_placeholder);
        assert_eq!(entity.progress, None);
    }
}
