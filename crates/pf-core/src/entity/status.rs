use serde::{Deserialize, Serialize};

/// Processing lifecycle of a tracked entity.
///
/// State transitions:
///
/// ```text
/// Pending ──→ MetadataExtracted ──→ Processing ──→ Completed
///                                              └─→ Failed
/// ```
///
/// Transitions are driven by backend snapshots only; this type carries no
/// transition logic of its own. See [`crate::job_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// Accepted by the backend, nothing extracted yet
    Pending,

    /// Title, page count and language have been extracted
    MetadataExtracted,

    /// Translation pipeline is running
    Processing,

    /// All artifacts are available
    Completed,

    /// Processing stopped with an error
    Failed,
}

impl EntityStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check if processing is still expected to make progress
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::MetadataExtracted => "metadata_extracted",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl Default for EntityStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(EntityStatus::Completed.is_terminal());
        assert!(EntityStatus::Failed.is_terminal());
        assert!(!EntityStatus::Pending.is_terminal());
        assert!(!EntityStatus::MetadataExtracted.is_terminal());
        assert!(!EntityStatus::Processing.is_terminal());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&EntityStatus::MetadataExtracted).unwrap();
        assert_eq!(json, "\"metadata_extracted\"");

        let parsed: EntityStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(parsed, EntityStatus::Processing);
    }

    #[test]
    fn test_default_state() {
        assert_eq!(EntityStatus::default(), EntityStatus::Pending);
    }
}
