use async_trait::async_trait;
use tokio::sync::mpsc;

use super::errors::FeedError;
use crate::entity::TrackedEntity;
use crate::ids::EntityId;

/// Releases the transport side of one subscription.
///
/// # Behavior / 行为
/// - `teardown()` must be idempotent.
/// - After teardown the transport should stop sending, but callers must not
///   rely on it: snapshots may still be in flight.
///
/// - `teardown()` 必须是幂等的。
pub trait FeedTeardown: Send + Sync {
    fn teardown(&self);
}

/// An open push subscription.
pub struct EntityFeed {
    /// Full snapshots, one per backend change
    pub snapshots: mpsc::Receiver<TrackedEntity>,
    pub teardown: Box<dyn FeedTeardown>,
}

impl std::fmt::Debug for EntityFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityFeed").finish_non_exhaustive()
    }
}

/// Push capability of the backend.
///
/// 后端推送能力：订阅实体变化。
#[async_trait]
pub trait EntityFeedPort: Send + Sync {
    /// Open a subscription delivering every change of `entity_id`.
    async fn subscribe(&self, entity_id: &EntityId) -> Result<EntityFeed, FeedError>;
}
