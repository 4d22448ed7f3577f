//! In-process backend
//! 进程内后端
//!
//! Implements the push and pull ports over plain collections so the stores can
//! be driven without a network: the bootstrap replay and integration tests
//! create entities, push snapshots and inspect how many feeds are still open.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use pf_core::account::AccountProfile;
use pf_core::ports::{
    AggregateFetchPort, BackendError, EntityFeed, EntityFeedPort, EntityQueryPort, FeedError,
    FeedTeardown,
};
use pf_core::{Artifact, EntityId, EntityStatus, SyncConfig, TrackedEntity};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

struct Subscriber {
    sender: mpsc::Sender<TrackedEntity>,
    closed: Arc<AtomicBool>,
}

#[derive(Default)]
struct BackendState {
    /// Creation order, oldest first
    entities: Vec<TrackedEntity>,
    artifacts: HashMap<EntityId, Vec<Artifact>>,
    account: Option<AccountProfile>,
    subscribers: HashMap<EntityId, Vec<Subscriber>>,
}

/// Idempotent teardown of one in-memory feed.
struct ChannelTeardown {
    closed: Arc<AtomicBool>,
    teardowns: Arc<AtomicUsize>,
}

impl FeedTeardown for ChannelTeardown {
    fn teardown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct InMemoryBackend {
    state: Mutex<BackendState>,
    feed_buffer: usize,
    available: AtomicBool,
    subscribes: AtomicUsize,
    teardowns: Arc<AtomicUsize>,
    artifact_calls: AtomicUsize,
    account_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new(feed_buffer: usize) -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
            feed_buffer: feed_buffer.max(1),
            available: AtomicBool::new(true),
            subscribes: AtomicUsize::new(0),
            teardowns: Arc::new(AtomicUsize::new(0)),
            artifact_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.feed_buffer)
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    /// Create a `Pending` entity with a generated id, as an upload would.
    pub fn create_entity(
        &self,
        owner_id: &str,
        client_ref: Option<&str>,
        created_at_ms: i64,
    ) -> TrackedEntity {
        let mut entity = TrackedEntity::new(
            Uuid::new_v4().simple().to_string(),
            EntityStatus::Pending,
            1,
        )
        .with_owner(owner_id)
        .created_at(created_at_ms);
        entity.client_ref = client_ref.map(str::to_string);

        self.insert_entity(entity.clone());
        entity
    }

    /// Insert or replace an entity without notifying subscribers.
    pub fn insert_entity(&self, entity: TrackedEntity) {
        let mut state = self.lock_state();
        match state.entities.iter_mut().find(|e| e.id == entity.id) {
            Some(current) => *current = entity,
            None => state.entities.push(entity),
        }
    }

    pub fn set_artifacts(&self, entity_id: &EntityId, artifacts: Vec<Artifact>) {
        self.lock_state()
            .artifacts
            .insert(entity_id.clone(), artifacts);
    }

    pub fn set_account(&self, profile: AccountProfile) {
        self.lock_state().account = Some(profile);
    }

    /// While unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Push
    // ------------------------------------------------------------------

    /// Store `snapshot` and deliver it to every open feed of its id.
    /// Returns the number of feeds it was delivered to.
    pub async fn push(&self, snapshot: TrackedEntity) -> usize {
        let senders: Vec<mpsc::Sender<TrackedEntity>> = {
            let mut state = self.lock_state();
            match state.entities.iter_mut().find(|e| e.id == snapshot.id) {
                Some(current) => *current = snapshot.clone(),
                None => state.entities.push(snapshot.clone()),
            }

            let Some(subscribers) = state.subscribers.get_mut(&snapshot.id) else {
                return 0;
            };
            subscribers.retain(|s| !s.closed.load(Ordering::SeqCst));
            subscribers.iter().map(|s| s.sender.clone()).collect()
        };

        let mut delivered = 0;
        for sender in senders {
            if sender.send(snapshot.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        debug!(entity_id = %snapshot.id, status = %snapshot.status, delivered, "Snapshot pushed");
        delivered
    }

    /// Push a snapshot that is not stored, e.g. a delayed duplicate.
    pub async fn replay(&self, snapshot: TrackedEntity) -> usize {
        let senders: Vec<mpsc::Sender<TrackedEntity>> = self
            .lock_state()
            .subscribers
            .get(&snapshot.id)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .filter(|s| !s.closed.load(Ordering::SeqCst))
                    .map(|s| s.sender.clone())
                    .collect()
            })
            .unwrap_or_default();

        let mut delivered = 0;
        for sender in senders {
            if sender.send(snapshot.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Close every feed of `entity_id` from the transport side, as a dropped
    /// connection would. Returns how many feeds were cut.
    pub fn drop_feeds(&self, entity_id: &EntityId) -> usize {
        let cut = self
            .lock_state()
            .subscribers
            .remove(entity_id)
            .map_or(0, |subscribers| subscribers.len());
        if cut > 0 {
            warn!(entity_id = %entity_id, cut, "Feeds dropped by transport");
        }
        cut
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Feeds of `entity_id` not torn down yet.
    pub fn open_feeds(&self, entity_id: &EntityId) -> usize {
        self.lock_state()
            .subscribers
            .get(entity_id)
            .map_or(0, |subscribers| {
                subscribers
                    .iter()
                    .filter(|s| !s.closed.load(Ordering::SeqCst))
                    .count()
            })
    }

    pub fn total_open_feeds(&self) -> usize {
        self.lock_state()
            .subscribers
            .values()
            .flatten()
            .filter(|s| !s.closed.load(Ordering::SeqCst))
            .count()
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    pub fn artifact_fetch_count(&self) -> usize {
        self.artifact_calls.load(Ordering::SeqCst)
    }

    pub fn account_fetch_count(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<(), BackendError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("in-memory backend offline".to_string()))
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EntityFeedPort for InMemoryBackend {
    async fn subscribe(&self, entity_id: &EntityId) -> Result<EntityFeed, FeedError> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.ensure_available() {
            warn!(entity_id = %entity_id, error = %err, "Subscribe refused");
            return Err(FeedError::OpenFailed {
                entity_id: entity_id.clone(),
                reason: err.to_string(),
            });
        }

        let (sender, receiver) = mpsc::channel(self.feed_buffer);
        let closed = Arc::new(AtomicBool::new(false));
        self.lock_state()
            .subscribers
            .entry(entity_id.clone())
            .or_default()
            .push(Subscriber {
                sender,
                closed: closed.clone(),
            });

        Ok(EntityFeed {
            snapshots: receiver,
            teardown: Box::new(ChannelTeardown {
                closed,
                teardowns: self.teardowns.clone(),
            }),
        })
    }
}

#[async_trait]
impl EntityQueryPort for InMemoryBackend {
    async fn fetch_entity(&self, entity_id: &EntityId) -> Result<TrackedEntity, BackendError> {
        self.ensure_available()?;
        self.lock_state()
            .entities
            .iter()
            .find(|e| &e.id == entity_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(entity_id.to_string()))
    }

    async fn list_entities(&self) -> Result<Vec<TrackedEntity>, BackendError> {
        self.ensure_available()?;
        Ok(self.lock_state().entities.iter().rev().cloned().collect())
    }

    async fn fetch_artifacts(&self, entity_id: &EntityId) -> Result<Vec<Artifact>, BackendError> {
        self.artifact_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        Ok(self
            .lock_state()
            .artifacts
            .get(entity_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl AggregateFetchPort<AccountProfile> for InMemoryBackend {
    async fn fetch(&self) -> Result<AccountProfile, BackendError> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;
        self.lock_state()
            .account
            .clone()
            .ok_or(BackendError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let backend = InMemoryBackend::new(4);
        let id = EntityId::from("p1");
        let feed = backend.subscribe(&id).await.expect("subscribe");

        feed.teardown.teardown();
        feed.teardown.teardown();

        assert_eq!(backend.teardown_count(), 1);
        assert_eq!(backend.open_feeds(&id), 0);
    }

    #[tokio::test]
    async fn push_skips_closed_feeds() {
        let backend = InMemoryBackend::new(4);
        let id = EntityId::from("p1");
        let closed = backend.subscribe(&id).await.expect("subscribe");
        let mut open = backend.subscribe(&id).await.expect("subscribe");
        closed.teardown.teardown();

        let delivered = backend
            .push(TrackedEntity::new("p1", EntityStatus::Processing, 2))
            .await;

        assert_eq!(delivered, 1);
        let snapshot = open.snapshots.recv().await.expect("snapshot");
        assert_eq!(snapshot.updated_at, 2);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let backend = InMemoryBackend::new(4);
        backend.insert_entity(TrackedEntity::new("old", EntityStatus::Completed, 5));
        backend.insert_entity(TrackedEntity::new("new", EntityStatus::Pending, 1));

        let ids: Vec<String> = backend
            .list_entities()
            .await
            .expect("list")
            .into_iter()
            .map(|e| e.id.into_inner())
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn unavailable_backend_fails_every_call() {
        let backend = InMemoryBackend::new(4);
        backend.set_available(false);

        assert!(backend.subscribe(&EntityId::from("p1")).await.is_err());
        assert!(backend.list_entities().await.is_err());
        assert_eq!(
            AggregateFetchPort::<AccountProfile>::fetch(&backend).await,
            Err(BackendError::Unavailable("in-memory backend offline".to_string()))
        );
    }

    #[tokio::test]
    async fn account_fetch_without_profile_is_unauthenticated() {
        let backend = InMemoryBackend::new(4);
        assert_eq!(
            AggregateFetchPort::<AccountProfile>::fetch(&backend).await,
            Err(BackendError::Unauthenticated)
        );
    }

    #[test]
    fn created_entities_get_unique_ids() {
        let backend = InMemoryBackend::new(4);
        let a = backend.create_entity("u1", None, 10);
        let b = backend.create_entity("u1", Some("upload-2"), 11);
        assert_ne!(a.id, b.id);
        assert_eq!(b.client_ref.as_deref(), Some("upload-2"));
        assert_eq!(a.status, EntityStatus::Pending);
    }
}
