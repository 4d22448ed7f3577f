//! Subscription registry
//! 订阅注册表
//!
//! Single source of truth for live push subscriptions. At most one
//! subscription exists per entity id; every snapshot it receives is forwarded
//! to the registered [`SnapshotHandler`] tagged with a [`SubscriptionToken`],
//! so handlers can reject deliveries that belong to a torn-down subscription.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use pf_core::ports::{EntityFeed, EntityFeedPort, FeedError, FeedTeardown};
use pf_core::{EntityId, TrackedEntity};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Identifies one opened subscription. Never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

impl std::fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One pushed snapshot, as routed to the handler.
#[derive(Debug, Clone)]
pub struct SnapshotDelivery {
    pub entity_id: EntityId,
    pub token: SubscriptionToken,
    pub snapshot: TrackedEntity,
}

/// Receives every snapshot delivered by the registry.
///
/// Implementations must check [`SubscriptionRegistry::is_live`] before
/// applying a delivery: a snapshot can still arrive after teardown.
#[async_trait]
pub trait SnapshotHandler: Send + Sync {
    async fn on_snapshot(&self, delivery: SnapshotDelivery);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A new subscription was opened.
    Opened(SubscriptionToken),
    /// A subscription for the id is already live or opening.
    AlreadyWatching,
    /// `unwatch` ran while the subscription was opening; it was torn down.
    Cancelled,
    /// The backend refused or failed to open the subscription.
    Failed,
    /// Not opened by the caller: placeholder id, or the entity already finished.
    Rejected,
}

struct LiveSubscription {
    token: SubscriptionToken,
    teardown: Box<dyn FeedTeardown>,
    stop: Option<oneshot::Sender<()>>,
}

impl LiveSubscription {
    fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            // The forwarder may already be gone when the feed closed on its own.
            let _ = stop.send(());
        }
        self.teardown.teardown();
    }
}

enum Slot {
    Opening { token: SubscriptionToken },
    Live(LiveSubscription),
}

impl Slot {
    fn token(&self) -> SubscriptionToken {
        match self {
            Slot::Opening { token } => *token,
            Slot::Live(live) => live.token,
        }
    }
}

type SlotMap = HashMap<EntityId, Slot>;

fn lock(slots: &Mutex<SlotMap>) -> MutexGuard<'_, SlotMap> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases an `Opening` reservation when `watch` is dropped mid-subscribe.
///
/// 当 `watch` 在等待订阅期间被取消时，释放占位。
struct OpeningGuard<'a> {
    slots: &'a Mutex<SlotMap>,
    entity_id: &'a EntityId,
    token: SubscriptionToken,
    armed: bool,
}

impl OpeningGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = lock(self.slots);
        if let Some(Slot::Opening { token }) = slots.get(self.entity_id) {
            if *token == self.token {
                slots.remove(self.entity_id);
                debug!(entity_id = %self.entity_id, token = %self.token, "Opening reservation released");
            }
        }
    }
}

/// Dedups and tracks one live subscription per entity id.
///
/// ## Behavior / 行为
/// - `watch()` is idempotent while a subscription is live or opening.
/// - `unwatch()` / `unwatch_all()` are safe to call at any time.
/// - A feed closed by the transport frees its slot, so the id can be watched again.
/// - Dropping the registry tears down every subscription.
///
/// - `watch()` 在订阅存活或正在建立时是幂等的。
/// - 注册表被释放时会关闭所有订阅。
pub struct SubscriptionRegistry {
    feed: Arc<dyn EntityFeedPort>,
    handler: Weak<dyn SnapshotHandler>,
    slots: Arc<Mutex<SlotMap>>,
    next_token: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new(feed: Arc<dyn EntityFeedPort>, handler: Weak<dyn SnapshotHandler>) -> Self {
        Self {
            feed,
            handler,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(1),
        }
    }

    /// Open a subscription for `entity_id` unless one exists.
    ///
    /// Cancel-safe: dropping the returned future releases the reservation.
    pub async fn watch(&self, entity_id: &EntityId) -> WatchOutcome {
        let token = {
            let mut slots = self.lock_slots();
            if slots.contains_key(entity_id) {
                debug!(entity_id = %entity_id, "Subscription already present, skipping watch");
                return WatchOutcome::AlreadyWatching;
            }
            let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
            slots.insert(entity_id.clone(), Slot::Opening { token });
            token
        };
        let mut reservation = OpeningGuard {
            slots: &self.slots,
            entity_id,
            token,
            armed: true,
        };

        let feed = match self.feed.subscribe(entity_id).await {
            Ok(feed) => feed,
            Err(err) => {
                warn!(entity_id = %entity_id, error = %err, "Failed to open subscription");
                return WatchOutcome::Failed;
            }
        };

        let EntityFeed {
            snapshots,
            teardown,
        } = feed;

        let mut slots = self.lock_slots();
        let still_wanted = matches!(
            slots.get(entity_id),
            Some(Slot::Opening { token: current }) if *current == token
        );
        if !still_wanted {
            reservation.disarm();
            drop(slots);
            teardown.teardown();
            debug!(entity_id = %entity_id, %token, "Unwatched while opening, feed torn down");
            return WatchOutcome::Cancelled;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(forward_snapshots(
            entity_id.clone(),
            token,
            snapshots,
            stop_rx,
            self.handler.clone(),
            Arc::downgrade(&self.slots),
        ));
        slots.insert(
            entity_id.clone(),
            Slot::Live(LiveSubscription {
                token,
                teardown,
                stop: Some(stop_tx),
            }),
        );
        reservation.disarm();
        drop(slots);

        info!(entity_id = %entity_id, %token, "Subscription opened");
        WatchOutcome::Opened(token)
    }

    /// Tear down the subscription for `entity_id`. Returns whether one existed.
    pub fn unwatch(&self, entity_id: &EntityId) -> bool {
        let removed = self.lock_slots().remove(entity_id);
        match removed {
            Some(Slot::Live(live)) => {
                let token = live.token;
                live.shutdown();
                info!(entity_id = %entity_id, %token, "Subscription closed");
                true
            }
            Some(Slot::Opening { token }) => {
                debug!(entity_id = %entity_id, %token, "Subscription cancelled while opening");
                true
            }
            None => false,
        }
    }

    /// Tear down every subscription. Returns how many were removed.
    pub fn unwatch_all(&self) -> usize {
        let drained: Vec<(EntityId, Slot)> = self.lock_slots().drain().collect();
        let count = drained.len();
        for (_, slot) in drained {
            if let Slot::Live(live) = slot {
                live.shutdown();
            }
        }
        if count > 0 {
            info!(count, "All subscriptions closed");
        }
        count
    }

    /// Whether `token` is the current live subscription of `entity_id`.
    pub fn is_live(&self, entity_id: &EntityId, token: SubscriptionToken) -> bool {
        matches!(
            self.lock_slots().get(entity_id),
            Some(Slot::Live(live)) if live.token == token
        )
    }

    pub fn is_watching(&self, entity_id: &EntityId) -> bool {
        self.lock_slots().contains_key(entity_id)
    }

    /// Number of subscriptions (live or opening) held for `entity_id`: 0 or 1.
    pub fn live_count(&self, entity_id: &EntityId) -> usize {
        usize::from(self.is_watching(entity_id))
    }

    pub fn total_live(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn watched_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.lock_slots().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lock_slots(&self) -> MutexGuard<'_, SlotMap> {
        lock(&self.slots)
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.unwatch_all();
    }
}

/// Drop the live slot of a feed the transport closed, if it is still ours.
fn release_closed(slots: &Weak<Mutex<SlotMap>>, entity_id: &EntityId, token: SubscriptionToken) {
    let Some(slots) = slots.upgrade() else {
        return;
    };
    let released = {
        let mut slots = lock(&slots);
        match slots.get(entity_id) {
            Some(Slot::Live(live)) if live.token == token => slots.remove(entity_id),
            _ => None,
        }
    };
    if let Some(Slot::Live(live)) = released {
        live.shutdown();
        warn!(
            entity_id = %entity_id,
            %token,
            error = %FeedError::TransportClosed,
            "Subscription lost, slot released"
        );
    }
}

async fn forward_snapshots(
    entity_id: EntityId,
    token: SubscriptionToken,
    mut snapshots: mpsc::Receiver<TrackedEntity>,
    mut stop: oneshot::Receiver<()>,
    handler: Weak<dyn SnapshotHandler>,
    slots: Weak<Mutex<SlotMap>>,
) {
    loop {
        let snapshot = tokio::select! {
            biased;
            _ = &mut stop => break,
            next = snapshots.recv() => match next {
                Some(snapshot) => snapshot,
                None => {
                    release_closed(&slots, &entity_id, token);
                    break;
                }
            },
        };

        let Some(handler) = handler.upgrade() else {
            break;
        };
        handler
            .on_snapshot(SnapshotDelivery {
                entity_id: entity_id.clone(),
                token,
                snapshot,
            })
            .await;
    }
}
