//! Paper processing store
//! 论文处理状态仓库
//!
//! Holds the list of tracked papers and keeps it in sync with the backend:
//!
//! ```text
//! UI action ──→ create_placeholder ──→ apply_authoritative ──→ watch real id
//!                                                                 │
//!                     push snapshot ──→ JobStatusStateMachine ────┘
//!                                             │
//!                          replace entity + [refetch, unwatch, navigate]
//! ```
//!
//! The collection is published as a whole through a `watch` channel; readers
//! never observe a half-applied update.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use pf_core::job_status::DiscardReason;
use pf_core::placeholder::StalledPlaceholder;
use pf_core::ports::{ClockPort, EntityFeedPort, EntityQueryPort, NavigationPort};
use pf_core::{
    Artifact, EntityId, JobEffect, JobStatusStateMachine, JobTransition, PlaceholderReconciler,
    PlaceholderSeed, SlotCorrelation, SlotKey, SyncConfig, TrackedEntity,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::registry::{SnapshotDelivery, SnapshotHandler, SubscriptionRegistry, WatchOutcome};

/// Read-only view of the store's collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityListView {
    /// Newest first. Terminal entities stay for display.
    pub entities: Vec<TrackedEntity>,
    pub artifacts: HashMap<EntityId, Vec<Artifact>>,
}

impl EntityListView {
    pub fn get(&self, entity_id: &EntityId) -> Option<&TrackedEntity> {
        self.entities.iter().find(|e| &e.id == entity_id)
    }

    /// Entities still expected to change.
    pub fn active(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.iter().filter(|e| !e.is_terminal())
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entities.iter().filter(|e| e.is_placeholder)
    }

    fn upsert(&mut self, entity: TrackedEntity) {
        match self.entities.iter_mut().find(|e| e.id == entity.id) {
            Some(slot) => *slot = entity,
            None => self.entities.insert(0, entity),
        }
    }

    fn remove(&mut self, entity_id: &EntityId) -> Option<usize> {
        let index = self.entities.iter().position(|e| &e.id == entity_id)?;
        self.entities.remove(index);
        Some(index)
    }

    /// Swap a placeholder for its authoritative entity at the same position.
    fn replace_placeholder(&mut self, placeholder_id: &EntityId, entity: TrackedEntity) {
        match self.remove(placeholder_id) {
            Some(index) => self.entities.insert(index, entity),
            None => self.upsert(entity),
        }
    }
}

/// Result of applying an authoritative list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListSyncReport {
    /// `(slot, real id)` for every placeholder replaced
    pub reconciled: Vec<(SlotKey, EntityId)>,
    /// Entities seen for the first time
    pub inserted: usize,
    /// Tracked entities that moved forward
    pub updated: usize,
}

struct PaperState {
    view: EntityListView,
    machine: JobStatusStateMachine,
    reconciler: PlaceholderReconciler,
    redirect_on_completion: bool,
    warned_stalled: HashSet<SlotKey>,
    /// Bumped by `reset`. Work that awaited across a reset must not write back.
    epoch: u64,
}

/// Dependencies of [`PaperProcessingStore`].
pub struct PaperProcessingDeps {
    pub feed: Arc<dyn EntityFeedPort>,
    pub query: Arc<dyn EntityQueryPort>,
    pub navigation: Arc<dyn NavigationPort>,
    pub clock: Arc<dyn ClockPort>,
}

pub struct PaperProcessingStore {
    registry: SubscriptionRegistry,
    query: Arc<dyn EntityQueryPort>,
    navigation: Arc<dyn NavigationPort>,
    clock: Arc<dyn ClockPort>,
    config: SyncConfig,
    state: Mutex<PaperState>,
    publisher: watch::Sender<Arc<EntityListView>>,
}

impl PaperProcessingStore {
    pub fn new(deps: PaperProcessingDeps, config: SyncConfig) -> Arc<Self> {
        let PaperProcessingDeps {
            feed,
            query,
            navigation,
            clock,
        } = deps;
        let (publisher, _) = watch::channel(Arc::new(EntityListView::default()));

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let handler: Weak<dyn SnapshotHandler> = weak.clone();
            Self {
                registry: SubscriptionRegistry::new(feed, handler),
                query,
                navigation,
                clock,
                state: Mutex::new(PaperState {
                    view: EntityListView::default(),
                    machine: JobStatusStateMachine::new(),
                    reconciler: PlaceholderReconciler::new(),
                    redirect_on_completion: config.redirect_on_completion,
                    warned_stalled: HashSet::new(),
                    epoch: 0,
                }),
                config,
                publisher,
            }
        })
    }

    // ------------------------------------------------------------------
    // Watching
    // ------------------------------------------------------------------

    /// Start receiving pushes for `entity_id`. Idempotent.
    pub async fn watch_entity(&self, entity_id: &EntityId) -> WatchOutcome {
        if entity_id.is_placeholder() {
            warn!(entity_id = %entity_id, "Placeholder ids cannot be watched");
            return WatchOutcome::Rejected;
        }
        if self.lock_state().machine.has_terminated(entity_id) {
            debug!(entity_id = %entity_id, "Entity already terminal, not watching");
            return WatchOutcome::Rejected;
        }
        self.registry.watch(entity_id).await
    }

    pub fn unwatch_entity(&self, entity_id: &EntityId) -> bool {
        self.registry.unwatch(entity_id)
    }

    /// Close every subscription (view unmount).
    pub fn unwatch_all(&self) -> usize {
        self.registry.unwatch_all()
    }

    pub fn is_watching(&self, entity_id: &EntityId) -> bool {
        self.registry.is_watching(entity_id)
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn set_redirect_on_completion(&self, enabled: bool) {
        self.lock_state().redirect_on_completion = enabled;
        debug!(enabled, "Redirect on completion updated");
    }

    pub fn redirect_on_completion(&self) -> bool {
        self.lock_state().redirect_on_completion
    }

    // ------------------------------------------------------------------
    // Placeholders
    // ------------------------------------------------------------------

    /// Show a placeholder for `slot` immediately. Returns its `temp_<n>` id.
    pub fn create_placeholder(
        &self,
        slot: SlotKey,
        seed: PlaceholderSeed,
        correlation: SlotCorrelation,
    ) -> EntityId {
        let now_ms = self.clock.now_ms();
        let mut state = self.lock_state();

        let created = state
            .reconciler
            .create_placeholder(slot.clone(), seed, correlation, now_ms);
        if let Some(replaced) = &created.replaced {
            state.view.remove(replaced);
        }
        state.warned_stalled.remove(&slot);

        let placeholder_id = created.entity.id.clone();
        state.view.entities.insert(0, created.entity);
        self.publish(&state);

        info!(slot = %slot, placeholder_id = %placeholder_id, "Placeholder created");
        placeholder_id
    }

    /// Remove the placeholder of an upload that failed before the backend
    /// created anything.
    pub fn discard_placeholder(&self, slot: &SlotKey) -> bool {
        let mut state = self.lock_state();
        let Some(placeholder_id) = state.reconciler.discard(slot) else {
            return false;
        };
        state.view.remove(&placeholder_id);
        state.warned_stalled.remove(slot);
        self.publish(&state);

        info!(slot = %slot, placeholder_id = %placeholder_id, "Placeholder discarded");
        true
    }

    /// Placeholders waiting longer than the grace window. They stay on
    /// screen; callers surface a soft warning.
    pub fn stalled_placeholders(&self) -> Vec<StalledPlaceholder> {
        let now_ms = self.clock.now_ms();
        let grace_ms = i64::try_from(self.config.placeholder_grace_ms).unwrap_or(i64::MAX);
        let mut state = self.lock_state();

        let stalled = state.reconciler.stalled(now_ms, grace_ms);
        for placeholder in &stalled {
            if state.warned_stalled.insert(placeholder.slot.clone()) {
                warn!(
                    slot = %placeholder.slot,
                    placeholder_id = %placeholder.placeholder_id,
                    waiting_ms = placeholder.waiting_ms,
                    "Placeholder still waiting for the backend"
                );
            }
        }
        stalled
    }

    // ------------------------------------------------------------------
    // Authoritative list
    // ------------------------------------------------------------------

    /// Fetch the entity list and apply it. Failures are logged and leave the
    /// store unchanged.
    pub async fn sync_entity_list(&self) -> Option<ListSyncReport> {
        let span = info_span!("store.paper.sync_entity_list");

        async {
            match self.query.list_entities().await {
                Ok(list) => Some(self.apply_authoritative(list).await),
                Err(err) => {
                    warn!(error = %err, "Failed to fetch entity list");
                    None
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Reconcile pending placeholders against `list` and merge it into the
    /// collection.
    ///
    /// - a placeholder is swapped for its correlated entity in one update
    /// - tracked entities only move forward (staleness rule)
    /// - unseen entities are added; non-terminal ones are watched
    /// - tracked non-terminal entities whose feed was lost are watched again
    pub async fn apply_authoritative(&self, list: Vec<TrackedEntity>) -> ListSyncReport {
        let mut report = ListSyncReport::default();
        let mut effects = Vec::new();
        let mut to_watch = Vec::new();

        let epoch = {
            let mut state = self.lock_state();
            let state = &mut *state;
            let redirect = state.redirect_on_completion;

            let tracked: HashSet<EntityId> = state
                .view
                .entities
                .iter()
                .filter(|e| !e.is_placeholder)
                .map(|e| e.id.clone())
                .collect();

            for reconciliation in state.reconciler.reconcile_all(&list, &tracked) {
                let entity = match state.machine.apply(reconciliation.entity.clone(), redirect) {
                    JobTransition::Applied {
                        entity,
                        effects: transition_effects,
                    } => {
                        effects.extend(transition_effects);
                        entity
                    }
                    JobTransition::Discarded { .. } => reconciliation.entity.normalized(),
                };
                if !entity.is_terminal() {
                    to_watch.push(entity.id.clone());
                }
                state.warned_stalled.remove(&reconciliation.slot);

                info!(
                    slot = %reconciliation.slot,
                    placeholder_id = %reconciliation.placeholder_id,
                    entity_id = %entity.id,
                    "Placeholder reconciled"
                );
                report
                    .reconciled
                    .push((reconciliation.slot, entity.id.clone()));
                state
                    .view
                    .replace_placeholder(&reconciliation.placeholder_id, entity);
            }

            let reconciled: HashSet<&EntityId> = report.reconciled.iter().map(|(_, id)| id).collect();
            for candidate in list {
                if candidate.is_placeholder || reconciled.contains(&candidate.id) {
                    continue;
                }
                if tracked.contains(&candidate.id) {
                    let entity_id = candidate.id.clone();
                    if let JobTransition::Applied {
                        entity,
                        effects: transition_effects,
                    } = state.machine.apply(candidate, redirect)
                    {
                        effects.extend(transition_effects);
                        state.view.upsert(entity);
                        report.updated += 1;
                    }
                    if !state.machine.has_terminated(&entity_id)
                        && !self.registry.is_watching(&entity_id)
                    {
                        to_watch.push(entity_id);
                    }
                } else {
                    let entity = candidate.normalized();
                    state.machine.seed(&entity);
                    if !entity.is_terminal() {
                        to_watch.push(entity.id.clone());
                    }
                    state.view.entities.push(entity);
                    report.inserted += 1;
                }
            }

            self.publish(state);
            state.epoch
        };

        self.run_effects(effects, epoch).await;
        for entity_id in to_watch {
            self.watch_in_epoch(&entity_id, epoch).await;
        }
        report
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn view(&self) -> Arc<EntityListView> {
        self.publisher.borrow().clone()
    }

    pub fn entities(&self) -> Vec<TrackedEntity> {
        self.view().entities.clone()
    }

    pub fn active_entities(&self) -> Vec<TrackedEntity> {
        self.view().active().cloned().collect()
    }

    pub fn entity(&self, entity_id: &EntityId) -> Option<TrackedEntity> {
        self.view().get(entity_id).cloned()
    }

    pub fn artifacts(&self, entity_id: &EntityId) -> Option<Vec<Artifact>> {
        self.view().artifacts.get(entity_id).cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<EntityListView>> {
        self.publisher.subscribe()
    }

    /// Sign-out: close every subscription and forget all state.
    ///
    /// Syncs still awaiting the backend finish without touching the new state.
    pub fn reset(&self) {
        {
            let mut state = self.lock_state();
            state.epoch = state.epoch.wrapping_add(1);
            state.view = EntityListView::default();
            state.machine.clear();
            state.reconciler.clear();
            state.warned_stalled.clear();
            state.redirect_on_completion = self.config.redirect_on_completion;
            self.publish(&state);
        }
        self.registry.unwatch_all();
        info!("Paper processing store reset");
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    /// Watch on behalf of work started in `epoch`; no-op once the store reset.
    async fn watch_in_epoch(&self, entity_id: &EntityId, epoch: u64) -> WatchOutcome {
        if !self.in_epoch(epoch) {
            debug!(entity_id = %entity_id, "Store reset, skipping watch");
            return WatchOutcome::Rejected;
        }
        let outcome = self.watch_entity(entity_id).await;
        if matches!(outcome, WatchOutcome::Opened(_)) && !self.in_epoch(epoch) {
            self.registry.unwatch(entity_id);
            debug!(entity_id = %entity_id, "Store reset while opening, subscription closed");
            return WatchOutcome::Cancelled;
        }
        outcome
    }

    async fn run_effects(&self, effects: Vec<JobEffect>, epoch: u64) {
        for effect in effects {
            match effect {
                JobEffect::RefetchDependents { entity_id } => {
                    self.refetch_artifacts(&entity_id, epoch).await;
                }
                JobEffect::Unwatch { entity_id } => {
                    self.registry.unwatch(&entity_id);
                }
                JobEffect::Navigate { entity_id } => {
                    if !self.in_epoch(epoch) {
                        debug!(entity_id = %entity_id, "Store reset, skipping navigation");
                        continue;
                    }
                    let route = self.config.detail_route(&entity_id);
                    match self.navigation.navigate(&route).await {
                        Ok(()) => info!(entity_id = %entity_id, route = %route, "Navigated to detail view"),
                        Err(err) => warn!(entity_id = %entity_id, error = %err, "Navigation failed"),
                    }
                }
            }
        }
    }

    async fn refetch_artifacts(&self, entity_id: &EntityId, epoch: u64) {
        match self.query.fetch_artifacts(entity_id).await {
            Ok(artifacts) => {
                let mut state = self.lock_state();
                if state.epoch != epoch {
                    debug!(entity_id = %entity_id, "Store reset, dropping fetched artifacts");
                    return;
                }
                debug!(entity_id = %entity_id, count = artifacts.len(), "Artifacts fetched");
                state.view.artifacts.insert(entity_id.clone(), artifacts);
                self.publish(&state);
            }
            Err(err) => {
                warn!(entity_id = %entity_id, error = %err, "Failed to fetch artifacts");
            }
        }
    }

    fn in_epoch(&self, epoch: u64) -> bool {
        self.lock_state().epoch == epoch
    }

    fn publish(&self, state: &PaperState) {
        self.publisher.send_replace(Arc::new(state.view.clone()));
    }

    fn lock_state(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SnapshotHandler for PaperProcessingStore {
    async fn on_snapshot(&self, delivery: SnapshotDelivery) {
        let span = info_span!(
            "store.paper.on_snapshot",
            entity_id = %delivery.entity_id,
            updated_at = delivery.snapshot.updated_at,
        );

        async {
            let SnapshotDelivery {
                entity_id,
                token,
                snapshot,
            } = delivery;

            if snapshot.id != entity_id {
                warn!(snapshot_id = %snapshot.id, "Snapshot id does not match subscription");
                return;
            }

            let (effects, epoch) = {
                let mut state = self.lock_state();
                if !self.registry.is_live(&entity_id, token) {
                    debug!(%token, "Dropping snapshot from a closed subscription");
                    return;
                }

                let redirect = state.redirect_on_completion;
                let effects = match state.machine.apply(snapshot, redirect) {
                    JobTransition::Applied { entity, effects } => {
                        debug!(status = %entity.status, progress = ?entity.progress, "Snapshot applied");
                        state.view.upsert(entity);
                        self.publish(&state);
                        effects
                    }
                    JobTransition::Discarded {
                        reason: DiscardReason::AlreadyTerminal,
                        ..
                    } => vec![JobEffect::Unwatch {
                        entity_id: entity_id.clone(),
                    }],
                    JobTransition::Discarded { .. } => return,
                };
                (effects, state.epoch)
            };

            self.run_effects(effects, epoch).await;
        }
        .instrument(span)
        .await
    }
}
