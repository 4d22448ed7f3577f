use std::collections::HashMap;

use tracing::debug;

use super::JobEffect;
use crate::entity::{EntityStatus, TrackedEntity};
use crate::ids::EntityId;

/// Why a snapshot was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// `updated_at` is not newer than the last value seen for the id.
    Stale { last_seen: u64 },
    /// The id already reached `Completed` or `Failed`.
    AlreadyTerminal,
}

/// Outcome of feeding one snapshot into the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTransition {
    Discarded {
        entity_id: EntityId,
        reason: DiscardReason,
    },
    Applied {
        /// Replacement value for the store's collection.
        entity: TrackedEntity,
        effects: Vec<JobEffect>,
    },
}

impl JobTransition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Observed {
    updated_at: u64,
    status: EntityStatus,
}

/// Per-entity lifecycle interpreter.
///
/// ```text
/// Pending ─→ MetadataExtracted ─→ Processing ─→ Completed : refetch, unwatch, [navigate]
///                                            └─→ Failed   : unwatch
/// ```
///
/// Staleness is decided on `updated_at` alone, so out-of-order pushes never
/// overwrite newer state. Terminal effects are emitted at most once per id.
///
/// 纯状态机：不包含副作用，只返回需要执行的副作用列表。
#[derive(Debug, Default)]
pub struct JobStatusStateMachine {
    observed: HashMap<EntityId, Observed>,
}

impl JobStatusStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entity the store already holds, without producing effects.
    ///
    /// Used when an authoritative entity enters the store through a list fetch
    /// so that the subscription's initial echo of the same version is treated
    /// as a duplicate.
    pub fn seed(&mut self, entity: &TrackedEntity) {
        let incoming = Observed {
            updated_at: entity.updated_at,
            status: entity.status,
        };
        self.observed
            .entry(entity.id.clone())
            .and_modify(|current| {
                if incoming.updated_at > current.updated_at {
                    *current = incoming;
                }
            })
            .or_insert(incoming);
    }

    pub fn forget(&mut self, entity_id: &EntityId) {
        self.observed.remove(entity_id);
    }

    pub fn clear(&mut self) {
        self.observed.clear();
    }

    pub fn last_seen(&self, entity_id: &EntityId) -> Option<u64> {
        self.observed.get(entity_id).map(|o| o.updated_at)
    }

    pub fn has_terminated(&self, entity_id: &EntityId) -> bool {
        self.observed
            .get(entity_id)
            .is_some_and(|o| o.status.is_terminal())
    }

    /// Feed one snapshot.
    ///
    /// `redirect_on_completion` is the session-level navigation flag at the
    /// time the snapshot is handled.
    pub fn apply(&mut self, snapshot: TrackedEntity, redirect_on_completion: bool) -> JobTransition {
        if let Some(previous) = self.observed.get(&snapshot.id) {
            let reason = if previous.status.is_terminal() {
                Some(DiscardReason::AlreadyTerminal)
            } else if snapshot.updated_at <= previous.updated_at {
                Some(DiscardReason::Stale {
                    last_seen: previous.updated_at,
                })
            } else {
                None
            };

            if let Some(reason) = reason {
                debug!(
                    entity_id = %snapshot.id,
                    updated_at = snapshot.updated_at,
                    ?reason,
                    "Discarding snapshot"
                );
                return JobTransition::Discarded {
                    entity_id: snapshot.id,
                    reason,
                };
            }
        }

        let entity = snapshot.normalized();
        self.observed.insert(
            entity.id.clone(),
            Observed {
                updated_at: entity.updated_at,
                status: entity.status,
            },
        );

        let effects = match entity.status {
            EntityStatus::Completed => {
                let mut effects = vec![
                    JobEffect::RefetchDependents {
                        entity_id: entity.id.clone(),
                    },
                    JobEffect::Unwatch {
                        entity_id: entity.id.clone(),
                    },
                ];
                if redirect_on_completion {
                    effects.push(JobEffect::Navigate {
                        entity_id: entity.id.clone(),
                    });
                }
                effects
            }
            EntityStatus::Failed => vec![JobEffect::Unwatch {
                entity_id: entity.id.clone(),
            }],
            EntityStatus::Pending | EntityStatus::MetadataExtracted | EntityStatus::Processing => {
                Vec::new()
            }
        };

        JobTransition::Applied { entity, effects }
    }
}
