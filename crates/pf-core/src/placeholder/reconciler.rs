use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::entity::{EntityStatus, TrackedEntity};
use crate::ids::{EntityId, SlotKey};

/// Fields the UI knows before the backend has created anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderSeed {
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub owner_id: Option<String>,
}

/// How an authoritative entity is recognised as the one a slot is waiting for.
///
/// 如何判断权威实体属于某个槽位（由调用方提供）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SlotCorrelation {
    /// The backend echoes the upload's client reference.
    ClientRef(String),
    /// The create call already returned the real id.
    EntityId(EntityId),
    /// Most recent entity of `owner_id` created at or after placeholder insertion.
    OwnerCreatedAfter { owner_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPlaceholder {
    pub entity: TrackedEntity,
    /// Previous placeholder of the same slot, to be removed in the same update.
    pub replaced: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub slot: SlotKey,
    pub placeholder_id: EntityId,
    pub entity: TrackedEntity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledPlaceholder {
    pub slot: SlotKey,
    pub placeholder_id: EntityId,
    pub waiting_ms: i64,
}

#[derive(Debug, Clone)]
struct PendingSlot {
    seq: u64,
    placeholder_id: EntityId,
    correlation: SlotCorrelation,
    inserted_at_ms: i64,
}

impl PendingSlot {
    fn accepts(&self, entity: &TrackedEntity) -> bool {
        match &self.correlation {
            SlotCorrelation::ClientRef(client_ref) => {
                entity.client_ref.as_deref() == Some(client_ref.as_str())
            }
            SlotCorrelation::EntityId(id) => &entity.id == id,
            SlotCorrelation::OwnerCreatedAfter { owner_id } => {
                entity.owner_id.as_deref() == Some(owner_id.as_str())
                    && entity.created_at_ms >= self.inserted_at_ms
            }
        }
    }
}

/// Arena of pending placeholders keyed by slot.
///
/// Invariant: at most one placeholder per slot. A slot is released as soon as
/// an authoritative entity is matched to it.
#[derive(Debug, Default)]
pub struct PlaceholderReconciler {
    slots: HashMap<SlotKey, PendingSlot>,
    next_seq: u64,
}

impl PlaceholderReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesize a placeholder for `slot`.
    ///
    /// Ids are `temp_1`, `temp_2`, ... in creation order.
    pub fn create_placeholder(
        &mut self,
        slot: SlotKey,
        seed: PlaceholderSeed,
        correlation: SlotCorrelation,
        now_ms: i64,
    ) -> CreatedPlaceholder {
        self.next_seq += 1;
        let placeholder_id = EntityId::placeholder(self.next_seq);

        let entity = TrackedEntity {
            id: placeholder_id.clone(),
            status: EntityStatus::Pending,
            progress: None,
            updated_at: 0,
            is_placeholder: true,
            title: seed.title,
            file_name: seed.file_name,
            owner_id: seed.owner_id,
            client_ref: match &correlation {
                SlotCorrelation::ClientRef(client_ref) => Some(client_ref.clone()),
                _ => None,
            },
            error_message: None,
            created_at_ms: now_ms,
        };

        let replaced = self
            .slots
            .insert(
                slot,
                PendingSlot {
                    seq: self.next_seq,
                    placeholder_id,
                    correlation,
                    inserted_at_ms: now_ms,
                },
            )
            .map(|previous| previous.placeholder_id);

        CreatedPlaceholder { entity, replaced }
    }

    /// Try to resolve one slot against the authoritative list.
    ///
    /// Entities in `claimed` are never matched (already tracked, or taken by
    /// another slot).
    pub fn reconcile(
        &mut self,
        slot: &SlotKey,
        authoritative: &[TrackedEntity],
        claimed: &HashSet<EntityId>,
    ) -> Option<Reconciliation> {
        let pending = self.slots.get(slot)?;
        let entity = Self::pick(pending, authoritative, claimed)?.clone();
        let pending = self.slots.remove(slot)?;

        Some(Reconciliation {
            slot: slot.clone(),
            placeholder_id: pending.placeholder_id,
            entity,
        })
    }

    /// Resolve every slot that has a match, newest slot first.
    ///
    /// With `OwnerCreatedAfter` the newest slot takes the newest entity, so two
    /// uploads issued in quick succession never swap entities.
    pub fn reconcile_all(
        &mut self,
        authoritative: &[TrackedEntity],
        claimed: &HashSet<EntityId>,
    ) -> Vec<Reconciliation> {
        let mut order: Vec<(u64, SlotKey)> = self
            .slots
            .iter()
            .map(|(slot, pending)| (pending.seq, slot.clone()))
            .collect();
        order.sort_by(|a, b| b.0.cmp(&a.0));

        let mut claimed = claimed.clone();
        let mut resolved = Vec::new();
        for (_, slot) in order {
            if let Some(reconciliation) = self.reconcile(&slot, authoritative, &claimed) {
                claimed.insert(reconciliation.entity.id.clone());
                resolved.push(reconciliation);
            }
        }
        resolved
    }

    /// Drop the placeholder of a slot whose creation failed.
    pub fn discard(&mut self, slot: &SlotKey) -> Option<EntityId> {
        self.slots.remove(slot).map(|pending| pending.placeholder_id)
    }

    /// Placeholders still waiting after `grace_ms`.
    pub fn stalled(&self, now_ms: i64, grace_ms: i64) -> Vec<StalledPlaceholder> {
        let mut stalled: Vec<_> = self
            .slots
            .iter()
            .filter_map(|(slot, pending)| {
                let waiting_ms = now_ms.saturating_sub(pending.inserted_at_ms);
                (waiting_ms >= grace_ms).then(|| StalledPlaceholder {
                    slot: slot.clone(),
                    placeholder_id: pending.placeholder_id.clone(),
                    waiting_ms,
                })
            })
            .collect();
        stalled.sort_by(|a, b| b.waiting_ms.cmp(&a.waiting_ms));
        stalled
    }

    pub fn placeholder_for(&self, slot: &SlotKey) -> Option<&EntityId> {
        self.slots.get(slot).map(|pending| &pending.placeholder_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    fn pick<'a>(
        pending: &PendingSlot,
        authoritative: &'a [TrackedEntity],
        claimed: &HashSet<EntityId>,
    ) -> Option<&'a TrackedEntity> {
        let mut candidates = authoritative
            .iter()
            .filter(|e| !e.is_placeholder && !claimed.contains(&e.id))
            .filter(|e| pending.accepts(e));

        match pending.correlation {
            SlotCorrelation::OwnerCreatedAfter { .. } => {
                candidates.max_by_key(|e| (e.created_at_ms, e.updated_at))
            }
            _ => candidates.next(),
        }
    }
}
