//! Key-indexed entity table with stable identities
//!
//! The store holds exactly one entity per key. Ids are minted from a
//! process-wide monotonic counter, stay stable across upserts of the same
//! key, and are never reused after removal. Entries are kept sorted by key
//! so snapshots and removal diffs iterate deterministically.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{Entity, EntityCandidate, EntityStatus};

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

fn mint_id() -> String {
    format!("ent-{}", NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
}

/// Diff produced by [`EntityStore::upsert`]
#[derive(Debug, Clone, Default)]
pub struct UpsertDiff {
    pub added: Vec<Entity>,
    pub updated: Vec<Entity>,
}

/// Diff produced by [`EntityStore::reconcile`]
#[derive(Debug, Clone, Default)]
pub struct ReconcileDiff {
    pub added: Vec<Entity>,
    pub updated: Vec<Entity>,
    pub removed: Vec<Entity>,
}

/// Entity table keyed by deduplication key, with an id index
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: BTreeMap<String, Entity>,
    ids: HashMap<String, String>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update candidates by key
    ///
    /// Existing entries keep their id. An existing entry lands in `updated`
    /// only when one of span, confidence, status, or value actually changed,
    /// so re-reporting identical candidates stays silent.
    pub fn upsert(&mut self, candidates: &[EntityCandidate]) -> UpsertDiff {
        let mut diff = UpsertDiff::default();

        for candidate in candidates {
            match self.entities.get(&candidate.key) {
                None => {
                    let entity = Entity::from_candidate(mint_id(), candidate);
                    self.ids.insert(entity.id.clone(), entity.key.clone());
                    self.entities.insert(entity.key.clone(), entity.clone());
                    diff.added.push(entity);
                }
                Some(existing) => {
                    let changed = existing.span != candidate.span
                        || existing.confidence != candidate.confidence
                        || existing.status != candidate.status
                        || existing.value != candidate.value;

                    let entity = Entity::from_candidate(existing.id.clone(), candidate);
                    self.entities.insert(entity.key.clone(), entity.clone());
                    if changed {
                        diff.updated.push(entity);
                    }
                }
            }
        }

        diff
    }

    /// Remove the given keys, silently ignoring absent ones
    pub fn remove_by_keys(&mut self, keys: &[String]) -> Vec<Entity> {
        let mut removed = Vec::new();
        for key in keys {
            if let Some(entity) = self.entities.remove(key) {
                self.ids.remove(&entity.id);
                removed.push(entity);
            }
        }
        removed
    }

    /// Make the store agree with the candidate set
    ///
    /// Every current key absent from `candidates` is removed, then the
    /// candidates are upserted. Removal order follows key order.
    pub fn reconcile(&mut self, candidates: &[EntityCandidate]) -> ReconcileDiff {
        let keep: HashSet<&str> = candidates.iter().map(|c| c.key.as_str()).collect();
        let stale: Vec<String> = self
            .entities
            .keys()
            .filter(|key| !keep.contains(key.as_str()))
            .cloned()
            .collect();

        let removed = self.remove_by_keys(&stale);
        let UpsertDiff { added, updated } = self.upsert(candidates);

        ReconcileDiff {
            added,
            updated,
            removed,
        }
    }

    /// Promote every provisional entity to confirmed
    ///
    /// Returns the promoted entities with their new status.
    pub fn confirm_all(&mut self) -> Vec<Entity> {
        let mut promoted = Vec::new();
        for entity in self.entities.values_mut() {
            if entity.status == EntityStatus::Provisional {
                entity.status = EntityStatus::Confirmed;
                promoted.push(entity.clone());
            }
        }
        promoted
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.ids.get(id).and_then(|key| self.entities.get(key))
    }

    pub fn get_by_key(&self, key: &str) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// Snapshot of all entities in key order
    pub fn get_all(&self) -> Vec<Entity> {
        self.entities.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.ids.clear();
    }
}
