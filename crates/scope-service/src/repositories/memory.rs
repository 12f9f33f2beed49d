//! In-memory implementation of all three collaborator stores.
//!
//! Used by unit and integration tests. A single `RwLock` guards the whole
//! state, so every read observes one consistent version.

use super::{ActorDirectory, HierarchyStore, LeafStore};
use crate::errors::ScopeError;
use crate::models::{
    Actor, BucketKey, HierarchyEdge, Leaf, LeafOwnerScope, OwnerCount, StatsQuery,
};
use async_trait::async_trait;
use common::types::{ActorId, LeafId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    actors: HashMap<ActorId, Actor>,
    /// Keyed by subordinate: at most one manager each.
    edges: BTreeMap<ActorId, ActorId>,
    leaves: BTreeMap<LeafId, Leaf>,
}

/// Shared in-memory store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from raw records.
    ///
    /// Edges are stored as given, without self-reference or cycle checks, so
    /// tests can reproduce corrupted hierarchies.
    pub fn from_parts(
        actors: impl IntoIterator<Item = Actor>,
        edges: impl IntoIterator<Item = HierarchyEdge>,
        leaves: impl IntoIterator<Item = Leaf>,
    ) -> Self {
        let inner = Inner {
            actors: actors.into_iter().map(|a| (a.id, a)).collect(),
            edges: edges
                .into_iter()
                .map(|e| (e.subordinate_id, e.manager_id))
                .collect(),
            leaves: leaves.into_iter().map(|l| (l.id, l)).collect(),
        };
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    pub async fn insert_actor(&self, actor: Actor) {
        self.inner.write().await.actors.insert(actor.id, actor);
    }

    pub async fn insert_leaf(&self, leaf: Leaf) {
        self.inner.write().await.leaves.insert(leaf.id, leaf);
    }
}

#[async_trait]
impl HierarchyStore for InMemoryStore {
    async fn parent_of(&self, actor: ActorId) -> Result<Option<ActorId>, ScopeError> {
        Ok(self.inner.read().await.edges.get(&actor).copied())
    }

    async fn children_of(&self, actor: ActorId) -> Result<Vec<ActorId>, ScopeError> {
        Ok(self
            .inner
            .read()
            .await
            .edges
            .iter()
            .filter(|(_, manager)| **manager == actor)
            .map(|(sub, _)| *sub)
            .collect())
    }

    async fn edges(&self) -> Result<Vec<HierarchyEdge>, ScopeError> {
        Ok(self
            .inner
            .read()
            .await
            .edges
            .iter()
            .map(|(sub, manager)| HierarchyEdge {
                subordinate_id: *sub,
                manager_id: *manager,
            })
            .collect())
    }

    async fn set_manager(&self, edge: HierarchyEdge) -> Result<(), ScopeError> {
        if edge.subordinate_id == edge.manager_id {
            return Err(ScopeError::SelfReferenceRejected(edge.subordinate_id));
        }
        self.inner
            .write()
            .await
            .edges
            .insert(edge.subordinate_id, edge.manager_id);
        Ok(())
    }

    async fn clear_manager(&self, subordinate: ActorId) -> Result<bool, ScopeError> {
        Ok(self
            .inner
            .write()
            .await
            .edges
            .remove(&subordinate)
            .is_some())
    }
}

#[async_trait]
impl ActorDirectory for InMemoryStore {
    async fn get(&self, id: ActorId) -> Result<Option<Actor>, ScopeError> {
        Ok(self.inner.read().await.actors.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Actor>, ScopeError> {
        Ok(self.inner.read().await.actors.values().cloned().collect())
    }

    async fn set_placeholder(&self, id: ActorId, is_placeholder: bool) -> Result<(), ScopeError> {
        match self.inner.write().await.actors.get_mut(&id) {
            Some(actor) => {
                actor.is_placeholder = is_placeholder;
                Ok(())
            }
            None => Err(ScopeError::UnknownActor(id)),
        }
    }

    async fn delete(&self, id: ActorId) -> Result<bool, ScopeError> {
        Ok(self.inner.write().await.actors.remove(&id).is_some())
    }
}

#[async_trait]
impl LeafStore for InMemoryStore {
    async fn visible_leaf_ids(
        &self,
        owners: &LeafOwnerScope,
        creator: ActorId,
    ) -> Result<Vec<LeafId>, ScopeError> {
        Ok(self
            .inner
            .read()
            .await
            .leaves
            .values()
            .filter(|l| owners.contains(&l.owner_actor_id) || l.creator_actor_id == creator)
            .map(|l| l.id)
            .collect())
    }

    async fn count_by_owner(
        &self,
        owners: &LeafOwnerScope,
        query: &StatsQuery,
    ) -> Result<Vec<OwnerCount>, ScopeError> {
        let inner = self.inner.read().await;
        let mut counts: BTreeMap<(BucketKey, ActorId), u64> = BTreeMap::new();
        for leaf in inner.leaves.values() {
            let bucket = leaf.bucket();
            if owners.contains(&leaf.owner_actor_id) && query.matches(&bucket) {
                *counts.entry((bucket, leaf.owner_actor_id)).or_insert(0) += 1;
            }
        }

        Ok(counts
            .into_iter()
            .map(|((bucket, owner), count)| OwnerCount {
                bucket,
                owner,
                count,
            })
            .collect())
    }

    async fn references_actor(&self, actor: ActorId) -> Result<bool, ScopeError> {
        Ok(self
            .inner
            .read()
            .await
            .leaves
            .values()
            .any(|l| l.owner_actor_id == actor || l.creator_actor_id == actor))
    }
}
