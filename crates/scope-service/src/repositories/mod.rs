//! Repository layer for the scope service.
//!
//! The hierarchy, actor and contact stores are collaborators owned by other
//! parts of the system. This module defines the narrow contracts the scope
//! engine reads through, a PostgreSQL implementation of each, and an
//! in-memory implementation for tests.

pub mod memory;
pub mod postgres;

use crate::errors::ScopeError;
use crate::models::{Actor, HierarchyEdge, LeafOwnerScope, OwnerCount, StatsQuery};
use async_trait::async_trait;
use common::types::{ActorId, LeafId};
use std::sync::Arc;

pub use memory::InMemoryStore;
pub use postgres::{PgActorDirectory, PgHierarchyStore, PgLeafStore};

/// Persisted `subordinate -> manager` edges.
#[async_trait]
pub trait HierarchyStore: Send + Sync {
    async fn parent_of(&self, actor: ActorId) -> Result<Option<ActorId>, ScopeError>;

    async fn children_of(&self, actor: ActorId) -> Result<Vec<ActorId>, ScopeError>;

    /// Every edge, read in one statement.
    async fn edges(&self) -> Result<Vec<HierarchyEdge>, ScopeError>;

    /// Insert or replace the manager of `edge.subordinate_id`.
    ///
    /// Implementations serialize on the subordinate so that one subordinate
    /// never ends up with two managers.
    async fn set_manager(&self, edge: HierarchyEdge) -> Result<(), ScopeError>;

    /// Remove the manager edge of `subordinate`. Returns whether one existed.
    async fn clear_manager(&self, subordinate: ActorId) -> Result<bool, ScopeError>;
}

/// Actor records.
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    async fn get(&self, id: ActorId) -> Result<Option<Actor>, ScopeError>;

    async fn list(&self) -> Result<Vec<Actor>, ScopeError>;

    async fn set_placeholder(&self, id: ActorId, is_placeholder: bool) -> Result<(), ScopeError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: ActorId) -> Result<bool, ScopeError>;
}

/// Contact records.
#[async_trait]
pub trait LeafStore: Send + Sync {
    /// Contacts owned by an actor in `owners`, or created by `creator`.
    async fn visible_leaf_ids(
        &self,
        owners: &LeafOwnerScope,
        creator: ActorId,
    ) -> Result<Vec<LeafId>, ScopeError>;

    /// Per-bucket, per-owner counts for contacts whose owner is in `owners`.
    async fn count_by_owner(
        &self,
        owners: &LeafOwnerScope,
        query: &StatsQuery,
    ) -> Result<Vec<OwnerCount>, ScopeError>;

    /// True when any contact is owned or created by `actor`.
    async fn references_actor(&self, actor: ActorId) -> Result<bool, ScopeError>;
}

/// Handles to the three collaborators, shared across handlers.
#[derive(Clone)]
pub struct Stores {
    pub hierarchy: Arc<dyn HierarchyStore>,
    pub directory: Arc<dyn ActorDirectory>,
    pub leaves: Arc<dyn LeafStore>,
}

impl Stores {
    /// One in-memory store serving all three roles.
    pub fn in_memory(store: InMemoryStore) -> Self {
        Self {
            hierarchy: Arc::new(store.clone()),
            directory: Arc::new(store.clone()),
            leaves: Arc::new(store),
        }
    }
}
