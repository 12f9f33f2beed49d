//! Hierarchy maintenance.
//!
//! Writes go through here so that no edge is persisted that would close a
//! cycle or point an actor at itself. The read paths still guard against
//! cycles, since edges can be written by other systems.

use super::closure::{ClosureResolver, HierarchySnapshot};
use super::ScopeLimits;
use crate::errors::ScopeError;
use crate::models::HierarchyEdge;
use crate::observability::metrics::record_hierarchy_mutation;
use crate::repositories::Stores;
use common::types::ActorId;
use tracing::{info, instrument, warn};

/// Make `manager` the manager of `subordinate`, replacing any previous edge.
///
/// # Errors
///
/// - `SelfReferenceRejected` when both ids are equal
/// - `UnknownActor` when either actor is missing from the directory
/// - `WouldCreateCycle` when `subordinate` already manages `manager`,
///   directly or transitively
/// - `WouldExceedDepth` when the moved subtree would reach below the
///   traversal depth ceiling
#[instrument(skip_all, fields(subordinate = %subordinate, manager = %manager))]
pub async fn assign_manager(
    stores: &Stores,
    limits: &ScopeLimits,
    subordinate: ActorId,
    manager: ActorId,
) -> Result<(), ScopeError> {
    let result = try_assign_manager(stores, limits, subordinate, manager).await;
    record_hierarchy_mutation("assign_manager", outcome(&result));
    result
}

async fn try_assign_manager(
    stores: &Stores,
    limits: &ScopeLimits,
    subordinate: ActorId,
    manager: ActorId,
) -> Result<(), ScopeError> {
    let edge = HierarchyEdge::new(subordinate, manager)?;

    for id in [subordinate, manager] {
        if stores.directory.get(id).await?.is_none() {
            return Err(ScopeError::UnknownActor(id));
        }
    }

    let snapshot =
        HierarchySnapshot::load(stores.hierarchy.as_ref(), stores.directory.as_ref()).await?;
    let resolver = ClosureResolver::new(&snapshot, limits.max_depth);
    if resolver.is_ancestor(subordinate, manager)? {
        warn!(
            target: "scope.services.hierarchy",
            "Rejected manager assignment that would close a cycle"
        );
        return Err(ScopeError::WouldCreateCycle {
            subordinate,
            manager,
        });
    }

    // Ancestor count of the deepest node in the moved subtree.
    let depth = resolver.ancestor_chain_of(manager)?.len()
        + 1
        + resolver.subtree_height(subordinate)?;
    if depth > limits.max_depth {
        warn!(
            target: "scope.services.hierarchy",
            depth,
            max_depth = limits.max_depth,
            "Rejected manager assignment that would exceed the depth ceiling"
        );
        return Err(ScopeError::WouldExceedDepth {
            subordinate,
            manager,
            limit: limits.max_depth,
        });
    }

    stores.hierarchy.set_manager(edge).await?;
    info!(target: "scope.services.hierarchy", "Manager assigned");
    Ok(())
}

/// Detach `subordinate` from its manager. Returns whether an edge existed.
#[instrument(skip_all, fields(subordinate = %subordinate))]
pub async fn remove_manager(stores: &Stores, subordinate: ActorId) -> Result<bool, ScopeError> {
    let result = async {
        if stores.directory.get(subordinate).await?.is_none() {
            return Err(ScopeError::UnknownActor(subordinate));
        }
        stores.hierarchy.clear_manager(subordinate).await
    }
    .await;

    record_hierarchy_mutation("remove_manager", outcome(&result));
    if let Ok(true) = result {
        info!(target: "scope.services.hierarchy", "Manager removed");
    }
    result
}

/// Delete an actor that nothing references any more.
///
/// Actors that still manage someone, or that own or created a contact, are
/// refused with `ActorInUse`. The actor's own manager edge is removed with it.
#[instrument(skip_all, fields(actor = %actor))]
pub async fn delete_actor(stores: &Stores, actor: ActorId) -> Result<(), ScopeError> {
    let result = try_delete_actor(stores, actor).await;
    record_hierarchy_mutation("delete_actor", outcome(&result));
    result
}

async fn try_delete_actor(stores: &Stores, actor: ActorId) -> Result<(), ScopeError> {
    if stores.directory.get(actor).await?.is_none() {
        return Err(ScopeError::UnknownActor(actor));
    }

    if !stores.hierarchy.children_of(actor).await?.is_empty()
        || stores.leaves.references_actor(actor).await?
    {
        return Err(ScopeError::ActorInUse(actor));
    }

    stores.hierarchy.clear_manager(actor).await?;
    stores.directory.delete(actor).await?;
    info!(target: "scope.services.hierarchy", "Actor deleted");
    Ok(())
}

fn outcome<T>(result: &Result<T, ScopeError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(ScopeError::Database(_) | ScopeError::Internal) => "error",
        Err(_) => "rejected",
    }
}
