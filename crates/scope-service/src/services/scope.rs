//! Contact visibility for a caller.
//!
//! Admins see everything. Everyone else sees contacts owned by themselves or
//! by anyone below them in the hierarchy, plus contacts they created. Unknown
//! callers see nothing.

use super::closure::{ClosureError, ClosureResolver, HierarchySnapshot};
use super::ScopeLimits;
use crate::errors::ScopeError;
use crate::models::{Leaf, LeafOwnerScope, Role};
use crate::repositories::Stores;
use common::types::{ActorId, LeafId};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Visibility rules evaluated against one hierarchy snapshot.
pub struct VisibilityScope<'a> {
    snapshot: &'a HierarchySnapshot,
    resolver: ClosureResolver<'a, HierarchySnapshot>,
}

impl<'a> VisibilityScope<'a> {
    pub fn new(snapshot: &'a HierarchySnapshot, max_depth: usize) -> Self {
        Self {
            snapshot,
            resolver: ClosureResolver::new(snapshot, max_depth),
        }
    }

    /// Owners whose contacts `actor` may read.
    ///
    /// Unknown actors get an empty scope regardless of `role`.
    pub fn visible_leaf_owners(
        &self,
        actor: ActorId,
        role: Role,
    ) -> Result<LeafOwnerScope, ClosureError> {
        if !self.snapshot.contains_actor(actor) {
            debug!(target: "scope.services.scope", actor = %actor, "Unknown actor, empty scope");
            return Ok(LeafOwnerScope::empty());
        }

        if role.has_unrestricted_visibility() {
            return Ok(LeafOwnerScope::Unrestricted);
        }

        let mut owners = self.resolver.descendants_of(actor)?;
        owners.insert(actor);
        Ok(LeafOwnerScope::Owners(owners))
    }

    /// Whether `actor` may read or write `leaf`.
    ///
    /// The creator keeps access after the contact is reassigned.
    pub fn can_access_leaf(
        &self,
        actor: ActorId,
        role: Role,
        leaf: &Leaf,
    ) -> Result<bool, ClosureError> {
        if !self.snapshot.contains_actor(actor) {
            return Ok(false);
        }
        if role.has_unrestricted_visibility() || leaf.creator_actor_id == actor {
            return Ok(true);
        }
        Ok(self
            .visible_leaf_owners(actor, role)?
            .contains(&leaf.owner_actor_id))
    }
}

/// Ids of every contact `actor` may read.
#[instrument(skip_all, fields(actor = %actor, role = ?role))]
pub async fn get_visible_leaf_ids(
    stores: &Stores,
    limits: &ScopeLimits,
    actor: ActorId,
    role: Role,
) -> Result<BTreeSet<LeafId>, ScopeError> {
    let snapshot =
        HierarchySnapshot::load(stores.hierarchy.as_ref(), stores.directory.as_ref()).await?;

    // Creator matches must not leak to an unknown caller either.
    if !snapshot.contains_actor(actor) {
        debug!(target: "scope.services.scope", "Unknown caller, no visible contacts");
        return Ok(BTreeSet::new());
    }

    let owners = VisibilityScope::new(&snapshot, limits.max_depth).visible_leaf_owners(actor, role)?;

    let ids = stores.leaves.visible_leaf_ids(&owners, actor).await?;
    debug!(target: "scope.services.scope", visible = ids.len(), "Resolved visible contacts");
    Ok(ids.into_iter().collect())
}
