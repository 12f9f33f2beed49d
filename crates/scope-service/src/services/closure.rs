//! Descendant and ancestor closures over the actor forest.
//!
//! Traversals are iterative with an explicit visited set and a depth
//! ceiling. Revisiting a node means the edge set contains a cycle; the walk
//! stops at once and reports [`ClosureError::CycleDetected`] together with the
//! nodes gathered so far.

use crate::errors::ScopeError;
use crate::models::{Actor, HierarchyEdge};
use crate::observability::metrics::{record_closure_size, record_hierarchy_violation};
use crate::repositories::{ActorDirectory, HierarchyStore};
use common::types::ActorId;
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;
use tracing::{error, instrument};

/// Read access to single-parent hierarchy edges.
pub trait HierarchyGraph {
    fn parent_of(&self, actor: ActorId) -> Option<ActorId>;
    fn children_of(&self, actor: ActorId) -> &[ActorId];
}

/// Traversal failure. Both variants carry the partial result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClosureError {
    #[error("cycle detected: actor {actor} reached twice")]
    CycleDetected {
        actor: ActorId,
        partial: Vec<ActorId>,
    },

    #[error("traversal exceeded depth limit {limit}")]
    DepthExceeded {
        limit: usize,
        partial: Vec<ActorId>,
    },
}

impl ClosureError {
    pub fn partial(&self) -> &[ActorId] {
        match self {
            ClosureError::CycleDetected { partial, .. }
            | ClosureError::DepthExceeded { partial, .. } => partial,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ClosureError::CycleDetected { .. } => "cycle",
            ClosureError::DepthExceeded { .. } => "depth",
        }
    }
}

/// Request-scoped, read-only copy of the hierarchy and the actor records.
///
/// Loaded once per request and passed by reference to the visibility and
/// statistics phases; nothing survives the request.
#[derive(Debug, Clone, Default)]
pub struct HierarchySnapshot {
    parents: HashMap<ActorId, ActorId>,
    children: HashMap<ActorId, Vec<ActorId>>,
    actors: HashMap<ActorId, Actor>,
}

impl HierarchySnapshot {
    pub fn new(
        edges: impl IntoIterator<Item = HierarchyEdge>,
        actors: impl IntoIterator<Item = Actor>,
    ) -> Self {
        let mut parents = HashMap::new();
        for edge in edges {
            parents.insert(edge.subordinate_id, edge.manager_id);
        }

        let mut children: HashMap<ActorId, Vec<ActorId>> = HashMap::new();
        for (child, parent) in &parents {
            children.entry(*parent).or_default().push(*child);
        }
        for list in children.values_mut() {
            list.sort();
        }

        let actors = actors.into_iter().map(|a| (a.id, a)).collect();

        Self {
            parents,
            children,
            actors,
        }
    }

    /// Read edges and actors from the collaborators.
    #[instrument(skip_all)]
    pub async fn load(
        hierarchy: &dyn HierarchyStore,
        directory: &dyn ActorDirectory,
    ) -> Result<Self, ScopeError> {
        let edges = hierarchy.edges().await?;
        let actors = directory.list().await?;
        Ok(Self::new(edges, actors))
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn contains_actor(&self, id: ActorId) -> bool {
        self.actors.contains_key(&id)
    }

    pub fn actor_ids(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.actors.keys().copied()
    }

    /// Unknown actors are not placeholders.
    pub fn is_placeholder(&self, id: ActorId) -> bool {
        self.actors.get(&id).is_some_and(|a| a.is_placeholder)
    }
}

impl HierarchyGraph for HierarchySnapshot {
    fn parent_of(&self, actor: ActorId) -> Option<ActorId> {
        self.parents.get(&actor).copied()
    }

    fn children_of(&self, actor: ActorId) -> &[ActorId] {
        self.children.get(&actor).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Computes closures over a [`HierarchyGraph`].
pub struct ClosureResolver<'a, G: HierarchyGraph + ?Sized> {
    graph: &'a G,
    max_depth: usize,
}

impl<'a, G: HierarchyGraph + ?Sized> ClosureResolver<'a, G> {
    pub fn new(graph: &'a G, max_depth: usize) -> Self {
        Self { graph, max_depth }
    }

    /// Every actor reachable through child edges from `root`, excluding `root`.
    pub fn descendants_of(&self, root: ActorId) -> Result<BTreeSet<ActorId>, ClosureError> {
        let (found, _) = self.walk_down(root)?;
        record_closure_size(found.len());
        Ok(found.into_iter().collect())
    }

    /// Number of edges on the longest downward path from `root`; 0 for a leaf.
    pub fn subtree_height(&self, root: ActorId) -> Result<usize, ClosureError> {
        Ok(self.walk_down(root)?.1)
    }

    /// Level-order walk below `root`. Returns the nodes found and the deepest
    /// level that held any.
    fn walk_down(&self, root: ActorId) -> Result<(Vec<ActorId>, usize), ClosureError> {
        let mut visited = HashSet::from([root]);
        let mut found = Vec::new();
        let mut frontier = vec![root];
        let mut depth = 0usize;
        let mut height = 0usize;

        while !frontier.is_empty() {
            depth += 1;
            let mut next = Vec::new();

            for node in frontier {
                for &child in self.graph.children_of(node) {
                    if !visited.insert(child) {
                        return Err(self.violation(ClosureError::CycleDetected {
                            actor: child,
                            partial: found,
                        }));
                    }
                    if depth > self.max_depth {
                        return Err(self.violation(ClosureError::DepthExceeded {
                            limit: self.max_depth,
                            partial: found,
                        }));
                    }
                    found.push(child);
                    next.push(child);
                    height = depth;
                }
            }

            frontier = next;
        }

        Ok((found, height))
    }

    /// Managers of `actor`, nearest first, up to the root of its tree.
    pub fn ancestor_chain_of(&self, actor: ActorId) -> Result<Vec<ActorId>, ClosureError> {
        let mut visited = HashSet::from([actor]);
        let mut chain = Vec::new();
        let mut current = actor;

        while let Some(parent) = self.graph.parent_of(current) {
            if !visited.insert(parent) {
                return Err(self.violation(ClosureError::CycleDetected {
                    actor: parent,
                    partial: chain,
                }));
            }
            if chain.len() >= self.max_depth {
                return Err(self.violation(ClosureError::DepthExceeded {
                    limit: self.max_depth,
                    partial: chain,
                }));
            }
            chain.push(parent);
            current = parent;
        }

        Ok(chain)
    }

    /// True when `ancestor` appears on `actor`'s manager chain.
    pub fn is_ancestor(&self, ancestor: ActorId, actor: ActorId) -> Result<bool, ClosureError> {
        Ok(self.ancestor_chain_of(actor)?.contains(&ancestor))
    }

    fn violation(&self, err: ClosureError) -> ClosureError {
        error!(
            target: "scope.services.closure",
            kind = err.kind(),
            partial_len = err.partial().len(),
            max_depth = self.max_depth,
            "Hierarchy traversal aborted"
        );
        record_hierarchy_violation(err.kind());
        err
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::models::{ActorStatus, Role};

    fn actor(name: &str) -> Actor {
        Actor {
            id: ActorId::new(),
            display_name: name.to_string(),
            email: format!("{name}@example.com"),
            role: Role::Manager,
            status: ActorStatus::Active,
            is_placeholder: false,
        }
    }

    fn edge(sub: &Actor, mgr: &Actor) -> HierarchyEdge {
        HierarchyEdge {
            subordinate_id: sub.id,
            manager_id: mgr.id,
        }
    }

    /// boss -> (rep1 -> trainee), rep2
    fn small_tree() -> (HierarchySnapshot, [Actor; 4]) {
        let boss = actor("boss");
        let rep1 = actor("rep1");
        let rep2 = actor("rep2");
        let trainee = actor("trainee");
        let snapshot = HierarchySnapshot::new(
            [edge(&rep1, &boss), edge(&rep2, &boss), edge(&trainee, &rep1)],
            [boss.clone(), rep1.clone(), rep2.clone(), trainee.clone()],
        );
        (snapshot, [boss, rep1, rep2, trainee])
    }

    #[test]
    fn test_descendants_of_tree_root() {
        let (snapshot, [boss, rep1, rep2, trainee]) = small_tree();
        let resolver = ClosureResolver::new(&snapshot, 8);

        let descendants = resolver.descendants_of(boss.id).unwrap();
        assert_eq!(
            descendants,
            BTreeSet::from([rep1.id, rep2.id, trainee.id])
        );
        assert!(!descendants.contains(&boss.id));
    }

    #[test]
    fn test_descendants_of_leaf_is_empty() {
        let (snapshot, [_, _, rep2, _]) = small_tree();
        let resolver = ClosureResolver::new(&snapshot, 8);
        assert!(resolver.descendants_of(rep2.id).unwrap().is_empty());
    }

    #[test]
    fn test_descendants_of_unknown_actor_is_empty() {
        let (snapshot, _) = small_tree();
        let resolver = ClosureResolver::new(&snapshot, 8);
        assert!(resolver.descendants_of(ActorId::new()).unwrap().is_empty());
    }

    #[test]
    fn test_descendants_never_contain_root_and_are_bounded() {
        let (snapshot, actors) = small_tree();
        let resolver = ClosureResolver::new(&snapshot, 8);
        for a in &actors {
            let d = resolver.descendants_of(a.id).unwrap();
            assert!(!d.contains(&a.id));
            assert!(d.len() <= actors.len());
        }
    }

    #[test]
    fn test_ancestor_chain_is_ordered_nearest_first() {
        let (snapshot, [boss, rep1, _, trainee]) = small_tree();
        let resolver = ClosureResolver::new(&snapshot, 8);

        assert_eq!(
            resolver.ancestor_chain_of(trainee.id).unwrap(),
            vec![rep1.id, boss.id]
        );
        assert!(resolver.ancestor_chain_of(boss.id).unwrap().is_empty());
        assert!(resolver.is_ancestor(boss.id, trainee.id).unwrap());
        assert!(!resolver.is_ancestor(trainee.id, boss.id).unwrap());
    }

    #[test]
    fn test_two_node_cycle_detected_in_descendants() {
        let a = actor("a");
        let b = actor("b");
        let snapshot =
            HierarchySnapshot::new([edge(&a, &b), edge(&b, &a)], [a.clone(), b.clone()]);
        let resolver = ClosureResolver::new(&snapshot, 64);

        let err = resolver.descendants_of(a.id).unwrap_err();
        assert!(matches!(&err, ClosureError::CycleDetected { actor, .. } if *actor == a.id));
        assert_eq!(err.partial(), &[b.id]);
    }

    #[test]
    fn test_two_node_cycle_detected_in_ancestors() {
        let a = actor("a");
        let b = actor("b");
        let snapshot =
            HierarchySnapshot::new([edge(&a, &b), edge(&b, &a)], [a.clone(), b.clone()]);
        let resolver = ClosureResolver::new(&snapshot, 64);

        let err = resolver.ancestor_chain_of(a.id).unwrap_err();
        assert!(matches!(err, ClosureError::CycleDetected { actor, .. } if actor == a.id));
    }

    #[test]
    fn test_self_loop_detected() {
        let a = actor("a");
        let snapshot = HierarchySnapshot::new(
            [HierarchyEdge {
                subordinate_id: a.id,
                manager_id: a.id,
            }],
            [a.clone()],
        );
        let resolver = ClosureResolver::new(&snapshot, 64);

        assert!(matches!(
            resolver.descendants_of(a.id),
            Err(ClosureError::CycleDetected { .. })
        ));
        assert!(matches!(
            resolver.ancestor_chain_of(a.id),
            Err(ClosureError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_cycle_below_root_detected() {
        // root <- x <- y <- z, plus x -> z closes a loop x, y, z
        let root = actor("root");
        let x = actor("x");
        let y = actor("y");
        let z = actor("z");
        let snapshot = HierarchySnapshot::new(
            [edge(&y, &x), edge(&z, &y), edge(&x, &z)],
            [root.clone(), x.clone(), y.clone(), z.clone()],
        );
        let resolver = ClosureResolver::new(&snapshot, 64);

        assert!(matches!(
            resolver.descendants_of(x.id),
            Err(ClosureError::CycleDetected { .. })
        ));
        assert!(resolver.descendants_of(root.id).unwrap().is_empty());
    }

    fn chain(len: usize) -> (HierarchySnapshot, Vec<Actor>) {
        let actors: Vec<Actor> = (0..len).map(|i| actor(&format!("level{i}"))).collect();
        let edges: Vec<HierarchyEdge> = actors
            .windows(2)
            .map(|w| edge(&w[1], &w[0]))
            .collect();
        (HierarchySnapshot::new(edges, actors.clone()), actors)
    }

    #[test]
    fn test_depth_limit_on_descendants() {
        let (snapshot, actors) = chain(6);
        let top = actors[0].id;

        assert_eq!(
            ClosureResolver::new(&snapshot, 5)
                .descendants_of(top)
                .unwrap()
                .len(),
            5
        );

        let err = ClosureResolver::new(&snapshot, 4)
            .descendants_of(top)
            .unwrap_err();
        assert!(matches!(&err, ClosureError::DepthExceeded { limit: 4, .. }));
        assert_eq!(err.partial().len(), 4);
    }

    #[test]
    fn test_subtree_height() {
        let (snapshot, [boss, rep1, rep2, trainee]) = small_tree();
        let resolver = ClosureResolver::new(&snapshot, 8);

        assert_eq!(resolver.subtree_height(boss.id).unwrap(), 2);
        assert_eq!(resolver.subtree_height(rep1.id).unwrap(), 1);
        assert_eq!(resolver.subtree_height(rep2.id).unwrap(), 0);
        assert_eq!(resolver.subtree_height(trainee.id).unwrap(), 0);
    }

    #[test]
    fn test_depth_limit_on_ancestors() {
        let (snapshot, actors) = chain(6);
        let bottom = actors[5].id;

        assert_eq!(
            ClosureResolver::new(&snapshot, 5)
                .ancestor_chain_of(bottom)
                .unwrap()
                .len(),
            5
        );
        assert!(matches!(
            ClosureResolver::new(&snapshot, 3).ancestor_chain_of(bottom),
            Err(ClosureError::DepthExceeded { limit: 3, .. })
        ));
    }

    #[test]
    fn test_snapshot_placeholder_lookup() {
        let mut p = actor("placeholder");
        p.is_placeholder = true;
        let snapshot = HierarchySnapshot::new([], [p.clone()]);
        assert!(snapshot.is_placeholder(p.id));
        assert!(!snapshot.is_placeholder(ActorId::new()));
        assert!(snapshot.contains_actor(p.id));
    }
}
