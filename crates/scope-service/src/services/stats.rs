//! Contact statistics rolled up through the management chain.
//!
//! Each classification bucket goes through three phases, each testable on
//! its own:
//!
//! 1. **Resolve**: every owner maps to an attribution point. Non-placeholder
//!    owners are their own point; placeholder owners map to the nearest
//!    non-placeholder ancestor inside the caller's scope, or to themselves
//!    when the chain holds none.
//! 2. **Aggregate**: counts move to their attribution point (each contact is
//!    counted at exactly one key), then every count is added to the aggregate
//!    of each display-eligible ancestor up to the top of the scope.
//! 3. **Filter**: admins see every key, including display-eligible actors
//!    with no contacts in the bucket (reported as zeros). Other callers see
//!    their own key and keys whose manager lies outside their scope.
//!
//! A traversal failure aborts the request with
//! [`ScopeError::HierarchyInconsistent`]; no partial totals are returned.

use super::closure::{ClosureError, ClosureResolver, HierarchyGraph, HierarchySnapshot};
use super::scope::VisibilityScope;
use super::ScopeLimits;
use crate::errors::ScopeError;
use crate::models::{
    ActorStat, BucketKey, BucketStats, LeafOwnerScope, OwnerCount, Role, StatsQuery, StatsReport,
};
use crate::observability::metrics::record_stats_computation;
use crate::repositories::Stores;
use common::types::ActorId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, error, instrument};

/// Per-bucket totals before display filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rollup {
    /// Counts as stored, keyed by owner.
    pub raw: BTreeMap<ActorId, u64>,
    /// Counts keyed by attribution point.
    pub attributed: BTreeMap<ActorId, u64>,
    /// Attributed count plus every attributed descendant within scope.
    pub aggregate: BTreeMap<ActorId, u64>,
}

impl Rollup {
    pub fn raw_total(&self) -> u64 {
        self.raw.values().sum()
    }

    pub fn attributed_total(&self) -> u64 {
        self.attributed.values().sum()
    }
}

/// Request-scoped attribution lookups, memoized per actor.
pub struct AttributionIndex<'a> {
    snapshot: &'a HierarchySnapshot,
    resolver: &'a ClosureResolver<'a, HierarchySnapshot>,
    scope: &'a LeafOwnerScope,
    resolved: HashMap<ActorId, ActorId>,
}

impl<'a> AttributionIndex<'a> {
    pub fn new(
        snapshot: &'a HierarchySnapshot,
        resolver: &'a ClosureResolver<'a, HierarchySnapshot>,
        scope: &'a LeafOwnerScope,
    ) -> Self {
        Self {
            snapshot,
            resolver,
            scope,
            resolved: HashMap::new(),
        }
    }

    /// Display key that contacts owned by `actor` are counted under.
    pub fn attribution_of(&mut self, actor: ActorId) -> Result<ActorId, ClosureError> {
        if let Some(target) = self.resolved.get(&actor) {
            return Ok(*target);
        }

        let target = if self.snapshot.is_placeholder(actor) {
            let chain = self.resolver.ancestor_chain_of(actor)?;
            chain
                .into_iter()
                .take_while(|a| self.scope.contains(a))
                .find(|a| !self.snapshot.is_placeholder(*a))
                .unwrap_or(actor)
        } else {
            actor
        };

        self.resolved.insert(actor, target);
        Ok(target)
    }

    /// Placeholders are eligible only when they are their own attribution point.
    pub fn is_display_eligible(&mut self, actor: ActorId) -> Result<bool, ClosureError> {
        if !self.snapshot.is_placeholder(actor) {
            return Ok(true);
        }
        Ok(self.attribution_of(actor)? == actor)
    }
}

/// Statistics over one hierarchy snapshot.
pub struct StatsAggregator<'a> {
    snapshot: &'a HierarchySnapshot,
    resolver: ClosureResolver<'a, HierarchySnapshot>,
}

impl<'a> StatsAggregator<'a> {
    pub fn new(snapshot: &'a HierarchySnapshot, max_depth: usize) -> Self {
        Self {
            snapshot,
            resolver: ClosureResolver::new(snapshot, max_depth),
        }
    }

    /// Re-attribute and aggregate one bucket's raw owner counts.
    pub fn rollup(
        &self,
        index: &mut AttributionIndex<'_>,
        scope: &LeafOwnerScope,
        raw: &BTreeMap<ActorId, u64>,
    ) -> Result<Rollup, ClosureError> {
        let mut attributed: BTreeMap<ActorId, u64> = BTreeMap::new();
        for (&owner, &count) in raw {
            let target = index.attribution_of(owner)?;
            if target != owner {
                debug!(
                    target: "scope.services.stats",
                    owner = %owner,
                    target = %target,
                    count,
                    "Re-attributing placeholder contacts"
                );
            }
            *attributed.entry(target).or_insert(0) += count;
        }

        let mut aggregate: BTreeMap<ActorId, u64> = BTreeMap::new();
        for (&actor, &count) in &attributed {
            *aggregate.entry(actor).or_insert(0) += count;
            for ancestor in self.resolver.ancestor_chain_of(actor)? {
                if !scope.contains(&ancestor) {
                    break;
                }
                if index.is_display_eligible(ancestor)? {
                    *aggregate.entry(ancestor).or_insert(0) += count;
                }
            }
        }

        if scope.is_unrestricted() {
            for actor in self.snapshot.actor_ids() {
                if index.is_display_eligible(actor)? {
                    aggregate.entry(actor).or_insert(0);
                }
            }
        }

        Ok(Rollup {
            raw: raw.clone(),
            attributed,
            aggregate,
        })
    }

    /// Keys the caller is shown, with their totals.
    pub fn display(
        &self,
        caller: ActorId,
        role: Role,
        scope: &LeafOwnerScope,
        rollup: &Rollup,
    ) -> BucketStats {
        let actors = rollup
            .aggregate
            .iter()
            .filter(|(key, _)| {
                role.has_unrestricted_visibility()
                    || **key == caller
                    || !self.has_manager_in_scope(**key, scope)
            })
            .map(|(&key, &aggregate_total)| {
                let stat = ActorStat {
                    own_total: rollup.attributed.get(&key).copied().unwrap_or(0),
                    aggregate_total,
                    display_name: self
                        .snapshot
                        .actor(key)
                        .map(|a| a.display_name.clone())
                        .unwrap_or_default(),
                };
                (key, stat)
            })
            .collect();

        BucketStats {
            total: rollup.raw_total(),
            actors,
        }
    }

    /// Full report for the caller.
    ///
    /// `counts` must already be restricted to `scope`; owners outside it are
    /// dropped again here.
    pub fn aggregate(
        &self,
        caller: ActorId,
        role: Role,
        scope: &LeafOwnerScope,
        counts: &[OwnerCount],
        query: &StatsQuery,
    ) -> Result<StatsReport, ScopeError> {
        let mut buckets: BTreeMap<BucketKey, BTreeMap<ActorId, u64>> = BTreeMap::new();
        for row in counts {
            if !scope.contains(&row.owner) || !query.matches(&row.bucket) {
                continue;
            }
            *buckets
                .entry(row.bucket)
                .or_default()
                .entry(row.owner)
                .or_insert(0) += row.count;
        }

        if let Some(range) = query.cohort_range() {
            let mut pairs: BTreeSet<_> = buckets
                .keys()
                .map(|b| (b.organization_id, b.program_id))
                .collect();
            if let (Some(org), Some(program)) = (query.organization, query.program) {
                pairs.insert((org, program));
            }
            for (organization_id, program_id) in pairs {
                for cohort_year in range.clone() {
                    buckets
                        .entry(BucketKey {
                            organization_id,
                            program_id,
                            cohort_year,
                        })
                        .or_default();
                }
            }
        }

        let mut index = AttributionIndex::new(self.snapshot, &self.resolver, scope);
        let mut report = StatsReport::default();

        for (bucket, raw) in buckets {
            let rollup = self.rollup(&mut index, scope, &raw).map_err(|e| {
                error!(
                    target: "scope.services.stats",
                    bucket = %bucket,
                    error = %e,
                    "Aborting statistics: hierarchy inconsistent"
                );
                ScopeError::HierarchyInconsistent {
                    bucket: bucket.to_string(),
                    reason: e.to_string(),
                }
            })?;
            report.insert(bucket, self.display(caller, role, scope, &rollup));
        }

        Ok(report)
    }

    fn has_manager_in_scope(&self, actor: ActorId, scope: &LeafOwnerScope) -> bool {
        self.snapshot
            .parent_of(actor)
            .is_some_and(|manager| scope.contains(&manager))
    }
}

/// Reject cohort ranges that are inverted or wider than allowed.
pub fn validate_query(query: &StatsQuery, limits: &ScopeLimits) -> Result<(), ScopeError> {
    if let (Some(from), Some(to)) = (query.cohort_from, query.cohort_to) {
        if from > to {
            return Err(ScopeError::BadRequest(format!(
                "cohort_from {} is after cohort_to {}",
                from, to
            )));
        }
        let span = i64::from(to) - i64::from(from) + 1;
        if span > i64::from(limits.max_cohort_span) {
            return Err(ScopeError::BadRequest(format!(
                "cohort range spans {} years, maximum is {}",
                span, limits.max_cohort_span
            )));
        }
    }
    Ok(())
}

/// Rolled-up statistics visible to `caller`.
#[instrument(skip_all, fields(caller = %caller, role = ?role))]
pub async fn get_aggregated_stats(
    stores: &Stores,
    limits: &ScopeLimits,
    caller: ActorId,
    role: Role,
    query: &StatsQuery,
) -> Result<StatsReport, ScopeError> {
    validate_query(query, limits)?;
    let start = Instant::now();

    let result = compute_stats(stores, limits, caller, role, query).await;

    let status = match &result {
        Ok(_) => "success",
        Err(e) if e.is_integrity_violation() => "inconsistent",
        Err(_) => "error",
    };
    record_stats_computation(status, start.elapsed());
    result
}

async fn compute_stats(
    stores: &Stores,
    limits: &ScopeLimits,
    caller: ActorId,
    role: Role,
    query: &StatsQuery,
) -> Result<StatsReport, ScopeError> {
    let snapshot =
        HierarchySnapshot::load(stores.hierarchy.as_ref(), stores.directory.as_ref()).await?;

    if !snapshot.contains_actor(caller) {
        debug!(target: "scope.services.stats", "Unknown caller, empty statistics");
        return Ok(StatsReport::default());
    }

    let scope = VisibilityScope::new(&snapshot, limits.max_depth).visible_leaf_owners(caller, role)?;
    let counts = stores.leaves.count_by_owner(&scope, query).await?;

    StatsAggregator::new(&snapshot, limits.max_depth).aggregate(caller, role, &scope, &counts, query)
}
