//! Data models for the scope service.
//!
//! Records read from the actor directory, hierarchy store and contact store,
//! plus the derived, never-persisted views returned to callers.

use crate::errors::ScopeError;
use common::types::{ActorId, LeafId, OrganizationId, ProgramId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Actor role. Closed set; visibility decisions go through
/// [`Role::has_unrestricted_visibility`] rather than string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
}

impl Role {
    /// Admins see every contact and every statistics key.
    pub fn has_unrestricted_visibility(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
        }
    }

    /// Parse from database string representation.
    ///
    /// Unknown values map to `Manager`, the restricted role.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            _ => Role::Manager,
        }
    }
}

/// Actor account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorStatus {
    Active,
    Inactive,
}

impl ActorStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ActorStatus::Active => "active",
            ActorStatus::Inactive => "inactive",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s {
            "active" => ActorStatus::Active,
            _ => ActorStatus::Inactive,
        }
    }
}

/// Sales-hierarchy participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    pub status: ActorStatus,
    /// Synthetic/test account. Never shown as a statistics key.
    pub is_placeholder: bool,
}

/// Single-parent edge `subordinate -> manager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HierarchyEdge {
    pub subordinate_id: ActorId,
    pub manager_id: ActorId,
}

impl HierarchyEdge {
    /// Build an edge, rejecting `subordinate == manager`.
    pub fn new(subordinate_id: ActorId, manager_id: ActorId) -> Result<Self, ScopeError> {
        if subordinate_id == manager_id {
            return Err(ScopeError::SelfReferenceRejected(subordinate_id));
        }
        Ok(Self {
            subordinate_id,
            manager_id,
        })
    }
}

/// Contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    pub id: LeafId,
    /// Current assignee.
    pub owner_actor_id: ActorId,
    pub creator_actor_id: ActorId,
    pub organization_id: OrganizationId,
    pub program_id: ProgramId,
    pub cohort_year: i32,
}

impl Leaf {
    pub fn bucket(&self) -> BucketKey {
        BucketKey {
            organization_id: self.organization_id,
            program_id: self.program_id,
            cohort_year: self.cohort_year,
        }
    }
}

/// Classification bucket: organization x program x cohort year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub organization_id: OrganizationId,
    pub program_id: ProgramId,
    pub cohort_year: i32,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.organization_id, self.program_id, self.cohort_year
        )
    }
}

/// Raw per-owner count inside one bucket, as returned by the contact store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerCount {
    pub bucket: BucketKey,
    pub owner: ActorId,
    pub count: u64,
}

/// Set of contact owners an actor may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafOwnerScope {
    /// No restriction (admin).
    Unrestricted,
    /// Only contacts owned by these actors. Empty means nothing is visible.
    Owners(BTreeSet<ActorId>),
}

impl LeafOwnerScope {
    pub fn empty() -> Self {
        LeafOwnerScope::Owners(BTreeSet::new())
    }

    pub fn contains(&self, actor: &ActorId) -> bool {
        match self {
            LeafOwnerScope::Unrestricted => true,
            LeafOwnerScope::Owners(owners) => owners.contains(actor),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, LeafOwnerScope::Unrestricted)
    }
}

/// Dimension filters for statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatsQuery {
    pub organization: Option<OrganizationId>,
    pub program: Option<ProgramId>,
    pub cohort_from: Option<i32>,
    pub cohort_to: Option<i32>,
}

impl StatsQuery {
    /// True when the bucket passes every filter that is set.
    pub fn matches(&self, bucket: &BucketKey) -> bool {
        self.organization
            .map_or(true, |org| org == bucket.organization_id)
            && self.program.map_or(true, |p| p == bucket.program_id)
            && self.cohort_from.map_or(true, |y| bucket.cohort_year >= y)
            && self.cohort_to.map_or(true, |y| bucket.cohort_year <= y)
    }

    /// Full cohort range, when both bounds are present.
    pub fn cohort_range(&self) -> Option<std::ops::RangeInclusive<i32>> {
        match (self.cohort_from, self.cohort_to) {
            (Some(from), Some(to)) => Some(from..=to),
            _ => None,
        }
    }
}

/// Totals shown for one display key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorStat {
    /// Contacts attributed directly to this key.
    pub own_total: u64,
    /// Own total plus every attributed descendant inside the caller's scope.
    pub aggregate_total: u64,
    pub display_name: String,
}

/// One classification bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BucketStats {
    /// Number of visible contacts in the bucket.
    pub total: u64,
    pub actors: BTreeMap<ActorId, ActorStat>,
}

/// Statistics nested organization -> program -> cohort year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    pub organizations: BTreeMap<OrganizationId, BTreeMap<ProgramId, BTreeMap<i32, BucketStats>>>,
}

impl StatsReport {
    pub fn bucket(&self, key: &BucketKey) -> Option<&BucketStats> {
        self.organizations
            .get(&key.organization_id)?
            .get(&key.program_id)?
            .get(&key.cohort_year)
    }

    pub fn insert(&mut self, key: BucketKey, stats: BucketStats) {
        self.organizations
            .entry(key.organization_id)
            .or_default()
            .entry(key.program_id)
            .or_default()
            .insert(key.cohort_year, stats);
    }

    pub fn buckets(&self) -> impl Iterator<Item = (BucketKey, &BucketStats)> {
        self.organizations.iter().flat_map(|(org, programs)| {
            programs.iter().flat_map(move |(program, cohorts)| {
                cohorts.iter().map(move |(year, stats)| {
                    (
                        BucketKey {
                            organization_id: *org,
                            program_id: *program,
                            cohort_year: *year,
                        },
                        stats,
                    )
                })
            })
        })
    }
}

/// Response body for the visible-contacts endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibleLeavesResponse {
    pub count: usize,
    pub leaf_ids: Vec<LeafId>,
}

/// Response body for the placeholder backfill endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillResponse {
    pub dry_run: bool,
    pub flagged: Vec<ActorId>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_visibility() {
        assert!(Role::Admin.has_unrestricted_visibility());
        assert!(!Role::Manager.has_unrestricted_visibility());
    }

    #[test]
    fn test_role_from_db_str_fails_closed() {
        assert_eq!(Role::from_db_str("admin"), Role::Admin);
        assert_eq!(Role::from_db_str("manager"), Role::Manager);
        assert_eq!(Role::from_db_str("ADMIN"), Role::Manager);
        assert_eq!(Role::from_db_str(""), Role::Manager);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [ActorStatus::Active, ActorStatus::Inactive] {
            assert_eq!(ActorStatus::from_db_str(status.as_db_str()), status);
        }
    }

    #[test]
    fn test_edge_rejects_self_reference() {
        let a = ActorId::new();
        assert!(matches!(
            HierarchyEdge::new(a, a),
            Err(ScopeError::SelfReferenceRejected(id)) if id == a
        ));
        assert!(HierarchyEdge::new(a, ActorId::new()).is_ok());
    }

    #[test]
    fn test_stats_query_matches() {
        let bucket = BucketKey {
            organization_id: OrganizationId::new(),
            program_id: ProgramId::new(),
            cohort_year: 2024,
        };

        assert!(StatsQuery::default().matches(&bucket));
        assert!(StatsQuery {
            organization: Some(bucket.organization_id),
            cohort_from: Some(2020),
            cohort_to: Some(2024),
            ..Default::default()
        }
        .matches(&bucket));
        assert!(!StatsQuery {
            cohort_from: Some(2025),
            ..Default::default()
        }
        .matches(&bucket));
        assert!(!StatsQuery {
            program: Some(ProgramId::new()),
            ..Default::default()
        }
        .matches(&bucket));
    }

    #[test]
    fn test_scope_contains() {
        let a = ActorId::new();
        assert!(LeafOwnerScope::Unrestricted.contains(&a));
        assert!(!LeafOwnerScope::empty().contains(&a));
        assert!(LeafOwnerScope::Owners(BTreeSet::from([a])).contains(&a));
    }

    #[test]
    fn test_report_insert_and_lookup() {
        let key = BucketKey {
            organization_id: OrganizationId::new(),
            program_id: ProgramId::new(),
            cohort_year: 2023,
        };
        let mut report = StatsReport::default();
        report.insert(
            key,
            BucketStats {
                total: 3,
                actors: BTreeMap::new(),
            },
        );

        assert_eq!(report.bucket(&key).map(|b| b.total), Some(3));
        assert_eq!(report.buckets().count(), 1);
    }
}
