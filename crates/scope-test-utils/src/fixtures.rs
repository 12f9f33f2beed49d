//! Org hierarchy fixtures.
//!
//! Actors are addressed by display name. Ids are random per fixture.

use common::types::{ActorId, LeafId, OrganizationId, ProgramId};
use scope_service::models::{Actor, ActorStatus, BucketKey, HierarchyEdge, Leaf, Role};
use scope_service::repositories::InMemoryStore;
use std::collections::BTreeMap;

/// Cohort year used when a contact is added without an explicit bucket.
pub const DEFAULT_COHORT: i32 = 2024;

/// Builder for an actor forest with contacts.
#[derive(Debug, Clone)]
pub struct OrgFixture {
    actors: BTreeMap<String, Actor>,
    edges: Vec<HierarchyEdge>,
    leaves: Vec<Leaf>,
    bucket: BucketKey,
}

impl Default for OrgFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl OrgFixture {
    pub fn new() -> Self {
        Self {
            actors: BTreeMap::new(),
            edges: Vec::new(),
            leaves: Vec::new(),
            bucket: BucketKey {
                organization_id: OrganizationId::new(),
                program_id: ProgramId::new(),
                cohort_year: DEFAULT_COHORT,
            },
        }
    }

    fn with_actor(mut self, name: &str, role: Role, is_placeholder: bool) -> Self {
        let actor = Actor {
            id: ActorId::new(),
            display_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            role,
            status: ActorStatus::Active,
            is_placeholder,
        };
        self.actors.insert(name.to_string(), actor);
        self
    }

    pub fn admin(self, name: &str) -> Self {
        self.with_actor(name, Role::Admin, false)
    }

    pub fn manager(self, name: &str) -> Self {
        self.with_actor(name, Role::Manager, false)
    }

    /// Flagged placeholder account with the manager role.
    pub fn placeholder(self, name: &str) -> Self {
        self.with_actor(name, Role::Manager, true)
    }

    /// Add the edge `subordinate -> manager`.
    ///
    /// Self-references and cycles are accepted here so tests can build
    /// corrupted hierarchies.
    pub fn reports_to(mut self, subordinate: &str, manager: &str) -> Self {
        let edge = HierarchyEdge {
            subordinate_id: self.id(subordinate),
            manager_id: self.id(manager),
        };
        self.edges.push(edge);
        self
    }

    /// `count` contacts owned and created by `owner` in the default bucket.
    pub fn contacts(self, owner: &str, count: usize) -> Self {
        let bucket = self.bucket;
        self.contacts_in(owner, bucket, count)
    }

    pub fn contacts_in(mut self, owner: &str, bucket: BucketKey, count: usize) -> Self {
        let owner_id = self.id(owner);
        for _ in 0..count {
            self.leaves.push(Leaf {
                id: LeafId::new(),
                owner_actor_id: owner_id,
                creator_actor_id: owner_id,
                organization_id: bucket.organization_id,
                program_id: bucket.program_id,
                cohort_year: bucket.cohort_year,
            });
        }
        self
    }

    /// One contact created by `creator` and owned by `owner`.
    pub fn reassigned_contact(mut self, creator: &str, owner: &str) -> Self {
        let bucket = self.bucket;
        self.leaves.push(Leaf {
            id: LeafId::new(),
            owner_actor_id: self.id(owner),
            creator_actor_id: self.id(creator),
            organization_id: bucket.organization_id,
            program_id: bucket.program_id,
            cohort_year: bucket.cohort_year,
        });
        self
    }

    /// Id of the named actor. Panics when the name was never added.
    pub fn id(&self, name: &str) -> ActorId {
        self.actors
            .get(name)
            .unwrap_or_else(|| panic!("fixture has no actor named {name:?}"))
            .id
    }

    pub fn actor(&self, name: &str) -> &Actor {
        self.actors
            .get(name)
            .unwrap_or_else(|| panic!("fixture has no actor named {name:?}"))
    }

    /// Default bucket every `contacts` call lands in.
    pub fn bucket(&self) -> BucketKey {
        self.bucket
    }

    /// Same organization and program, different cohort.
    pub fn bucket_for_year(&self, cohort_year: i32) -> BucketKey {
        BucketKey {
            cohort_year,
            ..self.bucket
        }
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    /// Fresh in-memory store holding the fixture.
    pub fn store(&self) -> InMemoryStore {
        InMemoryStore::from_parts(
            self.actors.values().cloned(),
            self.edges.iter().copied(),
            self.leaves.iter().cloned(),
        )
    }
}

/// Admin, Boss with reports Rep1 and Rep2; Rep1 owns 3 contacts, Rep2 owns 2,
/// Boss owns 1. Rep1 is a placeholder when `rep1_placeholder` is set.
pub fn boss_scenario(rep1_placeholder: bool) -> OrgFixture {
    let org = OrgFixture::new().admin("Admin").manager("Boss");
    let org = if rep1_placeholder {
        org.placeholder("Rep1")
    } else {
        org.manager("Rep1")
    };
    org.manager("Rep2")
        .reports_to("Rep1", "Boss")
        .reports_to("Rep2", "Boss")
        .contacts("Rep1", 3)
        .contacts("Rep2", 2)
        .contacts("Boss", 1)
}
