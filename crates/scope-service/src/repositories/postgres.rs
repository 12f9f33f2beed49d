//! PostgreSQL implementations of the collaborator stores.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)
//! - Contact contents are never logged, only counts

use super::{ActorDirectory, HierarchyStore, LeafStore};
use crate::errors::ScopeError;
use crate::models::{
    Actor, ActorStatus, BucketKey, HierarchyEdge, LeafOwnerScope, OwnerCount, Role, StatsQuery,
};
use crate::observability::metrics::record_db_query;
use async_trait::async_trait;
use common::types::{ActorId, LeafId, OrganizationId, ProgramId};
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Record query latency and outcome, passing the result through.
fn observe<T>(
    operation: &str,
    start: Instant,
    result: Result<T, sqlx::Error>,
) -> Result<T, ScopeError> {
    let status = if result.is_ok() { "success" } else { "error" };
    record_db_query(operation, status, start.elapsed());
    result.map_err(|e| ScopeError::Database(format!("{operation} failed: {e}")))
}

fn owner_filter(owners: &LeafOwnerScope) -> Option<Vec<Uuid>> {
    match owners {
        LeafOwnerScope::Unrestricted => None,
        LeafOwnerScope::Owners(ids) => Some(ids.iter().map(|id| id.0).collect()),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ActorRow {
    actor_id: Uuid,
    display_name: String,
    email: String,
    role: String,
    status: String,
    is_placeholder: bool,
}

impl From<ActorRow> for Actor {
    fn from(row: ActorRow) -> Self {
        Actor {
            id: ActorId(row.actor_id),
            display_name: row.display_name,
            email: row.email,
            role: Role::from_db_str(&row.role),
            status: ActorStatus::from_db_str(&row.status),
            is_placeholder: row.is_placeholder,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EdgeRow {
    subordinate_id: Uuid,
    manager_id: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct OwnerCountRow {
    organization_id: Uuid,
    program_id: Uuid,
    cohort_year: i32,
    owner_id: Uuid,
    contact_count: i64,
}

/// Hierarchy edges in the `hierarchy_edges` table.
#[derive(Clone)]
pub struct PgHierarchyStore {
    pool: PgPool,
}

impl PgHierarchyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HierarchyStore for PgHierarchyStore {
    async fn parent_of(&self, actor: ActorId) -> Result<Option<ActorId>, ScopeError> {
        let start = Instant::now();
        let result: Result<Option<(Uuid,)>, _> = sqlx::query_as(
            r#"
            SELECT manager_id
            FROM hierarchy_edges
            WHERE subordinate_id = $1
            "#,
        )
        .bind(actor.0)
        .fetch_optional(&self.pool)
        .await;

        Ok(observe("parent_of", start, result)?.map(|(id,)| ActorId(id)))
    }

    async fn children_of(&self, actor: ActorId) -> Result<Vec<ActorId>, ScopeError> {
        let start = Instant::now();
        let result: Result<Vec<(Uuid,)>, _> = sqlx::query_as(
            r#"
            SELECT subordinate_id
            FROM hierarchy_edges
            WHERE manager_id = $1
            ORDER BY subordinate_id
            "#,
        )
        .bind(actor.0)
        .fetch_all(&self.pool)
        .await;

        Ok(observe("children_of", start, result)?
            .into_iter()
            .map(|(id,)| ActorId(id))
            .collect())
    }

    #[instrument(skip_all)]
    async fn edges(&self) -> Result<Vec<HierarchyEdge>, ScopeError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, EdgeRow>(
            r#"
            SELECT subordinate_id, manager_id
            FROM hierarchy_edges
            "#,
        )
        .fetch_all(&self.pool)
        .await;

        Ok(observe("list_edges", start, result)?
            .into_iter()
            .map(|row| HierarchyEdge {
                subordinate_id: ActorId(row.subordinate_id),
                manager_id: ActorId(row.manager_id),
            })
            .collect())
    }

    #[instrument(skip_all, fields(subordinate = %edge.subordinate_id, manager = %edge.manager_id))]
    async fn set_manager(&self, edge: HierarchyEdge) -> Result<(), ScopeError> {
        let start = Instant::now();
        // subordinate_id is the primary key; the upsert is serialized on it.
        let result = sqlx::query(
            r#"
            INSERT INTO hierarchy_edges (subordinate_id, manager_id)
            VALUES ($1, $2)
            ON CONFLICT (subordinate_id) DO UPDATE SET
                manager_id = EXCLUDED.manager_id,
                updated_at = NOW()
            "#,
        )
        .bind(edge.subordinate_id.0)
        .bind(edge.manager_id.0)
        .execute(&self.pool)
        .await;

        observe("set_manager", start, result).map_err(|e| match e {
            ScopeError::Database(msg) if msg.contains("hierarchy_edges_no_self_reference") => {
                ScopeError::SelfReferenceRejected(edge.subordinate_id)
            }
            other => other,
        })?;
        Ok(())
    }

    async fn clear_manager(&self, subordinate: ActorId) -> Result<bool, ScopeError> {
        let start = Instant::now();
        let result = sqlx::query(
            r#"
            DELETE FROM hierarchy_edges
            WHERE subordinate_id = $1
            "#,
        )
        .bind(subordinate.0)
        .execute(&self.pool)
        .await;

        Ok(observe("clear_manager", start, result)?.rows_affected() > 0)
    }
}

/// Actor records in the `actors` table.
#[derive(Clone)]
pub struct PgActorDirectory {
    pool: PgPool,
}

impl PgActorDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActorDirectory for PgActorDirectory {
    async fn get(&self, id: ActorId) -> Result<Option<Actor>, ScopeError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, ActorRow>(
            r#"
            SELECT actor_id, display_name, email, role, status, is_placeholder
            FROM actors
            WHERE actor_id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await;

        Ok(observe("get_actor", start, result)?.map(Actor::from))
    }

    async fn list(&self) -> Result<Vec<Actor>, ScopeError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, ActorRow>(
            r#"
            SELECT actor_id, display_name, email, role, status, is_placeholder
            FROM actors
            "#,
        )
        .fetch_all(&self.pool)
        .await;

        Ok(observe("list_actors", start, result)?
            .into_iter()
            .map(Actor::from)
            .collect())
    }

    async fn set_placeholder(&self, id: ActorId, is_placeholder: bool) -> Result<(), ScopeError> {
        let start = Instant::now();
        let result = sqlx::query(
            r#"
            UPDATE actors
            SET is_placeholder = $2, updated_at = NOW()
            WHERE actor_id = $1
            "#,
        )
        .bind(id.0)
        .bind(is_placeholder)
        .execute(&self.pool)
        .await;

        if observe("set_placeholder", start, result)?.rows_affected() == 0 {
            return Err(ScopeError::UnknownActor(id));
        }
        Ok(())
    }

    async fn delete(&self, id: ActorId) -> Result<bool, ScopeError> {
        let start = Instant::now();
        let result = sqlx::query(
            r#"
            DELETE FROM actors
            WHERE actor_id = $1
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await;

        Ok(observe("delete_actor", start, result)?.rows_affected() > 0)
    }
}

/// Contact records in the `contacts` table.
#[derive(Clone)]
pub struct PgLeafStore {
    pool: PgPool,
}

impl PgLeafStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeafStore for PgLeafStore {
    #[instrument(skip_all, fields(creator = %creator))]
    async fn visible_leaf_ids(
        &self,
        owners: &LeafOwnerScope,
        creator: ActorId,
    ) -> Result<Vec<LeafId>, ScopeError> {
        let start = Instant::now();
        let result: Result<Vec<(Uuid,)>, _> = sqlx::query_as(
            r#"
            SELECT contact_id
            FROM contacts
            WHERE $1::uuid[] IS NULL
               OR owner_id = ANY($1)
               OR creator_id = $2
            ORDER BY contact_id
            "#,
        )
        .bind(owner_filter(owners))
        .bind(creator.0)
        .fetch_all(&self.pool)
        .await;

        Ok(observe("visible_leaf_ids", start, result)?
            .into_iter()
            .map(|(id,)| LeafId(id))
            .collect())
    }

    #[instrument(skip_all)]
    async fn count_by_owner(
        &self,
        owners: &LeafOwnerScope,
        query: &StatsQuery,
    ) -> Result<Vec<OwnerCount>, ScopeError> {
        let start = Instant::now();
        let result = sqlx::query_as::<_, OwnerCountRow>(
            r#"
            SELECT organization_id, program_id, cohort_year, owner_id,
                   COUNT(*) AS contact_count
            FROM contacts
            WHERE ($1::uuid[] IS NULL OR owner_id = ANY($1))
              AND ($2::uuid IS NULL OR organization_id = $2)
              AND ($3::uuid IS NULL OR program_id = $3)
              AND ($4::int IS NULL OR cohort_year >= $4)
              AND ($5::int IS NULL OR cohort_year <= $5)
            GROUP BY organization_id, program_id, cohort_year, owner_id
            "#,
        )
        .bind(owner_filter(owners))
        .bind(query.organization.map(|o| o.0))
        .bind(query.program.map(|p| p.0))
        .bind(query.cohort_from)
        .bind(query.cohort_to)
        .fetch_all(&self.pool)
        .await;

        observe("count_by_owner", start, result)?
            .into_iter()
            .map(|row| -> Result<OwnerCount, ScopeError> {
                let count = u64::try_from(row.contact_count).map_err(|_| ScopeError::Internal)?;
                Ok(OwnerCount {
                    bucket: BucketKey {
                        organization_id: OrganizationId(row.organization_id),
                        program_id: ProgramId(row.program_id),
                        cohort_year: row.cohort_year,
                    },
                    owner: ActorId(row.owner_id),
                    count,
                })
            })
            .collect()
    }

    async fn references_actor(&self, actor: ActorId) -> Result<bool, ScopeError> {
        let start = Instant::now();
        let result: Result<(bool,), _> = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM contacts
                WHERE owner_id = $1 OR creator_id = $1
            )
            "#,
        )
        .bind(actor.0)
        .fetch_one(&self.pool)
        .await;

        Ok(observe("contacts_reference_actor", start, result)?.0)
    }
}
