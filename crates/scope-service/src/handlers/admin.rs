//! Hierarchy administration handlers.
//!
//! - `PUT /api/v1/admin/actors/{id}/manager` - Assign a manager
//! - `DELETE /api/v1/admin/actors/{id}/manager` - Detach from manager
//! - `DELETE /api/v1/admin/actors/{id}` - Delete an unreferenced actor
//! - `POST /api/v1/admin/placeholders/backfill` - Flag placeholder accounts
//!
//! All require an admin caller.

use super::require_admin;
use crate::errors::ScopeError;
use crate::middleware::Caller;
use crate::models::BackfillResponse;
use crate::routes::AppState;
use crate::services::{hierarchy_admin, placeholder};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use common::types::ActorId;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Request body for manager assignment.
#[derive(Debug, Deserialize)]
pub struct AssignManagerRequest {
    pub manager_id: ActorId,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackfillParams {
    #[serde(default)]
    pub dry_run: bool,
}

/// Handler for PUT /api/v1/admin/actors/{id}/manager
#[instrument(skip_all, name = "scope.admin.assign_manager", fields(subordinate = %id))]
pub async fn assign_manager(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<ActorId>,
    Json(body): Json<AssignManagerRequest>,
) -> Result<StatusCode, ScopeError> {
    require_admin(&state, caller).await?;
    hierarchy_admin::assign_manager(&state.stores, &state.limits, id, body.manager_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for DELETE /api/v1/admin/actors/{id}/manager
///
/// 404 when the actor has no manager.
#[instrument(skip_all, name = "scope.admin.remove_manager", fields(subordinate = %id))]
pub async fn remove_manager(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<ActorId>,
) -> Result<StatusCode, ScopeError> {
    require_admin(&state, caller).await?;
    if hierarchy_admin::remove_manager(&state.stores, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

/// Handler for DELETE /api/v1/admin/actors/{id}
#[instrument(skip_all, name = "scope.admin.delete_actor", fields(actor = %id))]
pub async fn delete_actor(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<ActorId>,
) -> Result<StatusCode, ScopeError> {
    require_admin(&state, caller).await?;
    hierarchy_admin::delete_actor(&state.stores, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/v1/admin/placeholders/backfill?dry_run=
#[instrument(skip_all, name = "scope.admin.backfill", fields(dry_run = params.dry_run))]
pub async fn backfill_placeholders(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<BackfillParams>,
) -> Result<Json<BackfillResponse>, ScopeError> {
    require_admin(&state, caller).await?;
    let flagged = placeholder::backfill_placeholder_flags(
        state.stores.directory.as_ref(),
        &state.denylist,
        params.dry_run,
    )
    .await?;

    Ok(Json(BackfillResponse {
        dry_run: params.dry_run,
        flagged,
    }))
}
