//! Contact visibility handler.

use super::caller_role;
use crate::errors::ScopeError;
use crate::middleware::Caller;
use crate::models::VisibleLeavesResponse;
use crate::routes::AppState;
use crate::services::scope::get_visible_leaf_ids;
use axum::{extract::State, Extension, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/v1/contacts/visible
///
/// Ids of every contact the caller may read, in ascending order.
#[instrument(skip_all, name = "scope.contacts.visible", fields(caller = %caller.actor_id))]
pub async fn list_visible_contacts(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<VisibleLeavesResponse>, ScopeError> {
    let role = caller_role(&state, caller).await?;
    let ids = get_visible_leaf_ids(&state.stores, &state.limits, caller.actor_id, role).await?;

    Ok(Json(VisibleLeavesResponse {
        count: ids.len(),
        leaf_ids: ids.into_iter().collect(),
    }))
}
