//! Statistics handler.

use super::caller_role;
use crate::errors::ScopeError;
use crate::middleware::Caller;
use crate::models::{StatsQuery, StatsReport};
use crate::routes::AppState;
use crate::services::stats::get_aggregated_stats;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/v1/stats
///
/// Query parameters: `organization`, `program`, `cohort_from`, `cohort_to`,
/// all optional.
///
/// # Response
///
/// Nested `organizations -> program -> cohort year -> { total, actors }`.
/// A corrupted hierarchy yields 500 `STATISTICS_UNAVAILABLE` and no partial
/// totals.
#[instrument(skip_all, name = "scope.stats.get", fields(caller = %caller.actor_id))]
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsReport>, ScopeError> {
    let role = caller_role(&state, caller).await?;
    let report =
        get_aggregated_stats(&state.stores, &state.limits, caller.actor_id, role, &query).await?;
    Ok(Json(report))
}
