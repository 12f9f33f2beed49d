//! HTTP request handlers for the scope service.

pub mod admin;
pub mod contacts;
pub mod health;
pub mod metrics;
pub mod stats;

pub use admin::{assign_manager, backfill_placeholders, delete_actor, remove_manager};
pub use contacts::list_visible_contacts;
pub use health::health_check;
pub use metrics::metrics_handler;
pub use stats::get_stats;

use crate::errors::ScopeError;
use crate::middleware::Caller;
use crate::models::{Actor, Role};
use crate::routes::AppState;

/// Look up the caller's directory record.
///
/// The role comes from the directory, never from the request.
async fn load_caller(state: &AppState, caller: Caller) -> Result<Option<Actor>, ScopeError> {
    state.stores.directory.get(caller.actor_id).await
}

/// Role used for visibility decisions. Unknown callers get the restricted
/// role; the services then return empty results for them.
async fn caller_role(state: &AppState, caller: Caller) -> Result<Role, ScopeError> {
    Ok(load_caller(state, caller)
        .await?
        .map_or(Role::Manager, |actor| actor.role))
}

/// 403 unless the caller is a known admin.
async fn require_admin(state: &AppState, caller: Caller) -> Result<Actor, ScopeError> {
    match load_caller(state, caller).await? {
        Some(actor) if actor.role.has_unrestricted_visibility() => Ok(actor),
        _ => {
            tracing::warn!(
                target: "scope.handlers.admin",
                caller = %caller.actor_id,
                "Admin endpoint refused"
            );
            Err(ScopeError::Forbidden("Admin role required".to_string()))
        }
    }
}
