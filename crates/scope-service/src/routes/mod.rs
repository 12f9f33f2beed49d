//! HTTP routes for the scope service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_caller};
use crate::repositories::Stores;
use crate::services::placeholder::PlaceholderDenylist;
use crate::services::ScopeLimits;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Hierarchy, actor and contact stores.
    pub stores: Stores,

    /// Service configuration.
    pub config: Config,

    pub limits: ScopeLimits,

    pub denylist: PlaceholderDenylist,
}

impl AppState {
    pub fn new(stores: Stores, config: Config) -> Self {
        let limits = ScopeLimits::from(&config);
        let denylist = PlaceholderDenylist::new(config.placeholder_denylist.iter().cloned());
        Self {
            stores,
            config,
            limits,
            denylist,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe - public, unversioned
/// - `/metrics` - Prometheus metrics endpoint - public, unversioned
/// - `/api/v1/contacts/visible` - Visible contact ids - caller required
/// - `/api/v1/stats` - Rolled-up statistics - caller required
/// - `/api/v1/admin/...` - Hierarchy maintenance - admin caller required
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route(
            "/api/v1/contacts/visible",
            get(handlers::list_visible_contacts),
        )
        .route("/api/v1/stats", get(handlers::get_stats))
        .route(
            "/api/v1/admin/actors/:id/manager",
            put(handlers::assign_manager).delete(handlers::remove_manager),
        )
        .route("/api/v1/admin/actors/:id", delete(handlers::delete_actor))
        .route(
            "/api/v1/admin/placeholders/backfill",
            post(handlers::backfill_placeholders),
        )
        .route_layer(middleware::from_fn(require_caller))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
