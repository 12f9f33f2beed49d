//! Metrics definitions for the scope service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `scope_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: parameterized paths only, actor ids are replaced
//! - `status`: a handful of outcome strings per metric
//! - `operation`: bounded by code
//! - `kind`: `cycle` or `depth`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("scope_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("scope_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Full("scope_closure_size".to_string()),
            &[0.0, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0],
        )
        .map_err(|e| format!("Failed to set closure size buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("scope_stats_computation".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set stats computation buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `scope_http_requests_total`, `scope_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures framework-level rejections (404, 405, 415) as well as handler errors.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("scope_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("scope_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/metrics" | "/api/v1/contacts/visible" | "/api/v1/stats"
        | "/api/v1/admin/placeholders/backfill" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

/// Replaces actor ids in admin paths with `{id}`.
fn normalize_dynamic_endpoint(path: &str) -> String {
    if path.starts_with("/api/v1/admin/actors/") {
        let parts: Vec<&str> = path.split('/').collect();

        // /api/v1/admin/actors/{id}
        if parts.len() == 6 {
            return "/api/v1/admin/actors/{id}".to_string();
        }

        // /api/v1/admin/actors/{id}/manager
        if parts.len() == 7 && parts.get(6) == Some(&"manager") {
            return "/api/v1/admin/actors/{id}/manager".to_string();
        }
    }

    "/other".to_string()
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `scope_db_query_duration_seconds`, `scope_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("scope_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("scope_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Hierarchy Metrics
// ============================================================================

/// Record the size of a computed descendant closure.
///
/// Metric: `scope_closure_size`
pub fn record_closure_size(size: usize) {
    #[allow(clippy::cast_precision_loss)]
    histogram!("scope_closure_size").record(size as f64);
}

/// Record an aborted traversal.
///
/// Metric: `scope_hierarchy_violations_total`
/// Labels: `kind` (`cycle`, `depth`)
///
/// Any non-zero rate means the stored hierarchy is corrupted.
pub fn record_hierarchy_violation(kind: &str) {
    counter!("scope_hierarchy_violations_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a hierarchy write.
///
/// Metric: `scope_hierarchy_mutations_total`
/// Labels: `operation`, `status` (`success`, `rejected`, `error`)
pub fn record_hierarchy_mutation(operation: &str, status: &str) {
    counter!("scope_hierarchy_mutations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Statistics Metrics
// ============================================================================

/// Record one statistics computation.
///
/// Metric: `scope_stats_computation_duration_seconds`, `scope_stats_computations_total`
/// Labels: `status` (`success`, `inconsistent`, `error`)
pub fn record_stats_computation(status: &str, duration: Duration) {
    histogram!("scope_stats_computation_duration_seconds").record(duration.as_secs_f64());

    counter!("scope_stats_computations_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a placeholder backfill run.
///
/// Metric: `scope_placeholder_backfill_runs_total`, `scope_placeholder_backfill_flagged_total`
/// Labels: `dry_run`
pub fn record_placeholder_backfill(dry_run: bool, flagged: usize) {
    let mode = if dry_run { "true" } else { "false" };

    counter!("scope_placeholder_backfill_runs_total",
        "dry_run" => mode
    )
    .increment(1);

    counter!("scope_placeholder_backfill_flagged_total",
        "dry_run" => mode
    )
    .increment(flagged as u64);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record error by category.
///
/// Metric: `scope_errors_total`
/// Labels: `error_type`, `status_code`
pub fn record_error(error_type: &str, status_code: u16) {
    counter!("scope_errors_total",
        "error_type" => error_type.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
