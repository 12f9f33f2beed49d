//! Health check handler.

/// Liveness probe handler.
///
/// Returns "OK" while the process is running. Does not check dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}
