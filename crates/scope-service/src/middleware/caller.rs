//! Caller identification for protected routes.
//!
//! Authentication happens upstream. The gateway forwards the authenticated
//! actor id in the `x-caller-id` header; this middleware parses it and
//! injects a [`Caller`] into the request extensions. The caller's role is
//! resolved later from the actor directory, never from the request.

use crate::errors::ScopeError;
use axum::{extract::Request, middleware::Next, response::IntoResponse};
use common::types::ActorId;
use tracing::instrument;

/// Header carrying the authenticated actor id.
pub const CALLER_HEADER: &str = "x-caller-id";

/// Authenticated caller, available to handlers via `Extension<Caller>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub actor_id: ActorId,
}

fn extract_caller(req: &Request) -> Result<Caller, ScopeError> {
    let raw = req
        .headers()
        .get(CALLER_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "scope.middleware.caller", "Missing caller header");
            ScopeError::Unauthorized("Missing caller identity".to_string())
        })?;

    let actor_id = raw.trim().parse::<ActorId>().map_err(|_| {
        tracing::debug!(target: "scope.middleware.caller", "Malformed caller header");
        ScopeError::Unauthorized("Malformed caller identity".to_string())
    })?;

    Ok(Caller { actor_id })
}

/// Rejects requests without a well-formed caller id with 401.
#[instrument(skip_all, name = "scope.middleware.caller")]
pub async fn require_caller(
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ScopeError> {
    let caller = extract_caller(&req)?;
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn echo(Extension(caller): Extension<Caller>) -> String {
        caller.actor_id.to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/whoami", get(echo))
            .layer(middleware::from_fn(require_caller))
    }

    #[tokio::test]
    async fn test_caller_is_injected() {
        let id = ActorId::new();
        let request = HttpRequest::builder()
            .uri("/whoami")
            .header(CALLER_HEADER, id.to_string())
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, id.to_string());
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let request = HttpRequest::builder()
            .uri("/whoami")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_header_is_unauthorized() {
        let request = HttpRequest::builder()
            .uri("/whoami")
            .header(CALLER_HEADER, "not-a-uuid")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
