//! Scope service error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Hierarchy integrity failures are reported to clients as a generic
//! "statistics temporarily unavailable" error; details are logged server-side.

use crate::observability::metrics::record_error;
use crate::services::closure::ClosureError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::types::ActorId;
use serde::Serialize;
use thiserror::Error;

/// Scope service error type.
///
/// Maps to HTTP status codes:
/// - CycleDetected, DepthExceeded, HierarchyInconsistent: 500 (statistics unavailable)
/// - Database, Internal: 500 Internal Server Error
/// - SelfReferenceRejected, WouldCreateCycle, WouldExceedDepth, BadRequest: 400 Bad Request
/// - Unauthorized: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - UnknownActor: 404 Not Found
/// - ActorInUse: 409 Conflict
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("Unknown actor: {0}")]
    UnknownActor(ActorId),

    #[error("Hierarchy cycle detected at actor {actor}")]
    CycleDetected { actor: ActorId },

    #[error("Hierarchy depth exceeded limit of {limit}")]
    DepthExceeded { limit: usize },

    #[error("Actor {0} cannot manage itself")]
    SelfReferenceRejected(ActorId),

    #[error("Assigning {manager} as manager of {subordinate} would create a cycle")]
    WouldCreateCycle {
        subordinate: ActorId,
        manager: ActorId,
    },

    #[error("Assigning {manager} as manager of {subordinate} would exceed depth limit {limit}")]
    WouldExceedDepth {
        subordinate: ActorId,
        manager: ActorId,
        limit: usize,
    },

    #[error("Actor {0} is still referenced by hierarchy edges or contacts")]
    ActorInUse(ActorId),

    #[error("Hierarchy inconsistent while aggregating bucket {bucket}: {reason}")]
    HierarchyInconsistent { bucket: String, reason: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl ScopeError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            ScopeError::CycleDetected { .. }
            | ScopeError::DepthExceeded { .. }
            | ScopeError::HierarchyInconsistent { .. }
            | ScopeError::Database(_)
            | ScopeError::Internal => 500,
            ScopeError::SelfReferenceRejected(_)
            | ScopeError::WouldCreateCycle { .. }
            | ScopeError::WouldExceedDepth { .. }
            | ScopeError::BadRequest(_) => 400,
            ScopeError::Unauthorized(_) => 401,
            ScopeError::Forbidden(_) => 403,
            ScopeError::UnknownActor(_) => 404,
            ScopeError::ActorInUse(_) => 409,
        }
    }

    /// Bounded label for the `scope_errors_total` metric.
    pub fn error_type(&self) -> &'static str {
        match self {
            ScopeError::UnknownActor(_) => "unknown_actor",
            ScopeError::CycleDetected { .. } => "cycle_detected",
            ScopeError::DepthExceeded { .. } => "depth_exceeded",
            ScopeError::SelfReferenceRejected(_) => "self_reference",
            ScopeError::WouldCreateCycle { .. } => "would_create_cycle",
            ScopeError::WouldExceedDepth { .. } => "would_exceed_depth",
            ScopeError::ActorInUse(_) => "actor_in_use",
            ScopeError::HierarchyInconsistent { .. } => "hierarchy_inconsistent",
            ScopeError::BadRequest(_) => "bad_request",
            ScopeError::Unauthorized(_) => "unauthorized",
            ScopeError::Forbidden(_) => "forbidden",
            ScopeError::Database(_) => "database",
            ScopeError::Internal => "internal",
        }
    }

    /// True for errors that indicate a corrupted hierarchy rather than a bad request.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            ScopeError::CycleDetected { .. }
                | ScopeError::DepthExceeded { .. }
                | ScopeError::HierarchyInconsistent { .. }
        )
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ScopeError {
    fn into_response(self) -> Response {
        record_error(self.error_type(), self.status_code());

        let (status, code, message) = match &self {
            ScopeError::CycleDetected { .. }
            | ScopeError::DepthExceeded { .. }
            | ScopeError::HierarchyInconsistent { .. } => {
                tracing::error!(target: "scope.integrity", error = %self, "Hierarchy integrity violation");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STATISTICS_UNAVAILABLE",
                    "Statistics temporarily unavailable".to_string(),
                )
            }
            ScopeError::Database(err) => {
                tracing::error!(target: "scope.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            ScopeError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
            ScopeError::SelfReferenceRejected(_)
            | ScopeError::WouldCreateCycle { .. }
            | ScopeError::WouldExceedDepth { .. } => (
                StatusCode::BAD_REQUEST,
                "INVALID_HIERARCHY_EDGE",
                self.to_string(),
            ),
            ScopeError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            ScopeError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", reason.clone())
            }
            ScopeError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            ScopeError::UnknownActor(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ScopeError::ActorInUse(_) => (StatusCode::CONFLICT, "CONFLICT", self.to_string()),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Convert sqlx errors to ScopeError
impl From<sqlx::Error> for ScopeError {
    fn from(err: sqlx::Error) -> Self {
        ScopeError::Database(err.to_string())
    }
}

impl From<ClosureError> for ScopeError {
    fn from(err: ClosureError) -> Self {
        match err {
            ClosureError::CycleDetected { actor, .. } => ScopeError::CycleDetected { actor },
            ClosureError::DepthExceeded { limit, .. } => ScopeError::DepthExceeded { limit },
        }
    }
}
