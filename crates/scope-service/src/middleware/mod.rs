//! Middleware for the scope service.
//!
//! # Components
//!
//! - `caller` - Caller identification for protected routes
//! - `http_metrics` - HTTP request metrics middleware

pub mod caller;
pub mod http_metrics;

pub use caller::{require_caller, Caller, CALLER_HEADER};
pub use http_metrics::http_metrics_middleware;
