//! Scope Service Library
//!
//! Visibility and statistics engine for a sales organization hierarchy:
//!
//! - Resolves which contacts an actor may see (self, all subordinates,
//!   contacts they created; everything for admins)
//! - Rolls contact counts up the management chain per
//!   organization x program x cohort bucket
//! - Guards every traversal against cycles and runaway depth
//! - Keeps placeholder (synthetic) accounts out of displayed statistics
//!
//! # Architecture
//!
//! Handler -> Service -> Repository:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! Each request loads one [`services::closure::HierarchySnapshot`] and runs
//! the visibility and statistics phases against it.
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Caller identification and HTTP metrics
//! - `models` - Data models
//! - `observability` - Prometheus metrics
//! - `repositories` - Store traits with PostgreSQL and in-memory implementations
//! - `routes` - Axum router setup
//! - `services` - Closure, visibility, statistics and hierarchy maintenance

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
