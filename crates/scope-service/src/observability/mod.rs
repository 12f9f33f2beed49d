//! Observability module for the scope service.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
