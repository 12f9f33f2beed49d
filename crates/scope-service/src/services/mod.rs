//! Service layer for the scope service.

pub mod closure;
pub mod hierarchy_admin;
pub mod placeholder;
pub mod scope;
pub mod stats;

use crate::config::Config;

/// Traversal and query limits applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeLimits {
    pub max_depth: usize,
    pub max_cohort_span: u32,
}

impl Default for ScopeLimits {
    fn default() -> Self {
        Self {
            max_depth: crate::config::DEFAULT_MAX_DEPTH,
            max_cohort_span: crate::config::DEFAULT_MAX_COHORT_SPAN,
        }
    }
}

impl From<&Config> for ScopeLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_depth: config.max_depth,
            max_cohort_span: config.max_cohort_span,
        }
    }
}
