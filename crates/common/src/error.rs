//! Common error types for Salesline components.

use thiserror::Error;

/// Common errors that can occur across Salesline components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// An identifier could not be parsed
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
}
