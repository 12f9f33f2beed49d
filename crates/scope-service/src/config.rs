use common::config::ObservabilityConfig;
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default traversal depth ceiling for hierarchy walks.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Hard upper bound accepted for `HIERARCHY_MAX_DEPTH`.
const MAX_DEPTH_CEILING: usize = 1024;

const DEFAULT_PLACEHOLDER_DENYLIST: &str = "test,demo,placeholder,dummy";

pub const DEFAULT_MAX_COHORT_SPAN: u32 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub db_max_connections: u32,
    /// Safety ceiling for closure and ancestor walks.
    pub max_depth: usize,
    /// Substrings used by the one-time placeholder backfill.
    pub placeholder_denylist: Vec<String>,
    pub max_cohort_span: u32,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8090".to_string());

        let db_max_connections = parse_or(vars, "DB_MAX_CONNECTIONS", 5u32)?;
        if db_max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                name: "DB_MAX_CONNECTIONS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let max_depth = parse_or(vars, "HIERARCHY_MAX_DEPTH", DEFAULT_MAX_DEPTH)?;
        if max_depth == 0 || max_depth > MAX_DEPTH_CEILING {
            return Err(ConfigError::InvalidValue {
                name: "HIERARCHY_MAX_DEPTH".to_string(),
                reason: format!("must be between 1 and {}", MAX_DEPTH_CEILING),
            });
        }

        let placeholder_denylist = parse_denylist(
            vars.get("PLACEHOLDER_DENYLIST")
                .map(String::as_str)
                .unwrap_or(DEFAULT_PLACEHOLDER_DENYLIST),
        );

        let max_cohort_span = parse_or(vars, "STATS_MAX_COHORT_SPAN", DEFAULT_MAX_COHORT_SPAN)?;
        if max_cohort_span == 0 {
            return Err(ConfigError::InvalidValue {
                name: "STATS_MAX_COHORT_SPAN".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let json_logs = match vars.get("LOG_FORMAT").map(String::as_str) {
            None | Some("text") => false,
            Some("json") => true,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "LOG_FORMAT".to_string(),
                    reason: format!("expected 'text' or 'json', got '{}'", other),
                })
            }
        };

        Ok(Config {
            database_url,
            bind_address,
            db_max_connections,
            max_depth,
            placeholder_denylist,
            max_cohort_span,
            observability: ObservabilityConfig {
                log_level: vars
                    .get("LOG_LEVEL")
                    .cloned()
                    .unwrap_or_else(|| ObservabilityConfig::default().log_level),
                json_logs,
            },
        })
    }
}

fn parse_or<T>(vars: &HashMap<String, String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue {
                name: name.to_string(),
                reason: e.to_string(),
            }),
    }
}

fn parse_denylist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}
