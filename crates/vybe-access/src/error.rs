//! Access errors

use std::time::Duration;

use thiserror::Error;
use vybe_types::Tier;

use crate::config::ConfigError;

/// Errors surfaced by access operations.
///
/// None of these are fatal: every variant is recovered where it occurs and
/// leaves the previous state usable.
#[derive(Error, Debug)]
pub enum AccessError {
    /// A remote call exceeded its budget
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The call was abandoned because its owner shut down
    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },

    /// Sign-in or sign-out failed
    #[error("auth error: {0}")]
    Auth(String),

    /// A record lookup or insert failed
    #[error("query error: {0}")]
    Query(String),

    /// The storage service could not issue a signed link
    #[error("link issuance failed: {0}")]
    LinkIssuance(String),

    /// Object upload failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Required input is missing or malformed
    #[error("{0}")]
    Validation(String),

    /// The current grant does not cover the request
    #[error("requires {required} access")]
    NotEntitled { required: Requirement },

    /// Unknown asset
    #[error("asset not found: {0}")]
    NotFound(String),

    /// A previous submission is still running
    #[error("another submission is in progress")]
    Busy,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// What a refused request needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Tier(Tier),
    Admin,
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tier(tier) => write!(f, "{} tier", tier.display_name()),
            Self::Admin => f.write_str("admin"),
        }
    }
}

impl AccessError {
    /// Get error code for UI status lines and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Auth(_) => "AUTH_ERROR",
            Self::Query(_) => "QUERY_ERROR",
            Self::LinkIssuance(_) => "LINK_ISSUANCE_ERROR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotEntitled { .. } => "NOT_ENTITLED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Busy => "BUSY",
            Self::Config(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result alias for access operations
pub type AccessResult<T> = Result<T, AccessError>;
