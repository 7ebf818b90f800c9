//! Backend errors

use thiserror::Error;

/// Errors reported by remote collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The request never got a usable response (network, DNS, TLS, ...)
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with an error
    #[error("api error: {0}")]
    Api(String),

    /// The service answered successfully but left out a required field
    #[error("missing data: {0}")]
    MissingData(&'static str),
}

impl BackendError {
    /// Transport failures are worth another attempt; API rejections are not
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(BackendError::Transport("reset".to_string()).is_retryable());
        assert!(!BackendError::Api("row level security".to_string()).is_retryable());
        assert!(!BackendError::MissingData("signedUrl").is_retryable());
    }
}
