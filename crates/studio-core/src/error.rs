//! Centralized error types for Dress Studio.

use thiserror::Error;

use crate::providers::ProviderError;

/// Main error type for studio operations.
#[derive(Error, Debug)]
pub enum StudioError {
    #[error("{0}")]
    Validation(String),

    #[error("File \"{name}\" is too large. Maximum size is {limit_mb}MB.")]
    FileTooLarge { name: String, limit_mb: u64 },

    #[error("{0} not configured")]
    MissingCredentials(&'static str),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for studio operations.
pub type StudioResult<T> = Result<T, StudioError>;

impl StudioError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the error was caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::FileTooLarge { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(StudioError::validation("Description is required").is_client_error());
        assert!(StudioError::FileTooLarge { name: "a.png".to_string(), limit_mb: 10 }
            .is_client_error());
        assert!(!StudioError::MissingCredentials("FAL_KEY").is_client_error());
        assert!(!StudioError::Config("bad toml".to_string()).is_client_error());

        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = StudioError::from(missing);
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "IO error: gone");
    }
}
