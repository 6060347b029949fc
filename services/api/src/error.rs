//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error building or using the HTTP client for the hospital backend.
    #[error("HTTP Client Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn load(missing: bool) -> Result<(), ApiError> {
        if missing {
            Err(ConfigError::MissingVar("HOSPITAL_API_URL".to_string()))?;
        }
        Ok(())
    }

    #[test]
    fn startup_failures_convert_with_question_mark() {
        assert_matches!(load(true), Err(ApiError::Config(ConfigError::MissingVar(name))) if name == "HOSPITAL_API_URL");
        assert!(load(false).is_ok());

        let io = ApiError::from(std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"));
        assert_eq!(io.to_string(), "IO error: in use");
    }
}
