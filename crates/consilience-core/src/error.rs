//! Error types for consilience.

use thiserror::Error;

/// Result type alias using consilience's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for consilience operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Analysis not found
    #[error("Analysis not found: {0}")]
    AnalysisNotFound(String),

    /// Analysis has no documents attached
    #[error("No papers found for analysis: {0}")]
    NoDocuments(String),

    /// Synthesis attempted again inside the cool-down window
    #[error("Limit 1 analysis per minute. Please wait {retry_after_secs}s.")]
    RateLimited { retry_after_secs: u64 },

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model output failed structural validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Synthesis exhausted its attempt budget. Carries the last attempt's message.
    #[error("{0}")]
    Synthesis(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a model response could not be turned into a `SynthesisResult`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No balanced `{...}` span in the response.
    #[error("Model failed to return structured JSON")]
    NoJsonFound,

    /// A span was found but it does not parse as JSON.
    #[error("Model returned malformed JSON: {0}")]
    MalformedJson(String),

    /// JSON parsed but violates the result schema.
    #[error("Model returned invalid data structure at '{path}': {detail}")]
    SchemaViolation { path: String, detail: String },
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_analysis_not_found() {
        let err = Error::AnalysisNotFound("a-123".to_string());
        assert_eq!(err.to_string(), "Analysis not found: a-123");
    }

    #[test]
    fn test_error_display_no_documents() {
        let err = Error::NoDocuments("a-123".to_string());
        assert_eq!(err.to_string(), "No papers found for analysis: a-123");
    }

    #[test]
    fn test_error_display_rate_limited() {
        let err = Error::RateLimited {
            retry_after_secs: 42,
        };
        assert_eq!(
            err.to_string(),
            "Limit 1 analysis per minute. Please wait 42s."
        );
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("model timeout".to_string());
        assert_eq!(err.to_string(), "Inference error: model timeout");
    }

    #[test]
    fn test_error_display_synthesis_is_bare_message() {
        let err = Error::Synthesis("Analysis timed out. Try with fewer papers.".to_string());
        assert_eq!(err.to_string(), "Analysis timed out. Try with fewer papers.");
    }

    #[test]
    fn test_error_display_validation_wraps_inner() {
        let err: Error = ValidationError::NoJsonFound.into();
        assert_eq!(
            err.to_string(),
            "Validation error: Model failed to return structured JSON"
        );
    }

    #[test]
    fn test_validation_error_display_schema_violation() {
        let err = ValidationError::SchemaViolation {
            path: "/synthesis_confidence".to_string(),
            detail: "1.5 is greater than the maximum of 1.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Model returned invalid data structure at '/synthesis_confidence': 1.5 is greater than the maximum of 1.0"
        );
    }

    #[test]
    fn test_validation_error_display_malformed() {
        let err = ValidationError::MalformedJson("EOF while parsing".to_string());
        assert_eq!(
            err.to_string(),
            "Model returned malformed JSON: EOF while parsing"
        );
    }

    #[test]
    fn test_error_display_serialization() {
        let err = Error::Serialization("invalid JSON".to_string());
        assert_eq!(err.to_string(), "Serialization error: invalid JSON");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing API key".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing API key");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("negative count".to_string());
        assert_eq!(err.to_string(), "Invalid input: negative count");
    }

    #[test]
    fn test_error_display_request() {
        let err = Error::Request("network unreachable".to_string());
        assert_eq!(err.to_string(), "Request error: network unreachable");
    }

    #[test]
    fn test_error_display_internal() {
        let err = Error::Internal("unexpected state".to_string());
        assert_eq!(err.to_string(), "Internal error: unexpected state");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => {
                assert!(!msg.is_empty());
            }
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_error_debug_format() {
        let err = Error::AnalysisNotFound("x".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("AnalysisNotFound"));
    }
}
