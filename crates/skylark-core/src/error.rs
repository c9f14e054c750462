use thiserror::Error;

/// Top-level error type for the Skylark system.
///
/// Variants follow the orchestration engine's error taxonomy. Subsystem
/// crates define their own error types and implement
/// `From<SubsystemError> for SkylarkError` so that the `?` operator works
/// seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SkylarkError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("External service '{service}' failed: {reason}")]
    ExternalService { service: String, reason: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization denied: {0}")]
    Authorization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for SkylarkError {
    fn from(err: toml::de::Error) -> Self {
        SkylarkError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SkylarkError {
    fn from(err: toml::ser::Error) -> Self {
        SkylarkError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SkylarkError {
    fn from(err: serde_json::Error) -> Self {
        SkylarkError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Skylark operations.
pub type Result<T> = std::result::Result<T, SkylarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SkylarkError::Validation("message must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: message must not be empty"
        );
    }

    #[test]
    fn test_external_service_display() {
        let err = SkylarkError::ExternalService {
            service: "flight-search".to_string(),
            reason: "timed out".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "External service 'flight-search' failed: timed out"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SkylarkError = io_err.into();
        assert!(matches!(err, SkylarkError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_variants_are_non_exhaustive() {
        // This test just verifies we can construct each variant
        let errors: Vec<SkylarkError> = vec![
            SkylarkError::Validation("test".into()),
            SkylarkError::NotFound("test".into()),
            SkylarkError::ExternalService {
                service: "test".into(),
                reason: "test".into(),
            },
            SkylarkError::Conflict("test".into()),
            SkylarkError::RateLimited,
            SkylarkError::Authentication("test".into()),
            SkylarkError::Authorization("test".into()),
            SkylarkError::Config("test".into()),
            SkylarkError::Storage("test".into()),
            SkylarkError::Serialization("test".into()),
        ];
        assert_eq!(errors.len(), 10);
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(SkylarkError, &str)> = vec![
            (
                SkylarkError::NotFound("session abc".to_string()),
                "Not found: session abc",
            ),
            (
                SkylarkError::Conflict("booking already cancelled".to_string()),
                "Conflict: booking already cancelled",
            ),
            (SkylarkError::RateLimited, "Rate limit exceeded"),
            (
                SkylarkError::Authentication("bad token".to_string()),
                "Authentication failed: bad token",
            ),
            (
                SkylarkError::Authorization("not an admin".to_string()),
                "Authorization denied: not an admin",
            ),
            (
                SkylarkError::Config("missing section".to_string()),
                "Configuration error: missing section",
            ),
            (
                SkylarkError::Storage("lock poisoned".to_string()),
                "Storage error: lock poisoned",
            ),
            (
                SkylarkError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let err: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        assert!(err.is_err());
        let converted: SkylarkError = err.unwrap_err().into();
        assert!(matches!(converted, SkylarkError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let bad_json = "{ invalid json }";
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str(bad_json);
        assert!(err.is_err());
        let converted: SkylarkError = err.unwrap_err().into();
        assert!(matches!(converted, SkylarkError::Serialization(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(SkylarkError::NotFound("nothing here".to_string()))
        }

        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }

    #[test]
    fn test_error_debug_impl() {
        let err = SkylarkError::Conflict("test debug".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("Conflict"));
        assert!(debug_str.contains("test debug"));
    }
}
