//! Error type shared by all provider implementations.

use thiserror::Error;

use skylark_core::SkylarkError;

/// Failure reported by an outbound collaborator.
///
/// Providers return this instead of [`SkylarkError`] so the orchestration
/// layer can distinguish infrastructure failures (which feed the circuit
/// breaker) from domain outcomes such as a declined payment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// The collaborator could not be reached or refused to serve.
    #[error("'{service}' is unavailable: {reason}")]
    Unavailable { service: String, reason: String },

    /// The collaborator did not answer in time.
    #[error("'{service}' timed out")]
    Timeout { service: String },

    /// The collaborator answered with something we could not interpret.
    #[error("'{service}' returned a malformed response: {detail}")]
    Malformed { service: String, detail: String },

    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation conflicts with the record's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The payment gateway refused the charge.
    #[error("payment declined: {0}")]
    Declined(String),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<ProviderError> for SkylarkError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Unavailable { service, reason } => {
                SkylarkError::ExternalService { service, reason }
            }
            ProviderError::Timeout { service } => SkylarkError::ExternalService {
                service,
                reason: "request timed out".to_string(),
            },
            ProviderError::Malformed { service, detail } => SkylarkError::ExternalService {
                service,
                reason: format!("malformed response: {detail}"),
            },
            ProviderError::NotFound(what) => SkylarkError::NotFound(what),
            ProviderError::Conflict(what) => SkylarkError::Conflict(what),
            ProviderError::Declined(reason) => {
                SkylarkError::Validation(format!("payment declined: {reason}"))
            }
            ProviderError::Storage(detail) => SkylarkError::Storage(detail),
        }
    }
}
