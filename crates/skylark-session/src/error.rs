//! Session-layer errors.

use thiserror::Error;

use skylark_core::SkylarkError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// No session exists under this id.
    #[error("session '{0}' not found")]
    NotFound(String),

    /// The named booking step is not part of the flow.
    #[error("unknown booking step '{0}'")]
    UnknownStep(String),

    /// The payload for a booking step failed validation.
    #[error("invalid data for step '{step}': {detail}")]
    InvalidStepData { step: String, detail: String },

    /// The session store itself failed.
    #[error("session storage error: {0}")]
    Storage(String),
}

impl From<SessionError> for SkylarkError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(id) => SkylarkError::NotFound(format!("session '{id}'")),
            SessionError::UnknownStep(step) => {
                SkylarkError::Validation(format!("unknown booking step '{step}'"))
            }
            SessionError::InvalidStepData { step, detail } => {
                SkylarkError::Validation(format!("invalid data for step '{step}': {detail}"))
            }
            SessionError::Storage(detail) => SkylarkError::Storage(detail),
        }
    }
}
