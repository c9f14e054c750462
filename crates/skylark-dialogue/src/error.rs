//! Error type for dialogue orchestration and booking operations.

use skylark_core::SkylarkError;
use skylark_providers::ProviderError;
use skylark_ranking::RankingError;
use skylark_resilience::CallError;
use skylark_session::SessionError;
use thiserror::Error;

/// Errors surfaced by the orchestrator's public operations.
///
/// Most collaborator failures never reach this type: the chat path swallows
/// them behind fallbacks and composes a degraded reply instead. What remains
/// is caller-input validation and the booking operations, where failures
/// must be explicit.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DialogueError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("message exceeds the {0}-character limit")]
    MessageTooLong(usize),

    /// Confirmation was requested before every booking step was complete.
    #[error("booking is not ready to confirm: '{missing}' is incomplete")]
    IncompleteBooking { missing: String },

    /// The session already holds a confirmed booking reference.
    #[error("booking already confirmed under reference '{0}'")]
    AlreadyConfirmed(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Ranking(#[from] RankingError),
}

impl From<DialogueError> for SkylarkError {
    fn from(err: DialogueError) -> Self {
        match err {
            DialogueError::EmptyMessage | DialogueError::MessageTooLong(_) => {
                SkylarkError::Validation(err.to_string())
            }
            DialogueError::IncompleteBooking { .. } | DialogueError::AlreadyConfirmed(_) => {
                SkylarkError::Conflict(err.to_string())
            }
            DialogueError::Session(e) => e.into(),
            DialogueError::Provider(e) => e.into(),
            DialogueError::Ranking(e) => e.into(),
        }
    }
}

/// Flatten a breaker outcome into the provider error taxonomy. An open
/// circuit or a breaker-enforced timeout reads the same to callers as the
/// collaborator itself being down.
pub(crate) fn flatten_call_error(err: CallError<ProviderError>) -> ProviderError {
    match err {
        CallError::Inner(inner) => inner,
        CallError::Open { service } => ProviderError::Unavailable {
            service,
            reason: "circuit open".to_string(),
        },
        CallError::Timeout { service, .. } => ProviderError::Timeout { service },
    }
}
