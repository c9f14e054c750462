//! Language oracle used for intent classification.
//!
//! The classifier sends a structured prompt and expects a strict JSON
//! answer; anything else is reported as malformed and the deterministic
//! keyword classifier takes over. `OfflineOracle` is the default wiring
//! when no model endpoint is configured, and `ScriptedOracle` drives the
//! classifier in tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ProviderError;

pub const ORACLE_SERVICE: &str = "language-oracle";

/// Completes a prompt with model-generated text.
#[async_trait]
pub trait LanguageOracle: Send + Sync {
    /// Return the raw completion for the prompt.
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

// ---------------------------------------------------------------------------
// OfflineOracle - default when no model endpoint is configured
// ---------------------------------------------------------------------------

/// Oracle stand-in that reports itself unavailable on every call.
///
/// Wired by default so the assistant runs with no model endpoint: every
/// classification falls through to the keyword classifier, which is exactly
/// the degraded path a real outage would exercise.
#[derive(Clone, Debug, Default)]
pub struct OfflineOracle;

impl OfflineOracle {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LanguageOracle for OfflineOracle {
    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        debug!("offline oracle consulted, reporting unavailable");
        Err(ProviderError::Unavailable {
            service: ORACLE_SERVICE.to_string(),
            reason: "offline mode".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedOracle - queued completions for tests
// ---------------------------------------------------------------------------

/// Test oracle that replays queued responses in order and records every
/// prompt it receives. An exhausted script reports unavailable.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful completion.
    pub fn push_completion(&self, text: impl Into<String>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Ok(text.into()));
        }
    }

    /// Queue a failure.
    pub fn push_failure(&self, error: ProviderError) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Err(error));
        }
    }

    /// Every prompt seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageOracle for ScriptedOracle {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let next = self
            .responses
            .lock()
            .map_err(|e| ProviderError::Storage(format!("scripted oracle lock poisoned: {e}")))?
            .pop_front();

        next.unwrap_or_else(|| {
            Err(ProviderError::Unavailable {
                service: ORACLE_SERVICE.to_string(),
                reason: "script exhausted".to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_oracle_is_always_unavailable() {
        let oracle = OfflineOracle::new();
        let result = oracle.complete("classify this").await;
        assert!(matches!(
            result,
            Err(ProviderError::Unavailable { service, .. }) if service == ORACLE_SERVICE
        ));
    }

    #[tokio::test]
    async fn test_scripted_oracle_replays_in_order() {
        let oracle = ScriptedOracle::new();
        oracle.push_completion("first");
        oracle.push_failure(ProviderError::Timeout {
            service: ORACLE_SERVICE.to_string(),
        });
        oracle.push_completion("second");

        assert_eq!(oracle.complete("a").await.unwrap(), "first");
        assert!(matches!(
            oracle.complete("b").await,
            Err(ProviderError::Timeout { .. })
        ));
        assert_eq!(oracle.complete("c").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_scripted_oracle_records_prompts_and_exhausts() {
        let oracle = ScriptedOracle::new();
        oracle.push_completion("only");

        let _ = oracle.complete("prompt one").await;
        let result = oracle.complete("prompt two").await;

        assert!(matches!(result, Err(ProviderError::Unavailable { .. })));
        assert_eq!(oracle.prompts(), vec!["prompt one", "prompt two"]);
    }
}
