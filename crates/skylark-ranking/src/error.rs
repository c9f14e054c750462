//! Error type for the ranking and comparison operations.

use skylark_core::SkylarkError;
use thiserror::Error;

/// Errors surfaced by scoring, recommendation, and comparison.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RankingError {
    /// No flights were provided. Scoring requires at least one.
    #[error("cannot rank an empty flight set")]
    EmptySet,

    /// Comparison needs at least two flights to say anything useful.
    #[error("comparison requires at least 2 flights, got {0}")]
    NotEnoughFlights(usize),
}

impl From<RankingError> for SkylarkError {
    fn from(err: RankingError) -> Self {
        SkylarkError::Validation(err.to_string())
    }
}
