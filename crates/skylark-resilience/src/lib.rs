//! Resilience primitives for calls to external collaborators.
//!
//! Every fallible collaborator call in Skylark runs through these two
//! guards:
//! - [`CircuitBreaker`]: stops calling a failing service for a cooldown
//!   period and substitutes a fallback where one exists.
//! - [`RetryPolicy`]: retries transient failures with exponential backoff
//!   and jitter.
//!
//! Both are plain injected values with no global state, so tests can build
//! isolated instances with aggressive timings.

pub mod breaker;
pub mod retry;

pub use breaker::{BreakerConfig, BreakerSnapshot, BreakerStatus, CallError, CircuitBreaker};
pub use retry::RetryPolicy;
