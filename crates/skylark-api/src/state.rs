//! Application state shared across all route handlers.
//!
//! AppState is passed to handlers via axum's State extractor. It is a thin
//! bundle of `Arc`s, so cloning per request is cheap.

use std::sync::Arc;
use std::time::Instant;

use skylark_core::config::SkylarkConfig;
use skylark_dialogue::Orchestrator;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, fixed for the process lifetime.
    pub config: Arc<SkylarkConfig>,
    /// The conversation engine every endpoint delegates to.
    pub orchestrator: Arc<Orchestrator>,
    /// Server start time for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: SkylarkConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            start_time: Instant::now(),
        }
    }
}
