//! Skylark API crate - axum HTTP server and route handlers.
//!
//! Provides the REST surface for the Skylark travel assistant: the chat
//! endpoint, session inspection and booking-step submission, booking
//! confirmation/cancellation, breaker administration and health checks.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
