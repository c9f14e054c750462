//! Per-conversation session state.
//!
//! A session accumulates everything one conversation has established so far:
//! message history (capped FIFO), extracted travel parameters and
//! preferences, the latest search results, and booking-flow progress.
//! [`store::SessionStore`] owns all sessions behind a mutex and evicts idle
//! ones on a sweep interval.

pub mod error;
pub mod store;
pub mod types;

pub use error::SessionError;
pub use store::SessionStore;
pub use types::{ConversationMessage, MessageRole, Session, MAX_HISTORY_MESSAGES};
