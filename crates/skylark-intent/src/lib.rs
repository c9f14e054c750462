//! Intent classification and deterministic entity extraction.
//!
//! The classifier asks the language oracle first and falls back to fixed
//! keyword rules when the oracle is unavailable or unparseable, so every
//! message always resolves to exactly one typed [`classify::Intent`].

pub mod classify;
pub mod extract;

pub use classify::{
    Classification, ClassificationSource, Intent, IntentClassifier, IntentKind,
};
pub use extract::{extract_preferences, extract_selection, extract_travel_params};
