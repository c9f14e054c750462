//! Flight ranking, recommendation, and comparison.
//!
//! Pure functions over flight result sets: no I/O, no shared state. The
//! dialogue layer feeds stored search results through this crate whenever
//! a conversation needs an ordered list, a recommendation, or a
//! side-by-side comparison.

pub mod compare;
pub mod error;
pub mod recommend;
pub mod score;

pub use compare::{compare_flights, ComparisonEntry};
pub use error::RankingError;
pub use recommend::{recommend, Recommendation};
pub use score::{price_weight, score_flights, stops_score, FlightCategory, ScoredFlight};
