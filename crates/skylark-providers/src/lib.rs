//! Outbound collaborator traits and their shipped implementations.
//!
//! Every external dependency of the assistant lives behind a trait here:
//! flight inventory ([`search::FlightSearch`]), the language oracle used for
//! intent classification ([`oracle::LanguageOracle`]), the booking ledger
//! ([`booking::BookingStore`]), payment capture ([`payment::PaymentGateway`]),
//! and notification dispatch ([`notify::NotificationDispatcher`]).
//!
//! Each module pairs the trait with the default in-process implementation
//! and a deterministic test double, so the whole assistant runs and is
//! testable without network access. The orchestrator wraps every one of
//! these behind a circuit breaker; implementations report failures through
//! [`error::ProviderError`] and never panic.

pub mod booking;
pub mod error;
pub mod notify;
pub mod oracle;
pub mod payment;
pub mod search;

pub use booking::{new_booking_reference, BookingStore, MemoryBookingStore};
pub use error::ProviderError;
pub use notify::{CountingNotifier, LogNotifier, NotificationDispatcher, NOTIFY_SERVICE};
pub use oracle::{LanguageOracle, OfflineOracle, ScriptedOracle, ORACLE_SERVICE};
pub use payment::{ApprovingGateway, DecliningGateway, PaymentGateway, PAYMENT_SERVICE};
pub use search::{
    fallback_flights, FlightSearch, MockFlightSearch, StaticFlightIndex, SEARCH_SERVICE,
};
