use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current Unix timestamp in seconds. All session and booking bookkeeping
/// uses epoch seconds; flight times keep full `DateTime<Utc>` precision.
pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

// =============================================================================
// Enums
// =============================================================================

/// How firm the traveller is about the requested dates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFlexibility {
    /// Only the stated dates are acceptable.
    #[default]
    Exact,
    /// Nearby dates are fine if they improve price or routing.
    Flexible,
}

/// Stated spending appetite. Drives the price weight during ranking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetRange {
    /// Price-sensitive: price dominates the score.
    Budget,
    /// Balanced between price and comfort.
    MidRange,
    /// Comfort first: price barely matters.
    Premium,
}

/// Preferred departure window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    /// 05:00-11:59 departures.
    Morning,
    /// 12:00-17:59 departures.
    Afternoon,
    /// 18:00-22:59 departures.
    Evening,
}

/// Tolerance for connections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPreference {
    /// Nonstop only.
    Direct,
    /// At most one connection.
    OneStop,
    /// Any routing is acceptable.
    Flexible,
}

/// A ranking factor the traveller has asked to prioritize, in the order
/// stated. The recommendation walk consumes this list front to back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityFactor {
    Price,
    Duration,
    Convenience,
}

/// Lifecycle state of a booking record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

/// One of the five ordered booking milestones.
///
/// Steps are never persisted on their own — completion is always derived
/// from session fields. Names round-trip through `name`/`from_name` because
/// step identifiers arrive as strings from the HTTP surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStep {
    FlightSelection,
    PassengerInfo,
    ContactInfo,
    Payment,
    Confirmation,
}

impl BookingStep {
    /// All steps in booking order.
    pub const ALL: [BookingStep; 5] = [
        BookingStep::FlightSelection,
        BookingStep::PassengerInfo,
        BookingStep::ContactInfo,
        BookingStep::Payment,
        BookingStep::Confirmation,
    ];

    /// The wire name of this step.
    pub fn name(&self) -> &'static str {
        match self {
            BookingStep::FlightSelection => "flight_selection",
            BookingStep::PassengerInfo => "passenger_info",
            BookingStep::ContactInfo => "contact_info",
            BookingStep::Payment => "payment",
            BookingStep::Confirmation => "confirmation",
        }
    }

    /// Parse a wire name. Returns `None` for anything outside the five steps.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "flight_selection" => Some(BookingStep::FlightSelection),
            "passenger_info" => Some(BookingStep::PassengerInfo),
            "contact_info" => Some(BookingStep::ContactInfo),
            "payment" => Some(BookingStep::Payment),
            "confirmation" => Some(BookingStep::Confirmation),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Flights
// =============================================================================

/// Normalized flight summary supplied by the search collaborator.
/// Read-only to the orchestration engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlightResult {
    pub id: String,
    pub airline: String,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub stops: u32,
    pub price: f64,
    pub available_seats: u32,
}

/// A fully specified search request for the flight index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    pub passengers: u32,
    /// Optional routing filter (e.g. 0 for nonstop only).
    pub max_stops: Option<u32>,
}

// =============================================================================
// Extracted travel parameters
// =============================================================================

/// Travel parameters extracted from conversation so far.
///
/// Partial completion is valid — missing required fields drive clarification
/// prompts rather than errors.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TravelParams {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub passengers: Option<u32>,
    #[serde(default)]
    pub flexibility: DateFlexibility,
}

impl TravelParams {
    /// Passenger count with the default of one traveller applied.
    pub fn passenger_count(&self) -> u32 {
        self.passengers.unwrap_or(1)
    }

    /// Overlay `newer` onto `self`: populated fields win, absent fields keep
    /// the existing value. Flexibility follows the newer statement only when
    /// it differs from the default.
    pub fn merge(&mut self, newer: &TravelParams) {
        if newer.origin.is_some() {
            self.origin = newer.origin.clone();
        }
        if newer.destination.is_some() {
            self.destination = newer.destination.clone();
        }
        if newer.departure_date.is_some() {
            self.departure_date = newer.departure_date;
        }
        if newer.return_date.is_some() {
            self.return_date = newer.return_date;
        }
        if newer.passengers.is_some() {
            self.passengers = newer.passengers;
        }
        if newer.flexibility != DateFlexibility::default() {
            self.flexibility = newer.flexibility;
        }
    }

    /// Names of required fields still missing, in a stable order.
    /// A search needs origin, destination, and a departure date.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.origin.is_none() {
            missing.push("origin");
        }
        if self.destination.is_none() {
            missing.push("destination");
        }
        if self.departure_date.is_none() {
            missing.push("departure date");
        }
        missing
    }

    /// Build a search query if all required fields are present.
    pub fn to_query(&self) -> Option<FlightQuery> {
        Some(FlightQuery {
            origin: self.origin.clone()?,
            destination: self.destination.clone()?,
            date: self.departure_date?,
            passengers: self.passenger_count(),
            max_stops: None,
        })
    }
}

// =============================================================================
// Preferences
// =============================================================================

/// Stated traveller preferences. Every field is optional; absent fields fall
/// back to the ranking engine's neutral defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TravelPreferences {
    pub budget: Option<BudgetRange>,
    pub time_of_day: Option<TimeOfDay>,
    pub stops: Option<StopPreference>,
    /// Priority factors in the order the traveller stated them.
    #[serde(default)]
    pub priorities: Vec<PriorityFactor>,
    /// Preferred airlines, if a list was ever given.
    pub airlines: Option<Vec<String>>,
}

impl TravelPreferences {
    /// Overlay `newer` onto `self`. A newly stated priority list replaces the
    /// old one wholesale; an empty one leaves the old list in place.
    pub fn merge(&mut self, newer: &TravelPreferences) {
        if newer.budget.is_some() {
            self.budget = newer.budget;
        }
        if newer.time_of_day.is_some() {
            self.time_of_day = newer.time_of_day;
        }
        if newer.stops.is_some() {
            self.stops = newer.stops;
        }
        if !newer.priorities.is_empty() {
            self.priorities = newer.priorities.clone();
        }
        if newer.airlines.is_some() {
            self.airlines = newer.airlines.clone();
        }
    }

    /// True when no preference has been stated at all.
    pub fn is_empty(&self) -> bool {
        self.budget.is_none()
            && self.time_of_day.is_none()
            && self.stops.is_none()
            && self.priorities.is_empty()
            && self.airlines.is_none()
    }
}

// =============================================================================
// Booking data
// =============================================================================

/// Passenger identity captured during the passenger_info step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PassengerDetails {
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub passport_number: Option<String>,
}

/// Contact channel captured during the contact_info step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub email: String,
    pub phone: Option<String>,
}

/// Tokenized payment instrument captured during the payment step.
/// The engine never sees raw card data, only an opaque instrument token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub method: String,
    pub instrument_token: String,
}

/// Outcome of a successful charge at the payment gateway.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
}

/// A confirmed (or later cancelled) booking held by the booking store,
/// keyed by its opaque reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub reference: String,
    pub session_id: String,
    pub flight: FlightResult,
    pub passenger: PassengerDetails,
    pub contact: ContactDetails,
    pub receipt: PaymentReceipt,
    pub status: BookingStatus,
    pub created_at: i64,
}

/// A scheduled departure reminder, produced and consumed by maintenance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub booking_reference: String,
    pub due_at: i64,
    pub message: String,
    pub sent: bool,
}
