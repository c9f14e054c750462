//! Flight inventory access.
//!
//! - `StaticFlightIndex` is the default in-process inventory: it derives a
//!   stable daily schedule from the route, so repeated queries see the same
//!   flights without any network access.
//! - [`fallback_flights`] is the reduced result set the orchestrator
//!   substitutes when the live search path is failing or its circuit is open.
//! - `MockFlightSearch` is a scriptable double for tests, with fail-next-N
//!   fault injection.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::debug;

use skylark_core::types::{FlightQuery, FlightResult};

use crate::error::ProviderError;

/// Canonical service name for the flight inventory, used by its circuit
/// breaker and in error reports.
pub const SEARCH_SERVICE: &str = "flight-search";

/// Searches the flight inventory for itineraries matching a query.
#[async_trait]
pub trait FlightSearch: Send + Sync {
    /// Return every flight matching the query, soonest departure first.
    async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightResult>, ProviderError>;

    /// Look up a single flight by id. `Ok(None)` when the flight is no
    /// longer listed, which is not an error.
    async fn get_by_id(&self, id: &str) -> Result<Option<FlightResult>, ProviderError>;
}

// ---------------------------------------------------------------------------
// StaticFlightIndex - deterministic in-process inventory
// ---------------------------------------------------------------------------

const AIRLINES: [(&str, &str); 5] = [
    ("Meridian Air", "MA"),
    ("Pacifica Airways", "PA"),
    ("Northwind", "NW"),
    ("Atlas Connect", "AC"),
    ("Corsair Jet", "CJ"),
];

/// Scheduled departure hours for each route, spread across the day so every
/// time-of-day preference has candidates.
const DEPARTURE_HOURS: [u32; 8] = [6, 8, 10, 12, 14, 16, 19, 21];

/// In-process flight inventory with a deterministic daily schedule per route.
///
/// The schedule, durations, and fares are derived from a hash of the route,
/// so "NYC to LON" always offers the same flights while "NYC to PAR" offers
/// different ones. Identical queries always return identical results.
///
/// Flights already handed out are remembered, so lookups by id resolve
/// without the original route context.
#[derive(Debug, Default)]
pub struct StaticFlightIndex {
    served: Mutex<HashMap<String, FlightResult>>,
}

impl StaticFlightIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn route_seed(origin: &str, destination: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        origin.trim().to_uppercase().hash(&mut hasher);
        destination.trim().to_uppercase().hash(&mut hasher);
        hasher.finish()
    }

    fn build_schedule(query: &FlightQuery) -> Vec<FlightResult> {
        let seed = Self::route_seed(&query.origin, &query.destination);
        let route_minutes = 75 + (seed % 420) as u32;
        let base_price = 140.0 + (seed % 240) as f64;

        let mut flights = Vec::with_capacity(DEPARTURE_HOURS.len());
        for (i, &hour) in DEPARTURE_HOURS.iter().enumerate() {
            let slot = seed >> i;
            let stops = match (seed >> (3 * i)) % 4 {
                0 | 1 => 0u32,
                2 => 1,
                _ => 2,
            };
            if let Some(max_stops) = query.max_stops {
                if stops > max_stops {
                    continue;
                }
            }

            let available_seats = 3 + ((seed >> (i + 3)) % 57) as u32;
            if available_seats < query.passengers {
                continue;
            }

            let (airline, code) = AIRLINES[((slot as usize) + i) % AIRLINES.len()];
            let number = 100 + ((seed as u32).wrapping_mul(31).wrapping_add(i as u32 * 53)) % 800;
            let flight_number = format!("{code}{number}");

            let minute = (slot % 4) as u32 * 15;
            let departure_time = departure_at(query.date, hour, minute);
            let duration_minutes = route_minutes + stops * 95;
            let arrival_time = departure_time + Duration::minutes(i64::from(duration_minutes));

            // Peak-hour departures carry a premium, each stop a discount.
            let peak = (6..=9).contains(&hour) || (17..=20).contains(&hour);
            let hour_factor = if peak { 1.22 } else { 1.0 };
            let stop_factor = 1.0 - 0.18 * f64::from(stops);
            let wobble = 1.0 + (slot % 17) as f64 / 100.0;
            let price = round_cents(base_price * hour_factor * stop_factor * wobble);

            flights.push(FlightResult {
                id: format!("{flight_number}-{}", query.date),
                airline: airline.to_string(),
                flight_number,
                origin: query.origin.clone(),
                destination: query.destination.clone(),
                departure_time,
                arrival_time,
                duration_minutes,
                stops,
                price,
                available_seats,
            });
        }

        flights.sort_by_key(|f| (f.departure_time, f.flight_number.clone()));
        flights
    }
}

#[async_trait]
impl FlightSearch for StaticFlightIndex {
    async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightResult>, ProviderError> {
        let flights = Self::build_schedule(query);
        {
            let mut served = self
                .served
                .lock()
                .map_err(|e| ProviderError::Storage(format!("flight index lock poisoned: {e}")))?;
            for flight in &flights {
                served.insert(flight.id.clone(), flight.clone());
            }
        }
        debug!(
            origin = %query.origin,
            destination = %query.destination,
            date = %query.date,
            results = flights.len(),
            "static flight index searched"
        );
        Ok(flights)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<FlightResult>, ProviderError> {
        let served = self
            .served
            .lock()
            .map_err(|e| ProviderError::Storage(format!("flight index lock poisoned: {e}")))?;
        Ok(served.get(id).cloned())
    }
}

fn departure_at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_utc()
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Fallback inventory - substituted when the live search path is down
// ---------------------------------------------------------------------------

/// Reduced placeholder inventory for when flight search is unavailable.
///
/// Deliberately small so a degraded answer is recognizable as one; the
/// orchestrator flags responses built from these results.
pub fn fallback_flights(query: &FlightQuery) -> Vec<FlightResult> {
    let direct_departure = departure_at(query.date, 9, 0);
    let one_stop_departure = departure_at(query.date, 15, 30);

    let mut flights = vec![
        FlightResult {
            id: format!("SS901-{}", query.date),
            airline: "Skyline Shuttle".to_string(),
            flight_number: "SS901".to_string(),
            origin: query.origin.clone(),
            destination: query.destination.clone(),
            departure_time: direct_departure,
            arrival_time: direct_departure + Duration::minutes(195),
            duration_minutes: 195,
            stops: 0,
            price: 219.0,
            available_seats: 9,
        },
        FlightResult {
            id: format!("SS902-{}", query.date),
            airline: "Skyline Shuttle".to_string(),
            flight_number: "SS902".to_string(),
            origin: query.origin.clone(),
            destination: query.destination.clone(),
            departure_time: one_stop_departure,
            arrival_time: one_stop_departure + Duration::minutes(305),
            duration_minutes: 305,
            stops: 1,
            price: 164.0,
            available_seats: 9,
        },
    ];

    if let Some(max_stops) = query.max_stops {
        flights.retain(|f| f.stops <= max_stops);
    }
    flights.retain(|f| f.available_seats >= query.passengers);
    flights
}

// ---------------------------------------------------------------------------
// MockFlightSearch - scriptable double with fault injection
// ---------------------------------------------------------------------------

/// Test double returning a fixed flight list, with fail-next-N injection.
#[derive(Debug, Default)]
pub struct MockFlightSearch {
    flights: Mutex<Vec<FlightResult>>,
    queries: Mutex<Vec<FlightQuery>>,
    fail_next: AtomicU32,
    calls: AtomicU32,
}

impl MockFlightSearch {
    pub fn new(flights: Vec<FlightResult>) -> Self {
        Self {
            flights: Mutex::new(flights),
            queries: Mutex::new(Vec::new()),
            fail_next: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    /// Make the next `n` calls fail with `Unavailable` before recovering.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Replace the flight list returned by subsequent calls.
    pub fn set_flights(&self, flights: Vec<FlightResult>) {
        if let Ok(mut guard) = self.flights.lock() {
            *guard = flights;
        }
    }

    /// Number of times `search` has been invoked, including failed calls.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every query passed to `search`, in call order.
    pub fn queries(&self) -> Vec<FlightQuery> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FlightSearch for MockFlightSearch {
    async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }

        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ProviderError::Unavailable {
                service: SEARCH_SERVICE.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let flights = self
            .flights
            .lock()
            .map_err(|e| ProviderError::Storage(format!("mock flight lock poisoned: {e}")))?;
        Ok(flights.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<FlightResult>, ProviderError> {
        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ProviderError::Unavailable {
                service: SEARCH_SERVICE.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let flights = self
            .flights
            .lock()
            .map_err(|e| ProviderError::Storage(format!("mock flight lock poisoned: {e}")))?;
        Ok(flights.iter().find(|f| f.id == id).cloned())
    }
}
