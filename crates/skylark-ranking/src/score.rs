//! Multi-factor flight scoring.
//!
//! Every flight in a result set receives a weighted sum of five sub-scores:
//! price, duration, stop count, departure time, and airline. Price and
//! duration are min-max normalized within the set, so a score is only
//! meaningful relative to the other flights scored alongside it.

use chrono::Timelike;
use serde::Serialize;
use tracing::trace;

use skylark_core::types::{BudgetRange, FlightResult, TimeOfDay, TravelPreferences};

use crate::error::RankingError;

// ============================================================================
// Weights
// ============================================================================

/// Weight applied to the normalized duration score.
pub const DURATION_WEIGHT: f64 = 0.25;

/// Weight applied to the stop-count score.
pub const STOPS_WEIGHT: f64 = 0.20;

/// Weight applied to the departure-time score.
pub const TIME_WEIGHT: f64 = 0.15;

/// Weight applied to the airline score.
pub const AIRLINE_WEIGHT: f64 = 0.10;

/// Price weight, driven by the traveller's budget preference.
///
/// Budget travellers weigh price at 0.50, premium travellers at 0.15,
/// everyone else (mid-range or unstated) at 0.30.
pub fn price_weight(budget: Option<BudgetRange>) -> f64 {
    match budget {
        Some(BudgetRange::Budget) => 0.50,
        Some(BudgetRange::Premium) => 0.15,
        Some(BudgetRange::MidRange) | None => 0.30,
    }
}

// ============================================================================
// Categories
// ============================================================================

/// The headline role a flight plays within its result set.
///
/// Assignment is first-match per flight: cheapest, then fastest, then most
/// convenient (nonstop, provided the set contains a nonstop flight at all),
/// then best value for everything left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightCategory {
    Cheapest,
    Fastest,
    MostConvenient,
    BestValue,
}

impl FlightCategory {
    /// All categories in assignment (and alternative-picking) order.
    pub const ALL: [FlightCategory; 4] = [
        FlightCategory::Cheapest,
        FlightCategory::Fastest,
        FlightCategory::MostConvenient,
        FlightCategory::BestValue,
    ];

    /// Human-readable label used in chat responses.
    pub fn label(&self) -> &'static str {
        match self {
            FlightCategory::Cheapest => "cheapest",
            FlightCategory::Fastest => "fastest",
            FlightCategory::MostConvenient => "most convenient",
            FlightCategory::BestValue => "best value",
        }
    }
}

impl std::fmt::Display for FlightCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Scored flights
// ============================================================================

/// A flight annotated with its weighted score, its category within the
/// set, and short highlight phrases for response composition.
#[derive(Clone, Debug, Serialize)]
pub struct ScoredFlight {
    pub flight: FlightResult,
    /// Weighted sum of the five sub-scores.
    pub score: f64,
    pub category: FlightCategory,
    pub highlights: Vec<String>,
}

/// Per-set extrema used for normalization and category assignment.
struct SetBounds {
    min_price: f64,
    max_price: f64,
    min_duration: u32,
    max_duration: u32,
    has_nonstop: bool,
}

impl SetBounds {
    fn of(flights: &[FlightResult]) -> Self {
        let mut bounds = SetBounds {
            min_price: f64::INFINITY,
            max_price: f64::NEG_INFINITY,
            min_duration: u32::MAX,
            max_duration: 0,
            has_nonstop: false,
        };
        for flight in flights {
            bounds.min_price = bounds.min_price.min(flight.price);
            bounds.max_price = bounds.max_price.max(flight.price);
            bounds.min_duration = bounds.min_duration.min(flight.duration_minutes);
            bounds.max_duration = bounds.max_duration.max(flight.duration_minutes);
            bounds.has_nonstop |= flight.stops == 0;
        }
        bounds
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// Score every flight in `flights` against `prefs`.
///
/// Returns the set sorted by descending score; ties keep input order.
/// Errors on an empty set, since min-max normalization needs at least one
/// flight.
pub fn score_flights(
    flights: &[FlightResult],
    prefs: &TravelPreferences,
) -> Result<Vec<ScoredFlight>, RankingError> {
    if flights.is_empty() {
        return Err(RankingError::EmptySet);
    }

    let bounds = SetBounds::of(flights);
    let mut scored: Vec<ScoredFlight> = flights
        .iter()
        .map(|flight| score_one(flight, prefs, &bounds))
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    trace!(count = scored.len(), "scored flight set");
    Ok(scored)
}

fn score_one(flight: &FlightResult, prefs: &TravelPreferences, bounds: &SetBounds) -> ScoredFlight {
    let price = price_score(flight.price, bounds.min_price, bounds.max_price);
    let duration = duration_score(
        flight.duration_minutes,
        bounds.min_duration,
        bounds.max_duration,
    );
    let stops = stops_score(flight.stops);
    let time = time_score(flight.departure_time.hour(), prefs.time_of_day);
    let airline = airline_score(&flight.airline, prefs.airlines.as_deref());

    let score = price * price_weight(prefs.budget)
        + duration * DURATION_WEIGHT
        + stops * STOPS_WEIGHT
        + time * TIME_WEIGHT
        + airline * AIRLINE_WEIGHT;

    ScoredFlight {
        category: categorize(flight, bounds),
        highlights: highlights_for(flight, prefs, bounds),
        flight: flight.clone(),
        score,
    }
}

/// Min-max normalized price score. When every flight in the set costs the
/// same, the denominator collapses and everyone scores 1.0.
fn price_score(price: f64, min: f64, max: f64) -> f64 {
    if (max - min).abs() < f64::EPSILON {
        1.0
    } else {
        (max - price) / (max - min)
    }
}

fn duration_score(minutes: u32, min: u32, max: u32) -> f64 {
    if max == min {
        1.0
    } else {
        f64::from(max - minutes) / f64::from(max - min)
    }
}

/// Stop-count score: nonstop 1.0, one stop 0.6, two or more 0.3.
pub fn stops_score(stops: u32) -> f64 {
    match stops {
        0 => 1.0,
        1 => 0.6,
        _ => 0.3,
    }
}

/// Departure-time score against the preferred window.
///
/// With a stated preference: 1.0 inside the window, 0.3 outside. With no
/// preference: 0.8 for daytime departures (hours 06-22) and 0.4 for
/// red-eyes.
fn time_score(hour: u32, pref: Option<TimeOfDay>) -> f64 {
    match pref {
        Some(window) if in_window(hour, window) => 1.0,
        Some(_) => 0.3,
        None if (6..=22).contains(&hour) => 0.8,
        None => 0.4,
    }
}

/// Departure windows: morning 05:00-11:59, afternoon 12:00-17:59, evening
/// 18:00-22:59.
fn in_window(hour: u32, window: TimeOfDay) -> bool {
    match window {
        TimeOfDay::Morning => (5..=11).contains(&hour),
        TimeOfDay::Afternoon => (12..=17).contains(&hour),
        TimeOfDay::Evening => (18..=22).contains(&hour),
    }
}

/// Airline score: 1.0 for a preferred airline, 0.2 for any other airline
/// once a preference exists, 0.5 when the traveller never stated one.
fn airline_score(airline: &str, preferred: Option<&[String]>) -> f64 {
    match preferred {
        Some(list) if !list.is_empty() => {
            if list.iter().any(|name| airline_matches(airline, name)) {
                1.0
            } else {
                0.2
            }
        }
        _ => 0.5,
    }
}

/// Case-insensitive airline match. Travellers often give a partial name
/// ("Meridian" for "Meridian Air"), so containment counts as a match.
fn airline_matches(airline: &str, preferred: &str) -> bool {
    let airline = airline.to_lowercase();
    let preferred = preferred.trim().to_lowercase();
    !preferred.is_empty() && (airline == preferred || airline.contains(&preferred))
}

/// First-match category assignment.
fn categorize(flight: &FlightResult, bounds: &SetBounds) -> FlightCategory {
    if flight.price == bounds.min_price {
        FlightCategory::Cheapest
    } else if flight.duration_minutes == bounds.min_duration {
        FlightCategory::Fastest
    } else if bounds.has_nonstop && flight.stops == 0 {
        FlightCategory::MostConvenient
    } else {
        FlightCategory::BestValue
    }
}

fn highlights_for(
    flight: &FlightResult,
    prefs: &TravelPreferences,
    bounds: &SetBounds,
) -> Vec<String> {
    let mut highlights = Vec::new();
    if flight.price == bounds.min_price {
        highlights.push("lowest price in this set".to_string());
    }
    if flight.duration_minutes == bounds.min_duration {
        highlights.push("shortest travel time".to_string());
    }
    if flight.stops == 0 {
        highlights.push("direct flight".to_string());
    }
    if let Some(window) = prefs.time_of_day {
        if in_window(flight.departure_time.hour(), window) {
            highlights.push(format!(
                "departs in your preferred {} window",
                window_label(window)
            ));
        }
    }
    if let Some(list) = prefs.airlines.as_deref() {
        if list.iter().any(|name| airline_matches(&flight.airline, name)) {
            highlights.push(format!("operated by {}", flight.airline));
        }
    }
    highlights
}

fn window_label(window: TimeOfDay) -> &'static str {
    match window {
        TimeOfDay::Morning => "morning",
        TimeOfDay::Afternoon => "afternoon",
        TimeOfDay::Evening => "evening",
    }
}

// ============================================================================
// Tests
// ============================================================================
