//! Side-by-side comparison of flight options.
//!
//! Comparison is relative: each flight is tagged with advantages and
//! disadvantages against the set minima for price, duration, and stop
//! count, plus a departure-hour convenience tag.

use chrono::Timelike;
use serde::Serialize;

use skylark_core::types::FlightResult;

use crate::error::RankingError;

/// One flight's standing relative to the rest of the compared set.
#[derive(Clone, Debug, Serialize)]
pub struct ComparisonEntry {
    pub flight: FlightResult,
    pub advantages: Vec<String>,
    pub disadvantages: Vec<String>,
}

/// Compare two or more flights against each other.
///
/// Returns one entry per input flight, in input order. Fewer than two
/// flights is an error: a comparison of one thing says nothing.
pub fn compare_flights(flights: &[FlightResult]) -> Result<Vec<ComparisonEntry>, RankingError> {
    if flights.len() < 2 {
        return Err(RankingError::NotEnoughFlights(flights.len()));
    }

    let min_price = flights.iter().map(|f| f.price).fold(f64::INFINITY, f64::min);
    let min_duration = flights
        .iter()
        .map(|f| f.duration_minutes)
        .min()
        .unwrap_or(0);
    let min_stops = flights.iter().map(|f| f.stops).min().unwrap_or(0);

    let entries = flights
        .iter()
        .map(|flight| {
            let mut advantages = Vec::new();
            let mut disadvantages = Vec::new();

            if flight.price == min_price {
                advantages.push("lowest price".to_string());
            } else {
                disadvantages.push(format!(
                    "${:.2} more than the cheapest option",
                    flight.price - min_price
                ));
            }

            if flight.duration_minutes == min_duration {
                advantages.push("shortest duration".to_string());
            } else {
                disadvantages.push(format!(
                    "{} longer than the fastest option",
                    format_minutes(flight.duration_minutes - min_duration)
                ));
            }

            if flight.stops == 0 {
                advantages.push("direct flight".to_string());
            } else if flight.stops == min_stops {
                advantages.push("fewest stops".to_string());
            } else {
                let noun = if flight.stops == 1 { "stop" } else { "stops" };
                disadvantages.push(format!("{} {noun}", flight.stops));
            }

            let hour = flight.departure_time.hour();
            if (8..=18).contains(&hour) {
                advantages.push("convenient departure time".to_string());
            } else if hour < 6 || hour > 22 {
                disadvantages.push("inconvenient departure time".to_string());
            }

            ComparisonEntry {
                flight: flight.clone(),
                advantages,
                disadvantages,
            }
        })
        .collect();

    Ok(entries)
}

fn format_minutes(minutes: u32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours > 0 {
        format!("{hours}h {rest:02}m")
    } else {
        format!("{minutes}m")
    }
}

// ============================================================================
// Tests
// ============================================================================
