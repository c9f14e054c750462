//! Recommendation assembly: one primary pick plus categorized alternatives.

use serde::Serialize;
use tracing::debug;

use skylark_core::types::{FlightResult, PriorityFactor, TravelPreferences};

use crate::error::RankingError;
use crate::score::{score_flights, FlightCategory, ScoredFlight};

/// Maximum number of alternatives returned alongside the primary pick.
const MAX_ALTERNATIVES: usize = 3;

/// A ranked recommendation: the primary flight and up to three
/// alternatives drawn from the remaining categories.
#[derive(Clone, Debug, Serialize)]
pub struct Recommendation {
    pub primary: ScoredFlight,
    pub alternatives: Vec<ScoredFlight>,
}

/// Build a recommendation for `flights` under `prefs`.
///
/// The primary pick walks the traveller's stated priorities front to back
/// (price -> cheapest, duration -> fastest, convenience -> most
/// convenient) and takes the top-scoring flight of the first category that
/// has one. With no priorities stated, or none of them matched, the
/// highest-scoring flight overall wins. Alternatives are the top flight of
/// each remaining category, deduplicated against the primary.
pub fn recommend(
    flights: &[FlightResult],
    prefs: &TravelPreferences,
) -> Result<Recommendation, RankingError> {
    let scored = score_flights(flights, prefs)?;
    let primary = pick_primary(&scored, &prefs.priorities).ok_or(RankingError::EmptySet)?;
    let alternatives = pick_alternatives(&scored, &primary);

    debug!(
        primary = %primary.flight.id,
        category = %primary.category,
        alternatives = alternatives.len(),
        "assembled recommendation"
    );
    Ok(Recommendation {
        primary,
        alternatives,
    })
}

fn category_for(priority: PriorityFactor) -> FlightCategory {
    match priority {
        PriorityFactor::Price => FlightCategory::Cheapest,
        PriorityFactor::Duration => FlightCategory::Fastest,
        PriorityFactor::Convenience => FlightCategory::MostConvenient,
    }
}

/// `scored` arrives sorted by descending score, so the first hit in a
/// category is also its top-scoring member.
fn pick_primary(scored: &[ScoredFlight], priorities: &[PriorityFactor]) -> Option<ScoredFlight> {
    for priority in priorities {
        let wanted = category_for(*priority);
        if let Some(hit) = scored.iter().find(|s| s.category == wanted) {
            return Some(hit.clone());
        }
    }
    scored.first().cloned()
}

fn pick_alternatives(scored: &[ScoredFlight], primary: &ScoredFlight) -> Vec<ScoredFlight> {
    let mut alternatives = Vec::new();
    for category in FlightCategory::ALL {
        if category == primary.category {
            continue;
        }
        if let Some(hit) = scored.iter().find(|s| s.category == category) {
            if hit.flight.id != primary.flight.id {
                alternatives.push(hit.clone());
            }
        }
    }
    alternatives.truncate(MAX_ALTERNATIVES);
    alternatives
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use skylark_core::types::BudgetRange;

    fn departure(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 14, hour, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    fn flight(id: &str, price: f64, duration_minutes: u32, stops: u32) -> FlightResult {
        let departure_time = departure(10);
        FlightResult {
            id: id.to_string(),
            airline: "Meridian Air".to_string(),
            flight_number: format!("SK{id}"),
            origin: "SEA".to_string(),
            destination: "DEN".to_string(),
            departure_time,
            arrival_time: departure_time + Duration::minutes(i64::from(duration_minutes)),
            duration_minutes,
            stops,
            price,
            available_seats: 5,
        }
    }

    /// Four flights covering all four categories.
    fn full_spread() -> Vec<FlightResult> {
        vec![
            flight("cheap", 150.0, 300, 1),
            flight("fast", 400.0, 170, 1),
            flight("direct", 350.0, 220, 0),
            flight("rest", 300.0, 260, 1),
        ]
    }

    fn prefs_with_priorities(priorities: Vec<PriorityFactor>) -> TravelPreferences {
        TravelPreferences {
            priorities,
            ..TravelPreferences::default()
        }
    }

    // ---- primary selection ----

    #[test]
    fn price_priority_picks_the_cheapest_category() {
        // A premium budget keeps the cheap flight's raw score low, so the
        // priority walk, not the score order, must pick it.
        let prefs = TravelPreferences {
            budget: Some(BudgetRange::Premium),
            priorities: vec![PriorityFactor::Price],
            ..TravelPreferences::default()
        };
        let rec = recommend(&full_spread(), &prefs).unwrap();
        assert_eq!(rec.primary.flight.id, "cheap");
        assert_eq!(rec.primary.category, FlightCategory::Cheapest);
    }

    #[test]
    fn duration_priority_picks_the_fastest_category() {
        let prefs = prefs_with_priorities(vec![PriorityFactor::Duration]);
        let rec = recommend(&full_spread(), &prefs).unwrap();
        assert_eq!(rec.primary.flight.id, "fast");
    }

    #[test]
    fn convenience_priority_picks_the_nonstop() {
        let prefs = prefs_with_priorities(vec![PriorityFactor::Convenience]);
        let rec = recommend(&full_spread(), &prefs).unwrap();
        assert_eq!(rec.primary.flight.id, "direct");
    }

    #[test]
    fn unmatched_priority_falls_through_to_the_next_one() {
        // No nonstop in the set, so convenience cannot match and the
        // walk moves on to price.
        let flights = vec![
            flight("cheap", 150.0, 300, 1),
            flight("fast", 400.0, 170, 2),
        ];
        let prefs =
            prefs_with_priorities(vec![PriorityFactor::Convenience, PriorityFactor::Price]);
        let rec = recommend(&flights, &prefs).unwrap();
        assert_eq!(rec.primary.flight.id, "cheap");
    }

    #[test]
    fn no_priorities_means_highest_score_wins() {
        let flights = vec![
            flight("middling", 400.0, 300, 2),
            flight("strong", 200.0, 180, 0),
        ];
        let rec = recommend(&flights, &TravelPreferences::default()).unwrap();
        assert_eq!(rec.primary.flight.id, "strong");
    }

    // ---- alternatives ----

    #[test]
    fn alternatives_cover_the_remaining_categories() {
        let prefs = prefs_with_priorities(vec![PriorityFactor::Price]);
        let rec = recommend(&full_spread(), &prefs).unwrap();

        assert_eq!(rec.alternatives.len(), 3);
        let categories: Vec<FlightCategory> =
            rec.alternatives.iter().map(|s| s.category).collect();
        assert_eq!(
            categories,
            vec![
                FlightCategory::Fastest,
                FlightCategory::MostConvenient,
                FlightCategory::BestValue,
            ]
        );
        assert!(rec
            .alternatives
            .iter()
            .all(|s| s.flight.id != rec.primary.flight.id));
    }

    #[test]
    fn alternatives_deduplicate_against_the_primary() {
        // Two flights: the primary is the cheapest, the other is the
        // fastest. Only one alternative can exist.
        let flights = vec![
            flight("cheap", 150.0, 300, 1),
            flight("fast", 400.0, 170, 1),
        ];
        let prefs = prefs_with_priorities(vec![PriorityFactor::Price]);
        let rec = recommend(&flights, &prefs).unwrap();

        assert_eq!(rec.primary.flight.id, "cheap");
        assert_eq!(rec.alternatives.len(), 1);
        assert_eq!(rec.alternatives[0].flight.id, "fast");
    }

    #[test]
    fn single_flight_has_no_alternatives() {
        let flights = vec![flight("only", 250.0, 200, 0)];
        let rec = recommend(&flights, &TravelPreferences::default()).unwrap();
        assert_eq!(rec.primary.flight.id, "only");
        assert!(rec.alternatives.is_empty());
    }

    #[test]
    fn empty_set_is_rejected() {
        let err = recommend(&[], &TravelPreferences::default()).unwrap_err();
        assert_eq!(err, RankingError::EmptySet);
    }
}
