//! Benchmarks for scoring and recommending over realistic result sets.
//!
//! Provider pages rarely exceed a few dozen flights per route and day, so
//! 64 is treated as the realistic upper bound. Scoring is O(n) with two
//! passes (bounds, then per-flight scores) plus a sort; all sizes here
//! should finish in well under a millisecond.

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};

use skylark_core::types::{
    BudgetRange, FlightResult, PriorityFactor, TimeOfDay, TravelPreferences,
};
use skylark_ranking::{recommend, score_flights};

/// Result-set sizes to measure.
const SET_SIZES: [usize; 3] = [8, 32, 64];

fn departure(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 14, hour, 0, 0)
        .single()
        .expect("valid benchmark timestamp")
}

/// Deterministic spread of prices, durations, stops, and departure hours.
fn build_flights(count: usize) -> Vec<FlightResult> {
    (0..count)
        .map(|i| {
            let hour = 6 + (i % 16) as u32;
            let duration_minutes = 180 + ((i * 37) % 240) as u32;
            let departure_time = departure(hour);
            FlightResult {
                id: format!("SK{:03}-2026-09-14", 100 + i),
                airline: ["Meridian Air", "Pacifica Airways", "Northwind"][i % 3].to_string(),
                flight_number: format!("SK{:03}", 100 + i),
                origin: "SEA".to_string(),
                destination: "DEN".to_string(),
                departure_time,
                arrival_time: departure_time + Duration::minutes(i64::from(duration_minutes)),
                duration_minutes,
                stops: (i % 3) as u32,
                price: 180.0 + ((i * 53) % 400) as f64,
                available_seats: 4 + (i % 9) as u32,
            }
        })
        .collect()
}

/// Preferences exercising every sub-score path.
fn full_preferences() -> TravelPreferences {
    TravelPreferences {
        budget: Some(BudgetRange::Budget),
        time_of_day: Some(TimeOfDay::Morning),
        stops: None,
        priorities: vec![PriorityFactor::Price, PriorityFactor::Duration],
        airlines: Some(vec!["Meridian Air".to_string()]),
    }
}

fn bench_score_flights(c: &mut Criterion) {
    let prefs = full_preferences();
    let mut group = c.benchmark_group("score_flights");
    for size in SET_SIZES {
        let flights = build_flights(size);
        group.bench_function(format!("{size}_flights"), |b| {
            b.iter(|| score_flights(&flights, &prefs).expect("scoring failed"));
        });
    }
    group.finish();
}

fn bench_recommend(c: &mut Criterion) {
    let prefs = full_preferences();
    let mut group = c.benchmark_group("recommend");
    for size in SET_SIZES {
        let flights = build_flights(size);
        group.bench_function(format!("{size}_flights"), |b| {
            b.iter(|| recommend(&flights, &prefs).expect("recommendation failed"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_score_flights, bench_recommend);
criterion_main!(benches);
