//! Reply composition for the dialogue engine.
//!
//! Every handler outcome funnels through the [`Responder`], which turns
//! typed results (recommendations, comparisons, booking progress) into
//! conversational text plus suggested next actions. Templated on purpose:
//! prose generation belongs to the language oracle, and these composers are
//! the deterministic floor the engine can always fall back to.

use serde::Serialize;

use skylark_core::config::ChatConfig;
use skylark_core::types::{
    BookingRecord, BookingStep, BudgetRange, FlightQuery, FlightResult, StopPreference, TimeOfDay,
    TravelPreferences,
};
use skylark_intent::{Classification, IntentKind};
use skylark_ranking::{ComparisonEntry, FlightCategory, Recommendation, ScoredFlight};
use skylark_session::Session;

// =============================================================================
// EngineResponse
// =============================================================================

/// One completed conversational turn.
#[derive(Clone, Debug, Serialize)]
pub struct EngineResponse {
    pub session_id: String,
    /// Assistant reply text, ready for display.
    pub reply: String,
    pub intent: IntentKind,
    pub confidence: f64,
    /// Suggested next user actions, most relevant first.
    pub suggestions: Vec<String>,
    /// Flights this reply presented, in the order shown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flight_options: Vec<FlightResult>,
    /// The booking step the turn moved the flow to, when it advanced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_step: Option<BookingStep>,
}

impl EngineResponse {
    fn with_flights(mut self, flights: Vec<FlightResult>) -> Self {
        self.flight_options = flights;
        self
    }

    fn with_step(mut self, step: Option<BookingStep>) -> Self {
        self.booking_step = step;
        self
    }
}

// =============================================================================
// Responder
// =============================================================================

/// Composes [`EngineResponse`] values from handler outcomes.
pub struct Responder {
    max_suggestions: usize,
}

impl Responder {
    pub fn new(settings: &ChatConfig) -> Self {
        Self {
            max_suggestions: settings.max_suggestions,
        }
    }

    fn finish(
        &self,
        session_id: &str,
        classification: &Classification,
        reply: String,
        mut suggestions: Vec<String>,
    ) -> EngineResponse {
        suggestions.truncate(self.max_suggestions);
        EngineResponse {
            session_id: session_id.to_string(),
            reply,
            intent: classification.intent.kind(),
            confidence: classification.confidence,
            suggestions,
            flight_options: Vec::new(),
            booking_step: None,
        }
    }

    // ---- flight_search ----

    /// Ask for exactly the fields a search still needs.
    pub fn clarification(
        &self,
        session_id: &str,
        missing: &[&str],
        classification: &Classification,
    ) -> EngineResponse {
        let wanted = join_naturally(missing);
        let reply = format!(
            "I can search for flights once I know your {wanted}. \
             Where and when would you like to fly?"
        );
        self.finish(
            session_id,
            classification,
            reply,
            vec![
                "Flights from Seattle to Denver next Friday".to_string(),
                "I need 2 tickets to Tokyo on 2026-10-03".to_string(),
            ],
        )
    }

    pub fn no_flights(
        &self,
        session_id: &str,
        query: &FlightQuery,
        classification: &Classification,
    ) -> EngineResponse {
        let reply = format!(
            "I couldn't find any flights from {} to {} on {}. \
             A nearby date or airport might have better availability.",
            query.origin, query.destination, query.date
        );
        self.finish(
            session_id,
            classification,
            reply,
            vec![
                "Try the day after".to_string(),
                "Allow one stop".to_string(),
            ],
        )
    }

    /// Present search results: the primary pick plus up to two alternatives,
    /// numbered by their position in the stored (ranked) result list so
    /// ordinal selections resolve correctly.
    pub fn search_results(
        &self,
        session_id: &str,
        query: &FlightQuery,
        ranked: &[ScoredFlight],
        recommendation: &Recommendation,
        degraded: bool,
        classification: &Classification,
    ) -> EngineResponse {
        let mut reply = format!(
            "I found {} option{} from {} to {} on {}.\n",
            ranked.len(),
            plural(ranked.len()),
            query.origin,
            query.destination,
            query.date
        );

        let primary = &recommendation.primary;
        let primary_number = position_of(ranked, primary).unwrap_or(1);
        reply.push_str(&format!(
            "\nMy top pick is option {primary_number}: {}\n",
            flight_line(&primary.flight)
        ));
        if !primary.highlights.is_empty() {
            reply.push_str(&format!("   ({})\n", primary.highlights.join(", ")));
        }

        let alternatives: Vec<&ScoredFlight> = recommendation.alternatives.iter().take(2).collect();
        if !alternatives.is_empty() {
            reply.push_str("\nAlso worth a look:\n");
            for alternative in &alternatives {
                let number = position_of(ranked, alternative).unwrap_or(1);
                reply.push_str(&format!(
                    "Option {number} ({}): {}\n",
                    alternative.category.label(),
                    flight_line(&alternative.flight)
                ));
            }
        }

        if degraded {
            reply.push_str(
                "\nHeads up: live availability is unreachable right now, so these are \
                 representative options. Seats and fares may differ.\n",
            );
        }

        self.finish(
            session_id,
            classification,
            reply,
            vec![
                format!("Select flight {primary_number}"),
                "Compare these flights".to_string(),
                "Which do you recommend?".to_string(),
            ],
        )
        .with_flights(ranked.iter().map(|s| s.flight.clone()).collect())
    }

    // ---- flight_selection ----

    pub fn no_results_to_select(
        &self,
        session_id: &str,
        classification: &Classification,
    ) -> EngineResponse {
        let reply = "I don't have any search results to choose from yet. \
                     Tell me where and when you'd like to fly and I'll find options first."
            .to_string();
        self.finish(
            session_id,
            classification,
            reply,
            vec!["Find flights from Boston to Austin tomorrow".to_string()],
        )
    }

    /// The reference didn't resolve to a stored option; state is unchanged.
    pub fn invalid_selection(
        &self,
        session_id: &str,
        count: usize,
        classification: &Classification,
    ) -> EngineResponse {
        let reply = format!(
            "I couldn't match that to one of the current options. \
             Please pick a number between 1 and {count}."
        );
        self.finish(
            session_id,
            classification,
            reply,
            vec!["Select flight 1".to_string(), "Compare these flights".to_string()],
        )
    }

    pub fn flight_selected(
        &self,
        session_id: &str,
        flight: &FlightResult,
        next_step: Option<BookingStep>,
        classification: &Classification,
    ) -> EngineResponse {
        let mut reply = format!("Great choice. You've selected {}.", flight_line(flight));
        if let Some(step) = next_step {
            reply.push_str(&format!(" Next I'll need {}.", step_prompt(step)));
        }
        self.finish(
            session_id,
            classification,
            reply,
            vec![
                "Add passenger details".to_string(),
                "Actually, compare the options again".to_string(),
            ],
        )
        .with_flights(vec![flight.clone()])
        .with_step(next_step)
    }

    // ---- flight_comparison ----

    pub fn not_enough_to_compare(
        &self,
        session_id: &str,
        count: usize,
        classification: &Classification,
    ) -> EngineResponse {
        let reply = if count == 0 {
            "There's nothing to compare yet. Run a flight search first and I'll line the \
             options up side by side."
                .to_string()
        } else {
            "I only have one option stored, and a comparison needs at least two. \
             Broaden the search and ask me again."
                .to_string()
        };
        self.finish(
            session_id,
            classification,
            reply,
            vec!["Search for flights".to_string()],
        )
    }

    pub fn comparison(
        &self,
        session_id: &str,
        entries: &[ComparisonEntry],
        classification: &Classification,
    ) -> EngineResponse {
        let mut reply = String::from("Here's how they stack up:\n");
        for (i, entry) in entries.iter().enumerate() {
            reply.push_str(&format!("\n{}. {}\n", i + 1, flight_line(&entry.flight)));
            if !entry.advantages.is_empty() {
                reply.push_str(&format!("   For it: {}\n", entry.advantages.join(", ")));
            }
            if !entry.disadvantages.is_empty() {
                reply.push_str(&format!("   Against it: {}\n", entry.disadvantages.join(", ")));
            }
        }
        self.finish(
            session_id,
            classification,
            reply,
            vec![
                "Select flight 1".to_string(),
                "Which do you recommend?".to_string(),
            ],
        )
        .with_flights(entries.iter().map(|e| e.flight.clone()).collect())
    }

    // ---- preference_update ----

    pub fn preferences_noted(
        &self,
        session_id: &str,
        preferences: &TravelPreferences,
        reranked: Option<&Recommendation>,
        classification: &Classification,
    ) -> EngineResponse {
        let mut reply = if preferences.is_empty() {
            "I didn't catch a specific preference. You can ask for budget or premium fares, \
             morning or evening departures, direct flights, or name an airline you like."
                .to_string()
        } else {
            format!("Noted. I'll favor {}.", preference_summary(preferences))
        };

        if let Some(recommendation) = reranked {
            reply.push_str(&format!(
                " With that in mind, my new top pick is {}.",
                flight_line(&recommendation.primary.flight)
            ));
        }

        self.finish(
            session_id,
            classification,
            reply,
            vec![
                "Which do you recommend now?".to_string(),
                "Search again".to_string(),
            ],
        )
    }

    // ---- recommendation_request ----

    /// Generic advice for when there is nothing stored to rank yet.
    pub fn recommendation_advice(
        &self,
        session_id: &str,
        classification: &Classification,
    ) -> EngineResponse {
        let reply = "Happy to help you choose. Tell me where you're flying from, where to, \
                     and roughly when, and I'll rank the options against your preferences. \
                     As general advice: midweek departures and booking a few weeks out \
                     usually land the best fares."
            .to_string();
        self.finish(
            session_id,
            classification,
            reply,
            vec![
                "Find flights from Chicago to Miami in October".to_string(),
                "I prefer direct morning flights".to_string(),
            ],
        )
    }

    pub fn recommendation(
        &self,
        session_id: &str,
        recommendation: &Recommendation,
        preferences: &TravelPreferences,
        classification: &Classification,
    ) -> EngineResponse {
        let primary = &recommendation.primary;
        let mut reply = format!(
            "I'd go with the {} option: {}\n",
            primary.category.label(),
            flight_line(&primary.flight)
        );
        if !primary.highlights.is_empty() {
            reply.push_str(&format!("Why: {}.\n", primary.highlights.join(", ")));
        }

        if !recommendation.alternatives.is_empty() {
            reply.push_str("\nIf that doesn't suit:\n");
            for alternative in &recommendation.alternatives {
                reply.push_str(&format!(
                    "- {} option: {}\n",
                    alternative.category.label(),
                    flight_line(&alternative.flight)
                ));
            }
        }

        for tip in preference_tips(preferences) {
            reply.push_str(&format!("\nTip: {tip}"));
        }

        let mut shown = vec![primary.flight.clone()];
        shown.extend(recommendation.alternatives.iter().map(|a| a.flight.clone()));
        self.finish(
            session_id,
            classification,
            reply,
            vec![
                "Select the recommended flight".to_string(),
                "Compare these flights".to_string(),
            ],
        )
        .with_flights(shown)
    }

    // ---- general_inquiry ----

    pub fn general(
        &self,
        session_id: &str,
        text: String,
        classification: &Classification,
    ) -> EngineResponse {
        self.finish(
            session_id,
            classification,
            text,
            vec![
                "Search for flights".to_string(),
                "Get a recommendation".to_string(),
            ],
        )
    }

    /// Canned answer used when the language oracle is unreachable.
    pub fn general_fallback_text(&self) -> String {
        "I can help you search for flights, compare options, and book a trip. \
         Tell me where you'd like to go and I'll take it from there."
            .to_string()
    }

    /// Prompt handed to the language oracle for free-text questions,
    /// seeded with whatever trip context the session already holds.
    pub fn inquiry_prompt(&self, message: &str, session: &Session) -> String {
        let mut prompt = String::from(
            "You are a travel assistant. Answer the traveller's question briefly and helpfully.\n",
        );
        if let (Some(origin), Some(destination)) =
            (&session.params.origin, &session.params.destination)
        {
            prompt.push_str(&format!("Known trip: {origin} to {destination}.\n"));
        }
        if let Some(flight) = &session.selected_flight {
            prompt.push_str(&format!("Selected flight: {}.\n", flight_line(flight)));
        }
        prompt.push_str(&format!("Question: {message}\n"));
        prompt
    }

    // ---- failure ----

    /// Friendly stand-in for any unrecovered internal error. Never exposes
    /// error detail to the traveller.
    pub fn technical_difficulty(
        &self,
        session_id: &str,
        classification: &Classification,
    ) -> EngineResponse {
        let reply = "I ran into a technical difficulty handling that. Nothing was lost on \
                     your side, please try again in a moment."
            .to_string();
        self.finish(
            session_id,
            classification,
            reply,
            vec!["Try again".to_string()],
        )
    }

    // ---- notifications ----

    /// Subject and body for the booking confirmation notification.
    pub fn booking_email(&self, record: &BookingRecord) -> (String, String) {
        let subject = format!("Booking {} confirmed", record.reference);
        let body = format!(
            "Hello {},\n\nYour booking is confirmed.\n\nFlight: {}\nAmount charged: {} \
             ({})\nBooking reference: {}\n\nSafe travels!",
            record.passenger.full_name,
            flight_line(&record.flight),
            format_price(record.receipt.amount),
            record.receipt.transaction_id,
            record.reference,
        );
        (subject, body)
    }

    /// Subject and body for a cancellation notification.
    pub fn cancellation_email(&self, record: &BookingRecord) -> (String, String) {
        let subject = format!("Booking {} cancelled", record.reference);
        let body = format!(
            "Hello {},\n\nYour booking {} ({}) has been cancelled.\n\nWe hope to see you again.",
            record.passenger.full_name,
            record.reference,
            flight_line(&record.flight),
        );
        (subject, body)
    }
}

// =============================================================================
// Formatting helpers
// =============================================================================

/// One-line flight summary used across replies and notifications.
pub fn flight_line(flight: &FlightResult) -> String {
    format!(
        "{} {}, {} to {}, departs {}, {}, {}, {}",
        flight.airline,
        flight.flight_number,
        flight.origin,
        flight.destination,
        flight.departure_time.format("%Y-%m-%d %H:%M"),
        format_duration(flight.duration_minutes),
        format_stops(flight.stops),
        format_price(flight.price),
    )
}

fn format_duration(minutes: u32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours > 0 {
        format!("{hours}h {rest:02}m")
    } else {
        format!("{minutes}m")
    }
}

fn format_stops(stops: u32) -> String {
    match stops {
        0 => "nonstop".to_string(),
        1 => "1 stop".to_string(),
        n => format!("{n} stops"),
    }
}

pub(crate) fn format_price(price: f64) -> String {
    format!("${price:.2}")
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// "origin", "origin and destination", "origin, destination and departure date".
fn join_naturally(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [only] => (*only).to_string(),
        [head @ .., last] => format!("{} and {last}", head.join(", ")),
    }
}

/// 1-based position of a scored flight within the ranked list.
fn position_of(ranked: &[ScoredFlight], wanted: &ScoredFlight) -> Option<usize> {
    ranked
        .iter()
        .position(|s| s.flight.id == wanted.flight.id)
        .map(|i| i + 1)
}

fn step_prompt(step: BookingStep) -> &'static str {
    match step {
        BookingStep::FlightSelection => "a flight picked from the current options",
        BookingStep::PassengerInfo => "passenger details (full name and passport number)",
        BookingStep::ContactInfo => "contact details (an email address)",
        BookingStep::Payment => "payment details",
        BookingStep::Confirmation => "a final confirmation to book",
    }
}

fn window_name(window: TimeOfDay) -> &'static str {
    match window {
        TimeOfDay::Morning => "morning",
        TimeOfDay::Afternoon => "afternoon",
        TimeOfDay::Evening => "evening",
    }
}

fn preference_summary(preferences: &TravelPreferences) -> String {
    let mut parts = Vec::new();
    match preferences.budget {
        Some(BudgetRange::Budget) => parts.push("budget-friendly fares".to_string()),
        Some(BudgetRange::MidRange) => parts.push("balanced pricing".to_string()),
        Some(BudgetRange::Premium) => parts.push("premium comfort".to_string()),
        None => {}
    }
    if let Some(window) = preferences.time_of_day {
        parts.push(format!("{} departures", window_name(window)));
    }
    match preferences.stops {
        Some(StopPreference::Direct) => parts.push("direct routes".to_string()),
        Some(StopPreference::OneStop) => parts.push("at most one stop".to_string()),
        Some(StopPreference::Flexible) => parts.push("flexible routing".to_string()),
        None => {}
    }
    if let Some(airlines) = preferences.airlines.as_deref() {
        if !airlines.is_empty() {
            parts.push(format!("flying {}", airlines.join(" or ")));
        }
    }
    if let Some(first) = preferences.priorities.first() {
        parts.push(format!("prioritizing {}", priority_name(*first)));
    }
    parts.join(", ")
}

fn priority_name(priority: skylark_core::types::PriorityFactor) -> &'static str {
    use skylark_core::types::PriorityFactor;
    match priority {
        PriorityFactor::Price => "price",
        PriorityFactor::Duration => "duration",
        PriorityFactor::Convenience => "convenience",
    }
}

/// Up to two suggestions for sharpening future rankings, driven by which
/// preferences are still unstated.
fn preference_tips(preferences: &TravelPreferences) -> Vec<String> {
    let mut tips = Vec::new();
    if preferences.budget.is_none() {
        tips.push(
            "tell me your budget range (budget, mid-range, premium) and I'll weigh prices \
             accordingly"
                .to_string(),
        );
    }
    if preferences.time_of_day.is_none() {
        tips.push("mention a preferred departure window and I'll favor it".to_string());
    }
    if preferences.priorities.is_empty() {
        tips.push("say what matters most (price, duration, or convenience)".to_string());
    }
    tips.truncate(2);
    tips
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use skylark_core::types::PriorityFactor;
    use skylark_intent::{ClassificationSource, Intent};

    fn classification() -> Classification {
        Classification {
            intent: Intent::GeneralInquiry,
            confidence: 0.5,
            source: ClassificationSource::KeywordFallback,
        }
    }

    fn responder() -> Responder {
        Responder::new(&ChatConfig::default())
    }

    fn flight(id: &str, price: f64, stops: u32) -> FlightResult {
        let departure_time = Utc
            .with_ymd_and_hms(2026, 9, 14, 9, 0, 0)
            .single()
            .expect("valid test timestamp");
        FlightResult {
            id: id.to_string(),
            airline: "Meridian Air".to_string(),
            flight_number: format!("MA{id}"),
            origin: "SEA".to_string(),
            destination: "DEN".to_string(),
            departure_time,
            arrival_time: departure_time + Duration::minutes(195),
            duration_minutes: 195,
            stops,
            price,
            available_seats: 5,
        }
    }

    // ---- clarification ----

    #[test]
    fn clarification_names_each_missing_field() {
        let response = responder().clarification(
            "s1",
            &["origin", "destination", "departure date"],
            &classification(),
        );
        assert!(response.reply.contains("origin, destination and departure date"));
    }

    #[test]
    fn clarification_with_single_field_reads_naturally() {
        let response = responder().clarification("s1", &["departure date"], &classification());
        assert!(response.reply.contains("your departure date"));
        assert!(!response.reply.contains("and departure date"));
    }

    // ---- selection ----

    #[test]
    fn invalid_selection_states_the_valid_range() {
        let response = responder().invalid_selection("s1", 4, &classification());
        assert!(response.reply.contains("between 1 and 4"));
    }

    #[test]
    fn flight_selected_names_the_next_step() {
        let response = responder().flight_selected(
            "s1",
            &flight("F1", 219.0, 0),
            Some(BookingStep::PassengerInfo),
            &classification(),
        );
        assert!(response.reply.contains("passenger details"));
    }

    #[test]
    fn flight_selected_attaches_flight_and_step() {
        let response = responder().flight_selected(
            "s1",
            &flight("F1", 219.0, 0),
            Some(BookingStep::PassengerInfo),
            &classification(),
        );
        assert_eq!(response.flight_options.len(), 1);
        assert_eq!(response.flight_options[0].id, "F1");
        assert_eq!(response.booking_step, Some(BookingStep::PassengerInfo));
    }

    // ---- technical difficulty ----

    #[test]
    fn technical_difficulty_is_generic_and_suggests_retry() {
        let response = responder().technical_difficulty("s1", &classification());
        assert!(response.reply.contains("technical difficulty"));
        assert!(response.reply.contains("try again"));
        assert!(response.suggestions.contains(&"Try again".to_string()));
    }

    // ---- suggestions cap ----

    #[test]
    fn suggestions_are_capped_by_config() {
        let responder = Responder::new(&ChatConfig {
            max_message_length: 2000,
            max_suggestions: 1,
        });
        let response = responder.invalid_selection("s1", 3, &classification());
        assert_eq!(response.suggestions.len(), 1);
    }

    // ---- formatting ----

    #[test]
    fn flight_line_includes_the_essentials() {
        let line = flight_line(&flight("F1", 219.0, 0));
        assert!(line.contains("MAF1"));
        assert!(line.contains("SEA to DEN"));
        assert!(line.contains("3h 15m"));
        assert!(line.contains("nonstop"));
        assert!(line.contains("$219.00"));
    }

    #[test]
    fn stop_counts_format_readably() {
        assert_eq!(format_stops(0), "nonstop");
        assert_eq!(format_stops(1), "1 stop");
        assert_eq!(format_stops(2), "2 stops");
    }

    #[test]
    fn preference_summary_mentions_each_stated_field() {
        let preferences = TravelPreferences {
            budget: Some(BudgetRange::Budget),
            time_of_day: Some(TimeOfDay::Morning),
            stops: Some(StopPreference::Direct),
            priorities: vec![PriorityFactor::Price],
            airlines: None,
        };
        let summary = preference_summary(&preferences);
        assert!(summary.contains("budget-friendly fares"));
        assert!(summary.contains("morning departures"));
        assert!(summary.contains("direct routes"));
        assert!(summary.contains("prioritizing price"));
    }

    #[test]
    fn tips_cover_unstated_preferences_only() {
        let stated = TravelPreferences {
            budget: Some(BudgetRange::Budget),
            time_of_day: Some(TimeOfDay::Morning),
            priorities: vec![PriorityFactor::Price],
            ..TravelPreferences::default()
        };
        assert!(preference_tips(&stated).is_empty());

        let unstated = TravelPreferences::default();
        let tips = preference_tips(&unstated);
        assert_eq!(tips.len(), 2);
        assert!(tips[0].contains("budget"));
    }

    // ---- comparison ----

    #[test]
    fn comparison_lists_every_entry_with_tags() {
        let entries = vec![
            ComparisonEntry {
                flight: flight("F1", 350.0, 0),
                advantages: vec!["direct flight".to_string()],
                disadvantages: vec![],
            },
            ComparisonEntry {
                flight: flight("F2", 280.0, 1),
                advantages: vec!["lowest price".to_string()],
                disadvantages: vec!["1 stop".to_string()],
            },
        ];
        let response = responder().comparison("s1", &entries, &classification());
        assert!(response.reply.contains("direct flight"));
        assert!(response.reply.contains("lowest price"));
        assert!(response.reply.contains("Against it: 1 stop"));
    }

    // ---- booking email ----

    #[test]
    fn booking_email_carries_reference_and_amount() {
        let flight = flight("F1", 219.0, 0);
        let record = BookingRecord {
            reference: "SKY-AB12CD34".to_string(),
            session_id: "s1".to_string(),
            flight,
            passenger: skylark_core::types::PassengerDetails {
                full_name: "Dana Traveller".to_string(),
                date_of_birth: None,
                passport_number: Some("P1234567".to_string()),
            },
            contact: skylark_core::types::ContactDetails {
                email: "dana@example.com".to_string(),
                phone: None,
            },
            receipt: skylark_core::types::PaymentReceipt {
                transaction_id: "TXN-1".to_string(),
                amount: 219.0,
                currency: "USD".to_string(),
            },
            status: skylark_core::types::BookingStatus::Confirmed,
            created_at: 0,
        };
        let (subject, body) = responder().booking_email(&record);
        assert!(subject.contains("SKY-AB12CD34"));
        assert!(body.contains("Dana Traveller"));
        assert!(body.contains("$219.00"));
    }
}
