//! Intent classification.
//!
//! Primary path: ask the language oracle (through its circuit breaker) for a
//! strict-JSON classification of the latest message, then parse it into a
//! typed [`Intent`]. If the call fails, the circuit is open, or the reply
//! does not parse cleanly, classification degrades to deterministic keyword
//! matching with fixed per-intent confidences. Classification itself never
//! fails; the worst case is `general_inquiry` at 0.5.

use std::sync::{Arc, LazyLock};

use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use skylark_core::types::{
    BudgetRange, DateFlexibility, PriorityFactor, StopPreference, TimeOfDay, TravelParams,
    TravelPreferences,
};
use skylark_providers::LanguageOracle;
use skylark_resilience::CircuitBreaker;
use skylark_session::{ConversationMessage, MessageRole};

use crate::extract::{extract_preferences, extract_selection, extract_travel_params};

// =============================================================================
// Classification result types
// =============================================================================

/// Flat intent label, used for dispatch, logging, and the wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    FlightSearch,
    FlightSelection,
    FlightComparison,
    PreferenceUpdate,
    RecommendationRequest,
    GeneralInquiry,
}

impl IntentKind {
    pub fn name(&self) -> &'static str {
        match self {
            IntentKind::FlightSearch => "flight_search",
            IntentKind::FlightSelection => "flight_selection",
            IntentKind::FlightComparison => "flight_comparison",
            IntentKind::PreferenceUpdate => "preference_update",
            IntentKind::RecommendationRequest => "recommendation_request",
            IntentKind::GeneralInquiry => "general_inquiry",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "flight_search" => Some(IntentKind::FlightSearch),
            "flight_selection" => Some(IntentKind::FlightSelection),
            "flight_comparison" => Some(IntentKind::FlightComparison),
            "preference_update" => Some(IntentKind::PreferenceUpdate),
            "recommendation_request" => Some(IntentKind::RecommendationRequest),
            "general_inquiry" => Some(IntentKind::GeneralInquiry),
            _ => None,
        }
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A classified message: the intent together with its typed entities.
/// Downstream code only ever sees these parsed shapes, never raw oracle
/// fields.
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    FlightSearch { params: TravelParams },
    /// `index` is the oracle-extracted 1-based reference, when it gave one.
    /// The handler falls back to the deterministic extractor otherwise.
    FlightSelection { index: Option<usize> },
    FlightComparison,
    PreferenceUpdate { preferences: TravelPreferences },
    RecommendationRequest,
    GeneralInquiry,
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::FlightSearch { .. } => IntentKind::FlightSearch,
            Intent::FlightSelection { .. } => IntentKind::FlightSelection,
            Intent::FlightComparison => IntentKind::FlightComparison,
            Intent::PreferenceUpdate { .. } => IntentKind::PreferenceUpdate,
            Intent::RecommendationRequest => IntentKind::RecommendationRequest,
            Intent::GeneralInquiry => IntentKind::GeneralInquiry,
        }
    }
}

/// Which strategy produced a classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Oracle,
    KeywordFallback,
}

#[derive(Clone, Debug)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f64,
    pub source: ClassificationSource,
}

// =============================================================================
// Classifier
// =============================================================================

pub struct IntentClassifier {
    oracle: Arc<dyn LanguageOracle>,
    breaker: Arc<CircuitBreaker>,
}

impl IntentClassifier {
    pub fn new(oracle: Arc<dyn LanguageOracle>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { oracle, breaker }
    }

    /// Classify a message in its conversational context.
    ///
    /// Infallible by design: oracle failures, open circuits, and malformed
    /// replies all degrade to the keyword classifier.
    pub async fn classify(
        &self,
        message: &str,
        context: &[ConversationMessage],
    ) -> Classification {
        let prompt = build_prompt(message, context);

        match self.breaker.call(|| self.oracle.complete(&prompt)).await {
            Ok(reply) => match parse_oracle_reply(&reply) {
                Some(classification) => {
                    debug!(
                        intent = %classification.intent.kind(),
                        confidence = classification.confidence,
                        "oracle classification accepted"
                    );
                    classification
                }
                None => {
                    debug!("oracle reply unparseable, using keyword fallback");
                    keyword_classify(message, Utc::now().date_naive())
                }
            },
            Err(e) => {
                debug!(error = %e, "oracle call failed, using keyword fallback");
                keyword_classify(message, Utc::now().date_naive())
            }
        }
    }
}

fn build_prompt(message: &str, context: &[ConversationMessage]) -> String {
    let mut prompt = String::from(
        "You are the intent classifier for a travel assistant.\n\
         Classify the latest user message into exactly one of:\n\
         flight_search, flight_selection, flight_comparison, preference_update,\n\
         recommendation_request, general_inquiry.\n\
         Reply with strict JSON only, no prose, shaped as:\n\
         {\"intent\": \"...\", \"confidence\": 0.0, \"entities\": {}}\n\
         flight_search entities: origin, destination, departure_date (YYYY-MM-DD),\n\
         return_date, passengers.\n\
         flight_selection entities: index (1-based).\n\
         preference_update entities: budget (budget|mid_range|premium),\n\
         time_of_day (morning|afternoon|evening), stops (direct|one_stop|flexible),\n\
         priorities (price|duration|convenience), airlines.\n\n",
    );

    if !context.is_empty() {
        prompt.push_str("Recent conversation:\n");
        for msg in context {
            let who = match msg.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            };
            prompt.push_str(who);
            prompt.push_str(": ");
            prompt.push_str(&msg.content);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str("User message: ");
    prompt.push_str(message);
    prompt.push('\n');
    prompt
}

// =============================================================================
// Oracle reply parsing (strict parse-or-fallback boundary)
// =============================================================================

#[derive(Deserialize)]
struct OracleReply {
    intent: String,
    confidence: f64,
    #[serde(default)]
    entities: serde_json::Value,
}

#[derive(Deserialize)]
struct SearchEntities {
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    departure_date: Option<NaiveDate>,
    #[serde(default)]
    return_date: Option<NaiveDate>,
    #[serde(default)]
    passengers: Option<u32>,
    #[serde(default)]
    flexibility: Option<DateFlexibility>,
}

#[derive(Deserialize)]
struct SelectionEntities {
    #[serde(default)]
    index: Option<u32>,
}

#[derive(Deserialize)]
struct PreferenceEntities {
    #[serde(default)]
    budget: Option<BudgetRange>,
    #[serde(default)]
    time_of_day: Option<TimeOfDay>,
    #[serde(default)]
    stops: Option<StopPreference>,
    #[serde(default)]
    priorities: Vec<PriorityFactor>,
    #[serde(default)]
    airlines: Option<Vec<String>>,
}

/// Parse an oracle reply into a typed classification. Any defect — missing
/// fields, an unknown intent label, entities of the wrong shape — rejects
/// the whole reply; there is no partial acceptance.
fn parse_oracle_reply(text: &str) -> Option<Classification> {
    let json = strip_code_fences(text);
    let reply: OracleReply = serde_json::from_str(json).ok()?;
    let kind = IntentKind::from_name(&reply.intent)?;
    let confidence = reply.confidence.clamp(0.0, 1.0);

    let intent = match kind {
        IntentKind::FlightSearch => Intent::FlightSearch {
            params: parse_search_entities(reply.entities)?,
        },
        IntentKind::FlightSelection => Intent::FlightSelection {
            index: parse_selection_entities(reply.entities)?,
        },
        IntentKind::PreferenceUpdate => Intent::PreferenceUpdate {
            preferences: parse_preference_entities(reply.entities)?,
        },
        IntentKind::FlightComparison => Intent::FlightComparison,
        IntentKind::RecommendationRequest => Intent::RecommendationRequest,
        IntentKind::GeneralInquiry => Intent::GeneralInquiry,
    };

    Some(Classification {
        intent,
        confidence,
        source: ClassificationSource::Oracle,
    })
}

fn parse_search_entities(value: serde_json::Value) -> Option<TravelParams> {
    if value.is_null() {
        return Some(TravelParams::default());
    }
    let e: SearchEntities = serde_json::from_value(value).ok()?;
    Some(TravelParams {
        origin: e.origin,
        destination: e.destination,
        departure_date: e.departure_date,
        return_date: e.return_date,
        passengers: e.passengers,
        flexibility: e.flexibility.unwrap_or_default(),
    })
}

fn parse_selection_entities(value: serde_json::Value) -> Option<Option<usize>> {
    if value.is_null() {
        return Some(None);
    }
    let e: SelectionEntities = serde_json::from_value(value).ok()?;
    Some(e.index.map(|n| n as usize))
}

fn parse_preference_entities(value: serde_json::Value) -> Option<TravelPreferences> {
    if value.is_null() {
        return Some(TravelPreferences::default());
    }
    let e: PreferenceEntities = serde_json::from_value(value).ok()?;
    Some(TravelPreferences {
        budget: e.budget,
        time_of_day: e.time_of_day,
        stops: e.stops,
        priorities: e.priorities,
        airlines: e.airlines,
    })
}

/// Strip a Markdown code fence if the oracle wrapped its JSON in one.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    match inner.trim_start().strip_suffix("```") {
        Some(body) => body.trim(),
        None => inner.trim(),
    }
}

// =============================================================================
// Keyword fallback
// =============================================================================

// Fixed keyword sets per intent, anchored at word starts so "flights" and
// "flying" match but "butterfly" does not. Evaluated in priority order; the
// first matching set decides, at that intent's fixed confidence.

static SEARCH_KEYWORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:search|find|flight|fly)").expect("Invalid search regex"));

static SELECTION_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:select|choose|book)|\b(?:first|1st|second|2nd|third|3rd)\b|\b\d+\b")
        .expect("Invalid selection regex")
});

static COMPARISON_KEYWORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:compare|versus)|\bvs\b").expect("Invalid comparison regex"));

static PREFERENCE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:prefer|budget|cheaper|faster)").expect("Invalid preference regex")
});

static RECOMMENDATION_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:recommend|suggest|best|advice)").expect("Invalid recommendation regex")
});

fn keyword_classify(message: &str, today: NaiveDate) -> Classification {
    let lower = message.to_lowercase();

    let (intent, confidence) = if SEARCH_KEYWORDS.is_match(&lower) {
        (
            Intent::FlightSearch {
                params: extract_travel_params(message, today),
            },
            0.7,
        )
    } else if SELECTION_KEYWORDS.is_match(&lower) {
        (
            Intent::FlightSelection {
                index: extract_selection(message),
            },
            0.8,
        )
    } else if COMPARISON_KEYWORDS.is_match(&lower) {
        (Intent::FlightComparison, 0.8)
    } else if PREFERENCE_KEYWORDS.is_match(&lower) {
        (
            Intent::PreferenceUpdate {
                preferences: extract_preferences(message),
            },
            0.7,
        )
    } else if RECOMMENDATION_KEYWORDS.is_match(&lower) {
        (Intent::RecommendationRequest, 0.7)
    } else {
        (Intent::GeneralInquiry, 0.5)
    };

    Classification {
        intent,
        confidence,
        source: ClassificationSource::KeywordFallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylark_providers::{ProviderError, ScriptedOracle};
    use skylark_resilience::BreakerConfig;
    use std::time::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn classifier(oracle: Arc<ScriptedOracle>) -> IntentClassifier {
        let breaker = Arc::new(CircuitBreaker::new("language-oracle", BreakerConfig::default()));
        IntentClassifier::new(oracle, breaker)
    }

    // ---- keyword fallback ----

    #[test]
    fn test_keyword_confidences_per_intent() {
        let c = keyword_classify("find me a flight", today());
        assert_eq!(c.intent.kind(), IntentKind::FlightSearch);
        assert_eq!(c.confidence, 0.7);

        let c = keyword_classify("I want option 2", today());
        assert_eq!(c.intent.kind(), IntentKind::FlightSelection);
        assert_eq!(c.confidence, 0.8);

        let c = keyword_classify("how do these compare", today());
        assert_eq!(c.intent.kind(), IntentKind::FlightComparison);
        assert_eq!(c.confidence, 0.8);

        let c = keyword_classify("something cheaper please", today());
        assert_eq!(c.intent.kind(), IntentKind::PreferenceUpdate);
        assert_eq!(c.confidence, 0.7);

        let c = keyword_classify("any advice?", today());
        assert_eq!(c.intent.kind(), IntentKind::RecommendationRequest);
        assert_eq!(c.confidence, 0.7);

        let c = keyword_classify("hello there", today());
        assert_eq!(c.intent.kind(), IntentKind::GeneralInquiry);
        assert_eq!(c.confidence, 0.5);
    }

    #[test]
    fn test_priority_order_is_fixed() {
        // "book a flight" carries both a selection keyword and a search
        // keyword; search is evaluated first and wins.
        let c = keyword_classify("book a flight to paris", today());
        assert_eq!(c.intent.kind(), IntentKind::FlightSearch);

        // "best flight" likewise resolves as search, not recommendation.
        let c = keyword_classify("what's the best flight", today());
        assert_eq!(c.intent.kind(), IntentKind::FlightSearch);

        // A bare number triggers selection ahead of everything below it.
        let c = keyword_classify("2", today());
        assert_eq!(c.intent.kind(), IntentKind::FlightSelection);
    }

    #[test]
    fn test_keyword_search_carries_extracted_params() {
        let c = keyword_classify("find flights from oslo to rome tomorrow", today());
        match c.intent {
            Intent::FlightSearch { params } => {
                assert_eq!(params.origin.as_deref(), Some("Oslo"));
                assert_eq!(params.destination.as_deref(), Some("Rome"));
                assert_eq!(
                    params.departure_date,
                    NaiveDate::from_ymd_opt(2025, 6, 2)
                );
            }
            other => panic!("expected flight_search, got {other:?}"),
        }
    }

    #[test]
    fn test_keyword_selection_carries_index() {
        let c = keyword_classify("choose the second one", today());
        assert_eq!(
            c.intent,
            Intent::FlightSelection { index: Some(2) }
        );
    }

    #[test]
    fn test_keyword_preference_carries_extraction() {
        let c = keyword_classify("I prefer direct morning flights", today());
        // "flights" wins the priority race; rephrase without search words.
        assert_eq!(c.intent.kind(), IntentKind::FlightSearch);

        let c = keyword_classify("cheaper and direct in the morning please", today());
        match c.intent {
            Intent::PreferenceUpdate { preferences } => {
                assert_eq!(preferences.stops, Some(StopPreference::Direct));
                assert_eq!(preferences.time_of_day, Some(TimeOfDay::Morning));
            }
            other => panic!("expected preference_update, got {other:?}"),
        }
    }

    #[test]
    fn test_versus_and_vs_are_bounded() {
        assert_eq!(
            keyword_classify("the morning one versus the evening one", today())
                .intent
                .kind(),
            IntentKind::FlightComparison
        );
        assert_eq!(
            keyword_classify("morning vs evening", today()).intent.kind(),
            IntentKind::FlightComparison
        );
        // "vs" must not fire inside an unrelated word.
        assert_eq!(
            keyword_classify("I love navs and maps", today()).intent.kind(),
            IntentKind::GeneralInquiry
        );
    }

    // ---- oracle path ----

    #[tokio::test]
    async fn test_oracle_classification_accepted() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_completion(
            r#"{"intent": "flight_search", "confidence": 0.92,
                "entities": {"origin": "NYC", "destination": "LON",
                             "departure_date": "2025-06-12", "passengers": 2}}"#,
        );
        let classifier = classifier(oracle);

        let c = classifier.classify("get me to london", &[]).await;
        assert_eq!(c.source, ClassificationSource::Oracle);
        assert_eq!(c.confidence, 0.92);
        match c.intent {
            Intent::FlightSearch { params } => {
                assert_eq!(params.origin.as_deref(), Some("NYC"));
                assert_eq!(params.passengers, Some(2));
            }
            other => panic!("expected flight_search, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fenced_oracle_reply_parsed() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_completion(
            "```json\n{\"intent\": \"flight_comparison\", \"confidence\": 0.85}\n```",
        );
        let classifier = classifier(oracle);

        let c = classifier.classify("compare them", &[]).await;
        assert_eq!(c.source, ClassificationSource::Oracle);
        assert_eq!(c.intent, Intent::FlightComparison);
    }

    #[tokio::test]
    async fn test_confidence_clamped_to_unit_interval() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_completion(r#"{"intent": "general_inquiry", "confidence": 1.7}"#);
        let classifier = classifier(oracle);

        let c = classifier.classify("hi", &[]).await;
        assert_eq!(c.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_completion("I think the user wants to search for flights.");
        let classifier = classifier(oracle);

        let c = classifier.classify("find me a flight", &[]).await;
        assert_eq!(c.source, ClassificationSource::KeywordFallback);
        assert_eq!(c.intent.kind(), IntentKind::FlightSearch);
        assert_eq!(c.confidence, 0.7);
    }

    #[tokio::test]
    async fn test_unknown_intent_label_falls_back() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_completion(r#"{"intent": "hotel_search", "confidence": 0.9}"#);
        let classifier = classifier(oracle);

        let c = classifier.classify("find me a flight", &[]).await;
        assert_eq!(c.source, ClassificationSource::KeywordFallback);
    }

    #[tokio::test]
    async fn test_malformed_entities_reject_whole_reply() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_completion(
            r#"{"intent": "flight_search", "confidence": 0.9,
                "entities": {"passengers": "two"}}"#,
        );
        let classifier = classifier(oracle);

        let c = classifier.classify("find me a flight", &[]).await;
        assert_eq!(c.source, ClassificationSource::KeywordFallback);
    }

    #[tokio::test]
    async fn test_oracle_failure_falls_back() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_failure(ProviderError::Timeout {
            service: "language-oracle".to_string(),
        });
        let classifier = classifier(oracle);

        let c = classifier.classify("3", &[]).await;
        assert_eq!(c.source, ClassificationSource::KeywordFallback);
        assert_eq!(c.intent, Intent::FlightSelection { index: Some(3) });
    }

    #[tokio::test]
    async fn test_open_circuit_skips_the_oracle_entirely() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_failure(ProviderError::Unavailable {
            service: "language-oracle".to_string(),
            reason: "down".to_string(),
        });
        let breaker = Arc::new(CircuitBreaker::new(
            "language-oracle",
            BreakerConfig {
                failure_threshold: 1,
                recovery_timeout: Duration::from_secs(60),
                call_timeout: Duration::from_secs(1),
            },
        ));
        let classifier = IntentClassifier::new(oracle.clone(), breaker);

        // First call fails and opens the circuit.
        let c = classifier.classify("find flights", &[]).await;
        assert_eq!(c.source, ClassificationSource::KeywordFallback);

        // Second call is short-circuited: no new prompt reaches the oracle.
        let c = classifier.classify("find flights", &[]).await;
        assert_eq!(c.source, ClassificationSource::KeywordFallback);
        assert_eq!(oracle.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_prompt_carries_context_and_message() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_completion(r#"{"intent": "general_inquiry", "confidence": 0.6}"#);
        let classifier = classifier(oracle.clone());

        let context = vec![
            ConversationMessage::new(MessageRole::User, "I need to get to London"),
            ConversationMessage::new(MessageRole::Assistant, "When would you like to travel?"),
        ];
        classifier.classify("sometime in June", &context).await;

        let prompts = oracle.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Recent conversation:"));
        assert!(prompts[0].contains("user: I need to get to London"));
        assert!(prompts[0].contains("User message: sometime in June"));
    }

    #[tokio::test]
    async fn test_oracle_selection_index_carried() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push_completion(
            r#"{"intent": "flight_selection", "confidence": 0.88, "entities": {"index": 2}}"#,
        );
        let classifier = classifier(oracle);

        let c = classifier.classify("the second one", &[]).await;
        assert_eq!(c.intent, Intent::FlightSelection { index: Some(2) });
    }
}
