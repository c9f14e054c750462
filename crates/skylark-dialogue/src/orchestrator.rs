//! The dialogue orchestrator: one conversational turn at a time.
//!
//! `handle_message` is the single entry point for chat traffic. A turn is
//! validated, serialized against other turns on the same session, classified,
//! and dispatched to the handler for its intent. Handlers read and mutate
//! session state through the store and call collaborators only through the
//! resilience layer; whatever happens, the turn ends with a reply. Internal
//! failures degrade to a generic reply rather than surfacing as errors, so
//! the only `Err` outcomes a caller sees are its own invalid inputs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, error, info, warn};

use skylark_core::config::SkylarkConfig;
use skylark_core::types::{
    BookingStep, FlightQuery, FlightResult, StopPreference, TravelParams, TravelPreferences,
};
use skylark_intent::{
    extract_preferences, extract_selection, Classification, Intent, IntentClassifier,
};
use skylark_providers::{
    fallback_flights, BookingStore, FlightSearch, LanguageOracle, NotificationDispatcher,
    PaymentGateway, NOTIFY_SERVICE, ORACLE_SERVICE, PAYMENT_SERVICE, SEARCH_SERVICE,
};
use skylark_ranking::{compare_flights, recommend, score_flights, Recommendation};
use skylark_resilience::{BreakerConfig, BreakerSnapshot, CircuitBreaker, RetryPolicy};
use skylark_session::{ConversationMessage, MessageRole, Session, SessionError, SessionStore};

use crate::error::DialogueError;
use crate::response::{EngineResponse, Responder};

// =============================================================================
// Turn locks
// =============================================================================

/// Lock-map size above which stale handles are pruned on access.
const LOCK_PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per session so concurrent turns on the same conversation
/// run one at a time. Turns on different sessions never contend.
pub(crate) struct TurnLocks {
    locks: StdMutex<HashMap<String, Arc<TokioMutex<()>>>>,
}

impl TurnLocks {
    fn new() -> Self {
        Self {
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// The lock handle for one session, created on first use. Handles no
    /// longer held by any in-flight turn are pruned once the map grows past
    /// [`LOCK_PRUNE_THRESHOLD`].
    fn for_session(&self, id: &str) -> Result<Arc<TokioMutex<()>>, SessionError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| SessionError::Storage(format!("turn lock map poisoned: {e}")))?;
        if locks.len() > LOCK_PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Ok(locks.entry(id.to_string()).or_default().clone())
    }

    fn remove(&self, id: &str) {
        if let Ok(mut locks) = self.locks.lock() {
            locks.remove(id);
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct Orchestrator {
    pub(crate) sessions: Arc<SessionStore>,
    pub(crate) oracle: Arc<dyn LanguageOracle>,
    pub(crate) search: Arc<dyn FlightSearch>,
    pub(crate) bookings: Arc<dyn BookingStore>,
    pub(crate) payments: Arc<dyn PaymentGateway>,
    pub(crate) notifier: Arc<dyn NotificationDispatcher>,

    pub(crate) classifier: IntentClassifier,
    pub(crate) responder: Responder,
    pub(crate) retry: RetryPolicy,

    pub(crate) search_breaker: Arc<CircuitBreaker>,
    pub(crate) oracle_breaker: Arc<CircuitBreaker>,
    pub(crate) payment_breaker: Arc<CircuitBreaker>,
    pub(crate) notify_breaker: Arc<CircuitBreaker>,

    pub(crate) turn_locks: TurnLocks,

    pub(crate) context_turns: usize,
    pub(crate) max_message_length: usize,
    pub(crate) max_results: usize,
    pub(crate) currency: String,
}

impl Orchestrator {
    pub fn new(
        config: &SkylarkConfig,
        sessions: Arc<SessionStore>,
        oracle: Arc<dyn LanguageOracle>,
        search: Arc<dyn FlightSearch>,
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let breaker_config = BreakerConfig::from_settings(&config.resilience);
        let search_breaker = Arc::new(CircuitBreaker::new(SEARCH_SERVICE, breaker_config.clone()));
        let oracle_breaker = Arc::new(CircuitBreaker::new(ORACLE_SERVICE, breaker_config.clone()));
        let payment_breaker =
            Arc::new(CircuitBreaker::new(PAYMENT_SERVICE, breaker_config.clone()));
        let notify_breaker = Arc::new(CircuitBreaker::new(NOTIFY_SERVICE, breaker_config));

        Self {
            classifier: IntentClassifier::new(oracle.clone(), oracle_breaker.clone()),
            responder: Responder::new(&config.chat),
            retry: RetryPolicy::from_settings(&config.resilience),
            sessions,
            oracle,
            search,
            bookings,
            payments,
            notifier,
            search_breaker,
            oracle_breaker,
            payment_breaker,
            notify_breaker,
            turn_locks: TurnLocks::new(),
            context_turns: config.session.context_turns,
            max_message_length: config.chat.max_message_length,
            max_results: config.search.max_results,
            currency: config.search.currency.clone(),
        }
    }

    /// Handle one user message and produce the assistant's reply.
    ///
    /// The only errors returned are for invalid caller input (empty or
    /// overlong messages) and session-store failures before dispatch; every
    /// failure past that point composes a reply instead.
    pub async fn handle_message(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        message: &str,
    ) -> Result<EngineResponse, DialogueError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(DialogueError::EmptyMessage);
        }
        if message.chars().count() > self.max_message_length {
            return Err(DialogueError::MessageTooLong(self.max_message_length));
        }

        // Serialize turns per session: history must interleave user and
        // assistant messages, and handlers assume no concurrent mutation of
        // their session.
        let lock = self.turn_locks.for_session(session_id)?;
        let _turn = lock.lock().await;

        let session = self.sessions.get_or_create(session_id, user_id)?;
        // Context is the history as it stood before this message.
        let context = session.recent_history(self.context_turns).to_vec();
        self.sessions
            .append_message(session_id, MessageRole::User, message)?;

        let classification = self.classifier.classify(message, &context).await;
        debug!(
            session = %session_id,
            intent = %classification.intent.kind(),
            confidence = classification.confidence,
            source = ?classification.source,
            "message classified"
        );

        let response = match self.dispatch(session_id, message, &classification).await {
            Ok(response) => response,
            Err(e) => {
                error!(session = %session_id, error = %e, "turn handling failed");
                self.responder.technical_difficulty(session_id, &classification)
            }
        };

        // The reply joins the history so the next classification sees it.
        // Losing it degrades context but must not fail a turn that already
        // produced an answer.
        let mut reply = ConversationMessage::new(MessageRole::Assistant, &response.reply);
        reply.flight_options = response.flight_options.clone();
        reply.suggested_actions = response.suggestions.clone();
        reply.booking_step = response.booking_step;
        if let Err(e) = self.sessions.append(session_id, reply) {
            warn!(session = %session_id, error = %e, "failed to record assistant reply");
        }

        Ok(response)
    }

    async fn dispatch(
        &self,
        session_id: &str,
        message: &str,
        classification: &Classification,
    ) -> Result<EngineResponse, DialogueError> {
        match &classification.intent {
            Intent::FlightSearch { params } => {
                self.handle_flight_search(session_id, params, classification)
                    .await
            }
            Intent::FlightSelection { index } => {
                self.handle_flight_selection(session_id, message, *index, classification)
                    .await
            }
            Intent::FlightComparison => {
                self.handle_flight_comparison(session_id, classification).await
            }
            Intent::PreferenceUpdate { preferences } => {
                self.handle_preference_update(session_id, message, preferences, classification)
                    .await
            }
            Intent::RecommendationRequest => {
                self.handle_recommendation(session_id, classification).await
            }
            Intent::GeneralInquiry => {
                self.handle_general_inquiry(session_id, message, classification)
                    .await
            }
        }
    }

    // -------------------------------------------------------------------------
    // Intent handlers
    // -------------------------------------------------------------------------

    /// Merge newly extracted parameters into the session, then either ask for
    /// what is still missing or run the search and present ranked results.
    async fn handle_flight_search(
        &self,
        session_id: &str,
        extracted: &TravelParams,
        classification: &Classification,
    ) -> Result<EngineResponse, DialogueError> {
        let session = self.sessions.update(session_id, |s| {
            s.params.merge(extracted);
        })?;

        let Some(mut query) = session.params.to_query() else {
            let missing = session.params.missing_required();
            debug!(session = %session_id, missing = ?missing, "search needs clarification");
            return Ok(self.responder.clarification(session_id, &missing, classification));
        };
        query.max_stops = match session.preferences.stops {
            Some(StopPreference::Direct) => Some(0),
            Some(StopPreference::OneStop) => Some(1),
            Some(StopPreference::Flexible) | None => None,
        };

        let (mut flights, degraded) = self.search_flights(&query).await;
        if flights.is_empty() {
            return Ok(self.responder.no_flights(session_id, &query, classification));
        }
        flights.truncate(self.max_results);

        // Results are stored in ranked order so that ordinal references in
        // later turns resolve against the numbering the traveller saw.
        let ranked = score_flights(&flights, &session.preferences)?;
        let ordered: Vec<FlightResult> = ranked.iter().map(|s| s.flight.clone()).collect();
        let recommendation = recommend(&ordered, &session.preferences)?;

        let result_count = ordered.len();
        self.sessions.update(session_id, |s| {
            s.last_results = ordered;
        })?;

        info!(
            session = %session_id,
            origin = %query.origin,
            destination = %query.destination,
            results = result_count,
            degraded,
            "flight search completed"
        );
        Ok(self.responder.search_results(
            session_id,
            &query,
            &ranked,
            &recommendation,
            degraded,
            classification,
        ))
    }

    /// Resolve an ordinal reference against the stored results and advance
    /// the booking flow. An unresolvable reference changes nothing.
    async fn handle_flight_selection(
        &self,
        session_id: &str,
        message: &str,
        oracle_index: Option<usize>,
        classification: &Classification,
    ) -> Result<EngineResponse, DialogueError> {
        let session = self.sessions.get(session_id)?;
        if session.last_results.is_empty() {
            return Ok(self.responder.no_results_to_select(session_id, classification));
        }

        let index = oracle_index.or_else(|| extract_selection(message));
        let selected = index
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| session.last_results.get(i));
        let Some(flight) = selected else {
            return Ok(self.responder.invalid_selection(
                session_id,
                session.last_results.len(),
                classification,
            ));
        };

        let updated = self.sessions.update_step(
            session_id,
            BookingStep::FlightSelection.name(),
            serde_json::json!({ "flight_id": flight.id }),
        )?;

        info!(session = %session_id, flight = %flight.id, "flight selected");
        Ok(self
            .responder
            .flight_selected(session_id, flight, updated.next_step(), classification))
    }

    /// Compare the first three stored results side by side.
    async fn handle_flight_comparison(
        &self,
        session_id: &str,
        classification: &Classification,
    ) -> Result<EngineResponse, DialogueError> {
        let session = self.sessions.get(session_id)?;
        if session.last_results.len() < 2 {
            return Ok(self.responder.not_enough_to_compare(
                session_id,
                session.last_results.len(),
                classification,
            ));
        }

        let subset = &session.last_results[..session.last_results.len().min(3)];
        let entries = compare_flights(subset)?;
        Ok(self.responder.comparison(session_id, &entries, classification))
    }

    /// Merge stated preferences into the session and re-rank any stored
    /// results under the new weighting.
    async fn handle_preference_update(
        &self,
        session_id: &str,
        message: &str,
        oracle_preferences: &TravelPreferences,
        classification: &Classification,
    ) -> Result<EngineResponse, DialogueError> {
        // Oracle entities first, deterministic extraction second: when both
        // state the same field, the literal text of the message wins.
        let keyword_preferences = extract_preferences(message);
        let session = self.sessions.update(session_id, |s| {
            s.preferences.merge(oracle_preferences);
            s.preferences.merge(&keyword_preferences);
        })?;

        let reranked = if session.last_results.is_empty() {
            None
        } else {
            Some(self.rerank_stored(session_id, &session)?)
        };

        info!(session = %session_id, "travel preferences updated");
        Ok(self.responder.preferences_noted(
            session_id,
            &session.preferences,
            reranked.as_ref(),
            classification,
        ))
    }

    /// Recommend from the stored results without mutating anything.
    async fn handle_recommendation(
        &self,
        session_id: &str,
        classification: &Classification,
    ) -> Result<EngineResponse, DialogueError> {
        let session = self.sessions.get(session_id)?;
        if session.last_results.is_empty() {
            return Ok(self.responder.recommendation_advice(session_id, classification));
        }

        let recommendation = recommend(&session.last_results, &session.preferences)?;
        Ok(self.responder.recommendation(
            session_id,
            &recommendation,
            &session.preferences,
            classification,
        ))
    }

    /// Free-text questions go to the language oracle; if it is unreachable
    /// the traveller gets the canned capability summary instead.
    async fn handle_general_inquiry(
        &self,
        session_id: &str,
        message: &str,
        classification: &Classification,
    ) -> Result<EngineResponse, DialogueError> {
        let session = self.sessions.get(session_id)?;
        let prompt = self.responder.inquiry_prompt(message, &session);

        let text = self
            .oracle_breaker
            .call_with_fallback(
                || self.oracle.complete(&prompt),
                || self.responder.general_fallback_text(),
            )
            .await;
        let text = text.trim();
        // An empty completion reads as no answer at all.
        let text = if text.is_empty() {
            self.responder.general_fallback_text()
        } else {
            text.to_string()
        };

        Ok(self.responder.general(session_id, text, classification))
    }

    // -------------------------------------------------------------------------
    // Shared helpers
    // -------------------------------------------------------------------------

    /// Run a flight search through the retry policy inside the circuit
    /// breaker. Any unrecovered failure substitutes the static fallback
    /// inventory; the boolean tells the caller the results are degraded.
    async fn search_flights(&self, query: &FlightQuery) -> (Vec<FlightResult>, bool) {
        match self
            .search_breaker
            .call(|| self.retry.run(|| self.search.search(query)))
            .await
        {
            Ok(flights) => (flights, false),
            Err(e) => {
                warn!(error = %e, "flight search failed, substituting fallback inventory");
                (fallback_flights(query), true)
            }
        }
    }

    /// Re-score the stored results under the session's current preferences,
    /// persist the new order, and return the new recommendation.
    fn rerank_stored(
        &self,
        session_id: &str,
        session: &Session,
    ) -> Result<Recommendation, DialogueError> {
        let ranked = score_flights(&session.last_results, &session.preferences)?;
        let ordered: Vec<FlightResult> = ranked.iter().map(|s| s.flight.clone()).collect();
        let recommendation = recommend(&ordered, &session.preferences)?;
        self.sessions.update(session_id, |s| {
            s.last_results = ordered;
        })?;
        Ok(recommendation)
    }

    // -------------------------------------------------------------------------
    // Session surface
    // -------------------------------------------------------------------------

    pub fn get_session(&self, session_id: &str) -> Result<Session, DialogueError> {
        Ok(self.sessions.get(session_id)?)
    }

    /// Remove a session and its turn lock.
    pub fn clear_session(&self, session_id: &str) -> Result<(), DialogueError> {
        self.sessions.clear(session_id)?;
        self.turn_locks.remove(session_id);
        Ok(())
    }

    /// Validate and apply a booking-step payload arriving from outside the
    /// conversation (the HTTP surface).
    pub fn update_booking_step(
        &self,
        session_id: &str,
        step_name: &str,
        data: serde_json::Value,
    ) -> Result<Session, DialogueError> {
        Ok(self.sessions.update_step(session_id, step_name, data)?)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // -------------------------------------------------------------------------
    // Observability and shared infrastructure
    // -------------------------------------------------------------------------

    /// Point-in-time state of every circuit breaker, for health reporting.
    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        vec![
            self.search_breaker.snapshot(),
            self.oracle_breaker.snapshot(),
            self.payment_breaker.snapshot(),
            self.notify_breaker.snapshot(),
        ]
    }

    /// Shared handle to the flight-search breaker, so background maintenance
    /// and conversational traffic feed the same failure counters.
    pub fn search_breaker(&self) -> Arc<CircuitBreaker> {
        self.search_breaker.clone()
    }

    /// Shared handle to the notification breaker.
    pub fn notify_breaker(&self) -> Arc<CircuitBreaker> {
        self.notify_breaker.clone()
    }

    /// Administratively close the named breaker and zero its failure count.
    /// Returns `false` when no breaker carries that service name.
    pub fn reset_breaker(&self, service: &str) -> bool {
        let breakers = [
            &self.search_breaker,
            &self.oracle_breaker,
            &self.payment_breaker,
            &self.notify_breaker,
        ];
        match breakers.iter().find(|b| b.service() == service) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
