//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path/body parameters via axum extractors, delegates
//! to the orchestrator in AppState, and returns JSON responses.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use skylark_core::types::{BookingRecord, FlightResult, TravelParams, TravelPreferences};
use skylark_dialogue::{booking_steps, EngineResponse, StepStatus};
use skylark_resilience::BreakerSnapshot;
use skylark_session::{ConversationMessage, Session};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub message: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub breakers: Vec<BreakerSnapshot>,
}

/// Everything a conversation has established so far, plus the booking-flow
/// projection derived from it.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub created_at: i64,
    pub last_activity_at: i64,
    pub history: Vec<ConversationMessage>,
    pub params: TravelParams,
    pub preferences: TravelPreferences,
    pub results: Vec<FlightResult>,
    pub selected_flight: Option<FlightResult>,
    pub booking_reference: Option<String>,
    pub steps: Vec<StepStatus>,
}

impl SessionResponse {
    fn from_session(session: Session) -> Self {
        let steps = booking_steps(&session);
        Self {
            id: session.id,
            created_at: session.created_at,
            last_activity_at: session.last_activity_at,
            history: session.history,
            params: session.params,
            preferences: session.preferences,
            results: session.last_results,
            selected_flight: session.selected_flight,
            booking_reference: session.booking_reference,
            steps,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionClearedResponse {
    pub session_id: String,
    pub cleared: bool,
}

#[derive(Debug, Serialize)]
pub struct StepUpdateResponse {
    pub session_id: String,
    /// The next step that needs input, `null` once the flow is complete.
    pub next_step: Option<String>,
    pub steps: Vec<StepStatus>,
}

#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingRecord>,
}

#[derive(Debug, Serialize)]
pub struct BreakerResetResponse {
    pub service: String,
    pub reset: bool,
}

// =============================================================================
// Handler functions
// =============================================================================

/// POST /chat - run one conversational turn.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<EngineResponse>, ApiError> {
    if req.session_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Field 'session_id' must not be empty".to_string(),
        ));
    }

    let response = state
        .orchestrator
        .handle_message(&req.session_id, req.user_id.as_deref(), &req.message)
        .await?;
    Ok(Json(response))
}

/// GET /sessions/{id} - session contents and booking progress.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.orchestrator.get_session(&id)?;
    Ok(Json(SessionResponse::from_session(session)))
}

/// DELETE /sessions/{id} - drop a session and its conversation state.
pub async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionClearedResponse>, ApiError> {
    state.orchestrator.clear_session(&id)?;
    Ok(Json(SessionClearedResponse {
        session_id: id,
        cleared: true,
    }))
}

/// PUT /sessions/{id}/steps/{step} - submit data for one booking step.
pub async fn update_step(
    State(state): State<AppState>,
    Path((id, step)): Path<(String, String)>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<StepUpdateResponse>, ApiError> {
    let session = state.orchestrator.update_booking_step(&id, &step, payload)?;
    Ok(Json(StepUpdateResponse {
        session_id: id,
        next_step: session.next_step().map(|s| s.name().to_string()),
        steps: booking_steps(&session),
    }))
}

/// POST /sessions/{id}/booking/confirm - charge, persist and confirm.
pub async fn confirm_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookingRecord>, ApiError> {
    let record = state.orchestrator.confirm_booking(&id).await?;
    Ok(Json(record))
}

/// GET /sessions/{id}/bookings - every booking made in this session.
pub async fn list_bookings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookingListResponse>, ApiError> {
    let bookings = state.orchestrator.list_bookings(&id).await?;
    Ok(Json(BookingListResponse { bookings }))
}

/// POST /sessions/{id}/bookings/{reference}/cancel - cancel a booking.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path((id, reference)): Path<(String, String)>,
) -> Result<Json<BookingRecord>, ApiError> {
    let record = state.orchestrator.cancel_booking(&id, &reference).await?;
    Ok(Json(record))
}

/// POST /breakers/{service}/reset - administratively close a breaker.
pub async fn reset_breaker(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<BreakerResetResponse>, ApiError> {
    if !state.orchestrator.reset_breaker(&service) {
        return Err(ApiError::NotFound(format!(
            "No circuit breaker named '{service}'"
        )));
    }
    Ok(Json(BreakerResetResponse {
        service,
        reset: true,
    }))
}

/// GET /health - liveness, uptime, session count and breaker states.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: "0.1.0".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.orchestrator.session_count(),
        breakers: state.orchestrator.breaker_snapshots(),
    }))
}
