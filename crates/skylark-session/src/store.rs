//! In-memory session store.
//!
//! All sessions live in one mutex-guarded map keyed by session id. Reads
//! and conversation activity refresh a session's idle clock; the sweep
//! removes sessions idle longer than the TTL. Structural updates go through
//! [`SessionStore::update`] or the step-validated
//! [`SessionStore::update_step`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::Deserialize;
use tracing::{debug, info};

use skylark_core::config::SessionConfig;
use skylark_core::types::{
    now_ts, BookingStep, ContactDetails, PassengerDetails, PaymentDetails,
};

use crate::error::SessionError;
use crate::types::{ConversationMessage, MessageRole, Session};

/// Owner of every live conversation session.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    ttl_minutes: u64,
}

impl SessionStore {
    pub fn new(ttl_minutes: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl_minutes,
        }
    }

    pub fn from_settings(settings: &SessionConfig) -> Self {
        Self::new(settings.ttl_minutes)
    }

    /// Fetch a session, creating a fresh one under this id if none exists.
    /// Either way the idle clock is refreshed. A user id supplied on any
    /// turn sticks to the session once.
    pub fn get_or_create(
        &self,
        id: &str,
        user_id: Option<&str>,
    ) -> Result<Session, SessionError> {
        let mut sessions = self.lock()?;
        let session = sessions.entry(id.to_string()).or_insert_with(|| {
            debug!(session = %id, "session created");
            Session::new(id)
        });
        if session.user_id.is_none() {
            session.user_id = user_id.map(String::from);
        }
        session.touch();
        Ok(session.clone())
    }

    /// Fetch an existing session, refreshing its idle clock.
    pub fn get(&self, id: &str) -> Result<Session, SessionError> {
        let mut sessions = self.lock()?;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.touch();
        Ok(session.clone())
    }

    /// Append one conversation message, evicting the oldest past the cap.
    pub fn append(&self, id: &str, message: ConversationMessage) -> Result<(), SessionError> {
        let mut sessions = self.lock()?;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.push(message);
        session.touch();
        Ok(())
    }

    /// Append a bare text message with no attachments.
    pub fn append_message(
        &self,
        id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<(), SessionError> {
        self.append(id, ConversationMessage::new(role, content))
    }

    /// Apply an arbitrary structural mutation and return the updated session.
    /// Does not refresh the idle clock; conversation activity does that.
    pub fn update<F>(&self, id: &str, mutate: F) -> Result<Session, SessionError>
    where
        F: FnOnce(&mut Session),
    {
        let mut sessions = self.lock()?;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        mutate(session);
        Ok(session.clone())
    }

    /// Validate and apply a booking-step payload, returning the updated
    /// session. The step name and payload shape both come from outside, so
    /// every branch validates before writing.
    pub fn update_step(
        &self,
        id: &str,
        step_name: &str,
        data: serde_json::Value,
    ) -> Result<Session, SessionError> {
        let step = BookingStep::from_name(step_name)
            .ok_or_else(|| SessionError::UnknownStep(step_name.to_string()))?;

        let mut sessions = self.lock()?;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        apply_step(session, step, data)?;
        session.touch();
        debug!(session = %id, step = %step, "booking step updated");
        Ok(session.clone())
    }

    /// Remove a session entirely.
    pub fn clear(&self, id: &str) -> Result<(), SessionError> {
        let mut sessions = self.lock()?;
        sessions
            .remove(id)
            .map(|_| debug!(session = %id, "session cleared"))
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Drop every session idle longer than the TTL. Returns how many were
    /// removed.
    pub fn sweep_expired(&self) -> Result<usize, SessionError> {
        let now = now_ts();
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.ttl_minutes, now));
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "expired sessions swept");
        }
        Ok(removed)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>, SessionError> {
        self.sessions
            .lock()
            .map_err(|e| SessionError::Storage(format!("session lock poisoned: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Step payload validation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct FlightSelectionPayload {
    flight_id: String,
}

#[derive(Deserialize)]
struct ConfirmationPayload {
    booking_reference: String,
}

fn apply_step(
    session: &mut Session,
    step: BookingStep,
    data: serde_json::Value,
) -> Result<(), SessionError> {
    let invalid = |detail: String| SessionError::InvalidStepData {
        step: step.name().to_string(),
        detail,
    };

    match step {
        BookingStep::FlightSelection => {
            let payload: FlightSelectionPayload =
                serde_json::from_value(data).map_err(|e| invalid(e.to_string()))?;
            let flight = session
                .last_results
                .iter()
                .find(|f| f.id == payload.flight_id)
                .ok_or_else(|| {
                    invalid(format!(
                        "flight '{}' is not among the current results",
                        payload.flight_id
                    ))
                })?;
            session.selected_flight = Some(flight.clone());
        }
        BookingStep::PassengerInfo => {
            let payload: PassengerDetails =
                serde_json::from_value(data).map_err(|e| invalid(e.to_string()))?;
            if payload.full_name.trim().is_empty() {
                return Err(invalid("full name is required".to_string()));
            }
            let passport_blank = payload
                .passport_number
                .as_deref()
                .map_or(true, |p| p.trim().is_empty());
            if passport_blank {
                return Err(invalid("passport number is required".to_string()));
            }
            session.passenger = Some(payload);
        }
        BookingStep::ContactInfo => {
            let payload: ContactDetails =
                serde_json::from_value(data).map_err(|e| invalid(e.to_string()))?;
            if !payload.email.contains('@') {
                return Err(invalid(format!("'{}' is not an email address", payload.email)));
            }
            session.contact = Some(payload);
        }
        BookingStep::Payment => {
            let payload: PaymentDetails =
                serde_json::from_value(data).map_err(|e| invalid(e.to_string()))?;
            if payload.instrument_token.trim().is_empty() {
                return Err(invalid("payment instrument is required".to_string()));
            }
            session.payment = Some(payload);
        }
        BookingStep::Confirmation => {
            let payload: ConfirmationPayload =
                serde_json::from_value(data).map_err(|e| invalid(e.to_string()))?;
            if payload.booking_reference.trim().is_empty() {
                return Err(invalid("booking reference is required".to_string()));
            }
            session.booking_reference = Some(payload.booking_reference);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skylark_core::types::FlightResult;

    fn store() -> SessionStore {
        SessionStore::new(30)
    }

    fn test_flight(id: &str) -> FlightResult {
        let departure = chrono::NaiveDate::from_ymd_opt(2025, 6, 12)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            .and_utc();
        FlightResult {
            id: id.to_string(),
            airline: "Meridian Air".to_string(),
            flight_number: "MA101".to_string(),
            origin: "NYC".to_string(),
            destination: "LON".to_string(),
            departure_time: departure,
            arrival_time: departure + chrono::Duration::minutes(420),
            duration_minutes: 420,
            stops: 0,
            price: 350.0,
            available_seats: 12,
        }
    }

    // ---- lifecycle ----

    #[test]
    fn test_get_or_create_returns_fresh_session() {
        let store = store();
        let session = store.get_or_create("conv-1", None).unwrap();

        assert_eq!(session.id, "conv-1");
        assert!(session.history.is_empty());
        assert!(session.selected_flight.is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = store();
        store.get_or_create("conv-1", None).unwrap();
        store
            .append_message("conv-1", MessageRole::User, "hello")
            .unwrap();

        let again = store.get_or_create("conv-1", None).unwrap();
        assert_eq!(again.history.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_user_id_sticks_once_supplied() {
        let store = store();
        store.get_or_create("conv-1", None).unwrap();

        let session = store.get_or_create("conv-1", Some("traveller-7")).unwrap();
        assert_eq!(session.user_id.as_deref(), Some("traveller-7"));

        // A later turn with a different user id does not overwrite it.
        let session = store.get_or_create("conv-1", Some("traveller-8")).unwrap();
        assert_eq!(session.user_id.as_deref(), Some("traveller-7"));
    }

    #[test]
    fn test_get_unknown_session_not_found() {
        let store = store();
        assert!(matches!(
            store.get("missing"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_append_to_unknown_session_not_found() {
        let store = store();
        let result = store.append_message("missing", MessageRole::User, "hi");
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_history_evicts_oldest_beyond_cap() {
        let store = store();
        store.get_or_create("conv-1", None).unwrap();
        for i in 0..21 {
            store
                .append_message("conv-1", MessageRole::User, &format!("message {i}"))
                .unwrap();
        }

        let session = store.get("conv-1").unwrap();
        assert_eq!(session.history.len(), 20);
        assert_eq!(session.history[0].content, "message 1");
        assert_eq!(session.history[19].content, "message 20");
    }

    #[test]
    fn test_clear_removes_session() {
        let store = store();
        store.get_or_create("conv-1", None).unwrap();
        store.clear("conv-1").unwrap();

        assert!(store.is_empty());
        assert!(matches!(
            store.clear("conv-1"),
            Err(SessionError::NotFound(_))
        ));
    }

    // ---- expiry sweep ----

    #[test]
    fn test_sweep_removes_only_expired_sessions() {
        let store = store();
        store.get_or_create("stale", None).unwrap();
        store.get_or_create("fresh", None).unwrap();

        store
            .update("stale", |s| {
                s.last_activity_at = now_ts() - 31 * 60;
            })
            .unwrap();

        let removed = store.sweep_expired().unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("fresh").is_ok());
        assert!(matches!(store.get("stale"), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_read_refreshes_idle_clock() {
        let store = store();
        store.get_or_create("conv-1", None).unwrap();
        store
            .update("conv-1", |s| {
                s.last_activity_at = now_ts() - 31 * 60;
            })
            .unwrap();

        // A read touches the session, so the sweep keeps it.
        store.get("conv-1").unwrap();
        assert_eq!(store.sweep_expired().unwrap(), 0);
    }

    // ---- booking steps ----

    #[test]
    fn test_update_step_unknown_step_rejected() {
        let store = store();
        store.get_or_create("conv-1", None).unwrap();
        let result = store.update_step("conv-1", "seat_upgrade", json!({}));
        assert!(matches!(result, Err(SessionError::UnknownStep(_))));
    }

    #[test]
    fn test_update_step_unknown_session_rejected() {
        let store = store();
        let result = store.update_step("missing", "flight_selection", json!({}));
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn test_flight_selection_requires_flight_from_results() {
        let store = store();
        store.get_or_create("conv-1", None).unwrap();
        store
            .update("conv-1", |s| {
                s.last_results = vec![test_flight("MA101-2025-06-12")];
            })
            .unwrap();

        let result = store.update_step(
            "conv-1",
            "flight_selection",
            json!({"flight_id": "ZZ999-2025-06-12"}),
        );
        assert!(matches!(result, Err(SessionError::InvalidStepData { .. })));

        let session = store
            .update_step(
                "conv-1",
                "flight_selection",
                json!({"flight_id": "MA101-2025-06-12"}),
            )
            .unwrap();
        assert_eq!(
            session.selected_flight.unwrap().id,
            "MA101-2025-06-12"
        );
    }

    #[test]
    fn test_passenger_info_validates_required_fields() {
        let store = store();
        store.get_or_create("conv-1", None).unwrap();

        let result = store.update_step(
            "conv-1",
            "passenger_info",
            json!({"full_name": "  ", "date_of_birth": "1990-12-10", "passport_number": "P1"}),
        );
        assert!(matches!(result, Err(SessionError::InvalidStepData { .. })));

        let session = store
            .update_step(
                "conv-1",
                "passenger_info",
                json!({
                    "full_name": "Ada Lovelace",
                    "date_of_birth": "1990-12-10",
                    "passport_number": "P1234567"
                }),
            )
            .unwrap();
        assert_eq!(session.passenger.unwrap().full_name, "Ada Lovelace");
    }

    #[test]
    fn test_contact_info_requires_plausible_email() {
        let store = store();
        store.get_or_create("conv-1", None).unwrap();

        let result = store.update_step(
            "conv-1",
            "contact_info",
            json!({"email": "not-an-email", "phone": "+1-555-0100"}),
        );
        assert!(matches!(result, Err(SessionError::InvalidStepData { .. })));
    }

    #[test]
    fn test_malformed_payload_shape_rejected() {
        let store = store();
        store.get_or_create("conv-1", None).unwrap();
        let result = store.update_step("conv-1", "payment", json!({"method": "card"}));
        assert!(matches!(result, Err(SessionError::InvalidStepData { .. })));
    }

    #[test]
    fn test_confirmation_records_reference() {
        let store = store();
        store.get_or_create("conv-1", None).unwrap();
        let session = store
            .update_step(
                "conv-1",
                "confirmation",
                json!({"booking_reference": "SKY-AAAA1111"}),
            )
            .unwrap();
        assert_eq!(session.booking_reference.unwrap(), "SKY-AAAA1111");
    }
}
