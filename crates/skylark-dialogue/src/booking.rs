//! Booking completion: confirmation, cancellation, and flow progress.
//!
//! The conversational handlers collect booking data step by step; the
//! operations here turn a completed flow into a charged, stored, notified
//! booking. Payment is deliberately never retried — an ambiguous outcome
//! must not risk a double charge — while the notification afterwards is
//! best-effort: the booking stands whether or not the email goes out.

use serde::Serialize;
use tracing::{info, warn};

use skylark_core::types::{now_ts, BookingRecord, BookingStatus, BookingStep};
use skylark_providers::{new_booking_reference, ProviderError};
use skylark_session::Session;

use crate::error::{flatten_call_error, DialogueError};
use crate::orchestrator::Orchestrator;

// =============================================================================
// Step projection
// =============================================================================

/// Completion status of one booking step, for progress displays.
#[derive(Clone, Debug, Serialize)]
pub struct StepStatus {
    pub step: BookingStep,
    pub complete: bool,
    /// True for the single step that currently needs input.
    pub current: bool,
}

/// Project the five-step booking flow against a session's state. Completion
/// is always derived from session fields, never stored separately.
pub fn booking_steps(session: &Session) -> Vec<StepStatus> {
    let next = session.next_step();
    BookingStep::ALL
        .into_iter()
        .map(|step| {
            let complete = match step {
                BookingStep::FlightSelection => session.selected_flight.is_some(),
                BookingStep::PassengerInfo => session.passenger.is_some(),
                BookingStep::ContactInfo => session.contact.is_some(),
                BookingStep::Payment => session.payment.is_some(),
                BookingStep::Confirmation => session.booking_reference.is_some(),
            };
            StepStatus {
                step,
                complete,
                current: next == Some(step),
            }
        })
        .collect()
}

fn incomplete(step: BookingStep) -> DialogueError {
    DialogueError::IncompleteBooking {
        missing: step.name().to_string(),
    }
}

// =============================================================================
// Booking operations
// =============================================================================

impl Orchestrator {
    /// Confirm the session's booking: charge the payment instrument, persist
    /// the record, mark the session confirmed, and send the confirmation.
    ///
    /// Requires every earlier step to be complete. The charge goes through
    /// the payment breaker but is never retried.
    pub async fn confirm_booking(&self, session_id: &str) -> Result<BookingRecord, DialogueError> {
        let session = self.sessions.get(session_id)?;

        match session.next_step() {
            Some(BookingStep::Confirmation) => {}
            Some(step) => return Err(incomplete(step)),
            None => {
                let reference = session.booking_reference.clone().unwrap_or_default();
                return Err(DialogueError::AlreadyConfirmed(reference));
            }
        }
        let flight = session
            .selected_flight
            .clone()
            .ok_or_else(|| incomplete(BookingStep::FlightSelection))?;
        let passenger = session
            .passenger
            .clone()
            .ok_or_else(|| incomplete(BookingStep::PassengerInfo))?;
        let contact = session
            .contact
            .clone()
            .ok_or_else(|| incomplete(BookingStep::ContactInfo))?;
        let payment = session
            .payment
            .clone()
            .ok_or_else(|| incomplete(BookingStep::Payment))?;

        let amount = flight.price * f64::from(session.params.passenger_count());
        let receipt = self
            .payment_breaker
            .call(|| self.payments.charge(&payment, amount, &self.currency))
            .await
            .map_err(flatten_call_error)?;

        let reference = new_booking_reference();
        let record = BookingRecord {
            reference: reference.clone(),
            session_id: session_id.to_string(),
            flight,
            passenger,
            contact,
            receipt,
            status: BookingStatus::Confirmed,
            created_at: now_ts(),
        };
        self.bookings.create(record.clone()).await?;

        self.sessions.update_step(
            session_id,
            BookingStep::Confirmation.name(),
            serde_json::json!({ "booking_reference": reference }),
        )?;

        info!(
            session = %session_id,
            reference = %reference,
            amount = record.receipt.amount,
            "booking confirmed"
        );

        let (subject, body) = self.responder.booking_email(&record);
        if let Err(e) = self
            .notify_breaker
            .call(|| self.notifier.dispatch(&record.contact, &subject, &body))
            .await
        {
            warn!(reference = %reference, error = %e, "confirmation notification failed");
        }

        Ok(record)
    }

    /// Cancel a booking owned by this session. The session's booking-flow
    /// state is reset so the conversation can start a new booking; stored
    /// search results are kept.
    pub async fn cancel_booking(
        &self,
        session_id: &str,
        reference: &str,
    ) -> Result<BookingRecord, DialogueError> {
        let existing = self.bookings.get(reference).await?;
        if existing.session_id != session_id {
            return Err(DialogueError::Provider(ProviderError::NotFound(format!(
                "booking '{reference}'"
            ))));
        }

        let record = self.bookings.cancel(reference).await?;

        let reset = self.sessions.update(session_id, |s| {
            if s.booking_reference.as_deref() == Some(reference) {
                s.reset_booking();
            }
        });
        if let Err(e) = reset {
            warn!(session = %session_id, error = %e, "could not reset session after cancellation");
        }

        info!(session = %session_id, reference = %reference, "booking cancelled");

        let (subject, body) = self.responder.cancellation_email(&record);
        if let Err(e) = self
            .notify_breaker
            .call(|| self.notifier.dispatch(&record.contact, &subject, &body))
            .await
        {
            warn!(reference = %reference, error = %e, "cancellation notification failed");
        }

        Ok(record)
    }

    /// Every booking this session has made, oldest first.
    pub async fn list_bookings(
        &self,
        session_id: &str,
    ) -> Result<Vec<BookingRecord>, DialogueError> {
        Ok(self.bookings.list_for_session(session_id).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};
    use skylark_core::config::SkylarkConfig;
    use skylark_core::types::{
        ContactDetails, FlightResult, PassengerDetails, PaymentDetails,
    };
    use skylark_providers::{
        ApprovingGateway, BookingStore, CountingNotifier, DecliningGateway, MemoryBookingStore,
        MockFlightSearch, PaymentGateway, ScriptedOracle,
    };
    use skylark_session::SessionStore;

    struct Harness {
        orchestrator: Orchestrator,
        bookings: Arc<MemoryBookingStore>,
        notifier: Arc<CountingNotifier>,
        sessions: Arc<SessionStore>,
    }

    fn harness() -> Harness {
        harness_with_gateway(Arc::new(ApprovingGateway::new()))
    }

    fn harness_with_gateway(gateway: Arc<dyn PaymentGateway>) -> Harness {
        let config = SkylarkConfig::default();
        let sessions = Arc::new(SessionStore::from_settings(&config.session));
        let bookings = Arc::new(MemoryBookingStore::new());
        let notifier = Arc::new(CountingNotifier::new());
        let orchestrator = Orchestrator::new(
            &config,
            sessions.clone(),
            Arc::new(ScriptedOracle::new()),
            Arc::new(MockFlightSearch::new(Vec::new())),
            bookings.clone(),
            gateway,
            notifier.clone(),
        );
        Harness {
            orchestrator,
            bookings,
            notifier,
            sessions,
        }
    }

    fn test_flight() -> FlightResult {
        let departure = Utc.with_ymd_and_hms(2026, 9, 14, 9, 0, 0).single().unwrap();
        FlightResult {
            id: "F1".to_string(),
            airline: "Meridian Air".to_string(),
            flight_number: "MA101".to_string(),
            origin: "SEA".to_string(),
            destination: "DEN".to_string(),
            departure_time: departure,
            arrival_time: departure + Duration::minutes(195),
            duration_minutes: 195,
            stops: 0,
            price: 350.0,
            available_seats: 8,
        }
    }

    fn passenger() -> PassengerDetails {
        PassengerDetails {
            full_name: "Dana Traveller".to_string(),
            date_of_birth: None,
            passport_number: Some("P1234567".to_string()),
        }
    }

    fn contact() -> ContactDetails {
        ContactDetails {
            email: "dana@example.com".to_string(),
            phone: None,
        }
    }

    fn payment() -> PaymentDetails {
        PaymentDetails {
            method: "card".to_string(),
            instrument_token: "tok_visa".to_string(),
        }
    }

    /// A session with every step before confirmation complete, for two
    /// passengers.
    fn ready_session(h: &Harness, id: &str) {
        h.sessions.get_or_create(id, None).unwrap();
        h.sessions
            .update(id, |s| {
                s.params.passengers = Some(2);
                s.last_results = vec![test_flight()];
                s.selected_flight = Some(test_flight());
                s.passenger = Some(passenger());
                s.contact = Some(contact());
                s.payment = Some(payment());
            })
            .unwrap();
    }

    // ---- confirmation ----

    #[tokio::test]
    async fn test_confirm_requires_each_step_in_order() {
        let h = harness();
        h.sessions.get_or_create("s1", None).unwrap();

        let err = h.orchestrator.confirm_booking("s1").await.unwrap_err();
        assert!(
            matches!(err, DialogueError::IncompleteBooking { ref missing } if missing == "flight_selection")
        );

        h.sessions
            .update("s1", |s| {
                s.last_results = vec![test_flight()];
                s.selected_flight = Some(test_flight());
            })
            .unwrap();
        let err = h.orchestrator.confirm_booking("s1").await.unwrap_err();
        assert!(
            matches!(err, DialogueError::IncompleteBooking { ref missing } if missing == "passenger_info")
        );
    }

    #[tokio::test]
    async fn test_confirm_charges_stores_and_notifies() {
        let h = harness();
        ready_session(&h, "s1");

        let record = h.orchestrator.confirm_booking("s1").await.unwrap();

        assert!(record.reference.starts_with("SKY-"));
        assert_eq!(record.status, BookingStatus::Confirmed);
        // Two passengers at $350 each.
        assert_eq!(record.receipt.amount, 700.0);
        assert_eq!(record.receipt.currency, "USD");

        let stored = h.bookings.get(&record.reference).await.unwrap();
        assert_eq!(stored.passenger.full_name, "Dana Traveller");

        let session = h.sessions.get("s1").unwrap();
        assert_eq!(session.booking_reference.as_deref(), Some(record.reference.as_str()));
        assert_eq!(session.next_step(), None);

        assert_eq!(h.notifier.count(), 1);
        let sent = h.notifier.sent();
        assert_eq!(sent[0].recipient, "dana@example.com");
        assert!(sent[0].subject.contains(&record.reference));
        assert!(sent[0].body.contains("$700.00"));
    }

    #[tokio::test]
    async fn test_confirm_twice_is_a_conflict() {
        let h = harness();
        ready_session(&h, "s1");

        let record = h.orchestrator.confirm_booking("s1").await.unwrap();
        let err = h.orchestrator.confirm_booking("s1").await.unwrap_err();
        assert!(
            matches!(err, DialogueError::AlreadyConfirmed(ref reference) if *reference == record.reference)
        );
    }

    #[tokio::test]
    async fn test_declined_payment_leaves_the_flow_open() {
        let h = harness_with_gateway(Arc::new(DecliningGateway::new("expired card")));
        ready_session(&h, "s1");

        let err = h.orchestrator.confirm_booking("s1").await.unwrap_err();
        assert!(matches!(
            err,
            DialogueError::Provider(ProviderError::Declined(_))
        ));

        // Nothing was stored and the flow can be retried after fixing payment.
        assert!(h.bookings.list_for_session("s1").await.unwrap().is_empty());
        let session = h.sessions.get("s1").unwrap();
        assert!(session.booking_reference.is_none());
        assert_eq!(session.next_step(), Some(BookingStep::Confirmation));
        assert_eq!(h.notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_void_the_booking() {
        let h = harness();
        ready_session(&h, "s1");
        h.notifier.fail_next(1);

        let record = h.orchestrator.confirm_booking("s1").await.unwrap();

        assert_eq!(h.notifier.count(), 0, "email never went out");
        assert!(h.bookings.get(&record.reference).await.is_ok());
        let session = h.sessions.get("s1").unwrap();
        assert!(session.booking_reference.is_some());
    }

    // ---- cancellation ----

    #[tokio::test]
    async fn test_cancel_resets_flow_but_keeps_results() {
        let h = harness();
        ready_session(&h, "s1");
        let record = h.orchestrator.confirm_booking("s1").await.unwrap();

        let cancelled = h
            .orchestrator
            .cancel_booking("s1", &record.reference)
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let session = h.sessions.get("s1").unwrap();
        assert!(session.booking_reference.is_none());
        assert!(session.selected_flight.is_none());
        assert_eq!(session.last_results.len(), 1, "search context survives");

        // Confirmation email plus cancellation email.
        assert_eq!(h.notifier.count(), 2);
        assert!(h.notifier.sent()[1].subject.contains("cancelled"));
    }

    #[tokio::test]
    async fn test_cancel_is_scoped_to_the_owning_session() {
        let h = harness();
        ready_session(&h, "s1");
        let record = h.orchestrator.confirm_booking("s1").await.unwrap();

        let err = h
            .orchestrator
            .cancel_booking("s2", &record.reference)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DialogueError::Provider(ProviderError::NotFound(_))
        ));

        let stored = h.bookings.get(&record.reference).await.unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_cancel_unknown_reference() {
        let h = harness();
        h.sessions.get_or_create("s1", None).unwrap();
        let err = h
            .orchestrator
            .cancel_booking("s1", "SKY-NOPE0000")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DialogueError::Provider(ProviderError::NotFound(_))
        ));
    }

    // ---- listing ----

    #[tokio::test]
    async fn test_list_bookings_is_per_session() {
        let h = harness();
        ready_session(&h, "s1");
        ready_session(&h, "s2");
        let first = h.orchestrator.confirm_booking("s1").await.unwrap();
        h.orchestrator.confirm_booking("s2").await.unwrap();

        let listed = h.orchestrator.list_bookings("s1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].reference, first.reference);

        assert!(h.orchestrator.list_bookings("s3").await.unwrap().is_empty());
    }

    // ---- step projection ----

    #[test]
    fn test_booking_steps_projection_walks_the_flow() {
        let mut session = Session::new("s1");
        let steps = booking_steps(&session);
        assert_eq!(steps.len(), 5);
        assert!(steps.iter().all(|s| !s.complete));
        assert!(steps[0].current, "flight selection is up first");

        session.last_results = vec![test_flight()];
        session.selected_flight = Some(test_flight());
        session.passenger = Some(passenger());
        let steps = booking_steps(&session);
        assert!(steps[0].complete && steps[1].complete);
        assert!(!steps[2].complete);
        assert!(steps[2].current, "contact info is next");
        assert_eq!(steps.iter().filter(|s| s.current).count(), 1);

        session.contact = Some(contact());
        session.payment = Some(payment());
        session.booking_reference = Some("SKY-AAAA1111".to_string());
        let steps = booking_steps(&session);
        assert!(steps.iter().all(|s| s.complete));
        assert!(steps.iter().all(|s| !s.current), "nothing left to do");
    }
}
