//! Booking ledger.
//!
//! `MemoryBookingStore` keeps confirmed bookings in process memory, which is
//! enough for a single-node deployment and doubles as the test fixture. The
//! trait exists so a durable backend can be swapped in without touching the
//! orchestrator.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use skylark_core::types::{BookingRecord, BookingStatus};

use crate::error::ProviderError;

/// Generate an opaque booking reference, e.g. `SKY-3F9A2C1B`.
pub fn new_booking_reference() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("SKY-{}", id[..8].to_uppercase())
}

/// Persists bookings keyed by their reference.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Store a new booking. Fails with `Conflict` if the reference exists.
    async fn create(&self, record: BookingRecord) -> Result<(), ProviderError>;

    /// Fetch a booking by reference.
    async fn get(&self, reference: &str) -> Result<BookingRecord, ProviderError>;

    /// Cancel a confirmed booking, returning the updated record. Cancelling
    /// twice is a `Conflict`.
    async fn cancel(&self, reference: &str) -> Result<BookingRecord, ProviderError>;

    /// All bookings made from one conversation session, oldest first.
    async fn list_for_session(&self, session_id: &str) -> Result<Vec<BookingRecord>, ProviderError>;

    /// All currently confirmed bookings, oldest first. Used by the
    /// maintenance loops to schedule reminders and watch fares.
    async fn list_confirmed(&self) -> Result<Vec<BookingRecord>, ProviderError>;
}

// ---------------------------------------------------------------------------
// MemoryBookingStore
// ---------------------------------------------------------------------------

/// In-memory booking ledger.
#[derive(Debug, Default)]
pub struct MemoryBookingStore {
    records: Mutex<HashMap<String, BookingRecord>>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, BookingRecord>>, ProviderError> {
        self.records
            .lock()
            .map_err(|e| ProviderError::Storage(format!("booking store lock poisoned: {e}")))
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn create(&self, record: BookingRecord) -> Result<(), ProviderError> {
        let mut records = self.lock()?;
        if records.contains_key(&record.reference) {
            return Err(ProviderError::Conflict(format!(
                "booking '{}' already exists",
                record.reference
            )));
        }
        info!(
            reference = %record.reference,
            flight = %record.flight.flight_number,
            "booking stored"
        );
        records.insert(record.reference.clone(), record);
        Ok(())
    }

    async fn get(&self, reference: &str) -> Result<BookingRecord, ProviderError> {
        let records = self.lock()?;
        records
            .get(reference)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("booking '{reference}'")))
    }

    async fn cancel(&self, reference: &str) -> Result<BookingRecord, ProviderError> {
        let mut records = self.lock()?;
        let record = records
            .get_mut(reference)
            .ok_or_else(|| ProviderError::NotFound(format!("booking '{reference}'")))?;

        if record.status == BookingStatus::Cancelled {
            return Err(ProviderError::Conflict(format!(
                "booking '{reference}' is already cancelled"
            )));
        }

        record.status = BookingStatus::Cancelled;
        info!(reference = %reference, "booking cancelled");
        Ok(record.clone())
    }

    async fn list_for_session(&self, session_id: &str) -> Result<Vec<BookingRecord>, ProviderError> {
        let records = self.lock()?;
        let mut matching: Vec<_> = records
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        Ok(matching)
    }

    async fn list_confirmed(&self) -> Result<Vec<BookingRecord>, ProviderError> {
        let records = self.lock()?;
        let mut confirmed: Vec<_> = records
            .values()
            .filter(|r| r.status == BookingStatus::Confirmed)
            .cloned()
            .collect();
        confirmed.sort_by_key(|r| r.created_at);
        Ok(confirmed)
    }
}
