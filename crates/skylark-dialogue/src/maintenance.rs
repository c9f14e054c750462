//! Background maintenance loop: fare watching, departure reminders, and
//! expired-session sweeps.
//!
//! One worker owns all periodic duties so the application spawns a single
//! task. Each duty runs on its own cadence from [`MaintenanceConfig`] and
//! every outbound call goes through the shared circuit breakers, so a dead
//! collaborator degrades the loop instead of wedging it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::interval;
use tracing::{debug, warn};
use uuid::Uuid;

use skylark_core::config::{MaintenanceConfig, SkylarkConfig};
use skylark_core::types::{now_ts, BookingStatus, Reminder};
use skylark_providers::{BookingStore, FlightSearch, NotificationDispatcher};
use skylark_resilience::CircuitBreaker;
use skylark_session::SessionStore;

use crate::response::{flight_line, format_price};

/// Fare moves smaller than this are noise, not alerts.
const PRICE_ALERT_THRESHOLD: f64 = 0.01;

/// Periodic worker for everything that happens outside a conversation turn.
pub struct MaintenanceWorker {
    sessions: Arc<SessionStore>,
    search: Arc<dyn FlightSearch>,
    bookings: Arc<dyn BookingStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    search_breaker: Arc<CircuitBreaker>,
    notify_breaker: Arc<CircuitBreaker>,
    settings: MaintenanceConfig,
    sweep_interval_secs: u64,
    /// Scheduled reminders keyed by booking reference. Entries stay after
    /// dispatch (`sent = true`) so a booking is reminded at most once.
    reminders: Mutex<HashMap<String, Reminder>>,
    /// Last fare communicated per booking reference, seeded from the fare
    /// paid at booking time.
    watched_prices: Mutex<HashMap<String, f64>>,
    shutdown: Arc<Notify>,
}

impl MaintenanceWorker {
    pub fn new(
        config: &SkylarkConfig,
        sessions: Arc<SessionStore>,
        search: Arc<dyn FlightSearch>,
        bookings: Arc<dyn BookingStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        search_breaker: Arc<CircuitBreaker>,
        notify_breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            sessions,
            search,
            bookings,
            notifier,
            search_breaker,
            notify_breaker,
            settings: config.maintenance.clone(),
            sweep_interval_secs: config.session.sweep_interval_secs,
            reminders: Mutex::new(HashMap::new()),
            watched_prices: Mutex::new(HashMap::new()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Run the maintenance loop until [`shutdown`](Self::shutdown) is called.
    ///
    /// Every duty ticks once immediately on startup, then on its configured
    /// cadence.
    pub async fn run(&self) {
        // interval() panics on a zero period.
        let mut watch = interval(Duration::from_secs(
            self.settings.flight_watch_interval_secs.max(1),
        ));
        let mut schedule = interval(Duration::from_secs(
            self.settings.reminder_schedule_interval_secs.max(1),
        ));
        let mut dispatch = interval(Duration::from_secs(
            self.settings.reminder_dispatch_interval_secs.max(1),
        ));
        let mut sweep = interval(Duration::from_secs(self.sweep_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = watch.tick() => self.watch_flights().await,
                _ = schedule.tick() => self.schedule_reminders().await,
                _ = dispatch.tick() => self.dispatch_due_reminders().await,
                _ = sweep.tick() => {
                    if let Err(e) = self.sessions.sweep_expired() {
                        warn!(error = %e, "session sweep failed");
                    }
                }
                _ = self.shutdown.notified() => return,
            }
        }
    }

    /// Signal the worker to stop after its current duty.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Snapshot of scheduled reminders, soonest first.
    pub fn reminders(&self) -> Vec<Reminder> {
        let mut all: Vec<Reminder> = self
            .reminders
            .lock()
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by_key(|r| r.due_at);
        all
    }

    /// Re-check the live fare for every upcoming confirmed booking and alert
    /// the traveller when it moved. The last communicated fare is only
    /// updated after the alert goes out, so a failed notification is retried
    /// on the next tick.
    pub async fn watch_flights(&self) {
        let confirmed = match self.bookings.list_confirmed().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "fare watch could not list bookings");
                return;
            }
        };
        let now = now_ts();

        let active: HashSet<String> = confirmed.iter().map(|r| r.reference.clone()).collect();
        if let Ok(mut watched) = self.watched_prices.lock() {
            watched.retain(|reference, _| active.contains(reference));
        }

        for record in confirmed {
            if record.flight.departure_time.timestamp() <= now {
                continue;
            }

            let flight_id = record.flight.id.clone();
            let current = match self
                .search_breaker
                .call(|| self.search.get_by_id(&flight_id))
                .await
            {
                Ok(Some(flight)) => flight,
                Ok(None) => continue,
                Err(e) => {
                    debug!(reference = %record.reference, error = %e, "fare lookup failed");
                    continue;
                }
            };

            let known = {
                let Ok(mut watched) = self.watched_prices.lock() else {
                    return;
                };
                *watched
                    .entry(record.reference.clone())
                    .or_insert(record.flight.price)
            };
            if (current.price - known).abs() < PRICE_ALERT_THRESHOLD {
                continue;
            }

            let direction = if current.price < known {
                "dropped"
            } else {
                "gone up"
            };
            let subject = format!("Price update for booking {}", record.reference);
            let body = format!(
                "Hello {},\n\nThe fare for your flight has {} from {} to {}.\n\nFlight: {}",
                record.passenger.full_name,
                direction,
                format_price(known),
                format_price(current.price),
                flight_line(&current),
            );

            match self
                .notify_breaker
                .call(|| self.notifier.dispatch(&record.contact, &subject, &body))
                .await
            {
                Ok(()) => {
                    if let Ok(mut watched) = self.watched_prices.lock() {
                        watched.insert(record.reference.clone(), current.price);
                    }
                }
                Err(e) => {
                    warn!(reference = %record.reference, error = %e, "price alert failed");
                }
            }
        }
    }

    /// Create a departure reminder for every upcoming confirmed booking that
    /// does not have one yet, and drop reminders whose booking is gone.
    pub async fn schedule_reminders(&self) {
        let confirmed = match self.bookings.list_confirmed().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "reminder scheduling could not list bookings");
                return;
            }
        };
        let now = now_ts();
        let lead_secs = self.settings.reminder_lead_hours as i64 * 3600;
        let active: HashSet<String> = confirmed.iter().map(|r| r.reference.clone()).collect();

        let Ok(mut reminders) = self.reminders.lock() else {
            return;
        };
        reminders.retain(|reference, _| active.contains(reference));

        for record in &confirmed {
            let departure = record.flight.departure_time.timestamp();
            if departure <= now || reminders.contains_key(&record.reference) {
                continue;
            }
            let reminder = Reminder {
                id: Uuid::new_v4(),
                booking_reference: record.reference.clone(),
                due_at: departure - lead_secs,
                message: format!(
                    "Your trip is coming up. {}. Booking reference {}.",
                    flight_line(&record.flight),
                    record.reference,
                ),
                sent: false,
            };
            debug!(reference = %record.reference, due_at = reminder.due_at, "reminder scheduled");
            reminders.insert(record.reference.clone(), reminder);
        }
    }

    /// Send every due, unsent reminder. A reminder is marked sent only after
    /// the dispatch succeeds.
    pub async fn dispatch_due_reminders(&self) {
        let now = now_ts();
        let due: Vec<Reminder> = {
            let Ok(reminders) = self.reminders.lock() else {
                return;
            };
            reminders
                .values()
                .filter(|r| !r.sent && r.due_at <= now)
                .cloned()
                .collect()
        };

        for reminder in due {
            let record = match self.bookings.get(&reminder.booking_reference).await {
                Ok(record) => record,
                Err(e) => {
                    debug!(reference = %reminder.booking_reference, error = %e, "reminder lookup failed");
                    continue;
                }
            };
            if record.status != BookingStatus::Confirmed {
                if let Ok(mut reminders) = self.reminders.lock() {
                    reminders.remove(&reminder.booking_reference);
                }
                continue;
            }

            let subject = format!("Travel reminder for booking {}", reminder.booking_reference);
            match self
                .notify_breaker
                .call(|| self.notifier.dispatch(&record.contact, &subject, &reminder.message))
                .await
            {
                Ok(()) => {
                    if let Ok(mut reminders) = self.reminders.lock() {
                        if let Some(r) = reminders.get_mut(&reminder.booking_reference) {
                            r.sent = true;
                        }
                    }
                }
                Err(e) => {
                    warn!(reference = %reminder.booking_reference, error = %e, "reminder dispatch failed");
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
