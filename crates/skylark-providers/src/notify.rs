//! Notification dispatch for booking confirmations and departure reminders.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use skylark_core::types::ContactDetails;

use crate::error::ProviderError;

/// Canonical service name for notification dispatch.
pub const NOTIFY_SERVICE: &str = "notifications";

/// Delivers a notification to a traveller.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        contact: &ContactDetails,
        subject: &str,
        body: &str,
    ) -> Result<(), ProviderError>;
}

// ---------------------------------------------------------------------------
// LogNotifier
// ---------------------------------------------------------------------------

/// Dispatcher that writes notifications to the log instead of sending them.
/// Default wiring for deployments without an email or SMS integration.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn dispatch(
        &self,
        contact: &ContactDetails,
        subject: &str,
        body: &str,
    ) -> Result<(), ProviderError> {
        info!(
            recipient = %contact.email,
            subject = %subject,
            body = %body,
            "notification dispatched"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CountingNotifier - recording double for tests
// ---------------------------------------------------------------------------

/// A notification captured by [`CountingNotifier`].
#[derive(Clone, Debug, PartialEq)]
pub struct SentNotification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Test dispatcher that records every notification, with fail-next-N
/// injection for exercising redelivery.
#[derive(Debug, Default)]
pub struct CountingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    fail_next: AtomicU32,
}

impl CountingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` dispatch calls fail before recovering.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Every successfully dispatched notification, in order.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl NotificationDispatcher for CountingNotifier {
    async fn dispatch(
        &self,
        contact: &ContactDetails,
        subject: &str,
        body: &str,
    ) -> Result<(), ProviderError> {
        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ProviderError::Unavailable {
                service: NOTIFY_SERVICE.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let mut sent = self
            .sent
            .lock()
            .map_err(|e| ProviderError::Storage(format!("notifier lock poisoned: {e}")))?;
        sent.push(SentNotification {
            recipient: contact.email.clone(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> ContactDetails {
        ContactDetails {
            email: "ada@example.com".to_string(),
            phone: Some("+1-555-0100".to_string()),
        }
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        let notifier = LogNotifier::new();
        let result = notifier
            .dispatch(&contact(), "Booking confirmed", "See you at the gate.")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_counting_notifier_records_in_order() {
        let notifier = CountingNotifier::new();
        notifier.dispatch(&contact(), "first", "a").await.unwrap();
        notifier.dispatch(&contact(), "second", "b").await.unwrap();

        let sent = notifier.sent();
        assert_eq!(notifier.count(), 2);
        assert_eq!(sent[0].subject, "first");
        assert_eq!(sent[1].subject, "second");
        assert_eq!(sent[0].recipient, "ada@example.com");
    }

    #[tokio::test]
    async fn test_counting_notifier_fail_next_skips_recording() {
        let notifier = CountingNotifier::new();
        notifier.fail_next(1);

        assert!(notifier.dispatch(&contact(), "lost", "x").await.is_err());
        assert!(notifier.dispatch(&contact(), "kept", "y").await.is_ok());

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "kept");
    }
}
