//! Payment capture.
//!
//! `ApprovingGateway` is the default single-node gateway: it validates the
//! charge and issues a receipt without contacting a processor. Payment is
//! the one call the orchestrator never retries, so gateways must treat each
//! `charge` as a fresh, unrepeatable attempt.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use skylark_core::types::{PaymentDetails, PaymentReceipt};

use crate::error::ProviderError;

/// Canonical service name for the payment gateway.
pub const PAYMENT_SERVICE: &str = "payments";

/// Captures a payment for a booking.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge the instrument and return a receipt.
    async fn charge(
        &self,
        payment: &PaymentDetails,
        amount: f64,
        currency: &str,
    ) -> Result<PaymentReceipt, ProviderError>;
}

// ---------------------------------------------------------------------------
// ApprovingGateway
// ---------------------------------------------------------------------------

/// Gateway that approves every structurally valid charge.
#[derive(Clone, Debug, Default)]
pub struct ApprovingGateway;

impl ApprovingGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentGateway for ApprovingGateway {
    async fn charge(
        &self,
        payment: &PaymentDetails,
        amount: f64,
        currency: &str,
    ) -> Result<PaymentReceipt, ProviderError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ProviderError::Declined(format!(
                "invalid charge amount {amount}"
            )));
        }
        if payment.instrument_token.trim().is_empty() {
            return Err(ProviderError::Declined(
                "missing payment instrument".to_string(),
            ));
        }

        let receipt = PaymentReceipt {
            transaction_id: format!("TXN-{}", Uuid::new_v4().simple()),
            amount: (amount * 100.0).round() / 100.0,
            currency: currency.to_string(),
        };
        info!(
            transaction = %receipt.transaction_id,
            amount = receipt.amount,
            currency = %receipt.currency,
            method = %payment.method,
            "payment captured"
        );
        Ok(receipt)
    }
}

// ---------------------------------------------------------------------------
// DecliningGateway - refusal double for tests
// ---------------------------------------------------------------------------

/// Test gateway that declines every charge with a fixed reason.
#[derive(Clone, Debug)]
pub struct DecliningGateway {
    reason: String,
}

impl DecliningGateway {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for DecliningGateway {
    fn default() -> Self {
        Self::new("card declined by issuer")
    }
}

#[async_trait]
impl PaymentGateway for DecliningGateway {
    async fn charge(
        &self,
        _payment: &PaymentDetails,
        _amount: f64,
        _currency: &str,
    ) -> Result<PaymentReceipt, ProviderError> {
        Err(ProviderError::Declined(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> PaymentDetails {
        PaymentDetails {
            method: "card".to_string(),
            instrument_token: "tok_visa_4242".to_string(),
        }
    }

    #[tokio::test]
    async fn test_approving_gateway_issues_receipt() {
        let gateway = ApprovingGateway::new();
        let receipt = gateway.charge(&card(), 349.999, "USD").await.unwrap();

        assert!(receipt.transaction_id.starts_with("TXN-"));
        assert_eq!(receipt.amount, 350.0);
        assert_eq!(receipt.currency, "USD");
    }

    #[tokio::test]
    async fn test_non_positive_amount_declined() {
        let gateway = ApprovingGateway::new();
        assert!(matches!(
            gateway.charge(&card(), 0.0, "USD").await,
            Err(ProviderError::Declined(_))
        ));
        assert!(matches!(
            gateway.charge(&card(), -10.0, "USD").await,
            Err(ProviderError::Declined(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_instrument_declined() {
        let gateway = ApprovingGateway::new();
        let payment = PaymentDetails {
            method: "card".to_string(),
            instrument_token: "  ".to_string(),
        };
        let result = gateway.charge(&payment, 100.0, "USD").await;
        assert!(matches!(result, Err(ProviderError::Declined(_))));
    }

    #[tokio::test]
    async fn test_declining_gateway_always_declines() {
        let gateway = DecliningGateway::default();
        let result = gateway.charge(&card(), 100.0, "USD").await;
        assert!(matches!(
            result,
            Err(ProviderError::Declined(reason)) if reason == "card declined by issuer"
        ));
    }
}
