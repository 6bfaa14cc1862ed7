//! Payment webhook adapter
//!
//! Validates a payment notification, records the payment on its invoice and
//! hands full payments to the suspension handler. Deliveries may repeat: an
//! invoice that is already paid keeps its original payment data.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use svcbill_core::{
    config::SuspensionConfig,
    models::{PaymentConfirmation, PaymentWebhookData},
    traits::BillingStore,
    AppError, AppResult,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::bounded;
use crate::constants::MAX_PAID_AT_SKEW_SECS;
use crate::suspension_handler::{PaymentReactivationResult, SuspensionHandler};

/// What happened to the payment itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDisposition {
    /// The invoice is now paid
    Recorded,
    /// The invoice was paid by an earlier delivery
    AlreadyPaid,
    /// Less than the amount due; the invoice stays unpaid
    Partial,
}

/// Result of handling one webhook delivery
#[derive(Debug, Clone, Serialize)]
pub struct PaymentWebhookOutcome {
    pub invoice_id: Uuid,
    pub company_service_id: Uuid,
    pub payment: PaymentDisposition,
    pub amount_due: Decimal,
    pub paid_amount: Decimal,
    /// Absent for partial payments
    pub reactivation: Option<PaymentReactivationResult>,
}

/// Payment webhook adapter
pub struct PaymentWebhookAdapter<S: BillingStore> {
    store: Arc<S>,
    handler: Arc<SuspensionHandler<S>>,
    store_timeout: StdDuration,
}

impl<S: BillingStore> PaymentWebhookAdapter<S> {
    pub fn new(store: Arc<S>, handler: Arc<SuspensionHandler<S>>, config: &SuspensionConfig) -> Self {
        Self {
            store,
            handler,
            store_timeout: config.store_timeout(),
        }
    }

    #[instrument(skip(self, data), fields(invoice_id = %data.invoice_id, company_service_id = %data.company_service_id))]
    pub async fn handle(&self, data: PaymentWebhookData) -> AppResult<PaymentWebhookOutcome> {
        validate_payload(&data)?;

        let invoice = bounded(
            self.store_timeout,
            "find_invoice",
            self.store.find_invoice(data.invoice_id),
        )
        .await?
        .ok_or_else(|| AppError::InvoiceNotFound(data.invoice_id.to_string()))?;

        if invoice.company_service_id != data.company_service_id {
            warn!("Payment references a different company service than its invoice");
            return Err(AppError::InvalidInput(format!(
                "Invoice {} does not belong to company service {}",
                invoice.id, data.company_service_id
            )));
        }

        let mut outcome = PaymentWebhookOutcome {
            invoice_id: invoice.id,
            company_service_id: invoice.company_service_id,
            payment: PaymentDisposition::Recorded,
            amount_due: invoice.amount,
            paid_amount: data.paid_amount,
            reactivation: None,
        };

        if invoice.is_paid() {
            info!("Invoice already paid, re-checking reactivation only");
            outcome.payment = PaymentDisposition::AlreadyPaid;
        } else if !invoice.is_settled_by(data.paid_amount) {
            warn!(
                amount_due = %invoice.amount,
                paid_amount = %data.paid_amount,
                "Partial payment, invoice left unpaid"
            );
            outcome.payment = PaymentDisposition::Partial;
            return Ok(outcome);
        } else {
            bounded(
                self.store_timeout,
                "record_payment",
                self.store
                    .record_payment(invoice.id, data.paid_amount, data.paid_at),
            )
            .await?;
            info!(paid_amount = %data.paid_amount, "Payment recorded");
        }

        let confirmation = PaymentConfirmation::from(&data);
        outcome.reactivation = Some(self.handler.reactivate_on_payment(&confirmation).await?);

        Ok(outcome)
    }
}

/// Reject payloads no provider should send
fn validate_payload(data: &PaymentWebhookData) -> AppResult<()> {
    if data.paid_amount <= Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "paidAmount must be positive, got {}",
            data.paid_amount
        )));
    }

    let latest_allowed = Utc::now() + Duration::seconds(MAX_PAID_AT_SKEW_SECS);
    if data.paid_at > latest_allowed {
        return Err(AppError::Validation(format!(
            "paidAt {} lies in the future",
            data.paid_at.to_rfc3339()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn payload(paid_amount: Decimal, paid_at_offset: Duration) -> PaymentWebhookData {
        PaymentWebhookData {
            invoice_id: Uuid::new_v4(),
            company_service_id: Uuid::new_v4(),
            paid_amount,
            paid_at: Utc::now() + paid_at_offset,
        }
    }

    #[test]
    fn test_valid_payload() {
        assert!(validate_payload(&payload(dec!(10.00), Duration::minutes(-3))).is_ok());
        // small clock skew is tolerated
        assert!(validate_payload(&payload(dec!(10.00), Duration::minutes(2))).is_ok());
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        assert!(validate_payload(&payload(dec!(0), Duration::zero())).is_err());
        assert!(validate_payload(&payload(dec!(-5.00), Duration::zero())).is_err());
    }

    #[test]
    fn test_rejects_future_payment() {
        let err = validate_payload(&payload(dec!(10.00), Duration::hours(1))).unwrap_err();
        assert_eq!(err.error_code(), "validation_error");
    }
}
