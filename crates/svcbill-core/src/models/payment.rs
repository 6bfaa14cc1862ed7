//! Inbound payment notification

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment confirmation delivered by the payment provider integration.
///
/// Transient: consumed once by the webhook adapter and never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWebhookData {
    pub invoice_id: Uuid,
    pub company_service_id: Uuid,
    pub paid_amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

/// Reference to a paid invoice, as consumed by the suspension handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub invoice_id: Uuid,
    pub company_service_id: Uuid,
}

impl From<&PaymentWebhookData> for PaymentConfirmation {
    fn from(data: &PaymentWebhookData) -> Self {
        Self {
            invoice_id: data.invoice_id,
            company_service_id: data.company_service_id,
        }
    }
}
