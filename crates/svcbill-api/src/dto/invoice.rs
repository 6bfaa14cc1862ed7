//! Invoice DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use svcbill_core::models::{Invoice, InvoiceSource, InvoiceStatus};
use svcbill_services::ManualInvoiceRequest;
use uuid::Uuid;
use validator::Validate;

/// Create a manual invoice
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub company_service_id: Uuid,

    pub amount: Decimal,

    pub due_date: DateTime<Utc>,

    /// ISO 4217 code
    #[validate(length(equal = 3))]
    pub currency: Option<String>,

    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl From<CreateInvoiceRequest> for ManualInvoiceRequest {
    fn from(req: CreateInvoiceRequest) -> Self {
        Self {
            company_service_id: req.company_service_id,
            amount: req.amount,
            due_date: req.due_date,
            currency: req.currency,
            description: req.description,
        }
    }
}

/// Invoice as returned to operators
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub company_service_id: Uuid,
    pub invoice_number: String,
    pub amount: Decimal,
    pub currency: String,
    pub due_date: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub source: InvoiceSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Unpaid and past its due date right now
    pub is_overdue: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        let is_overdue = invoice.is_overdue_at(Utc::now());
        Self {
            id: invoice.id,
            company_service_id: invoice.company_service_id,
            invoice_number: invoice.invoice_number,
            amount: invoice.amount,
            currency: invoice.currency,
            due_date: invoice.due_date,
            status: invoice.status,
            source: invoice.source,
            paid_at: invoice.paid_at,
            paid_amount: invoice.paid_amount,
            description: invoice.description,
            created_by: invoice.created_by,
            is_overdue,
            created_at: invoice.created_at,
        }
    }
}
