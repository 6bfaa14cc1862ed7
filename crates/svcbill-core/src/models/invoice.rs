//! Invoice model
//!
//! Billing obligations tied to a company service.

use super::company_service::CompanyService;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Invoice status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Paid,
    Overdue,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Pending => write!(f, "pending"),
            InvoiceStatus::Paid => write!(f, "paid"),
            InvoiceStatus::Overdue => write!(f, "overdue"),
        }
    }
}

impl InvoiceStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(InvoiceStatus::Pending),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            _ => None,
        }
    }
}

/// How an invoice came into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceSource {
    /// Regular billing cycle
    #[default]
    Cycle,
    /// Created by an operator outside the cycle
    Manual,
}

impl fmt::Display for InvoiceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceSource::Cycle => write!(f, "cycle"),
            InvoiceSource::Manual => write!(f, "manual"),
        }
    }
}

impl InvoiceSource {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cycle" => Some(InvoiceSource::Cycle),
            "manual" => Some(InvoiceSource::Manual),
            _ => None,
        }
    }
}

/// Invoice entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: Uuid,

    /// Subscription this invoice bills
    pub company_service_id: Uuid,

    /// Human-facing invoice number
    pub invoice_number: String,

    /// Amount due
    pub amount: Decimal,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Payment due date
    pub due_date: DateTime<Utc>,

    /// Current status
    pub status: InvoiceStatus,

    /// When payment was confirmed
    pub paid_at: Option<DateTime<Utc>>,

    /// Amount received with the confirming payment
    pub paid_amount: Option<Decimal>,

    /// Cycle or manual
    pub source: InvoiceSource,

    /// Free-text description
    pub description: Option<String>,

    /// Operator who created the invoice (manual invoices only)
    pub created_by: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    #[inline]
    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// Past due and not paid at `now`
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_paid() && self.due_date < now
    }

    /// Whether `paid_amount` settles this invoice in full
    pub fn is_settled_by(&self, paid_amount: Decimal) -> bool {
        paid_amount >= self.amount
    }
}

/// Data for creating an invoice
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub company_service_id: Uuid,
    pub invoice_number: String,
    pub amount: Decimal,
    pub currency: String,
    pub due_date: DateTime<Utc>,
    pub source: InvoiceSource,
    pub description: Option<String>,
    pub created_by: Option<String>,
}

impl NewInvoice {
    /// Build a pending invoice record from this data
    pub fn into_invoice(self, now: DateTime<Utc>) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            company_service_id: self.company_service_id,
            invoice_number: self.invoice_number,
            amount: self.amount,
            currency: self.currency,
            due_date: self.due_date,
            status: InvoiceStatus::Pending,
            paid_at: None,
            paid_amount: None,
            source: self.source,
            description: self.description,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An overdue invoice joined with the service it bills
#[derive(Debug, Clone, Serialize)]
pub struct OverdueInvoiceWithService {
    pub invoice: Invoice,
    pub service: CompanyService,
}
