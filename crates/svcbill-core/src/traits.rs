//! Store traits for the suspension core
//!
//! The service manager and suspension handler only see these traits, so the
//! PostgreSQL store and the in-memory store are interchangeable.

use crate::error::AppError;
use crate::models::{
    CompanyService, Invoice, NewInvoice, OverdueInvoiceWithService, ServiceSuspensionHistory,
    StatusTransition, TransitionWrite,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Company service repository
#[async_trait]
pub trait CompanyServiceRepository: Send + Sync {
    /// Find a company service by ID
    async fn find_service(&self, id: Uuid) -> Result<Option<CompanyService>, AppError>;

    /// Apply a status transition and append its history row in one atomic unit.
    ///
    /// Writes nothing and returns [`TransitionWrite::Stale`] when the stored
    /// version no longer equals `transition.expected_version`, or
    /// [`TransitionWrite::InvoiceSettled`] when `transition.unpaid_invoice` is
    /// set and that invoice is already paid. The invoice check must hold off
    /// concurrent payments until the unit commits.
    async fn apply_transition(
        &self,
        transition: &StatusTransition,
    ) -> Result<TransitionWrite, AppError>;
}

/// Suspension history repository (read side; rows are written by `apply_transition`)
#[async_trait]
pub trait SuspensionHistoryRepository: Send + Sync {
    /// Page of history for a service, newest first, with the total count
    async fn list_history(
        &self,
        company_service_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ServiceSuspensionHistory>, i64), AppError>;

    /// Most recent history row for a service
    async fn latest_history(
        &self,
        company_service_id: Uuid,
    ) -> Result<Option<ServiceSuspensionHistory>, AppError>;
}

/// Invoice repository
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Find invoice by ID
    async fn find_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError>;

    /// Insert a new pending invoice
    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<Invoice, AppError>;

    /// Invoices of a service, newest due date first
    async fn list_invoices_by_service(
        &self,
        company_service_id: Uuid,
    ) -> Result<Vec<Invoice>, AppError>;

    /// Invoices with `due_date < now AND status != paid`, joined to their service
    async fn find_overdue(&self, now: DateTime<Utc>)
        -> Result<Vec<OverdueInvoiceWithService>, AppError>;

    /// Count overdue invoices of a service, optionally ignoring one invoice
    async fn count_overdue_for_service(
        &self,
        company_service_id: Uuid,
        now: DateTime<Utc>,
        exclude_invoice: Option<Uuid>,
    ) -> Result<i64, AppError>;

    /// Flip a `pending` invoice to `overdue`; returns whether a row changed
    async fn mark_overdue(&self, id: Uuid) -> Result<bool, AppError>;

    /// Mark an invoice paid. Leaves already-paid invoices untouched.
    async fn record_payment(
        &self,
        id: Uuid,
        paid_amount: Decimal,
        paid_at: DateTime<Utc>,
    ) -> Result<Invoice, AppError>;
}

/// Everything the suspension core needs from the billing record store
pub trait BillingStore:
    CompanyServiceRepository + SuspensionHistoryRepository + InvoiceRepository + 'static
{
}

impl<T> BillingStore for T where
    T: CompanyServiceRepository + SuspensionHistoryRepository + InvoiceRepository + 'static
{
}

/// Pagination parameters
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 1000),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}
