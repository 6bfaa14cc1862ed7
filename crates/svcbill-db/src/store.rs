//! PostgreSQL billing store
//!
//! Bundles the three repositories behind one value so services can be
//! generic over a single `BillingStore`.

use crate::repositories::{
    PgCompanyServiceRepository, PgInvoiceRepository, PgSuspensionHistoryRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use svcbill_core::{
    models::{
        CompanyService, Invoice, NewInvoice, OverdueInvoiceWithService, ServiceSuspensionHistory,
        StatusTransition, TransitionWrite,
    },
    traits::{CompanyServiceRepository, InvoiceRepository, SuspensionHistoryRepository},
    AppResult,
};
use uuid::Uuid;

/// Billing store backed by PostgreSQL
#[derive(Clone)]
pub struct PgBillingStore {
    services: PgCompanyServiceRepository,
    history: PgSuspensionHistoryRepository,
    invoices: PgInvoiceRepository,
}

impl PgBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            services: PgCompanyServiceRepository::new(pool.clone()),
            history: PgSuspensionHistoryRepository::new(pool.clone()),
            invoices: PgInvoiceRepository::new(pool),
        }
    }
}

#[async_trait]
impl CompanyServiceRepository for PgBillingStore {
    async fn find_service(&self, id: Uuid) -> AppResult<Option<CompanyService>> {
        self.services.find_service(id).await
    }

    async fn apply_transition(&self, transition: &StatusTransition) -> AppResult<TransitionWrite> {
        self.services.apply_transition(transition).await
    }
}

#[async_trait]
impl SuspensionHistoryRepository for PgBillingStore {
    async fn list_history(
        &self,
        company_service_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<ServiceSuspensionHistory>, i64)> {
        self.history
            .list_history(company_service_id, limit, offset)
            .await
    }

    async fn latest_history(
        &self,
        company_service_id: Uuid,
    ) -> AppResult<Option<ServiceSuspensionHistory>> {
        self.history.latest_history(company_service_id).await
    }
}

#[async_trait]
impl InvoiceRepository for PgBillingStore {
    async fn find_invoice(&self, id: Uuid) -> AppResult<Option<Invoice>> {
        self.invoices.find_invoice(id).await
    }

    async fn create_invoice(&self, invoice: &NewInvoice) -> AppResult<Invoice> {
        self.invoices.create_invoice(invoice).await
    }

    async fn list_invoices_by_service(&self, company_service_id: Uuid) -> AppResult<Vec<Invoice>> {
        self.invoices
            .list_invoices_by_service(company_service_id)
            .await
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<OverdueInvoiceWithService>> {
        self.invoices.find_overdue(now).await
    }

    async fn count_overdue_for_service(
        &self,
        company_service_id: Uuid,
        now: DateTime<Utc>,
        exclude_invoice: Option<Uuid>,
    ) -> AppResult<i64> {
        self.invoices
            .count_overdue_for_service(company_service_id, now, exclude_invoice)
            .await
    }

    async fn mark_overdue(&self, id: Uuid) -> AppResult<bool> {
        self.invoices.mark_overdue(id).await
    }

    async fn record_payment(
        &self,
        id: Uuid,
        paid_amount: Decimal,
        paid_at: DateTime<Utc>,
    ) -> AppResult<Invoice> {
        self.invoices.record_payment(id, paid_amount, paid_at).await
    }
}
