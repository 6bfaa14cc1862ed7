//! Shared fixtures for the service integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use svcbill_core::{
    config::SuspensionConfig,
    models::{CompanyService, Invoice, InvoiceSource, NewInvoice, ServiceStatus},
    traits::InvoiceRepository,
};
use svcbill_db::InMemoryBillingStore;
use svcbill_services::{
    ManualInvoiceService, PaymentWebhookAdapter, ServiceManager, SuspensionHandler,
};
use uuid::Uuid;

pub type Store = InMemoryBillingStore;

/// All services wired to one in-memory store
pub struct Harness {
    pub config: SuspensionConfig,
    pub store: Arc<Store>,
    pub manager: Arc<ServiceManager<Store>>,
    pub handler: Arc<SuspensionHandler<Store>>,
    pub webhook: PaymentWebhookAdapter<Store>,
    pub invoices: ManualInvoiceService<Store>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SuspensionConfig::default())
    }

    pub fn with_config(config: SuspensionConfig) -> Self {
        let store = Arc::new(InMemoryBillingStore::new());
        let manager = Arc::new(ServiceManager::new(store.clone(), &config));
        let handler = Arc::new(SuspensionHandler::new(
            store.clone(),
            manager.clone(),
            &config,
        ));
        let webhook = PaymentWebhookAdapter::new(store.clone(), handler.clone(), &config);
        let invoices = ManualInvoiceService::new(store.clone(), &config);

        Self {
            config,
            store,
            manager,
            handler,
            webhook,
            invoices,
        }
    }

    pub fn active_service(&self) -> CompanyService {
        self.service_with_status(ServiceStatus::Active)
    }

    pub fn service_with_status(&self, status: ServiceStatus) -> CompanyService {
        let mut service = CompanyService::new(Uuid::new_v4(), "whatsapp_bot", "pro");
        service.status = status;
        self.store.insert_service(service)
    }

    /// Pending invoice of `amount` due at `due_date`
    pub fn invoice(
        &self,
        company_service_id: Uuid,
        amount: Decimal,
        due_date: DateTime<Utc>,
    ) -> Invoice {
        let invoice = NewInvoice {
            company_service_id,
            invoice_number: format!("INV-{}", Uuid::new_v4().simple()),
            amount,
            currency: "USD".to_string(),
            due_date,
            source: InvoiceSource::Cycle,
            description: None,
            created_by: None,
        }
        .into_invoice(due_date - Duration::days(30));

        self.store.insert_invoice(invoice)
    }

    /// Pending invoice of 50.00 that fell due `days` days ago
    pub fn overdue_invoice(&self, company_service_id: Uuid, days: i64) -> Invoice {
        self.invoice(company_service_id, dec!(50.00), Utc::now() - Duration::days(days))
    }

    /// Record a full payment of `invoice` now
    pub async fn mark_paid(&self, invoice: &Invoice) -> Invoice {
        self.store
            .record_payment(invoice.id, invoice.amount, Utc::now())
            .await
            .expect("payment recorded")
    }

    pub fn history_len(&self, company_service_id: Uuid) -> usize {
        self.store.history_for(company_service_id).len()
    }

    pub fn status_of(&self, company_service_id: Uuid) -> ServiceStatus {
        self.store
            .service(company_service_id)
            .map(|s| s.status)
            .expect("service exists")
    }
}
