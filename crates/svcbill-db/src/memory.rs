//! In-memory billing store
//!
//! Implements the same store traits as `PgBillingStore` on top of mutex
//! guarded maps. Used by the test suites and for running the server without
//! a database. Faults (latency, outages, lost version races, payments landing
//! mid-sweep) can be injected per store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use svcbill_core::{
    models::{
        CompanyService, Invoice, InvoiceStatus, NewInvoice, OverdueInvoiceWithService,
        ServiceSuspensionHistory, StatusTransition, TransitionWrite,
    },
    traits::{CompanyServiceRepository, InvoiceRepository, SuspensionHistoryRepository},
    AppError, AppResult,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Records {
    services: HashMap<Uuid, CompanyService>,
    invoices: HashMap<Uuid, Invoice>,
    /// Append-only, in commit order
    history: Vec<ServiceSuspensionHistory>,
}

#[derive(Default)]
struct Faults {
    unavailable: bool,
    latency: Option<Duration>,
    lost_races: HashSet<Uuid>,
    broken_writes: HashSet<Uuid>,
    settle_after_scan: HashSet<Uuid>,
}

/// Billing store kept entirely in process memory
#[derive(Default)]
pub struct InMemoryBillingStore {
    records: Mutex<Records>,
    faults: Mutex<Faults>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a service record as-is
    pub fn insert_service(&self, service: CompanyService) -> CompanyService {
        self.records
            .lock()
            .services
            .insert(service.id, service.clone());
        service
    }

    /// Insert or replace an invoice record as-is
    pub fn insert_invoice(&self, invoice: Invoice) -> Invoice {
        self.records
            .lock()
            .invoices
            .insert(invoice.id, invoice.clone());
        invoice
    }

    /// Current snapshot of a service
    pub fn service(&self, id: Uuid) -> Option<CompanyService> {
        self.records.lock().services.get(&id).cloned()
    }

    /// Current snapshot of an invoice
    pub fn invoice(&self, id: Uuid) -> Option<Invoice> {
        self.records.lock().invoices.get(&id).cloned()
    }

    /// History of a service, oldest first
    pub fn history_for(&self, company_service_id: Uuid) -> Vec<ServiceSuspensionHistory> {
        self.records
            .lock()
            .history
            .iter()
            .filter(|h| h.company_service_id == company_service_id)
            .cloned()
            .collect()
    }

    /// Make every call fail with `StoreUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.lock().unavailable = unavailable;
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.faults.lock().latency = latency;
    }

    /// Make every transition of `company_service_id` lose its version check
    pub fn fail_transitions_for(&self, company_service_id: Uuid) {
        self.faults.lock().lost_races.insert(company_service_id);
    }

    /// Make every transition of `company_service_id` fail with `Database`
    pub fn fail_writes_for(&self, company_service_id: Uuid) {
        self.faults.lock().broken_writes.insert(company_service_id);
    }

    /// Pay `invoice_id` in full right after the next overdue scan has taken
    /// its snapshot, so the scan result still lists it as unpaid
    pub fn settle_after_overdue_scan(&self, invoice_id: Uuid) {
        self.faults.lock().settle_after_scan.insert(invoice_id);
    }

    async fn enter(&self) -> AppResult<()> {
        let (unavailable, latency) = {
            let faults = self.faults.lock();
            (faults.unavailable, faults.latency)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if unavailable {
            return Err(AppError::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl CompanyServiceRepository for InMemoryBillingStore {
    async fn find_service(&self, id: Uuid) -> AppResult<Option<CompanyService>> {
        self.enter().await?;
        Ok(self.service(id))
    }

    async fn apply_transition(&self, transition: &StatusTransition) -> AppResult<TransitionWrite> {
        self.enter().await?;

        let (lost_race, broken) = {
            let faults = self.faults.lock();
            (
                faults.lost_races.contains(&transition.company_service_id),
                faults.broken_writes.contains(&transition.company_service_id),
            )
        };

        if broken {
            return Err(AppError::Database(format!(
                "injected write failure for company service {}",
                transition.company_service_id
            )));
        }

        if lost_race {
            debug!(
                company_service_id = %transition.company_service_id,
                "Injected version conflict"
            );
            return Ok(TransitionWrite::Stale);
        }

        let now = Utc::now();
        let mut records = self.records.lock();

        if let Some(invoice_id) = transition.unpaid_invoice {
            if records.invoices.get(&invoice_id).map_or(true, Invoice::is_paid) {
                return Ok(TransitionWrite::InvoiceSettled);
            }
        }

        let Some(service) = records.services.get_mut(&transition.company_service_id) else {
            return Ok(TransitionWrite::Stale);
        };

        if service.version != transition.expected_version
            || service.status != transition.previous_status
        {
            return Ok(TransitionWrite::Stale);
        }

        service.status = transition.new_status;
        service.version += 1;
        service.updated_at = now;
        let updated = service.clone();

        let entry = transition.history_entry(now);
        records.history.push(entry.clone());

        Ok(TransitionWrite::Committed {
            service: updated,
            entry,
        })
    }
}

#[async_trait]
impl SuspensionHistoryRepository for InMemoryBillingStore {
    async fn list_history(
        &self,
        company_service_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<ServiceSuspensionHistory>, i64)> {
        self.enter().await?;
        let mut entries = self.history_for(company_service_id);
        entries.reverse();

        let total = entries.len() as i64;
        let page = entries
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok((page, total))
    }

    async fn latest_history(
        &self,
        company_service_id: Uuid,
    ) -> AppResult<Option<ServiceSuspensionHistory>> {
        self.enter().await?;
        Ok(self
            .records
            .lock()
            .history
            .iter()
            .rev()
            .find(|h| h.company_service_id == company_service_id)
            .cloned())
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryBillingStore {
    async fn find_invoice(&self, id: Uuid) -> AppResult<Option<Invoice>> {
        self.enter().await?;
        Ok(self.invoice(id))
    }

    async fn create_invoice(&self, invoice: &NewInvoice) -> AppResult<Invoice> {
        self.enter().await?;
        let mut records = self.records.lock();
        if records
            .invoices
            .values()
            .any(|i| i.invoice_number == invoice.invoice_number)
        {
            return Err(AppError::AlreadyExists(format!(
                "Invoice number {} already exists",
                invoice.invoice_number
            )));
        }

        let created = invoice.clone().into_invoice(Utc::now());
        records.invoices.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_invoices_by_service(&self, company_service_id: Uuid) -> AppResult<Vec<Invoice>> {
        self.enter().await?;
        let mut invoices: Vec<_> = self
            .records
            .lock()
            .invoices
            .values()
            .filter(|i| i.company_service_id == company_service_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.due_date.cmp(&a.due_date));
        Ok(invoices)
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<OverdueInvoiceWithService>> {
        self.enter().await?;
        let settle: Vec<Uuid> = self.faults.lock().settle_after_scan.drain().collect();
        let mut records = self.records.lock();
        let mut overdue: Vec<_> = records
            .invoices
            .values()
            .filter(|i| i.is_overdue_at(now))
            .filter_map(|i| {
                records
                    .services
                    .get(&i.company_service_id)
                    .map(|s| OverdueInvoiceWithService {
                        invoice: i.clone(),
                        service: s.clone(),
                    })
            })
            .collect();
        overdue.sort_by_key(|o| o.invoice.due_date);

        for id in settle {
            if let Some(invoice) = records.invoices.get_mut(&id) {
                debug!(invoice_id = %id, "Injected payment after overdue scan");
                invoice.status = InvoiceStatus::Paid;
                invoice.paid_amount = Some(invoice.amount);
                invoice.paid_at = Some(now);
                invoice.updated_at = now;
            }
        }

        Ok(overdue)
    }

    async fn count_overdue_for_service(
        &self,
        company_service_id: Uuid,
        now: DateTime<Utc>,
        exclude_invoice: Option<Uuid>,
    ) -> AppResult<i64> {
        self.enter().await?;
        let count = self
            .records
            .lock()
            .invoices
            .values()
            .filter(|i| i.company_service_id == company_service_id)
            .filter(|i| Some(i.id) != exclude_invoice)
            .filter(|i| i.is_overdue_at(now))
            .count();
        Ok(count as i64)
    }

    async fn mark_overdue(&self, id: Uuid) -> AppResult<bool> {
        self.enter().await?;
        let mut records = self.records.lock();
        match records.invoices.get_mut(&id) {
            Some(invoice) if invoice.status == InvoiceStatus::Pending => {
                invoice.status = InvoiceStatus::Overdue;
                invoice.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_payment(
        &self,
        id: Uuid,
        paid_amount: Decimal,
        paid_at: DateTime<Utc>,
    ) -> AppResult<Invoice> {
        self.enter().await?;
        let mut records = self.records.lock();
        let invoice = records
            .invoices
            .get_mut(&id)
            .ok_or_else(|| AppError::InvoiceNotFound(id.to_string()))?;

        if !invoice.is_paid() {
            invoice.status = InvoiceStatus::Paid;
            invoice.paid_amount = Some(paid_amount);
            invoice.paid_at = Some(paid_at);
            invoice.updated_at = Utc::now();
        }

        Ok(invoice.clone())
    }
}
