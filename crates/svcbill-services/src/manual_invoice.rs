//! Manual invoice service
//!
//! Lets an operator bill a service outside the regular cycle. Creating an
//! invoice never suspends anything; the sweep picks it up once it is overdue.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use svcbill_core::{
    config::SuspensionConfig,
    models::{Actor, Invoice, InvoiceSource, NewInvoice},
    traits::BillingStore,
    AppError, AppResult,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::bounded;
use crate::constants::{DEFAULT_CURRENCY, MANUAL_INVOICE_PREFIX};

const MAX_DESCRIPTION_LEN: usize = 500;

/// Manual invoice request
#[derive(Debug, Clone)]
pub struct ManualInvoiceRequest {
    pub company_service_id: Uuid,
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    /// ISO 4217 code, defaults to USD
    pub currency: Option<String>,
    pub description: Option<String>,
}

/// Manual invoice service
pub struct ManualInvoiceService<S: BillingStore> {
    store: Arc<S>,
    store_timeout: Duration,
}

impl<S: BillingStore> ManualInvoiceService<S> {
    pub fn new(store: Arc<S>, config: &SuspensionConfig) -> Self {
        Self {
            store,
            store_timeout: config.store_timeout(),
        }
    }

    /// Create a pending manual invoice
    ///
    /// # Errors
    ///
    /// - `PolicyViolation` when `actor` is not an operator
    /// - `Validation` for a non-positive amount or malformed currency
    /// - `CompanyServiceNotFound` for an unknown service
    /// - `InvalidState` when the service is cancelled
    #[instrument(skip(self, request), fields(company_service_id = %request.company_service_id, actor = %actor))]
    pub async fn create_invoice(
        &self,
        request: ManualInvoiceRequest,
        actor: &Actor,
    ) -> AppResult<Invoice> {
        let Actor::Operator(operator) = actor else {
            warn!("Manual invoice requested by a non-operator");
            return Err(AppError::PolicyViolation(
                "Manual invoices can only be created by an operator".to_string(),
            ));
        };

        let currency = validate_request(&request)?;

        let service = bounded(
            self.store_timeout,
            "find_service",
            self.store.find_service(request.company_service_id),
        )
        .await?
        .ok_or_else(|| AppError::CompanyServiceNotFound(request.company_service_id.to_string()))?;

        if service.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "Company service {} is {}",
                service.id, service.status
            )));
        }

        let new_invoice = NewInvoice {
            company_service_id: service.id,
            invoice_number: generate_invoice_number(Utc::now()),
            amount: request.amount,
            currency,
            due_date: request.due_date,
            source: InvoiceSource::Manual,
            description: request.description,
            created_by: Some(operator.clone()),
        };

        let invoice = bounded(
            self.store_timeout,
            "create_invoice",
            self.store.create_invoice(&new_invoice),
        )
        .await?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            amount = %invoice.amount,
            "Manual invoice created"
        );

        Ok(invoice)
    }

    /// Invoices of a service, newest due date first
    #[instrument(skip(self))]
    pub async fn list_invoices(&self, company_service_id: Uuid) -> AppResult<Vec<Invoice>> {
        bounded(
            self.store_timeout,
            "find_service",
            self.store.find_service(company_service_id),
        )
        .await?
        .ok_or_else(|| AppError::CompanyServiceNotFound(company_service_id.to_string()))?;

        bounded(
            self.store_timeout,
            "list_invoices_by_service",
            self.store.list_invoices_by_service(company_service_id),
        )
        .await
    }
}

/// Check the request and return the normalized currency code
fn validate_request(request: &ManualInvoiceRequest) -> AppResult<String> {
    if request.amount <= Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "Invoice amount must be positive, got {}",
            request.amount
        )));
    }

    if let Some(description) = &request.description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(AppError::Validation(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
    }

    let currency = request
        .currency
        .as_deref()
        .unwrap_or(DEFAULT_CURRENCY)
        .trim()
        .to_uppercase();

    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Validation(format!(
            "Currency must be a 3-letter ISO code, got '{}'",
            currency
        )));
    }

    Ok(currency)
}

/// `MAN-YYYYMMDD-XXXXXXXX`
fn generate_invoice_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{}-{}-{}", MANUAL_INVOICE_PREFIX, now.format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn request(amount: Decimal, currency: Option<&str>) -> ManualInvoiceRequest {
        ManualInvoiceRequest {
            company_service_id: Uuid::new_v4(),
            amount,
            due_date: Utc::now(),
            currency: currency.map(str::to_string),
            description: None,
        }
    }

    #[test]
    fn test_invoice_number_format() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        let number = generate_invoice_number(now);

        assert!(number.starts_with("MAN-20240307-"));
        assert_eq!(number.len(), "MAN-20240307-".len() + 8);
        assert!(number[13..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_currency_defaults_and_normalizes() {
        assert_eq!(validate_request(&request(dec!(10), None)).unwrap(), "USD");
        assert_eq!(validate_request(&request(dec!(10), Some("eur"))).unwrap(), "EUR");
        assert!(validate_request(&request(dec!(10), Some("EURO"))).is_err());
    }

    #[test]
    fn test_amount_must_be_positive() {
        assert!(validate_request(&request(dec!(0), None)).is_err());
        assert!(validate_request(&request(dec!(-1.50), None)).is_err());
    }
}
