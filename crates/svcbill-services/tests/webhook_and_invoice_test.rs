//! Integration tests for the payment webhook adapter and manual invoices

mod common;

use chrono::{Duration, Utc};
use common::Harness;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use svcbill_core::{
    models::{Actor, Invoice, InvoiceSource, InvoiceStatus, PaymentWebhookData, ServiceStatus},
    AppError,
};
use svcbill_services::{ManualInvoiceRequest, PaymentDisposition};
use uuid::Uuid;

fn webhook_for(invoice: &Invoice, amount: Decimal) -> PaymentWebhookData {
    PaymentWebhookData {
        invoice_id: invoice.id,
        company_service_id: invoice.company_service_id,
        paid_amount: amount,
        paid_at: Utc::now() - Duration::minutes(1),
    }
}

#[tokio::test]
async fn duplicate_delivery_keeps_first_payment() {
    let h = Harness::new();
    let service = h.active_service();
    let invoice = h.overdue_invoice(service.id, 4);
    h.handler.check_overdue_and_suspend().await.unwrap();

    let first = h.webhook.handle(webhook_for(&invoice, dec!(50.00))).await.unwrap();
    assert_eq!(first.payment, PaymentDisposition::Recorded);
    assert!(first.reactivation.unwrap().is_reactivated());
    let paid_at = h.store.invoice(invoice.id).unwrap().paid_at;

    let second = h.webhook.handle(webhook_for(&invoice, dec!(75.00))).await.unwrap();
    assert_eq!(second.payment, PaymentDisposition::AlreadyPaid);
    assert!(!second.reactivation.unwrap().is_reactivated());

    let stored = h.store.invoice(invoice.id).unwrap();
    assert_eq!(stored.paid_amount, Some(dec!(50.00)));
    assert_eq!(stored.paid_at, paid_at);
    assert_eq!(h.history_len(service.id), 2);
}

#[tokio::test]
async fn partial_payment_is_not_recorded() {
    let h = Harness::new();
    let service = h.active_service();
    let invoice = h.overdue_invoice(service.id, 4);
    h.handler.check_overdue_and_suspend().await.unwrap();

    let outcome = h.webhook.handle(webhook_for(&invoice, dec!(20.00))).await.unwrap();

    assert_eq!(outcome.payment, PaymentDisposition::Partial);
    assert_eq!(outcome.amount_due, dec!(50.00));
    assert!(outcome.reactivation.is_none());
    assert!(!h.store.invoice(invoice.id).unwrap().is_paid());
    assert_eq!(h.status_of(service.id), ServiceStatus::Suspended);
}

#[tokio::test]
async fn overpayment_settles_invoice() {
    let h = Harness::new();
    let service = h.active_service();
    let invoice = h.overdue_invoice(service.id, 1);

    let outcome = h.webhook.handle(webhook_for(&invoice, dec!(60.00))).await.unwrap();

    assert_eq!(outcome.payment, PaymentDisposition::Recorded);
    assert_eq!(
        h.store.invoice(invoice.id).unwrap().status,
        InvoiceStatus::Paid
    );
}

#[tokio::test]
async fn webhook_rejects_bad_payloads() {
    let h = Harness::new();
    let service = h.active_service();
    let other = h.active_service();
    let invoice = h.overdue_invoice(service.id, 1);

    let err = h.webhook.handle(webhook_for(&invoice, dec!(0))).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut future = webhook_for(&invoice, dec!(50.00));
    future.paid_at = Utc::now() + Duration::hours(2);
    let err = h.webhook.handle(future).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut mismatched = webhook_for(&invoice, dec!(50.00));
    mismatched.company_service_id = other.id;
    let err = h.webhook.handle(mismatched).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let mut unknown = webhook_for(&invoice, dec!(50.00));
    unknown.invoice_id = Uuid::new_v4();
    let err = h.webhook.handle(unknown).await.unwrap_err();
    assert!(err.is_not_found());

    assert!(!h.store.invoice(invoice.id).unwrap().is_paid());
}

fn manual_request(company_service_id: Uuid) -> ManualInvoiceRequest {
    ManualInvoiceRequest {
        company_service_id,
        amount: dec!(120.00),
        due_date: Utc::now() + Duration::days(15),
        currency: None,
        description: Some("Onboarding workshop".to_string()),
    }
}

#[tokio::test]
async fn operator_creates_pending_manual_invoice() {
    let h = Harness::new();
    let service = h.active_service();

    let invoice = h
        .invoices
        .create_invoice(manual_request(service.id), &Actor::operator("ana"))
        .await
        .unwrap();

    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.source, InvoiceSource::Manual);
    assert_eq!(invoice.currency, "USD");
    assert_eq!(invoice.created_by.as_deref(), Some("ana"));
    assert!(invoice.invoice_number.starts_with("MAN-"));

    // creating an invoice never touches the service
    assert_eq!(h.status_of(service.id), ServiceStatus::Active);
    assert_eq!(h.history_len(service.id), 0);
}

#[tokio::test]
async fn manual_invoice_rules() {
    let h = Harness::new();
    let service = h.active_service();
    let cancelled = h.service_with_status(ServiceStatus::Cancelled);

    let err = h
        .invoices
        .create_invoice(manual_request(service.id), &Actor::System)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PolicyViolation(_)));

    let err = h
        .invoices
        .create_invoice(manual_request(cancelled.id), &Actor::operator("ana"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let err = h
        .invoices
        .create_invoice(manual_request(Uuid::new_v4()), &Actor::operator("ana"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CompanyServiceNotFound(_)));

    let mut zero = manual_request(service.id);
    zero.amount = dec!(0);
    let err = h
        .invoices
        .create_invoice(zero, &Actor::operator("ana"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn overdue_manual_invoice_is_picked_up_by_next_sweep() {
    let h = Harness::new();
    let service = h.active_service();

    let mut request = manual_request(service.id);
    request.due_date = Utc::now() - Duration::days(1);
    h.invoices
        .create_invoice(request, &Actor::operator("ana"))
        .await
        .unwrap();
    assert_eq!(h.status_of(service.id), ServiceStatus::Active);

    let result = h.handler.check_overdue_and_suspend().await.unwrap();
    assert_eq!(result.suspended, 1);
    assert_eq!(h.status_of(service.id), ServiceStatus::Suspended);
}

#[tokio::test]
async fn list_invoices_newest_due_first() {
    let h = Harness::new();
    let service = h.active_service();
    let older = h.overdue_invoice(service.id, 30);
    let newer = h.invoice(service.id, dec!(10.00), Utc::now() + Duration::days(1));

    let invoices = h.invoices.list_invoices(service.id).await.unwrap();
    let ids: Vec<_> = invoices.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);

    let err = h.invoices.list_invoices(Uuid::new_v4()).await.unwrap_err();
    assert!(err.is_not_found());
}
