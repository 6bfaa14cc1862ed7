//! HTTP tests for the svcbill routes, backed by the in-memory store

use actix_web::{http::StatusCode, test, web, App};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use svcbill_api::{configure, AppServices};
use svcbill_auth::JwtService;
use svcbill_core::config::SuspensionConfig;
use svcbill_core::models::{
    CompanyService, InvoiceSource, NewInvoice, ServiceStatus, SuspensionReason, UserRole,
};
use svcbill_db::InMemoryBillingStore;
use uuid::Uuid;

struct Fixture {
    store: Arc<InMemoryBillingStore>,
    services: AppServices<InMemoryBillingStore>,
    jwt: Arc<JwtService>,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(InMemoryBillingStore::new());
        let services = AppServices::new(store.clone(), &SuspensionConfig::default());
        let jwt = Arc::new(JwtService::new("handlers-test-secret", 3600));
        Self {
            store,
            services,
            jwt,
        }
    }

    fn bearer(&self, username: &str, role: UserRole) -> (&'static str, String) {
        let token = self.jwt.create_token_for_user(username, role).unwrap();
        ("Authorization", format!("Bearer {}", token))
    }

    fn admin(&self) -> (&'static str, String) {
        self.bearer("ana", UserRole::Admin)
    }

    fn service(&self, status: ServiceStatus) -> CompanyService {
        let mut service = CompanyService::new(Uuid::new_v4(), "whatsapp_bot", "pro");
        service.status = status;
        self.store.insert_service(service)
    }

    fn overdue_invoice(&self, company_service_id: Uuid) -> Uuid {
        let due = Utc::now() - Duration::days(3);
        let invoice = NewInvoice {
            company_service_id,
            invoice_number: format!("INV-{}", Uuid::new_v4().simple()),
            amount: dec!(50.00),
            currency: "USD".to_string(),
            due_date: due,
            source: InvoiceSource::Cycle,
            description: None,
            created_by: None,
        }
        .into_invoice(due - Duration::days(30));
        self.store.insert_invoice(invoice).id
    }
}

macro_rules! app {
    ($fx:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($fx.services.clone()))
                .app_data(web::Data::new($fx.jwt.clone()))
                .configure(configure::<InMemoryBillingStore>),
        )
        .await
    };
}

#[actix_web::test]
async fn health_needs_no_token() {
    let fx = Fixture::new();
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn control_endpoints_require_admin() {
    let fx = Fixture::new();
    let service = fx.service(ServiceStatus::Active);
    let app = app!(fx);
    let uri = format!("/api/v1/company-services/{}/suspend", service.id);

    let req = test::TestRequest::post().uri(&uri).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(fx.bearer("support", UserRole::Operator))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    assert_eq!(fx.store.service(service.id).unwrap().status, ServiceStatus::Active);
    assert!(fx.store.history_for(service.id).is_empty());
}

#[actix_web::test]
async fn suspend_twice_is_applied_then_no_op() {
    let fx = Fixture::new();
    let service = fx.service(ServiceStatus::Active);
    let app = app!(fx);
    let uri = format!("/api/v1/company-services/{}/suspend", service.id);

    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(fx.admin())
        .set_json(json!({ "note": "chargeback review" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["outcome"], "applied");
    assert_eq!(body["current_status"], "suspended");
    assert_eq!(body["history_entry"]["reason"], "manual");
    assert_eq!(body["history_entry"]["actor"], "operator:ana");

    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(fx.admin())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["outcome"], "no_op");

    let history = fx.store.history_for(service.id);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].reason, SuspensionReason::Manual);
    assert_eq!(history[0].note.as_deref(), Some("chargeback review"));
}

#[actix_web::test]
async fn reactivate_outcomes_map_to_status_codes() {
    let fx = Fixture::new();
    let active = fx.service(ServiceStatus::Active);
    let cancelled = fx.service(ServiceStatus::Cancelled);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/company-services/{}/reactivate", active.id))
        .insert_header(fx.admin())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["outcome"], "no_op");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/company-services/{}/reactivate", cancelled.id))
        .insert_header(fx.admin())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["outcome"], "invalid_state");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/company-services/{}/reactivate", Uuid::new_v4()))
        .insert_header(fx.admin())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["outcome"], "not_found");

    assert!(fx.store.history_for(active.id).is_empty());
    assert!(fx.store.history_for(cancelled.id).is_empty());
}

#[actix_web::test]
async fn unknown_reason_is_rejected() {
    let fx = Fixture::new();
    let service = fx.service(ServiceStatus::Active);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/company-services/{}/suspend", service.id))
        .insert_header(fx.admin())
        .set_json(json!({ "reason": "fraud" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "validation_error");
}

#[actix_web::test]
async fn malformed_control_body_is_rejected() {
    let fx = Fixture::new();
    let service = fx.service(ServiceStatus::Active);
    let app = app!(fx);
    let uri = format!("/api/v1/company-services/{}/suspend", service.id);

    // wrong field type must not fall back to an unpinned default suspend
    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(fx.admin())
        .set_json(json!({ "reason": "non_payment", "expected_version": 99, "note": 42 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "validation_error");

    let req = test::TestRequest::post()
        .uri(&uri)
        .insert_header(fx.admin())
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"reason\": \"manual\"")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(fx.store.service(service.id).unwrap().status, ServiceStatus::Active);
    assert!(fx.store.history_for(service.id).is_empty());
}

#[actix_web::test]
async fn stale_pinned_version_is_conflict() {
    let fx = Fixture::new();
    let service = fx.service(ServiceStatus::Active);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/company-services/{}/suspend", service.id))
        .insert_header(fx.admin())
        .set_json(json!({ "reason": "non_payment", "expected_version": service.version + 99 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["outcome"], "conflict");
    assert!(fx.store.history_for(service.id).is_empty());
}

#[actix_web::test]
async fn huge_page_number_is_rejected() {
    let fx = Fixture::new();
    let service = fx.service(ServiceStatus::Active);
    let app = app!(fx);

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/v1/company-services/{}?page={}",
            service.id,
            i64::MAX
        ))
        .insert_header(fx.admin())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "validation_error");
}

#[actix_web::test]
async fn status_lists_history_newest_first() {
    let fx = Fixture::new();
    let service = fx.service(ServiceStatus::Active);
    let app = app!(fx);

    for action in ["suspend", "reactivate", "suspend"] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/company-services/{}/{}", service.id, action))
            .insert_header(fx.admin())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/v1/company-services/{}?page=1&per_page=2",
            service.id
        ))
        .insert_header(fx.bearer("support", UserRole::Operator))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;

    let data = &body["data"];
    assert_eq!(data["service"]["status"], "suspended");
    assert_eq!(data["pagination"]["total"], 3);
    let history = data["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["new_status"], "suspended");
    assert_eq!(history[1]["new_status"], "active");
    assert_eq!(data["active_suspension"]["reason"], "manual");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/company-services/{}", Uuid::new_v4()))
        .insert_header(fx.admin())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn sweep_then_payment_webhook_reactivates() {
    let fx = Fixture::new();
    let service = fx.service(ServiceStatus::Active);
    let invoice_id = fx.overdue_invoice(service.id);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/sweeps")
        .insert_header(fx.admin())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["suspended"], 1);
    assert_eq!(fx.store.service(service.id).unwrap().status, ServiceStatus::Suspended);

    let payload = json!({
        "invoiceId": invoice_id,
        "companyServiceId": service.id,
        "paidAmount": "50.00",
        "paidAt": (Utc::now() - Duration::minutes(1)).to_rfc3339(),
    });
    let req = test::TestRequest::post()
        .uri("/api/v1/webhooks/payments")
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["payment"], "recorded");
    assert_eq!(body["reactivation"]["action"], "reactivated");
    assert_eq!(fx.store.service(service.id).unwrap().status, ServiceStatus::Active);

    // redelivery
    let req = test::TestRequest::post()
        .uri("/api/v1/webhooks/payments")
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["payment"], "already_paid");
    assert_eq!(fx.store.history_for(service.id).len(), 2);
}

#[actix_web::test]
async fn manual_suspension_survives_payment() {
    let fx = Fixture::new();
    let service = fx.service(ServiceStatus::Active);
    let invoice_id = fx.overdue_invoice(service.id);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/company-services/{}/suspend", service.id))
        .insert_header(fx.admin())
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/webhooks/payments")
        .set_json(json!({
            "invoiceId": invoice_id,
            "companyServiceId": service.id,
            "paidAmount": "50.00",
            "paidAt": Utc::now().to_rfc3339(),
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["reactivation"]["action"], "blocked_by_policy");
    assert_eq!(fx.store.service(service.id).unwrap().status, ServiceStatus::Suspended);
}

#[actix_web::test]
async fn create_and_list_manual_invoices() {
    let fx = Fixture::new();
    let service = fx.service(ServiceStatus::Active);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri("/api/v1/invoices")
        .insert_header(fx.admin())
        .set_json(json!({
            "company_service_id": service.id,
            "amount": "120.00",
            "due_date": (Utc::now() + Duration::days(15)).to_rfc3339(),
            "currency": "eur",
            "description": "Onboarding workshop",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["source"], "manual");
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["currency"], "EUR");
    assert_eq!(body["data"]["created_by"], "ana");
    assert_eq!(body["data"]["is_overdue"], false);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/company-services/{}/invoices", service.id))
        .insert_header(fx.bearer("support", UserRole::Operator))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // creating an invoice never changes the service
    assert_eq!(fx.store.service(service.id).unwrap().status, ServiceStatus::Active);
}

#[actix_web::test]
async fn store_outage_is_retryable() {
    let fx = Fixture::new();
    let service = fx.service(ServiceStatus::Active);
    fx.store.set_unavailable(true);
    let app = app!(fx);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/company-services/{}/suspend", service.id))
        .insert_header(fx.admin())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "store_unavailable");
    assert_eq!(body["retryable"], true);
}
