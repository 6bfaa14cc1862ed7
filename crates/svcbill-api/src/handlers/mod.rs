//! HTTP request handlers

pub mod company_service;
pub mod invoice;
pub mod sweep;
pub mod webhook;

use actix_web::{web, HttpResponse};
use svcbill_core::traits::BillingStore;

/// Liveness probe
///
/// GET /api/v1/health
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "svcbill",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Register every route under `/api/v1`
///
/// Expects `web::Data<AppServices<S>>` and `web::Data<Arc<JwtService>>` as app data.
pub fn configure<S: BillingStore>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health_check))
            .configure(company_service::configure::<S>)
            .configure(invoice::configure::<S>)
            .configure(webhook::configure::<S>)
            .configure(sweep::configure::<S>),
    );
}
