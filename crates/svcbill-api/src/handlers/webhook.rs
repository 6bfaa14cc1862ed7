//! Payment provider webhook

use crate::state::AppServices;
use actix_web::{web, HttpResponse};
use svcbill_core::models::PaymentWebhookData;
use svcbill_core::traits::BillingStore;
use svcbill_core::AppError;
use tracing::{info, instrument};

/// Record a payment and reactivate the service when policy allows
///
/// POST /api/v1/webhooks/payments
///
/// Redeliveries are answered with `200` and `payment: already_paid`.
#[instrument(skip(services, payload), fields(invoice_id = %payload.invoice_id))]
pub async fn payment_webhook<S: BillingStore>(
    services: web::Data<AppServices<S>>,
    payload: web::Json<PaymentWebhookData>,
) -> Result<HttpResponse, AppError> {
    let outcome = services.webhook.handle(payload.into_inner()).await?;

    info!(
        company_service_id = %outcome.company_service_id,
        payment = ?outcome.payment,
        reactivated = outcome
            .reactivation
            .as_ref()
            .is_some_and(|r| r.is_reactivated()),
        "Payment webhook processed"
    );

    Ok(HttpResponse::Ok().json(outcome))
}

pub fn configure<S: BillingStore>(cfg: &mut web::ServiceConfig) {
    cfg.route("/webhooks/payments", web::post().to(payment_webhook::<S>));
}
