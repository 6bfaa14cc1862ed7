//! Invoice handlers

use crate::dto::{ApiResponse, CreateInvoiceRequest, InvoiceResponse};
use crate::state::AppServices;
use actix_web::{web, HttpResponse};
use svcbill_auth::{AdminUser, AuthenticatedUser};
use svcbill_core::traits::BillingStore;
use svcbill_core::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Invoices of one service, newest due date first
///
/// GET /api/v1/company-services/{id}/invoices
#[instrument(skip(services, _user))]
pub async fn list_service_invoices<S: BillingStore>(
    services: web::Data<AppServices<S>>,
    path: web::Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let invoices = services.invoices.list_invoices(path.into_inner()).await?;
    let data: Vec<InvoiceResponse> = invoices.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(data)))
}

/// Create a manual invoice
///
/// POST /api/v1/invoices
#[instrument(skip(services, admin, req), fields(operator = %admin.username))]
pub async fn create_invoice<S: BillingStore>(
    services: web::Data<AppServices<S>>,
    admin: AdminUser,
    req: web::Json<CreateInvoiceRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Invoice creation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let invoice = services
        .invoices
        .create_invoice(req.into_inner().into(), &admin.actor())
        .await?;

    info!(
        invoice_id = %invoice.id,
        invoice_number = %invoice.invoice_number,
        company_service_id = %invoice.company_service_id,
        "Manual invoice created"
    );

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        InvoiceResponse::from(invoice),
        "Invoice created successfully",
    )))
}

pub fn configure<S: BillingStore>(cfg: &mut web::ServiceConfig) {
    cfg.route("/invoices", web::post().to(create_invoice::<S>));
}
