//! Company service status handlers
//!
//! Control endpoints return the manager's outcome as the body so callers can
//! tell "already in that state" apart from "failed, retry".

use crate::dto::{ApiResponse, ControlRequest, PaginationParams};
use crate::state::AppServices;
use actix_web::{http::StatusCode, web, HttpResponse};
use svcbill_auth::{AdminUser, AuthenticatedUser};
use svcbill_core::models::SuspensionReason;
use svcbill_core::traits::{BillingStore, Pagination};
use svcbill_core::AppError;
use svcbill_services::{ControlOutcome, ServiceControlResult};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

fn outcome_status(outcome: ControlOutcome) -> StatusCode {
    match outcome {
        ControlOutcome::Applied | ControlOutcome::NoOp => StatusCode::OK,
        ControlOutcome::InvalidState | ControlOutcome::Conflict | ControlOutcome::Superseded => {
            StatusCode::CONFLICT
        }
        ControlOutcome::NotFound => StatusCode::NOT_FOUND,
    }
}

fn control_response(result: ServiceControlResult) -> HttpResponse {
    HttpResponse::build(outcome_status(result.outcome)).json(result)
}

fn control_params(body: &web::Bytes) -> Result<ControlRequest, AppError> {
    ControlRequest::from_body(body).map_err(|e| {
        warn!("Rejected control request body: {}", e);
        e
    })
}

/// Current status with a page of suspension history
///
/// GET /api/v1/company-services/{id}
#[instrument(skip(services, query, user), fields(operator = %user.username))]
pub async fn get_service<S: BillingStore>(
    services: web::Data<AppServices<S>>,
    path: web::Path<Uuid>,
    query: web::Query<PaginationParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let id = path.into_inner();
    debug!(company_service_id = %id, page = query.page, "Fetching service status");

    let info = services
        .manager
        .get_status(id, Pagination::from(&*query))
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(info)))
}

/// Suspend a service; the reason defaults to `manual`
///
/// POST /api/v1/company-services/{id}/suspend
#[instrument(skip(services, admin, body), fields(operator = %admin.username))]
pub async fn suspend_service<S: BillingStore>(
    services: web::Data<AppServices<S>>,
    path: web::Path<Uuid>,
    admin: AdminUser,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let params = control_params(&body)?.into_params(
        path.into_inner(),
        admin.actor(),
        Some(SuspensionReason::Manual),
    )?;

    let result = services.manager.suspend(params).await?;
    info!(
        company_service_id = %result.company_service_id,
        outcome = result.outcome.as_str(),
        "Suspend requested by operator"
    );

    Ok(control_response(result))
}

/// Reactivate a suspended service
///
/// POST /api/v1/company-services/{id}/reactivate
#[instrument(skip(services, admin, body), fields(operator = %admin.username))]
pub async fn reactivate_service<S: BillingStore>(
    services: web::Data<AppServices<S>>,
    path: web::Path<Uuid>,
    admin: AdminUser,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let params = control_params(&body)?.into_params(path.into_inner(), admin.actor(), None)?;

    let result = services.manager.reactivate(params).await?;
    info!(
        company_service_id = %result.company_service_id,
        outcome = result.outcome.as_str(),
        "Reactivation requested by operator"
    );

    Ok(control_response(result))
}

/// Cancel a service permanently
///
/// POST /api/v1/company-services/{id}/cancel
#[instrument(skip(services, admin, body), fields(operator = %admin.username))]
pub async fn cancel_service<S: BillingStore>(
    services: web::Data<AppServices<S>>,
    path: web::Path<Uuid>,
    admin: AdminUser,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let params = control_params(&body)?.into_params(path.into_inner(), admin.actor(), None)?;

    let result = services.manager.cancel(params).await?;
    info!(
        company_service_id = %result.company_service_id,
        outcome = result.outcome.as_str(),
        "Cancellation requested by operator"
    );

    Ok(control_response(result))
}

pub fn configure<S: BillingStore>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/company-services")
            .route("/{id}", web::get().to(get_service::<S>))
            .route("/{id}/suspend", web::post().to(suspend_service::<S>))
            .route("/{id}/reactivate", web::post().to(reactivate_service::<S>))
            .route("/{id}/cancel", web::post().to(cancel_service::<S>))
            .route(
                "/{id}/invoices",
                web::get().to(super::invoice::list_service_invoices::<S>),
            ),
    );
}
