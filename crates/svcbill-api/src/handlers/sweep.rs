//! Manual sweep trigger

use crate::dto::ApiResponse;
use crate::state::AppServices;
use actix_web::{web, HttpResponse};
use svcbill_auth::AdminUser;
use svcbill_core::traits::BillingStore;
use svcbill_core::AppError;
use tracing::{info, instrument};

/// Run one overdue sweep now. Safe to overlap with the scheduled run.
///
/// POST /api/v1/sweeps
#[instrument(skip(services, admin), fields(operator = %admin.username))]
pub async fn run_sweep<S: BillingStore>(
    services: web::Data<AppServices<S>>,
    admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    info!("Manual sweep triggered");
    let result = services.scheduler().run_once().await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(result)))
}

pub fn configure<S: BillingStore>(cfg: &mut web::ServiceConfig) {
    cfg.route("/sweeps", web::post().to(run_sweep::<S>));
}
