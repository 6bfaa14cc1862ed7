//! Company service repository implementation
//!
//! Provides PostgreSQL-backed storage for company services. Status changes go
//! through a version-checked update committed together with the history row,
//! optionally guarded by a share lock on an unpaid invoice.

use super::history_repo::HistoryRow;
use crate::map_sqlx_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use svcbill_core::{
    models::{
        CompanyService, InvoiceStatus, ServiceStatus, ServiceSuspensionHistory, StatusTransition,
        TransitionWrite,
    },
    traits::CompanyServiceRepository,
    AppError, AppResult,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SERVICE_COLUMNS: &str = r#"
    id, company_id, service_type, status, package_tier,
    activated_at, current_invoice_id, version, created_at, updated_at
"#;

/// PostgreSQL implementation of CompanyServiceRepository
#[derive(Clone)]
pub struct PgCompanyServiceRepository {
    pool: PgPool,
}

impl PgCompanyServiceRepository {
    /// Create a new company service repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompanyServiceRepository for PgCompanyServiceRepository {
    #[instrument(skip(self))]
    async fn find_service(&self, id: Uuid) -> AppResult<Option<CompanyService>> {
        debug!("Finding company service by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, CompanyServiceRow>(&format!(
            "SELECT {} FROM company_services WHERE id = $1",
            SERVICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to find company service", e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(
        skip(self, transition),
        fields(
            company_service_id = %transition.company_service_id,
            from = %transition.previous_status,
            to = %transition.new_status,
        )
    )]
    async fn apply_transition(&self, transition: &StatusTransition) -> AppResult<TransitionWrite> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to start transition transaction", e))?;

        // FOR SHARE holds off record_payment on this invoice until we commit,
        // so a payment either lands before (and we skip) or sees our result.
        if let Some(invoice_id) = transition.unpaid_invoice {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM invoices WHERE id = $1 FOR SHARE")
                    .bind(invoice_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("Failed to lock guarding invoice", e))?;

            let settled = status.as_deref().and_then(InvoiceStatus::from_str);
            if matches!(settled, None | Some(InvoiceStatus::Paid)) {
                debug!(%invoice_id, "Guarding invoice settled, transition not applied");
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("Failed to roll back transition", e))?;
                return Ok(TransitionWrite::InvoiceSettled);
            }
        }

        // Compare-and-set on (id, version, status)
        let updated = sqlx::query_as::<sqlx::Postgres, CompanyServiceRow>(&format!(
            r#"
            UPDATE company_services
            SET status = $3,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2 AND status = $4
            RETURNING {}
            "#,
            SERVICE_COLUMNS
        ))
        .bind(transition.company_service_id)
        .bind(transition.expected_version)
        .bind(transition.new_status.as_str())
        .bind(transition.previous_status.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to update service status", e))?;

        let Some(row) = updated else {
            debug!(
                expected_version = transition.expected_version,
                "Version check failed, transition not applied"
            );
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("Failed to roll back transition", e))?;
            return Ok(TransitionWrite::Stale);
        };

        let entry = transition.history_entry(Utc::now());
        let history = sqlx::query_as::<sqlx::Postgres, HistoryRow>(
            r#"
            INSERT INTO service_suspension_history (
                id, company_service_id, previous_status, new_status,
                reason, actor, note, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                id, company_service_id, previous_status, new_status,
                reason, actor, note, created_at
            "#,
        )
        .bind(entry.id)
        .bind(entry.company_service_id)
        .bind(entry.previous_status.as_str())
        .bind(entry.new_status.as_str())
        .bind(entry.reason.as_str())
        .bind(entry.actor.to_string())
        .bind(&entry.note)
        .bind(entry.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to append suspension history", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit transition", e))?;

        let service: CompanyService = row.try_into()?;
        let history: ServiceSuspensionHistory = history.try_into()?;

        info!(version = service.version, "Service status transition committed");

        Ok(TransitionWrite::Committed {
            service,
            entry: history,
        })
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CompanyServiceRow {
    pub(crate) id: Uuid,
    pub(crate) company_id: Uuid,
    pub(crate) service_type: String,
    pub(crate) status: String,
    pub(crate) package_tier: String,
    pub(crate) activated_at: DateTime<Utc>,
    pub(crate) current_invoice_id: Option<Uuid>,
    pub(crate) version: i64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl TryFrom<CompanyServiceRow> for CompanyService {
    type Error = AppError;

    fn try_from(row: CompanyServiceRow) -> Result<Self, Self::Error> {
        let status = ServiceStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Database(format!(
                "Unknown status '{}' on company service {}",
                row.status, row.id
            ))
        })?;

        Ok(Self {
            id: row.id,
            company_id: row.company_id,
            service_type: row.service_type,
            status,
            package_tier: row.package_tier,
            activated_at: row.activated_at,
            current_invoice_id: row.current_invoice_id,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
