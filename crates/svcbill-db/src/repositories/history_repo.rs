//! Suspension history repository implementation
//!
//! Rows are inserted by `PgCompanyServiceRepository::apply_transition`; this
//! repository only reads them.

use crate::map_sqlx_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use svcbill_core::{
    models::{Actor, ServiceStatus, ServiceSuspensionHistory, SuspensionReason},
    traits::SuspensionHistoryRepository,
    AppError, AppResult,
};
use tracing::{debug, instrument};
use uuid::Uuid;

/// PostgreSQL implementation of SuspensionHistoryRepository
#[derive(Clone)]
pub struct PgSuspensionHistoryRepository {
    pool: PgPool,
}

impl PgSuspensionHistoryRepository {
    /// Create a new history repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SuspensionHistoryRepository for PgSuspensionHistoryRepository {
    #[instrument(skip(self))]
    async fn list_history(
        &self,
        company_service_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<ServiceSuspensionHistory>, i64)> {
        debug!(
            "Listing suspension history for service {} (limit: {}, offset: {})",
            company_service_id, limit, offset
        );

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM service_suspension_history WHERE company_service_id = $1",
        )
        .bind(company_service_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to count suspension history", e))?;

        let rows = sqlx::query_as::<sqlx::Postgres, HistoryRow>(
            r#"
            SELECT id, company_service_id, previous_status, new_status,
                   reason, actor, note, created_at
            FROM service_suspension_history
            WHERE company_service_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(company_service_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to list suspension history", e))?;

        let entries = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((entries, total))
    }

    #[instrument(skip(self))]
    async fn latest_history(
        &self,
        company_service_id: Uuid,
    ) -> AppResult<Option<ServiceSuspensionHistory>> {
        let row = sqlx::query_as::<sqlx::Postgres, HistoryRow>(
            r#"
            SELECT id, company_service_id, previous_status, new_status,
                   reason, actor, note, created_at
            FROM service_suspension_history
            WHERE company_service_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(company_service_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to fetch latest suspension history", e))?;

        row.map(TryInto::try_into).transpose()
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HistoryRow {
    pub(crate) id: Uuid,
    pub(crate) company_service_id: Uuid,
    pub(crate) previous_status: String,
    pub(crate) new_status: String,
    pub(crate) reason: String,
    pub(crate) actor: String,
    pub(crate) note: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for ServiceSuspensionHistory {
    type Error = AppError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, value: &str| {
            AppError::Database(format!(
                "Invalid {} '{}' in history row {}",
                field, value, row.id
            ))
        };

        let previous_status = ServiceStatus::from_str(&row.previous_status)
            .ok_or_else(|| corrupt("previous_status", &row.previous_status))?;
        let new_status = ServiceStatus::from_str(&row.new_status)
            .ok_or_else(|| corrupt("new_status", &row.new_status))?;
        let reason =
            SuspensionReason::from_str(&row.reason).ok_or_else(|| corrupt("reason", &row.reason))?;
        let actor = Actor::parse(&row.actor).ok_or_else(|| corrupt("actor", &row.actor))?;

        Ok(Self {
            id: row.id,
            company_service_id: row.company_service_id,
            previous_status,
            new_status,
            reason,
            actor,
            note: row.note,
            created_at: row.created_at,
        })
    }
}
