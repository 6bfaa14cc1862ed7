//! Invoice repository implementation
//!
//! Provides PostgreSQL-backed storage for invoices and the overdue queries
//! that drive the suspension sweep.

use super::company_service_repo::CompanyServiceRow;
use crate::map_sqlx_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use svcbill_core::{
    models::{Invoice, InvoiceSource, InvoiceStatus, NewInvoice, OverdueInvoiceWithService},
    traits::InvoiceRepository,
    AppError, AppResult,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = r#"
    id, company_service_id, invoice_number, amount, currency, due_date,
    status, paid_at, paid_amount, source, description, created_by,
    created_at, updated_at
"#;

/// PostgreSQL implementation of InvoiceRepository
#[derive(Clone)]
pub struct PgInvoiceRepository {
    pool: PgPool,
}

impl PgInvoiceRepository {
    /// Create a new invoice repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceRepository for PgInvoiceRepository {
    #[instrument(skip(self))]
    async fn find_invoice(&self, id: Uuid) -> AppResult<Option<Invoice>> {
        let row = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to find invoice", e))?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self, invoice), fields(company_service_id = %invoice.company_service_id))]
    async fn create_invoice(&self, invoice: &NewInvoice) -> AppResult<Invoice> {
        debug!("Creating invoice {}", invoice.invoice_number);

        let row = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(&format!(
            r#"
            INSERT INTO invoices (
                id, company_service_id, invoice_number, amount, currency,
                due_date, status, source, description, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(invoice.company_service_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.amount)
        .bind(&invoice.currency)
        .bind(invoice.due_date)
        .bind(invoice.source.to_string())
        .bind(&invoice.description)
        .bind(&invoice.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::AlreadyExists(
                format!("Invoice number {} already exists", invoice.invoice_number),
            ),
            e => map_sqlx_error("Failed to create invoice", e),
        })?;

        let created: Invoice = row.try_into()?;
        info!(invoice_id = %created.id, "Invoice created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn list_invoices_by_service(&self, company_service_id: Uuid) -> AppResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE company_service_id = $1 ORDER BY due_date DESC",
            INVOICE_COLUMNS
        ))
        .bind(company_service_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to list invoices", e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self))]
    async fn find_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<OverdueInvoiceWithService>> {
        let rows = sqlx::query_as::<sqlx::Postgres, OverdueRow>(
            r#"
            SELECT
                i.id, i.company_service_id, i.invoice_number, i.amount, i.currency,
                i.due_date, i.status, i.paid_at, i.paid_amount, i.source,
                i.description, i.created_by, i.created_at, i.updated_at,
                s.id AS s_id,
                s.company_id AS s_company_id,
                s.service_type AS s_service_type,
                s.status AS s_status,
                s.package_tier AS s_package_tier,
                s.activated_at AS s_activated_at,
                s.current_invoice_id AS s_current_invoice_id,
                s.version AS s_version,
                s.created_at AS s_created_at,
                s.updated_at AS s_updated_at
            FROM invoices i
            JOIN company_services s ON s.id = i.company_service_id
            WHERE i.due_date < $1 AND i.status <> 'paid'
            ORDER BY i.due_date
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to query overdue invoices", e))?;

        debug!("Found {} overdue invoices", rows.len());

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self))]
    async fn count_overdue_for_service(
        &self,
        company_service_id: Uuid,
        now: DateTime<Utc>,
        exclude_invoice: Option<Uuid>,
    ) -> AppResult<i64> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM invoices
            WHERE company_service_id = $1
              AND due_date < $2
              AND status <> 'paid'
              AND ($3::uuid IS NULL OR id <> $3)
            "#,
        )
        .bind(company_service_id)
        .bind(now)
        .bind(exclude_invoice)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to count overdue invoices", e))
    }

    #[instrument(skip(self))]
    async fn mark_overdue(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'overdue', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to mark invoice overdue", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn record_payment(
        &self,
        id: Uuid,
        paid_amount: Decimal,
        paid_at: DateTime<Utc>,
    ) -> AppResult<Invoice> {
        let updated = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(&format!(
            r#"
            UPDATE invoices
            SET status = 'paid',
                paid_amount = $2,
                paid_at = $3,
                updated_at = NOW()
            WHERE id = $1 AND status <> 'paid'
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(id)
        .bind(paid_amount)
        .bind(paid_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to record payment", e))?;

        if let Some(row) = updated {
            info!(invoice_id = %id, "Payment recorded");
            return row.try_into();
        }

        // Either already paid or missing
        match self.find_invoice(id).await? {
            Some(invoice) => {
                warn!(invoice_id = %id, "Invoice already paid, payment not re-recorded");
                Ok(invoice)
            }
            None => Err(AppError::InvoiceNotFound(id.to_string())),
        }
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    company_service_id: Uuid,
    invoice_number: String,
    amount: Decimal,
    currency: String,
    due_date: DateTime<Utc>,
    status: String,
    paid_at: Option<DateTime<Utc>>,
    paid_amount: Option<Decimal>,
    source: String,
    description: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let status = InvoiceStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Database(format!("Unknown status '{}' on invoice {}", row.status, row.id))
        })?;
        let source = InvoiceSource::from_str(&row.source).ok_or_else(|| {
            AppError::Database(format!("Unknown source '{}' on invoice {}", row.source, row.id))
        })?;

        Ok(Self {
            id: row.id,
            company_service_id: row.company_service_id,
            invoice_number: row.invoice_number,
            amount: row.amount,
            currency: row.currency,
            due_date: row.due_date,
            status,
            paid_at: row.paid_at,
            paid_amount: row.paid_amount,
            source,
            description: row.description,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Invoice joined with its service; service columns carry an `s_` prefix
#[derive(Debug, sqlx::FromRow)]
struct OverdueRow {
    #[sqlx(flatten)]
    invoice: InvoiceRow,
    s_id: Uuid,
    s_company_id: Uuid,
    s_service_type: String,
    s_status: String,
    s_package_tier: String,
    s_activated_at: DateTime<Utc>,
    s_current_invoice_id: Option<Uuid>,
    s_version: i64,
    s_created_at: DateTime<Utc>,
    s_updated_at: DateTime<Utc>,
}

impl TryFrom<OverdueRow> for OverdueInvoiceWithService {
    type Error = AppError;

    fn try_from(row: OverdueRow) -> Result<Self, Self::Error> {
        let service = CompanyServiceRow {
            id: row.s_id,
            company_id: row.s_company_id,
            service_type: row.s_service_type,
            status: row.s_status,
            package_tier: row.s_package_tier,
            activated_at: row.s_activated_at,
            current_invoice_id: row.s_current_invoice_id,
            version: row.s_version,
            created_at: row.s_created_at,
            updated_at: row.s_updated_at,
        };

        Ok(Self {
            invoice: row.invoice.try_into()?,
            service: service.try_into()?,
        })
    }
}
