//! Suspension handler
//!
//! Policy layer over the service manager:
//! - `check_overdue_and_suspend` suspends active services with overdue invoices
//! - `reactivate_on_payment` brings back services suspended for non-payment
//!
//! The sweep is idempotent. Running it again over the same overdue invoices
//! finds their services already suspended and skips them.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use svcbill_core::{
    config::SuspensionConfig,
    models::{
        Actor, InvoiceStatus, OverdueInvoiceWithService, PaymentConfirmation, ServiceStatus,
        SuspensionReason,
    },
    traits::BillingStore,
    AppError, AppResult,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::bounded;
use crate::service_manager::{ControlOutcome, ServiceControlParams, ServiceControlResult, ServiceManager};

/// A sweep item that could not be processed
#[derive(Debug, Clone, Serialize)]
pub struct SuspensionFailure {
    pub invoice_id: Uuid,
    pub company_service_id: Uuid,
    pub error_code: String,
    pub message: String,
}

/// Summary of one overdue sweep
#[derive(Debug, Clone, Serialize)]
pub struct AutoSuspendCheckResult {
    /// Overdue invoices examined
    pub checked: usize,
    pub suspended: usize,
    pub skipped: usize,
    pub failed: usize,
    pub suspended_services: Vec<Uuid>,
    pub failures: Vec<SuspensionFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AutoSuspendCheckResult {
    fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            checked: 0,
            suspended: 0,
            skipped: 0,
            failed: 0,
            suspended_services: Vec::new(),
            failures: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    fn record(&mut self, outcome: ItemOutcome) {
        self.checked += 1;
        match outcome {
            ItemOutcome::Suspended(id) => {
                self.suspended += 1;
                self.suspended_services.push(id);
            }
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed(failure) => {
                self.failed += 1;
                self.failures.push(failure);
            }
        }
    }
}

enum ItemOutcome {
    Suspended(Uuid),
    Skipped,
    Failed(SuspensionFailure),
}

/// Why a payment did not reactivate its service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoActionReason {
    InvoiceNotPaid,
    NotSuspended,
    /// Other invoices of the service are still overdue
    OutstandingInvoices,
    /// The service manager did not apply the reactivation
    NotApplied,
}

/// Decision taken for a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReactivationAction {
    Reactivated,
    NoAction {
        reason: NoActionReason,
    },
    /// The suspension was not caused by non-payment
    BlockedByPolicy {
        suspension_reason: Option<SuspensionReason>,
    },
}

/// Result of `reactivate_on_payment`
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReactivationResult {
    pub invoice_id: Uuid,
    pub company_service_id: Uuid,
    #[serde(flatten)]
    pub action: ReactivationAction,
    /// Service manager result, when reactivation was attempted
    pub control: Option<ServiceControlResult>,
}

impl PaymentReactivationResult {
    fn new(confirmation: &PaymentConfirmation, action: ReactivationAction) -> Self {
        Self {
            invoice_id: confirmation.invoice_id,
            company_service_id: confirmation.company_service_id,
            action,
            control: None,
        }
    }

    fn no_action(confirmation: &PaymentConfirmation, reason: NoActionReason) -> Self {
        Self::new(confirmation, ReactivationAction::NoAction { reason })
    }

    pub fn is_reactivated(&self) -> bool {
        self.action == ReactivationAction::Reactivated
    }
}

/// Suspension handler
pub struct SuspensionHandler<S: BillingStore> {
    store: Arc<S>,
    manager: Arc<ServiceManager<S>>,
    concurrency: usize,
    store_timeout: Duration,
    require_settled_invoices: bool,
}

impl<S: BillingStore> SuspensionHandler<S> {
    /// Create a new suspension handler
    pub fn new(store: Arc<S>, manager: Arc<ServiceManager<S>>, config: &SuspensionConfig) -> Self {
        Self {
            store,
            manager,
            concurrency: config.sweep_concurrency.max(1),
            store_timeout: config.store_timeout(),
            require_settled_invoices: config.require_settled_invoices,
        }
    }

    /// Suspend every active service that has an overdue invoice right now
    pub async fn check_overdue_and_suspend(&self) -> AppResult<AutoSuspendCheckResult> {
        self.check_overdue_and_suspend_at(Utc::now()).await
    }

    /// Sweep as of `now`.
    ///
    /// Returns `Err` only when the overdue query itself fails. Per-item
    /// problems are reported in the result.
    #[instrument(skip(self))]
    pub async fn check_overdue_and_suspend_at(
        &self,
        now: DateTime<Utc>,
    ) -> AppResult<AutoSuspendCheckResult> {
        let started_at = Utc::now();

        let overdue = bounded(self.store_timeout, "find_overdue", self.store.find_overdue(now))
            .await
            .map_err(|e| {
                error!("Overdue sweep could not read invoices: {}", e);
                e
            })?;

        debug!("Sweep found {} overdue invoices", overdue.len());

        let outcomes: Vec<ItemOutcome> = stream::iter(overdue)
            .map(|item| self.process_overdue_item(item))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut result = AutoSuspendCheckResult::empty(started_at);
        for outcome in outcomes {
            result.record(outcome);
        }
        result.finished_at = Utc::now();

        info!(
            checked = result.checked,
            suspended = result.suspended,
            skipped = result.skipped,
            failed = result.failed,
            "Overdue sweep finished"
        );

        Ok(result)
    }

    async fn process_overdue_item(&self, item: OverdueInvoiceWithService) -> ItemOutcome {
        let OverdueInvoiceWithService { invoice, service } = item;

        if invoice.status == InvoiceStatus::Pending {
            match bounded(
                self.store_timeout,
                "mark_overdue",
                self.store.mark_overdue(invoice.id),
            )
            .await
            {
                Ok(true) => debug!(invoice_id = %invoice.id, "Invoice marked overdue"),
                Ok(false) => {}
                Err(e) => warn!(invoice_id = %invoice.id, "Failed to mark invoice overdue: {}", e),
            }
        }

        if service.status != ServiceStatus::Active {
            debug!(
                invoice_id = %invoice.id,
                company_service_id = %service.id,
                status = %service.status,
                "Service not active, skipping"
            );
            return ItemOutcome::Skipped;
        }

        // The scan is a snapshot; a payment may have landed since.
        let params = ServiceControlParams::new(service.id, Actor::System)
            .with_reason(SuspensionReason::NonPayment)
            .while_unpaid(invoice.id)
            .with_note(format!(
                "Invoice {} overdue since {}",
                invoice.invoice_number,
                invoice.due_date.format("%Y-%m-%d")
            ));

        let failure = |error_code: &str, message: String| SuspensionFailure {
            invoice_id: invoice.id,
            company_service_id: service.id,
            error_code: error_code.to_string(),
            message,
        };

        match self.manager.suspend(params).await {
            Ok(result) => match result.outcome {
                ControlOutcome::Applied => ItemOutcome::Suspended(service.id),
                ControlOutcome::NoOp
                | ControlOutcome::InvalidState
                | ControlOutcome::Conflict
                | ControlOutcome::Superseded => {
                    debug!(
                        company_service_id = %service.id,
                        outcome = result.outcome.as_str(),
                        "Suspension not applied"
                    );
                    ItemOutcome::Skipped
                }
                ControlOutcome::NotFound => {
                    warn!(company_service_id = %service.id, "Service vanished during sweep");
                    ItemOutcome::Failed(failure("not_found", result.message))
                }
            },
            Err(e) => {
                warn!(
                    invoice_id = %invoice.id,
                    company_service_id = %service.id,
                    "Failed to suspend service: {}",
                    e
                );
                ItemOutcome::Failed(failure(e.error_code(), e.to_string()))
            }
        }
    }

    /// Reactivate a service whose invoice has been paid.
    ///
    /// Only suspensions caused by non-payment are lifted. Anything else is
    /// reported as `blocked_by_policy`.
    #[instrument(skip(self), fields(invoice_id = %confirmation.invoice_id))]
    pub async fn reactivate_on_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> AppResult<PaymentReactivationResult> {
        let invoice = bounded(
            self.store_timeout,
            "find_invoice",
            self.store.find_invoice(confirmation.invoice_id),
        )
        .await?
        .ok_or_else(|| AppError::InvoiceNotFound(confirmation.invoice_id.to_string()))?;

        if invoice.company_service_id != confirmation.company_service_id {
            return Err(AppError::InvalidInput(format!(
                "Invoice {} does not belong to company service {}",
                invoice.id, confirmation.company_service_id
            )));
        }

        if !invoice.is_paid() {
            debug!("Invoice not paid, nothing to reactivate");
            return Ok(PaymentReactivationResult::no_action(
                confirmation,
                NoActionReason::InvoiceNotPaid,
            ));
        }

        let service = bounded(
            self.store_timeout,
            "find_service",
            self.store.find_service(invoice.company_service_id),
        )
        .await?
        .ok_or_else(|| AppError::CompanyServiceNotFound(invoice.company_service_id.to_string()))?;

        if !service.is_suspended() {
            debug!(status = %service.status, "Service not suspended");
            return Ok(PaymentReactivationResult::no_action(
                confirmation,
                NoActionReason::NotSuspended,
            ));
        }

        let latest = bounded(
            self.store_timeout,
            "latest_history",
            self.store.latest_history(service.id),
        )
        .await?;

        let suspension_reason = latest
            .filter(|entry| entry.new_status == ServiceStatus::Suspended)
            .map(|entry| entry.reason);

        if suspension_reason != Some(SuspensionReason::NonPayment) {
            warn!(
                company_service_id = %service.id,
                suspension_reason = ?suspension_reason,
                "Payment does not lift a suspension that was not caused by non-payment"
            );
            return Ok(PaymentReactivationResult::new(
                confirmation,
                ReactivationAction::BlockedByPolicy { suspension_reason },
            ));
        }

        if self.require_settled_invoices {
            let outstanding = bounded(
                self.store_timeout,
                "count_overdue_for_service",
                self.store
                    .count_overdue_for_service(service.id, Utc::now(), Some(invoice.id)),
            )
            .await?;

            if outstanding > 0 {
                info!(
                    company_service_id = %service.id,
                    outstanding,
                    "Other invoices still overdue, keeping service suspended"
                );
                return Ok(PaymentReactivationResult::no_action(
                    confirmation,
                    NoActionReason::OutstandingInvoices,
                ));
            }
        }

        let params = ServiceControlParams::new(service.id, Actor::System)
            .with_note(format!("Payment received for invoice {}", invoice.invoice_number))
            .pinned_to(service.version);

        let control = self.manager.reactivate(params).await?;

        let action = if control.outcome.is_applied() {
            ReactivationAction::Reactivated
        } else {
            ReactivationAction::NoAction {
                reason: NoActionReason::NotApplied,
            }
        };

        Ok(PaymentReactivationResult {
            control: Some(control),
            ..PaymentReactivationResult::new(confirmation, action)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reactivation_action_shape() {
        let blocked = ReactivationAction::BlockedByPolicy {
            suspension_reason: Some(SuspensionReason::Manual),
        };
        let value = serde_json::to_value(&blocked).unwrap();
        assert_eq!(value["action"], "blocked_by_policy");
        assert_eq!(value["suspension_reason"], "manual");

        let none = ReactivationAction::NoAction {
            reason: NoActionReason::OutstandingInvoices,
        };
        let value = serde_json::to_value(&none).unwrap();
        assert_eq!(value["action"], "no_action");
        assert_eq!(value["reason"], "outstanding_invoices");
    }

    #[test]
    fn test_result_counts() {
        let mut result = AutoSuspendCheckResult::empty(Utc::now());
        result.record(ItemOutcome::Suspended(Uuid::new_v4()));
        result.record(ItemOutcome::Skipped);
        result.record(ItemOutcome::Failed(SuspensionFailure {
            invoice_id: Uuid::new_v4(),
            company_service_id: Uuid::new_v4(),
            error_code: "store_unavailable".to_string(),
            message: "timed out".to_string(),
        }));

        assert_eq!(result.checked, 3);
        assert_eq!(result.suspended, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.suspended_services.len(), 1);
    }
}
