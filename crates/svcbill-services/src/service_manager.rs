//! Service manager
//!
//! Sole authority over company service status. Every operation:
//! - reads the current record (never a cache)
//! - checks the requested transition against the state machine
//! - applies it as a version-checked write together with one history row
//! - re-reads and re-checks when another writer got there first

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use svcbill_core::{
    config::SuspensionConfig,
    models::{
        Actor, CompanyService, ServiceStatus, ServiceSuspensionHistory, StatusTransition,
        SuspensionReason, TransitionCheck, TransitionWrite,
    },
    traits::{BillingStore, Pagination, PaginationMeta},
    AppError, AppResult,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::bounded;

/// Parameters of a control operation
#[derive(Debug, Clone)]
pub struct ServiceControlParams {
    pub company_service_id: Uuid,
    pub reason: Option<SuspensionReason>,
    pub actor: Actor,
    pub note: Option<String>,
    /// Only apply while the service still has this version
    pub expected_version: Option<i64>,
    /// Only apply while this invoice is unpaid
    pub unpaid_invoice: Option<Uuid>,
}

impl ServiceControlParams {
    pub fn new(company_service_id: Uuid, actor: Actor) -> Self {
        Self {
            company_service_id,
            reason: None,
            actor,
            note: None,
            expected_version: None,
            unpaid_invoice: None,
        }
    }

    pub fn with_reason(mut self, reason: SuspensionReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn pinned_to(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }

    pub fn while_unpaid(mut self, invoice_id: Uuid) -> Self {
        self.unpaid_invoice = Some(invoice_id);
        self
    }
}

/// What a control operation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlOutcome {
    /// The transition happened and one history row was appended
    Applied,
    /// Already in the target state; nothing written
    NoOp,
    /// The transition does not exist from the current state
    InvalidState,
    /// No such company service
    NotFound,
    /// Lost the version race too often, or the pinned version moved
    Conflict,
    /// The invoice the request was conditioned on got paid first
    Superseded,
}

impl ControlOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlOutcome::Applied => "applied",
            ControlOutcome::NoOp => "no_op",
            ControlOutcome::InvalidState => "invalid_state",
            ControlOutcome::NotFound => "not_found",
            ControlOutcome::Conflict => "conflict",
            ControlOutcome::Superseded => "superseded",
        }
    }

    #[inline]
    pub fn is_applied(&self) -> bool {
        matches!(self, ControlOutcome::Applied)
    }
}

/// Result of suspend / reactivate / cancel
#[derive(Debug, Clone, Serialize)]
pub struct ServiceControlResult {
    pub company_service_id: Uuid,
    pub outcome: ControlOutcome,
    pub previous_status: Option<ServiceStatus>,
    pub current_status: Option<ServiceStatus>,
    pub history_entry: Option<ServiceSuspensionHistory>,
    pub message: String,
}

impl ServiceControlResult {
    fn unchanged(service: &CompanyService, outcome: ControlOutcome, message: String) -> Self {
        Self {
            company_service_id: service.id,
            outcome,
            previous_status: Some(service.status),
            current_status: Some(service.status),
            history_entry: None,
            message,
        }
    }

    fn not_found(company_service_id: Uuid) -> Self {
        Self {
            company_service_id,
            outcome: ControlOutcome::NotFound,
            previous_status: None,
            current_status: None,
            history_entry: None,
            message: format!("Company service {} not found", company_service_id),
        }
    }
}

/// Current status of a service with a page of its history
#[derive(Debug, Clone, Serialize)]
pub struct ServiceWithSuspensionInfo {
    pub service: CompanyService,
    /// Newest first
    pub history: Vec<ServiceSuspensionHistory>,
    pub pagination: PaginationMeta,
    /// Entry that put the service in `suspended`, when it is suspended
    pub active_suspension: Option<ServiceSuspensionHistory>,
}

/// Service manager
pub struct ServiceManager<S: BillingStore> {
    store: Arc<S>,
    store_timeout: Duration,
    max_retries: u32,
}

impl<S: BillingStore> ServiceManager<S> {
    /// Create a new service manager
    pub fn new(store: Arc<S>, config: &SuspensionConfig) -> Self {
        Self {
            store,
            store_timeout: config.store_timeout(),
            max_retries: config.max_transition_retries,
        }
    }

    /// Move an `active` service to `suspended`.
    ///
    /// `params.reason` must be `non_payment` or `manual`.
    #[instrument(skip(self, params), fields(company_service_id = %params.company_service_id, actor = %params.actor))]
    pub async fn suspend(&self, params: ServiceControlParams) -> AppResult<ServiceControlResult> {
        let reason = match params.reason {
            Some(reason) if reason.is_suspension_cause() => reason,
            Some(other) => {
                return Err(AppError::InvalidInput(format!(
                    "'{}' is not a suspension reason",
                    other
                )))
            }
            None => {
                return Err(AppError::InvalidInput(
                    "A suspension reason is required".to_string(),
                ))
            }
        };

        self.transition(&params, ServiceStatus::Suspended, reason)
            .await
    }

    /// Move a `suspended` service back to `active`.
    ///
    /// Recorded with reason `reactivation` regardless of the caller.
    #[instrument(skip(self, params), fields(company_service_id = %params.company_service_id, actor = %params.actor))]
    pub async fn reactivate(&self, params: ServiceControlParams) -> AppResult<ServiceControlResult> {
        if let Some(reason) = params.reason {
            if reason != SuspensionReason::Reactivation {
                return Err(AppError::InvalidInput(format!(
                    "Reactivation cannot be recorded with reason '{}'",
                    reason
                )));
            }
        }

        self.transition(&params, ServiceStatus::Active, SuspensionReason::Reactivation)
            .await
    }

    /// Terminate a service. Operators only; `cancelled` is terminal.
    #[instrument(skip(self, params), fields(company_service_id = %params.company_service_id, actor = %params.actor))]
    pub async fn cancel(&self, params: ServiceControlParams) -> AppResult<ServiceControlResult> {
        if params.actor.is_system() {
            warn!("Automatic cancellation rejected");
            return Err(AppError::PolicyViolation(
                "Cancellation requires an operator".to_string(),
            ));
        }

        let reason = match params.reason {
            None => SuspensionReason::Manual,
            Some(reason) if reason.is_suspension_cause() => reason,
            Some(other) => {
                return Err(AppError::InvalidInput(format!(
                    "'{}' is not a cancellation reason",
                    other
                )))
            }
        };

        self.transition(&params, ServiceStatus::Cancelled, reason)
            .await
    }

    /// Current status plus a page of history, read from the store
    #[instrument(skip(self))]
    pub async fn get_status(
        &self,
        company_service_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<ServiceWithSuspensionInfo> {
        let service = bounded(
            self.store_timeout,
            "find_service",
            self.store.find_service(company_service_id),
        )
        .await?
        .ok_or_else(|| AppError::CompanyServiceNotFound(company_service_id.to_string()))?;

        let (history, total) = bounded(
            self.store_timeout,
            "list_history",
            self.store
                .list_history(company_service_id, pagination.limit(), pagination.offset()),
        )
        .await?;

        let active_suspension = if service.is_suspended() {
            bounded(
                self.store_timeout,
                "latest_history",
                self.store.latest_history(company_service_id),
            )
            .await?
            .filter(|entry| entry.new_status == ServiceStatus::Suspended)
        } else {
            None
        };

        Ok(ServiceWithSuspensionInfo {
            service,
            history,
            pagination: PaginationMeta::new(total, pagination.page, pagination.per_page),
            active_suspension,
        })
    }

    async fn transition(
        &self,
        params: &ServiceControlParams,
        target: ServiceStatus,
        reason: SuspensionReason,
    ) -> AppResult<ServiceControlResult> {
        let id = params.company_service_id;

        for attempt in 0..=self.max_retries {
            let Some(service) =
                bounded(self.store_timeout, "find_service", self.store.find_service(id)).await?
            else {
                debug!("Company service not found");
                return Ok(ServiceControlResult::not_found(id));
            };

            if let Some(pinned) = params.expected_version {
                if pinned != service.version {
                    warn!(pinned, current = service.version, "Service changed since it was read");
                    return Ok(ServiceControlResult::unchanged(
                        &service,
                        ControlOutcome::Conflict,
                        format!(
                            "Service changed since version {} (now {})",
                            pinned, service.version
                        ),
                    ));
                }
            }

            match service.status.check_transition(target) {
                TransitionCheck::AlreadyInState => {
                    debug!(status = %service.status, "Already in target state");
                    return Ok(ServiceControlResult::unchanged(
                        &service,
                        ControlOutcome::NoOp,
                        format!("Service is already {}", service.status),
                    ));
                }
                TransitionCheck::NotAllowed => {
                    debug!(from = %service.status, to = %target, "Transition not allowed");
                    return Ok(ServiceControlResult::unchanged(
                        &service,
                        ControlOutcome::InvalidState,
                        format!("Cannot move a {} service to {}", service.status, target),
                    ));
                }
                TransitionCheck::Allowed => {}
            }

            let transition = StatusTransition {
                company_service_id: id,
                expected_version: service.version,
                previous_status: service.status,
                new_status: target,
                reason,
                actor: params.actor.clone(),
                note: params.note.clone(),
                unpaid_invoice: params.unpaid_invoice,
            };

            let applied = bounded(
                self.store_timeout,
                "apply_transition",
                self.store.apply_transition(&transition),
            )
            .await?;

            match applied {
                TransitionWrite::Committed {
                    service: updated,
                    entry,
                } => {
                    info!(
                        from = %service.status,
                        to = %updated.status,
                        reason = %reason,
                        version = updated.version,
                        "Service status changed"
                    );
                    return Ok(ServiceControlResult {
                        company_service_id: id,
                        outcome: ControlOutcome::Applied,
                        previous_status: Some(service.status),
                        current_status: Some(updated.status),
                        history_entry: Some(entry),
                        message: format!("Service moved from {} to {}", service.status, updated.status),
                    });
                }
                TransitionWrite::InvoiceSettled => {
                    info!(
                        invoice_id = ?params.unpaid_invoice,
                        "Invoice settled before the transition could apply"
                    );
                    return Ok(ServiceControlResult::unchanged(
                        &service,
                        ControlOutcome::Superseded,
                        "The invoice behind this request has been paid".to_string(),
                    ));
                }
                TransitionWrite::Stale if params.expected_version.is_some() => {
                    warn!("Pinned version lost to a concurrent writer");
                    return Ok(ServiceControlResult::unchanged(
                        &service,
                        ControlOutcome::Conflict,
                        "Service changed while the transition was being applied".to_string(),
                    ));
                }
                TransitionWrite::Stale => {
                    debug!(attempt, "Version check failed, re-reading service");
                }
            }
        }

        warn!(retries = self.max_retries, "Giving up after repeated version conflicts");
        Ok(ServiceControlResult {
            company_service_id: id,
            outcome: ControlOutcome::Conflict,
            previous_status: None,
            current_status: None,
            history_entry: None,
            message: format!(
                "Transition to {} kept conflicting with concurrent writers",
                target
            ),
        })
    }
}

impl<S: BillingStore> Clone for ServiceManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            store_timeout: self.store_timeout,
            max_retries: self.max_retries,
        }
    }
}
