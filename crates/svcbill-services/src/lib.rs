//! Business logic services for svcbill
//!
//! This crate holds the suspension core: the lifecycle of company services,
//! the overdue sweep, payment-driven reactivation and manual invoicing.
//!
//! # Architecture
//!
//! Services are generic over a single [`BillingStore`] so the PostgreSQL
//! store and the in-memory store are interchangeable:
//! - Services hold their store in an `Arc` and are shared across tasks
//! - Every store call is bounded by the configured store timeout
//! - Expected conditions come back as structured results, store faults as `AppError`
//!
//! # Services
//!
//! - `ServiceManager` - the only writer of service status and history
//! - `SuspensionHandler` - overdue sweep and reactivation policy
//! - `PaymentWebhookAdapter` - validates payment notifications
//! - `SweepScheduler` - periodic sweep with retry backoff
//! - `ManualInvoiceService` - operator-created invoices
//!
//! [`BillingStore`]: svcbill_core::traits::BillingStore

pub mod manual_invoice;
pub mod payment_webhook;
pub mod scheduler;
pub mod service_manager;
pub mod suspension_handler;

pub use manual_invoice::{ManualInvoiceRequest, ManualInvoiceService};
pub use payment_webhook::{PaymentDisposition, PaymentWebhookAdapter, PaymentWebhookOutcome};
pub use scheduler::SweepScheduler;
pub use service_manager::{
    ControlOutcome, ServiceControlParams, ServiceControlResult, ServiceManager,
    ServiceWithSuspensionInfo,
};
pub use suspension_handler::{
    AutoSuspendCheckResult, NoActionReason, PaymentReactivationResult, ReactivationAction,
    SuspensionFailure, SuspensionHandler,
};

use std::future::Future;
use std::time::Duration;
use svcbill_core::{AppError, AppResult};
use tracing::warn;

/// Business logic constants
pub mod constants {
    /// How far in the future a reported payment time may lie (clock skew)
    pub const MAX_PAID_AT_SKEW_SECS: i64 = 300;

    /// Prefix of generated manual invoice numbers
    pub const MANUAL_INVOICE_PREFIX: &str = "MAN";

    /// Default currency for manual invoices
    pub const DEFAULT_CURRENCY: &str = "USD";
}

/// Run a store call, turning a timeout into `StoreUnavailable`
pub(crate) async fn bounded<T, F>(timeout: Duration, operation: &str, call: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, ?timeout, "Store call timed out");
            Err(AppError::StoreUnavailable(format!(
                "{} timed out after {}ms",
                operation,
                timeout.as_millis()
            )))
        }
    }
}
