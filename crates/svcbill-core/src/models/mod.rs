//! Domain models for svcbill
//!
//! This module contains all the core domain models used throughout the application.

pub mod company_service;
pub mod invoice;
pub mod payment;
pub mod role;
pub mod suspension;

pub use company_service::{CompanyService, ServiceStatus, TransitionCheck};
pub use invoice::{Invoice, InvoiceSource, InvoiceStatus, NewInvoice, OverdueInvoiceWithService};
pub use payment::{PaymentConfirmation, PaymentWebhookData};
pub use role::UserRole;
pub use suspension::{
    Actor, ServiceSuspensionHistory, StatusTransition, SuspensionReason, TransitionWrite,
};
