//! Data Transfer Objects (DTOs) for API requests and responses

pub mod common;
pub mod company_service;
pub mod invoice;

pub use common::*;
pub use company_service::ControlRequest;
pub use invoice::{CreateInvoiceRequest, InvoiceResponse};
