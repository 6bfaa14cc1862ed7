//! API layer for svcbill
//!
//! HTTP handlers for operator tooling and the payment provider integration.
//! Handlers are generic over the [`BillingStore`] so the same routes serve
//! the PostgreSQL store in production and the in-memory store in tests.
//!
//! [`BillingStore`]: svcbill_core::traits::BillingStore

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;
pub mod state;

pub use dto::{ApiResponse, PaginationParams};
pub use handlers::configure;
pub use state::AppServices;
