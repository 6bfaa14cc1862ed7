//! svcbill Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the service suspension core. It includes:
//!
//! - Domain models (CompanyService, Invoice, suspension history, etc.)
//! - Store traits implemented by the database layer and the in-memory store
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
