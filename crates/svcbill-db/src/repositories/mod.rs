//! Repository implementations
//!
//! Concrete implementations of the store traits defined in svcbill-core,
//! using sqlx for PostgreSQL access.

pub mod company_service_repo;
pub mod history_repo;
pub mod invoice_repo;

pub use company_service_repo::PgCompanyServiceRepository;
pub use history_repo::PgSuspensionHistoryRepository;
pub use invoice_repo::PgInvoiceRepository;
