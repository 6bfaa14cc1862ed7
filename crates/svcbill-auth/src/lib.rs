//! Operator authentication for svcbill
//!
//! Operators call the control endpoints with a bearer JWT issued against the
//! shared secret in `auth.jwt_secret`. This crate validates those tokens and
//! exposes Actix-web extractors that turn them into an operator [`Actor`].
//!
//! # Examples
//!
//! ```no_run
//! use actix_web::HttpResponse;
//! use svcbill_auth::{AdminUser, AuthenticatedUser};
//!
//! async fn read_route(user: AuthenticatedUser) -> HttpResponse {
//!     HttpResponse::Ok().body(user.actor().to_string())
//! }
//!
//! async fn control_route(admin: AdminUser) -> HttpResponse {
//!     HttpResponse::Ok().body(admin.username.clone())
//! }
//! ```
//!
//! [`Actor`]: svcbill_core::models::Actor

pub mod claims;
pub mod jwt;
pub mod middleware;

pub use claims::Claims;
pub use jwt::JwtService;
pub use middleware::{AdminUser, AuthenticatedUser};
