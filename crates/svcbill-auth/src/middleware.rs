//! Actix-web request extractors for operator tokens

use crate::jwt::JwtService;
use crate::Claims;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use std::sync::Arc;
use svcbill_core::error::AppError;
use svcbill_core::models::{Actor, UserRole};
use tracing::{debug, warn};

/// Bearer token from the Authorization header
fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    let jwt_service = req
        .app_data::<web::Data<Arc<JwtService>>>()
        .ok_or_else(|| {
            warn!("JwtService not registered as app data");
            AppError::Internal("Authentication service not configured".to_string())
        })?;

    let token = bearer_token(req).ok_or_else(|| {
        debug!(path = %req.path(), "Request without bearer token");
        AppError::InvalidToken("No bearer token provided".to_string())
    })?;

    let claims = jwt_service.validate_token(token)?;
    debug!(username = %claims.sub, role = %claims.role, "Operator authenticated");

    Ok(AuthenticatedUser {
        username: claims.sub.clone(),
        claims,
    })
}

/// Any operator holding a valid token
///
/// Rejects with 401 when the token is missing, malformed or expired.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn role(&self) -> UserRole {
        self.claims.role
    }

    pub fn is_admin(&self) -> bool {
        self.claims.is_admin()
    }

    /// Actor recorded in suspension history for this operator
    pub fn actor(&self) -> Actor {
        self.claims.actor()
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).map_err(Into::into))
    }
}

/// Operator allowed to change service status and issue invoices
///
/// Rejects with 403 when the token is valid but the role is below admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl std::ops::Deref for AdminUser {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for AdminUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = match authenticate(req) {
            Ok(user) => user,
            Err(e) => return ready(Err(e.into())),
        };

        if !user.is_admin() {
            warn!(
                username = %user.username,
                role = %user.role(),
                path = %req.path(),
                "Operator attempted admin action without privileges"
            );
            return ready(Err(AppError::Forbidden.into()));
        }

        ready(Ok(AdminUser(user)))
    }
}
