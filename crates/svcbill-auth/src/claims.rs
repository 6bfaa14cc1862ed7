//! JWT claims carried by operator tokens

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use svcbill_core::models::{Actor, UserRole};

/// Operator token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Operator username
    pub sub: String,

    /// Operator role
    pub role: UserRole,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp); 0 lets `JwtService` pick the default
    pub exp: i64,
}

impl Claims {
    /// Claims for `username`, expiring after the service default
    ///
    /// ```
    /// use svcbill_auth::Claims;
    /// use svcbill_core::models::UserRole;
    ///
    /// let claims = Claims::new("ana", UserRole::Admin);
    /// assert_eq!(claims.sub, "ana");
    /// assert_eq!(claims.exp, 0);
    /// ```
    pub fn new(username: &str, role: UserRole) -> Self {
        Self {
            sub: username.to_string(),
            role,
            iat: Utc::now().timestamp(),
            exp: 0,
        }
    }

    /// Claims expiring `expires_in_secs` from now
    pub fn with_expiration(username: &str, role: UserRole, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: username.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(expires_in_secs)).timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }

    /// May change service status and create invoices
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// History actor for actions taken with this token
    pub fn actor(&self) -> Actor {
        Actor::operator(self.sub.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_with_expiration() {
        let claims = Claims::with_expiration("ana", UserRole::Admin, 3600);
        assert!(!claims.is_expired());

        let now = Utc::now().timestamp();
        assert!(claims.exp > now);
        assert!(claims.exp <= now + 3600);
    }

    #[test]
    fn test_expired_claims() {
        let mut claims = Claims::new("ana", UserRole::Operator);
        claims.exp = (Utc::now() - Duration::hours(1)).timestamp();
        assert!(claims.is_expired());
    }

    #[test]
    fn test_admin_roles() {
        assert!(!Claims::new("support", UserRole::Operator).is_admin());
        assert!(Claims::new("billing", UserRole::Admin).is_admin());
        assert!(Claims::new("root", UserRole::Superadmin).is_admin());
    }

    #[test]
    fn test_actor() {
        let claims = Claims::new("ana", UserRole::Admin);
        assert_eq!(claims.actor(), Actor::operator("ana"));
        assert_eq!(claims.actor().to_string(), "operator:ana");
    }
}
