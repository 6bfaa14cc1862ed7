//! Roles carried in operator tokens

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who is behind an operator token.
///
/// Support staff only read status and invoices. Billing and platform admins
/// may also suspend, reactivate, cancel and issue manual invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Operator,
    Admin,
    Superadmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Operator => "operator",
            UserRole::Admin => "admin",
            UserRole::Superadmin => "superadmin",
        }
    }

    /// May change service status and issue invoices
    pub fn is_admin(&self) -> bool {
        !matches!(self, UserRole::Operator)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
