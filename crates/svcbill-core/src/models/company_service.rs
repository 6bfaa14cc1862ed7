//! Company service model
//!
//! A company's subscription to one offered service (WhatsApp bot, Gmail,
//! Calendar, Sheets, Docs integrations, ...) and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Service status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Service is running for the company
    #[default]
    Active,
    /// Service is temporarily blocked (non-payment or administrative action)
    Suspended,
    /// Service is permanently terminated
    Cancelled,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of checking a requested status change against the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// The transition is part of the state machine
    Allowed,
    /// The service already has the requested status
    AlreadyInState,
    /// The transition does not exist from the current status
    NotAllowed,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Active => "active",
            ServiceStatus::Suspended => "suspended",
            ServiceStatus::Cancelled => "cancelled",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(ServiceStatus::Active),
            "suspended" => Some(ServiceStatus::Suspended),
            "cancelled" | "canceled" => Some(ServiceStatus::Cancelled),
            _ => None,
        }
    }

    /// `cancelled` has no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceStatus::Cancelled)
    }

    /// Check a transition to `target`.
    ///
    /// | From      | To        | Result         |
    /// |-----------|-----------|----------------|
    /// | active    | suspended | Allowed        |
    /// | suspended | active    | Allowed        |
    /// | active    | cancelled | Allowed        |
    /// | suspended | cancelled | Allowed        |
    /// | cancelled | cancelled | AlreadyInState |
    /// | cancelled | *other*   | NotAllowed     |
    /// | x         | x         | AlreadyInState |
    pub fn check_transition(&self, target: ServiceStatus) -> TransitionCheck {
        if *self == target {
            return TransitionCheck::AlreadyInState;
        }

        let allowed = match self {
            ServiceStatus::Active => {
                matches!(target, ServiceStatus::Suspended | ServiceStatus::Cancelled)
            }
            ServiceStatus::Suspended => {
                matches!(target, ServiceStatus::Active | ServiceStatus::Cancelled)
            }
            ServiceStatus::Cancelled => false,
        };

        if allowed {
            TransitionCheck::Allowed
        } else {
            TransitionCheck::NotAllowed
        }
    }
}

/// Company service entity
///
/// Status is only ever changed through the service manager, which bumps
/// `version` on every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyService {
    /// Unique identifier
    pub id: Uuid,

    /// Owning company
    pub company_id: Uuid,

    /// Offered service identifier (e.g. "whatsapp_bot", "gmail")
    pub service_type: String,

    /// Current status
    pub status: ServiceStatus,

    /// Package tier the company subscribed to
    pub package_tier: String,

    /// When the subscription was activated
    pub activated_at: DateTime<Utc>,

    /// Invoice of the current billing cycle
    pub current_invoice_id: Option<Uuid>,

    /// Optimistic concurrency token
    pub version: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl CompanyService {
    /// Create a new active subscription
    pub fn new(
        company_id: Uuid,
        service_type: impl Into<String>,
        package_tier: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_id,
            service_type: service_type.into(),
            status: ServiceStatus::Active,
            package_tier: package_tier.into(),
            activated_at: now,
            current_invoice_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == ServiceStatus::Active
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.status == ServiceStatus::Suspended
    }
}
