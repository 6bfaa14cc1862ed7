//! Suspension history model
//!
//! Append-only audit trail of every company service status transition.

use super::company_service::{CompanyService, ServiceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Why a transition happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspensionReason {
    /// Overdue invoice
    NonPayment,
    /// Administrative action
    Manual,
    /// Return to active
    Reactivation,
}

impl fmt::Display for SuspensionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SuspensionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuspensionReason::NonPayment => "non_payment",
            SuspensionReason::Manual => "manual",
            SuspensionReason::Reactivation => "reactivation",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "non_payment" => Some(SuspensionReason::NonPayment),
            "manual" => Some(SuspensionReason::Manual),
            "reactivation" => Some(SuspensionReason::Reactivation),
            _ => None,
        }
    }

    /// Reasons a caller may give for moving a service out of `active`
    pub fn is_suspension_cause(&self) -> bool {
        matches!(self, SuspensionReason::NonPayment | SuspensionReason::Manual)
    }
}

/// Who requested a transition
///
/// Stored as `system` or `operator:<username>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Actor {
    /// Automated sweep or payment processing
    System,
    /// A named human operator
    Operator(String),
}

impl Actor {
    pub fn operator(username: impl Into<String>) -> Self {
        Actor::Operator(username.into())
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Actor::System)
    }

    /// Parse the stored representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Actor::System),
            other => other
                .strip_prefix("operator:")
                .filter(|name| !name.is_empty())
                .map(Actor::operator),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => write!(f, "system"),
            Actor::Operator(name) => write!(f, "operator:{}", name),
        }
    }
}

impl From<Actor> for String {
    fn from(actor: Actor) -> Self {
        actor.to_string()
    }
}

impl TryFrom<String> for Actor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Actor::parse(&value).ok_or_else(|| format!("invalid actor: {}", value))
    }
}

/// Suspension history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSuspensionHistory {
    /// Unique identifier
    pub id: Uuid,

    /// Service that transitioned
    pub company_service_id: Uuid,

    /// Status before the transition
    pub previous_status: ServiceStatus,

    /// Status after the transition
    pub new_status: ServiceStatus,

    /// Cause of the transition
    pub reason: SuspensionReason,

    /// Who requested it
    pub actor: Actor,

    /// Optional operator note
    pub note: Option<String>,

    /// When it happened
    pub created_at: DateTime<Utc>,
}

/// A status change to apply atomically together with its history row.
///
/// The store must only apply it when the row still has `expected_version`.
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub company_service_id: Uuid,
    pub expected_version: i64,
    pub previous_status: ServiceStatus,
    pub new_status: ServiceStatus,
    pub reason: SuspensionReason,
    pub actor: Actor,
    pub note: Option<String>,
    /// Only apply while this invoice exists and is not paid. Checked inside
    /// the same unit of work as the status write.
    pub unpaid_invoice: Option<Uuid>,
}

/// Result of handing a [`StatusTransition`] to the store
#[derive(Debug, Clone)]
pub enum TransitionWrite {
    /// Status updated and history row appended
    Committed {
        service: CompanyService,
        entry: ServiceSuspensionHistory,
    },
    /// Version or status moved underneath us; nothing written
    Stale,
    /// The guarding invoice was paid (or removed); nothing written
    InvoiceSettled,
}

impl StatusTransition {
    /// History row recorded for this transition
    pub fn history_entry(&self, at: DateTime<Utc>) -> ServiceSuspensionHistory {
        ServiceSuspensionHistory {
            id: Uuid::new_v4(),
            company_service_id: self.company_service_id,
            previous_status: self.previous_status,
            new_status: self.new_status,
            reason: self.reason,
            actor: self.actor.clone(),
            note: self.note.clone(),
            created_at: at,
        }
    }
}
