//! Company service control DTOs

use serde::Deserialize;
use svcbill_core::models::{Actor, SuspensionReason};
use svcbill_core::AppError;
use svcbill_services::ServiceControlParams;
use uuid::Uuid;
use validator::Validate;

/// Body of suspend / reactivate / cancel; every field is optional
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ControlRequest {
    /// `non_payment`, `manual` or `reactivation`
    pub reason: Option<String>,

    #[validate(length(max = 1000))]
    pub note: Option<String>,

    /// Fail with `conflict` instead of retrying if the service moved past this version
    #[validate(range(min = 0))]
    pub expected_version: Option<i64>,
}

impl ControlRequest {
    /// Parse a raw request body. An empty body means "all defaults"; anything
    /// else must be a well-formed, valid `ControlRequest`.
    pub fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let request: Self = serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("Malformed request body: {}", e)))?;
        request.validate()?;
        Ok(request)
    }

    /// Build manager parameters, falling back to `default_reason` when none is given
    pub fn into_params(
        self,
        company_service_id: Uuid,
        actor: Actor,
        default_reason: Option<SuspensionReason>,
    ) -> Result<ServiceControlParams, AppError> {
        let reason = match self.reason.as_deref() {
            Some(raw) => Some(SuspensionReason::from_str(raw).ok_or_else(|| {
                AppError::Validation(format!("Unknown reason '{}'", raw))
            })?),
            None => default_reason,
        };

        let mut params = ServiceControlParams::new(company_service_id, actor);
        if let Some(reason) = reason {
            params = params.with_reason(reason);
        }
        if let Some(note) = self.note.filter(|n| !n.trim().is_empty()) {
            params = params.with_note(note);
        }
        if let Some(version) = self.expected_version {
            params = params.pinned_to(version);
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reason_applies() {
        let id = Uuid::new_v4();
        let params = ControlRequest::default()
            .into_params(id, Actor::operator("ana"), Some(SuspensionReason::Manual))
            .unwrap();

        assert_eq!(params.company_service_id, id);
        assert_eq!(params.reason, Some(SuspensionReason::Manual));
        assert_eq!(params.actor, Actor::operator("ana"));
        assert!(params.note.is_none());
        assert!(params.expected_version.is_none());
    }

    #[test]
    fn test_explicit_fields() {
        let request = ControlRequest {
            reason: Some("NON_PAYMENT".to_string()),
            note: Some("ticket 4411".to_string()),
            expected_version: Some(7),
        };
        let params = request
            .into_params(Uuid::new_v4(), Actor::operator("ana"), None)
            .unwrap();

        assert_eq!(params.reason, Some(SuspensionReason::NonPayment));
        assert_eq!(params.note.as_deref(), Some("ticket 4411"));
        assert_eq!(params.expected_version, Some(7));
    }

    #[test]
    fn test_empty_body_means_defaults() {
        let request = ControlRequest::from_body(b"").unwrap();
        assert!(request.reason.is_none());
        assert!(ControlRequest::from_body(b" \n").unwrap().note.is_none());
    }

    #[test]
    fn test_malformed_body_rejected() {
        let err = ControlRequest::from_body(
            br#"{"reason":"non_payment","expected_version":99,"note":42}"#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert!(ControlRequest::from_body(b"{not json").is_err());
        assert!(ControlRequest::from_body(br#"{"expected_version":-1}"#).is_err());
    }

    #[test]
    fn test_well_formed_body_parsed() {
        let request =
            ControlRequest::from_body(br#"{"reason":"manual","expected_version":3}"#).unwrap();
        assert_eq!(request.reason.as_deref(), Some("manual"));
        assert_eq!(request.expected_version, Some(3));
    }

    #[test]
    fn test_unknown_reason_rejected() {
        let request = ControlRequest {
            reason: Some("fraud".to_string()),
            ..Default::default()
        };
        let err = request
            .into_params(Uuid::new_v4(), Actor::operator("ana"), None)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
