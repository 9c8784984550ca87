//! Backend wire payloads.
//!
//! Responses are deserialized into these closed shapes and converted into
//! domain types here, so nothing outside this module sees raw JSON.

use super::{BackendError, CreatedSession, RecordOutcome};
use chrono::{DateTime, Utc};
use common::types::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct CreateSessionRequest<'a> {
    pub class_name: &'a str,
    pub duration_minutes: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateSessionResponse {
    pub session_code: String,
    pub class_name: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<CreateSessionResponse> for CreatedSession {
    type Error = BackendError;

    fn try_from(response: CreateSessionResponse) -> Result<Self, Self::Error> {
        if response.expires_at <= response.created_at {
            return Err(BackendError::MalformedResponse(
                "session expires before it is created".to_string(),
            ));
        }
        Ok(CreatedSession {
            session_code: response.session_code,
            class_name: response.class_name,
            owner_id: response.owner_id,
            created_at: response.created_at,
            expires_at: response.expires_at,
        })
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ValidateRequest<'a> {
    pub session_code: &'a str,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum ValidateResponse {
    Recorded {
        class_name: String,
    },
    AlreadyRecorded {
        class_name: String,
    },
    Rejected {
        reason: String,
        #[serde(default)]
        message: Option<String>,
    },
}

impl ValidateResponse {
    pub fn into_outcome(self) -> Result<RecordOutcome, BackendError> {
        match self {
            ValidateResponse::Recorded { class_name } => Ok(RecordOutcome::Recorded { class_name }),
            ValidateResponse::AlreadyRecorded { class_name } => {
                Ok(RecordOutcome::AlreadyRecorded { class_name })
            }
            ValidateResponse::Rejected { reason, message } => Err(match reason.as_str() {
                "expired" => BackendError::Expired(message),
                "invalid_code" => BackendError::InvalidCode(message),
                _ => BackendError::Rejected(
                    message.unwrap_or_else(|| crate::errors::DEFAULT_REJECTION_MESSAGE.to_string()),
                ),
            }),
        }
    }
}

/// PostgREST error body.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_payload() {
        let response: ValidateResponse =
            serde_json::from_str(r#"{"status":"recorded","class_name":"CS201"}"#).unwrap();
        assert_eq!(
            response.into_outcome().unwrap(),
            RecordOutcome::Recorded {
                class_name: "CS201".into()
            }
        );
    }

    #[test]
    fn test_already_recorded_payload() {
        let response: ValidateResponse =
            serde_json::from_str(r#"{"status":"already_recorded","class_name":"CS201"}"#).unwrap();
        assert!(response.into_outcome().unwrap().already_recorded());
    }

    #[test]
    fn test_rejected_payload_maps_reason() {
        let expired: ValidateResponse =
            serde_json::from_str(r#"{"status":"rejected","reason":"expired"}"#).unwrap();
        assert_eq!(expired.into_outcome().unwrap_err(), BackendError::Expired(None));

        let invalid: ValidateResponse = serde_json::from_str(
            r#"{"status":"rejected","reason":"invalid_code","message":"Unknown code"}"#,
        )
        .unwrap();
        assert_eq!(
            invalid.into_outcome().unwrap_err(),
            BackendError::InvalidCode(Some("Unknown code".into()))
        );

        let other: ValidateResponse =
            serde_json::from_str(r#"{"status":"rejected","reason":"not_enrolled"}"#).unwrap();
        assert_eq!(
            other.into_outcome().unwrap_err(),
            BackendError::Rejected("Invalid or expired code".into())
        );
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(serde_json::from_str::<ValidateResponse>(r#"{"status":"maybe"}"#).is_err());
        assert!(serde_json::from_str::<ValidateResponse>(r#"{"recorded":true}"#).is_err());
    }

    #[test]
    fn test_create_response_requires_positive_window() {
        let response: CreateSessionResponse = serde_json::from_value(serde_json::json!({
            "session_code": "ATTEND-CS201-Ab12Cd-1",
            "class_name": "CS201",
            "owner_id": "00000000-0000-0000-0000-000000000064",
            "created_at": "2026-03-02T09:05:00Z",
            "expires_at": "2026-03-02T09:00:00Z",
        }))
        .unwrap();

        assert!(matches!(
            CreatedSession::try_from(response).unwrap_err(),
            BackendError::MalformedResponse(_)
        ));
    }
}
