//! HTTP binding for a PostgREST-style backend.
//!
//! Session creation and validation are RPC calls; record lookups read the
//! `attendance_records` table directly with row-level security scoping them
//! to the caller.
//!
//! # Security
//!
//! - The anon key and user access token are `SecretString`s and never logged
//! - Every request carries the caller's access token; the backend enforces
//!   ownership and uniqueness
//! - Timeouts prevent hanging connections

use super::payload::{
    CreateSessionRequest, CreateSessionResponse, ErrorBody, ValidateRequest, ValidateResponse,
};
use super::{AttendanceBackend, BackendError, CreatedSession, RecordOutcome};
use crate::auth::Identity;
use crate::codec::SessionCode;
use crate::models::AttendanceRecord;
use common::secret::{ExposeSecret, SecretString};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{error, instrument, warn};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 5;

const CREATE_SESSION_RPC: &str = "create_attendance_session";
const VALIDATE_RPC: &str = "validate_and_record_attendance";
const RECORDS_TABLE: &str = "attendance_records";

/// Backend client over HTTP.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    anon_key: SecretString,
}

impl HttpBackend {
    /// Create a new backend client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Project URL, e.g. `https://project.example.co`
    /// * `anon_key` - Public API key sent as the `apikey` header
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the HTTP client fails to build.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "attendance.backend", error = %e, "Failed to build HTTP client");
                BackendError::Unavailable("Failed to create HTTP client".to_string())
            })?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            anon_key,
        })
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{function}", self.base_url)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn request(&self, method: Method, url: String, identity: &Identity) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(identity.access_token().expose_secret())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(target: "attendance.backend", operation, "Backend request timed out");
                BackendError::Timeout
            } else {
                warn!(target: "attendance.backend", operation, error = %e, "Backend request failed");
                BackendError::Unavailable("Attendance backend is unreachable".to_string())
            }
        })?;

        Self::handle_response(operation, response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| {
                error!(target: "attendance.backend", operation, error = %e, "Failed to parse backend response");
                BackendError::MalformedResponse(format!("{operation} returned an unexpected body"))
            })
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(target: "attendance.backend", operation, status = %status, "Backend rejected credentials");
            Err(BackendError::Unauthorized(format!(
                "{operation} denied with status {status}"
            )))
        } else if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY
        {
            let body = response.json::<ErrorBody>().await.ok();
            let message = body
                .and_then(|b| b.message)
                .unwrap_or_else(|| "Request rejected".to_string());
            warn!(target: "attendance.backend", operation, status = %status, message = %message, "Backend rejected request");
            Err(BackendError::Validation(message))
        } else if status.is_server_error() {
            warn!(target: "attendance.backend", operation, status = %status, "Backend returned server error");
            Err(BackendError::Unavailable(
                "Attendance backend is unavailable".to_string(),
            ))
        } else {
            warn!(target: "attendance.backend", operation, status = %status, "Unexpected backend response");
            Err(BackendError::Unavailable(format!(
                "Unexpected status {status}"
            )))
        }
    }
}

fn duration_minutes(duration: Duration) -> u32 {
    u32::try_from(duration.as_secs().div_ceil(60))
        .unwrap_or(u32::MAX)
        .max(1)
}

#[async_trait::async_trait]
impl AttendanceBackend for HttpBackend {
    #[instrument(skip_all, fields(owner_id = %owner.user_id()))]
    async fn create_attendance_session(
        &self,
        owner: &Identity,
        class_name: &str,
        duration: Duration,
    ) -> Result<CreatedSession, BackendError> {
        let body = CreateSessionRequest {
            class_name,
            duration_minutes: duration_minutes(duration),
        };
        let request = self
            .request(Method::POST, self.rpc_url(CREATE_SESSION_RPC), owner)
            .json(&body);

        let response: CreateSessionResponse = self.send(CREATE_SESSION_RPC, request).await?;
        CreatedSession::try_from(response)
    }

    #[instrument(skip_all, fields(user_id = %participant.user_id(), session_code = %code))]
    async fn validate_and_record_attendance(
        &self,
        participant: &Identity,
        code: &SessionCode,
    ) -> Result<RecordOutcome, BackendError> {
        let body = ValidateRequest {
            session_code: code.as_str(),
        };
        let request = self
            .request(Method::POST, self.rpc_url(VALIDATE_RPC), participant)
            .json(&body);

        let response: ValidateResponse = self.send(VALIDATE_RPC, request).await?;
        response.into_outcome()
    }

    #[instrument(skip_all, fields(user_id = %participant.user_id(), session_code = %code))]
    async fn find_record(
        &self,
        participant: &Identity,
        code: &SessionCode,
    ) -> Result<Option<AttendanceRecord>, BackendError> {
        let request = self
            .request(Method::GET, self.table_url(RECORDS_TABLE), participant)
            .query(&[
                ("user_id", format!("eq.{}", participant.user_id())),
                ("session_code", format!("eq.{code}")),
                ("limit", "1".to_string()),
            ]);

        let records: Vec<AttendanceRecord> = self.send("find_record", request).await?;
        let record = records.into_iter().next();

        if let Some(found) = &record {
            if found.user_id != participant.user_id() || &found.session_code != code {
                error!(target: "attendance.backend", "Record lookup returned a row for another user or session");
                return Err(BackendError::MalformedResponse(
                    "record does not match the requested user and session".to_string(),
                ));
            }
        }
        Ok(record)
    }

    #[instrument(skip_all, fields(owner_id = %owner.user_id(), session_code = %code))]
    async fn list_session_records(
        &self,
        owner: &Identity,
        code: &SessionCode,
    ) -> Result<Vec<AttendanceRecord>, BackendError> {
        let request = self
            .request(Method::GET, self.table_url(RECORDS_TABLE), owner)
            .query(&[
                ("session_code", format!("eq.{code}")),
                ("order", "checked_in_at.asc".to_string()),
            ]);

        let records: Vec<AttendanceRecord> = self.send("list_session_records", request).await?;
        if records.iter().any(|r| &r.session_code != code) {
            error!(target: "attendance.backend", "Roster returned rows for another session");
            return Err(BackendError::MalformedResponse(
                "roster contains records for another session".to_string(),
            ));
        }
        Ok(records)
    }
}
