//! HTTP boundary.
//!
//! Converts every service outcome into the fixed response shapes. Failure
//! detail goes to the log, never into a response body.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::services::{CheckinError, CheckinService, IssuanceError, IssuanceService};

/// Session used when a check-in names none.
pub const DEFAULT_SESSION_ID: i64 = 1;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub issuance: IssuanceService,
    pub checkin: CheckinService,
}

/// Build the daemon's router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sign_cert", post(sign_cert))
        .route("/checkin", post(checkin))
        .with_state(state)
}

/// An identifier that clients may send as a JSON string or number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    pub fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCertificateRequest {
    #[serde(alias = "id")]
    pub record_id: WireId,
    #[serde(alias = "token")]
    pub presented_token: String,
    #[serde(alias = "pub_key")]
    pub public_key_hex: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssueCertificateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub valid_until: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub authority_public_key: Option<String>,
}

impl IssueCertificateResponse {
    fn failure() -> Self {
        Self {
            success: false,
            valid_until: None,
            signature: None,
            authority_public_key: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRequest {
    #[serde(alias = "cert_id")]
    pub certificate_id: WireId,
    #[serde(alias = "session_id", default)]
    pub session_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CheckinResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub identity_name: Option<String>,
}

impl CheckinResponse {
    fn failure(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            identity_name: None,
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn sign_cert(
    State(state): State<AppState>,
    Json(request): Json<IssueCertificateRequest>,
) -> (StatusCode, Json<IssueCertificateResponse>) {
    let record_id = request.record_id.into_string();

    match state
        .issuance
        .issue(&record_id, &request.presented_token, &request.public_key_hex)
        .await
    {
        Ok(cert) => (
            StatusCode::OK,
            Json(IssueCertificateResponse {
                success: true,
                valid_until: Some(cert.payload().expiry_string()),
                signature: Some(cert.signature().to_hex()),
                authority_public_key: Some(cert.authority().to_hex()),
            }),
        ),
        Err(e) => (issuance_status(&e), Json(IssueCertificateResponse::failure())),
    }
}

fn issuance_status(err: &IssuanceError) -> StatusCode {
    match err {
        IssuanceError::InvalidPublicKey(_) => StatusCode::BAD_REQUEST,
        IssuanceError::Storage(_) | IssuanceError::ExpiryOutOfRange => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        IssuanceError::NotFound | IssuanceError::Rejected(_) | IssuanceError::InvalidSubject(_) => {
            StatusCode::FORBIDDEN
        }
    }
}

async fn checkin(
    State(state): State<AppState>,
    Json(request): Json<CheckinRequest>,
) -> (StatusCode, Json<CheckinResponse>) {
    let certificate_id = request.certificate_id.into_string();
    let session_id = request.session_id.unwrap_or(DEFAULT_SESSION_ID);

    match state
        .checkin
        .check_in(&certificate_id, session_id, Utc::now())
        .await
    {
        Ok((identity, _)) => (
            StatusCode::OK,
            Json(CheckinResponse {
                success: true,
                message: format!("Welcome back {}!", identity.name),
                identity_name: Some(identity.name),
            }),
        ),
        Err(CheckinError::Unauthorized) => (
            StatusCode::UNAUTHORIZED,
            Json(CheckinResponse::failure("Invalid certificate")),
        ),
        Err(CheckinError::Storage(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CheckinResponse::failure("Check-in processing failed")),
        ),
    }
}
