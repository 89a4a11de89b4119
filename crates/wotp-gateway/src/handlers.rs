// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use std::str::FromStr;
use std::sync::LazyLock;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use wotp_core::{LiveStatus, PairingEvent, SessionKey, WotpError};
use wotp_queue::otp::{self, OtpKind};

use crate::auth::AccountId;
use crate::server::GatewayState;

/// E.164 number with an optional leading `+`.
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{6,14}$").expect("valid phone pattern"));

static LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid label pattern"));

const MAX_MESSAGE_LEN: usize = 2048;
const MIN_EXPIRY_SECS: u64 = 30;
const MAX_EXPIRY_SECS: u64 = 3600;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A handler failure rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<WotpError> for ApiError {
    fn from(e: WotpError) -> Self {
        let status = match &e {
            WotpError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            WotpError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            WotpError::NotConnected { .. } => StatusCode::CONFLICT,
            WotpError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            WotpError::Transport { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %e, "request failed");
            return Self::new(status, "internal error");
        }
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Sessions held by the supervisor.
    pub sessions: usize,
}

/// One entry of GET /v1/sessions.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub label: String,
    /// Live status when the supervisor holds the session, else the persisted one.
    pub status: String,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionView>,
}

/// Response body for POST /v1/sessions/{label}/connect.
#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    /// `pairing` or `connected`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
    pub message: &'static str,
}

impl ConnectResponse {
    fn connected() -> Self {
        Self {
            status: "connected",
            pairing_code: None,
            message: "WhatsApp is connected",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub label: String,
    pub status: &'static str,
}

/// Request body for POST /v1/messages.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageRequest {
    pub phone: String,
    pub content: String,
    /// Session label; the account's default session when absent.
    #[serde(default)]
    pub label: Option<String>,
}

/// Request body for POST /v1/otp.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OtpRequest {
    pub phone: String,
    #[serde(default)]
    pub length: Option<usize>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Expiry stated to the caller, in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Message template containing `{{otp}}`.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Response body for accepted sends.
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub status: &'static str,
    pub log_id: i64,
    pub job_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

fn session_key(account: String, label: Option<&str>) -> Result<SessionKey, ApiError> {
    if let Some(label) = label
        && !LABEL.is_match(label)
    {
        return Err(ApiError::bad_request(format!(
            "invalid session label `{label}`"
        )));
    }
    Ok(SessionKey::with_optional_label(account, label))
}

fn validate_phone(phone: &str) -> Result<(), ApiError> {
    if PHONE.is_match(phone) {
        Ok(())
    } else {
        Err(ApiError::bad_request("invalid phone number"))
    }
}

/// Rejects sends through a session the supervisor knows to be down.
async fn ensure_not_dropped(state: &GatewayState, key: &SessionKey) -> Result<(), ApiError> {
    let status = state.supervisor.status(key).await;
    if status == LiveStatus::Disconnected {
        return Err(WotpError::NotConnected {
            session: key.to_string(),
            status: status.to_string(),
        }
        .into());
    }
    Ok(())
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        sessions: state.supervisor.registry().len(),
    })
}

/// GET /v1/sessions
pub async fn list_sessions(
    State(state): State<GatewayState>,
    Extension(AccountId(account)): Extension<AccountId>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let summaries = state.connections.list_summaries(Some(&account)).await?;
    let mut sessions = Vec::with_capacity(summaries.len());
    for summary in summaries {
        let live = state.supervisor.status(&summary.key()).await;
        let status = match live {
            LiveStatus::Unknown => summary.status.to_string(),
            live => live.to_string(),
        };
        sessions.push(SessionView {
            label: summary.label,
            status,
            phone: summary.phone,
            name: summary.name,
            updated_at: summary.updated_at,
        });
    }
    Ok(Json(SessionListResponse { sessions }))
}

/// POST /v1/sessions/{label}/connect
///
/// Starts the session and waits for its first pairing outcome: a pairing
/// code to enter on the phone, a restored connection, or a terminal error.
pub async fn connect_session(
    State(state): State<GatewayState>,
    Extension(AccountId(account)): Extension<AccountId>,
    Path(label): Path<String>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let key = session_key(account, Some(&label))?;
    if state.supervisor.status(&key).await == LiveStatus::Connected {
        return Ok(Json(ConnectResponse::connected()));
    }

    // Subscribe before starting so the first event cannot be missed.
    let subscription = state.supervisor.subscribe(&key);
    state.supervisor.start_session(&key).await?;

    match subscription.wait_for_outcome(state.pairing_wait).await {
        Some(PairingEvent::PairingCode { code }) => Ok(Json(ConnectResponse {
            status: "pairing",
            pairing_code: Some(code),
            message: "Enter the pairing code in WhatsApp under Linked devices",
        })),
        Some(PairingEvent::Connected) => Ok(Json(ConnectResponse::connected())),
        Some(PairingEvent::Error { reason }) => Err(ApiError::new(StatusCode::BAD_GATEWAY, reason)),
        None => Err(ApiError::new(
            StatusCode::GATEWAY_TIMEOUT,
            "timed out waiting for a pairing code",
        )),
    }
}

/// DELETE /v1/sessions/{label}
pub async fn disconnect_session(
    State(state): State<GatewayState>,
    Extension(AccountId(account)): Extension<AccountId>,
    Path(label): Path<String>,
) -> Result<Json<DisconnectResponse>, ApiError> {
    let key = session_key(account, Some(&label))?;
    let live = state.supervisor.status(&key).await;
    if live == LiveStatus::Unknown && state.connections.get_summary(&key).await?.is_none() {
        return Err(WotpError::SessionNotFound {
            session: key.to_string(),
        }
        .into());
    }

    state.supervisor.stop_session(&key).await?;
    Ok(Json(DisconnectResponse {
        label: key.label,
        status: "disconnected",
    }))
}

/// POST /v1/messages
pub async fn send_message(
    State(state): State<GatewayState>,
    Extension(AccountId(account)): Extension<AccountId>,
    Json(body): Json<MessageRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>), ApiError> {
    validate_phone(&body.phone)?;
    if body.content.is_empty() || body.content.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::bad_request(format!(
            "content must be 1 to {MAX_MESSAGE_LEN} characters"
        )));
    }
    let key = session_key(account, body.label.as_deref())?;
    ensure_not_dropped(&state, &key).await?;

    let queued = state
        .outbox
        .enqueue_message(&key, &body.phone, &body.content)
        .await?;
    tracing::info!(session = %key, log_id = queued.log_id, "message queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            status: "queued",
            log_id: queued.log_id,
            job_id: queued.job_id,
            otp: None,
            expires_in: None,
        }),
    ))
}

/// POST /v1/otp
///
/// Generates a code, queues its delivery and returns it to the caller,
/// which owns verification.
pub async fn send_otp(
    State(state): State<GatewayState>,
    Extension(AccountId(account)): Extension<AccountId>,
    Json(body): Json<OtpRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>), ApiError> {
    validate_phone(&body.phone)?;
    let kind_name = body.kind.as_deref().unwrap_or(&state.otp.default_type);
    let kind = OtpKind::from_str(kind_name)
        .map_err(|_| ApiError::bad_request(format!("unknown otp type `{kind_name}`")))?;
    let expires_in = body.expires_in.unwrap_or(state.otp.default_expiry_secs);
    if !(MIN_EXPIRY_SECS..=MAX_EXPIRY_SECS).contains(&expires_in) {
        return Err(ApiError::bad_request(format!(
            "expires_in must be between {MIN_EXPIRY_SECS} and {MAX_EXPIRY_SECS} seconds"
        )));
    }
    if let Some(template) = &body.message {
        otp::validate_template(template)?;
    }
    let key = session_key(account, body.label.as_deref())?;
    ensure_not_dropped(&state, &key).await?;

    let code = otp::generate(body.length.unwrap_or(state.otp.default_length), kind)?;
    let queued = state
        .outbox
        .enqueue_otp(&key, &body.phone, &code, body.message)
        .await?;
    tracing::info!(session = %key, log_id = queued.log_id, "otp queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            status: "queued",
            log_id: queued.log_id,
            job_id: queued.job_id,
            otp: Some(code),
            expires_in: Some(expires_in),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_numbers_follow_e164() {
        assert!(validate_phone("+15550100200").is_ok());
        assert!(validate_phone("919876543210").is_ok());
        assert!(validate_phone("0123456").is_err());
        assert!(validate_phone("+1 555 0100").is_err());
        assert!(validate_phone("12345").is_err());
    }

    #[test]
    fn labels_are_restricted() {
        assert_eq!(
            session_key("a".into(), None).unwrap(),
            SessionKey::default_for("a")
        );
        assert_eq!(
            session_key("a".into(), Some("support-2")).unwrap().label,
            "support-2"
        );
        assert!(session_key("a".into(), Some("a:b")).is_err());
        assert!(session_key("a".into(), Some("")).is_err());
    }

    #[test]
    fn errors_map_to_statuses() {
        let not_connected: ApiError = WotpError::NotConnected {
            session: "a:default".into(),
            status: "disconnected".into(),
        }
        .into();
        assert_eq!(not_connected.status, StatusCode::CONFLICT);
        assert!(not_connected.message.contains("not connected"));

        let storage: ApiError = WotpError::Storage {
            source: "disk full".into(),
        }
        .into();
        assert_eq!(storage.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(storage.message, "internal error");
    }

    #[test]
    fn otp_request_uses_type_field() {
        let req: OtpRequest =
            serde_json::from_str(r#"{"phone": "15550100200", "type": "alpha", "length": 8}"#)
                .unwrap();
        assert_eq!(req.kind.as_deref(), Some("alpha"));
        assert_eq!(req.length, Some(8));
        assert!(req.message.is_none());
    }
}
