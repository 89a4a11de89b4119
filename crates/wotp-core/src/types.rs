// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the WOTP workspace.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Label used when a caller does not name a session.
pub const DEFAULT_LABEL: &str = "default";

/// Record id used for singleton credential records.
pub const SINGLETON_RECORD_ID: &str = "default";

/// Composite identity of one WhatsApp session: `(account, label)`.
///
/// At most one live transport connection exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub account_id: String,
    pub label: String,
}

impl SessionKey {
    pub fn new(account_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            label: label.into(),
        }
    }

    /// Key for the account's `"default"` session.
    pub fn default_for(account_id: impl Into<String>) -> Self {
        Self::new(account_id, DEFAULT_LABEL)
    }

    /// Builds a key from an optional label, falling back to `"default"`.
    pub fn with_optional_label(account_id: impl Into<String>, label: Option<&str>) -> Self {
        match label.map(str::trim).filter(|l| !l.is_empty()) {
            Some(label) => Self::new(account_id, label),
            None => Self::default_for(account_id),
        }
    }

    pub fn is_default(&self) -> bool {
        self.label == DEFAULT_LABEL
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.account_id, self.label)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Transport,
    Gateway,
}

/// In-memory connection phase owned by the session supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Connecting,
    Open,
    Closed,
}

impl Phase {
    pub fn live_status(self) -> LiveStatus {
        match self {
            Phase::Connecting => LiveStatus::Connecting,
            Phase::Open => LiveStatus::Connected,
            Phase::Closed => LiveStatus::Disconnected,
        }
    }
}

/// Status reported to callers from the supervisor's in-memory view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LiveStatus {
    Connecting,
    Connected,
    Disconnected,
    /// The supervisor holds no entry for the key.
    Unknown,
}

/// Coarse status persisted in the connection summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CoarseStatus {
    Connected,
    Connecting,
    Disconnected,
}

impl CoarseStatus {
    /// Whether a session in this status is restarted at boot.
    pub fn is_restorable(self) -> bool {
        matches!(self, CoarseStatus::Connected | CoarseStatus::Connecting)
    }
}

/// Category of persisted credential material.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum RecordType {
    /// Identity credentials; a singleton per session.
    Creds,
    PreKey,
    Session,
    SenderKey,
    AppStateSyncKey,
    AppStateSyncVersion,
    SenderKeyMemory,
}

impl RecordType {
    pub const ALL: [RecordType; 7] = [
        RecordType::Creds,
        RecordType::PreKey,
        RecordType::Session,
        RecordType::SenderKey,
        RecordType::AppStateSyncKey,
        RecordType::AppStateSyncVersion,
        RecordType::SenderKeyMemory,
    ];

    pub fn is_singleton(self) -> bool {
        self == RecordType::Creds
    }
}

/// One write (or delete, when `value` is `None`) inside a credential batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub record_type: RecordType,
    pub record_id: String,
    pub value: Option<Vec<u8>>,
}

/// A set of credential changes emitted by the transport in one event.
pub type CredentialBatch = Vec<CredentialUpdate>;

/// Identity of the phone linked to a session once it is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedIdentity {
    pub jid: String,
    pub phone: String,
    pub name: Option<String>,
}

impl LinkedIdentity {
    /// Derives the phone number from a JID such as `15551234567:12@s.whatsapp.net`.
    pub fn from_jid(jid: impl Into<String>, name: Option<String>) -> Self {
        let jid = jid.into();
        let user = jid.split('@').next().unwrap_or_default();
        let phone = user.split(':').next().unwrap_or_default().to_string();
        Self { jid, phone, name }
    }
}

/// How a connection close must be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CloseClass {
    /// The linked device was logged out or credentials were rejected.
    Unauthorized,
    /// The account is banned.
    Forbidden,
    /// Anything else; eligible for reconnect.
    Other,
}

/// Reason reported by the transport when a connection closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason {
    /// Protocol status code (`401` logged out, `403` forbidden, ...).
    pub code: Option<u16>,
    pub detail: String,
}

impl CloseReason {
    pub fn logged_out() -> Self {
        Self {
            code: Some(401),
            detail: "logged out".into(),
        }
    }

    pub fn forbidden() -> Self {
        Self {
            code: Some(403),
            detail: "forbidden".into(),
        }
    }

    pub fn other(detail: impl Into<String>) -> Self {
        Self {
            code: None,
            detail: detail.into(),
        }
    }

    pub fn class(&self) -> CloseClass {
        match self.code {
            Some(401) => CloseClass::Unauthorized,
            Some(403) => CloseClass::Forbidden,
            _ => CloseClass::Other,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({code})", self.detail),
            None => f.write_str(&self.detail),
        }
    }
}

/// Event emitted by a live transport connection, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    PairingCode(String),
    Open(LinkedIdentity),
    Closed(CloseReason),
    CredentialsUpdated(CredentialBatch),
}

/// Event published to pairing subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PairingEvent {
    PairingCode { code: String },
    Connected,
    Error { reason: String },
}

/// Persisted summary of one session, the source of truth for API consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub account_id: String,
    pub label: String,
    pub status: CoarseStatus,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ConnectionSummary {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.account_id.clone(), self.label.clone())
    }
}

/// Outbound work categories; each has its own queue and worker pool.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Otp,
    Message,
}

impl JobKind {
    /// Name of the durable queue holding jobs of this kind.
    pub fn queue_name(self) -> &'static str {
        match self {
            JobKind::Otp => "otp",
            JobKind::Message => "message",
        }
    }
}

/// Outcome state of a delivery log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn session_key_display_and_default_label() {
        let key = SessionKey::with_optional_label("acct-1", None);
        assert_eq!(key.to_string(), "acct-1:default");
        assert!(key.is_default());

        let named = SessionKey::with_optional_label("acct-1", Some("support"));
        assert_eq!(named.to_string(), "acct-1:support");
        assert!(!named.is_default());

        let blank = SessionKey::with_optional_label("acct-1", Some("  "));
        assert!(blank.is_default());
    }

    #[test]
    fn record_type_names_are_stable() {
        assert_eq!(RecordType::Creds.to_string(), "creds");
        assert_eq!(RecordType::AppStateSyncVersion.to_string(), "app-state-sync-version");
        for rt in RecordType::ALL {
            assert_eq!(RecordType::from_str(&rt.to_string()).unwrap(), rt);
        }
        assert!(RecordType::Creds.is_singleton());
        assert!(!RecordType::PreKey.is_singleton());
    }

    #[test]
    fn linked_identity_strips_device_and_server() {
        let id = LinkedIdentity::from_jid("15551234567:12@s.whatsapp.net", Some("Ada".into()));
        assert_eq!(id.phone, "15551234567");
        assert_eq!(id.name.as_deref(), Some("Ada"));

        let bare = LinkedIdentity::from_jid("4915111@s.whatsapp.net", None);
        assert_eq!(bare.phone, "4915111");
    }

    proptest::proptest! {
        #[test]
        fn phone_is_jid_user_part(phone in "[0-9]{6,15}", device in 0u32..64) {
            let id = LinkedIdentity::from_jid(format!("{phone}:{device}@s.whatsapp.net"), None);
            proptest::prop_assert_eq!(id.phone, phone);
        }
    }

    #[test]
    fn close_reason_classification() {
        assert_eq!(CloseReason::logged_out().class(), CloseClass::Unauthorized);
        assert_eq!(CloseReason::forbidden().class(), CloseClass::Forbidden);
        assert_eq!(CloseReason::other("stream errored").class(), CloseClass::Other);
        let restart = CloseReason {
            code: Some(515),
            detail: "restart required".into(),
        };
        assert_eq!(restart.class(), CloseClass::Other);
    }

    #[test]
    fn pairing_event_wire_shape() {
        let json = serde_json::to_value(PairingEvent::PairingCode {
            code: "1234-5678".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "pairing-code");
        assert_eq!(json["code"], "1234-5678");

        let json = serde_json::to_value(PairingEvent::Connected).unwrap();
        assert_eq!(json["type"], "connected");
    }

    #[test]
    fn phase_maps_to_live_status() {
        assert_eq!(Phase::Connecting.live_status(), LiveStatus::Connecting);
        assert_eq!(Phase::Open.live_status(), LiveStatus::Connected);
        assert_eq!(Phase::Closed.live_status(), LiveStatus::Disconnected);
        assert_eq!(LiveStatus::Unknown.to_string(), "unknown");
    }

    #[test]
    fn restorable_statuses() {
        assert!(CoarseStatus::Connected.is_restorable());
        assert!(CoarseStatus::Connecting.is_restorable());
        assert!(!CoarseStatus::Disconnected.is_restorable());
        assert_eq!(CoarseStatus::from_str("connecting").unwrap(), CoarseStatus::Connecting);
    }
}
