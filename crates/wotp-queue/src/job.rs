// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job payloads stored in the durable queue.

use serde::{Deserialize, Serialize};
use wotp_core::{JobKind, SessionKey, WotpError};

/// What to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobPayload {
    /// A one-time code, rendered into `template` or the configured default.
    Otp {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
    },
    /// A transactional text message.
    Message { body: String },
}

/// One outbound send, as serialized into `queue.payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundJob {
    pub account_id: String,
    pub label: String,
    pub recipient: String,
    pub payload: JobPayload,
    /// Delivery log row written at enqueue time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<i64>,
}

impl OutboundJob {
    pub fn kind(&self) -> JobKind {
        match self.payload {
            JobPayload::Otp { .. } => JobKind::Otp,
            JobPayload::Message { .. } => JobKind::Message,
        }
    }

    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(self.account_id.clone(), self.label.clone())
    }

    /// Body recorded in the delivery log. OTP codes are never stored.
    pub fn logged_content(&self) -> Option<&str> {
        match &self.payload {
            JobPayload::Otp { .. } => None,
            JobPayload::Message { body } => Some(body),
        }
    }

    pub fn to_json(&self) -> Result<String, WotpError> {
        serde_json::to_string(self).map_err(|e| WotpError::Queue(format!("encode job: {e}")))
    }

    pub fn from_json(payload: &str) -> Result<Self, WotpError> {
        serde_json::from_str(payload).map_err(|e| WotpError::Queue(format!("decode job: {e}")))
    }
}
