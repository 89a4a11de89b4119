// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the WOTP session manager.

use thiserror::Error;

/// The primary error type used across all WOTP adapter traits and core operations.
#[derive(Debug, Error)]
pub enum WotpError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport errors (socket failure, rejected send, protocol error).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The session has no usable live connection.
    #[error("session {session} is not connected (status: {status})")]
    NotConnected { session: String, status: String },

    /// No persisted or live session matches the given key.
    #[error("session not found: {session}")]
    SessionNotFound { session: String },

    /// Caller input that can never succeed (malformed recipient, bad OTP options).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Durable queue errors (unknown job kind, malformed payload).
    #[error("queue error: {0}")]
    Queue(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WotpError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error means the session had no live connection.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected { .. })
    }
}
