// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The narrow seam between the session supervisor and the WhatsApp protocol client.
//!
//! The protocol itself is opaque here: a factory opens one connection per
//! session from restored credentials, the connection reports pairing codes,
//! state transitions and credential changes on an ordered event channel, and
//! the handle accepts text sends and logout.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::WotpError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CredentialBatch, RecordType, SessionKey, TransportEvent};

/// Credential access handed to the transport for the lifetime of a connection.
#[async_trait]
pub trait SignalKeyStore: Send + Sync {
    /// Reads the requested records; ids with no stored value are omitted.
    async fn get(
        &self,
        record_type: RecordType,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<u8>>, WotpError>;

    /// Applies a batch of writes and deletes.
    async fn set(&self, batch: CredentialBatch) -> Result<(), WotpError>;
}

/// Restored authentication state for opening a connection.
#[derive(Clone)]
pub struct AuthState {
    /// Identity credentials, absent for a session that was never linked.
    pub identity: Option<Vec<u8>>,
    pub keys: Arc<dyn SignalKeyStore>,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("identity", &self.identity.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

/// A live connection's control handle.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Sends a text message to a fully qualified recipient JID.
    async fn send_text(&self, jid: &str, text: &str) -> Result<(), WotpError>;

    /// Unlinks the device from the phone and closes the connection.
    async fn logout(&self) -> Result<(), WotpError>;

    /// Closes the connection without unlinking.
    async fn close(&self);
}

/// An opened connection: the handle plus its ordered event stream.
pub struct TransportConnection {
    pub handle: Arc<dyn TransportHandle>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens protocol connections.
#[async_trait]
pub trait TransportFactory: PluginAdapter {
    async fn open(&self, key: &SessionKey, auth: AuthState)
        -> Result<TransportConnection, WotpError>;
}
