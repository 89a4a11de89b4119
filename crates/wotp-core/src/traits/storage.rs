// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage traits: backend lifecycle, credential records, and connection summaries.

use async_trait::async_trait;

use crate::error::WotpError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CoarseStatus, ConnectionSummary, RecordType, SessionKey};

/// Adapter for storage and persistence backends.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), WotpError>;

    /// Closes the storage backend, flushing pending writes and releasing connections.
    async fn close(&self) -> Result<(), WotpError>;
}

/// Durable key-value persistence for per-session cryptographic material.
///
/// Values are opaque byte blobs and must round-trip exactly.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(
        &self,
        key: &SessionKey,
        record_type: RecordType,
        record_id: &str,
    ) -> Result<Option<Vec<u8>>, WotpError>;

    /// Creates or overwrites one record.
    async fn save(
        &self,
        key: &SessionKey,
        record_type: RecordType,
        record_id: &str,
        value: &[u8],
    ) -> Result<(), WotpError>;

    async fn delete(
        &self,
        key: &SessionKey,
        record_type: RecordType,
        record_id: &str,
    ) -> Result<(), WotpError>;

    /// Removes every record of the session. Returns the number removed.
    async fn delete_all(&self, key: &SessionKey) -> Result<u64, WotpError>;

    /// Number of records held for the session.
    async fn count(&self, key: &SessionKey) -> Result<u64, WotpError>;
}

/// Persistence of coarse per-session status and the linked phone identity.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Upserts the coarse status of a session.
    async fn set_status(&self, key: &SessionKey, status: CoarseStatus) -> Result<(), WotpError>;

    /// Records the linked phone number and display name.
    async fn set_identity(
        &self,
        key: &SessionKey,
        phone: &str,
        name: Option<&str>,
    ) -> Result<(), WotpError>;

    /// Writes the legacy single-session status field on the account.
    async fn set_account_status(
        &self,
        account_id: &str,
        status: CoarseStatus,
    ) -> Result<(), WotpError>;

    async fn get_summary(&self, key: &SessionKey) -> Result<Option<ConnectionSummary>, WotpError>;

    /// Lists summaries, optionally restricted to one account.
    async fn list_summaries(
        &self,
        account_id: Option<&str>,
    ) -> Result<Vec<ConnectionSummary>, WotpError>;
}
