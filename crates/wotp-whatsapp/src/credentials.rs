// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-scoped view of the credential store handed to the transport.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};
use wotp_core::{
    CredentialBatch, CredentialStore, RecordType, SessionKey, SignalKeyStore, WotpError,
    SINGLETON_RECORD_ID,
};

/// Credential access for one session.
///
/// Individual record failures are logged and skipped; a bad record never
/// fails a whole batch.
#[derive(Clone)]
pub struct SessionCredentials {
    key: SessionKey,
    store: Arc<dyn CredentialStore>,
}

impl SessionCredentials {
    pub fn new(key: SessionKey, store: Arc<dyn CredentialStore>) -> Self {
        Self { key, store }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Identity credentials, or `None` for a never-linked session.
    pub async fn identity(&self) -> Option<Vec<u8>> {
        match self
            .store
            .load(&self.key, RecordType::Creds, SINGLETON_RECORD_ID)
            .await
        {
            Ok(value) => value,
            Err(e) => {
                warn!(session = %self.key, error = %e, "failed to load identity credentials");
                None
            }
        }
    }

    /// Replaces the identity credentials. Returns whether the write landed.
    pub async fn save_identity(&self, value: &[u8]) -> bool {
        match self
            .store
            .save(&self.key, RecordType::Creds, SINGLETON_RECORD_ID, value)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(session = %self.key, error = %e, "failed to save identity credentials");
                false
            }
        }
    }

    /// Writes and deletes every update of the batch concurrently.
    /// Returns the number of updates that failed.
    pub async fn apply(&self, batch: CredentialBatch) -> usize {
        let total = batch.len();
        let writes = batch.into_iter().map(|update| async move {
            let result = match &update.value {
                Some(value) => {
                    self.store
                        .save(&self.key, update.record_type, &update.record_id, value)
                        .await
                }
                None => {
                    self.store
                        .delete(&self.key, update.record_type, &update.record_id)
                        .await
                }
            };
            if let Err(e) = &result {
                warn!(
                    session = %self.key,
                    record_type = %update.record_type,
                    record_id = %update.record_id,
                    error = %e,
                    "credential write failed"
                );
            }
            result.is_err()
        });
        let failed = join_all(writes).await.into_iter().filter(|f| *f).count();
        debug!(session = %self.key, total, failed, "credential batch applied");
        failed
    }

    /// Removes all records of the session.
    pub async fn wipe(&self) -> u64 {
        match self.store.delete_all(&self.key).await {
            Ok(n) => n,
            Err(e) => {
                warn!(session = %self.key, error = %e, "failed to wipe credentials");
                0
            }
        }
    }
}

#[async_trait]
impl SignalKeyStore for SessionCredentials {
    async fn get(
        &self,
        record_type: RecordType,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<u8>>, WotpError> {
        let reads = ids.iter().map(|id| async move {
            match self.store.load(&self.key, record_type, id).await {
                Ok(value) => value.map(|v| (id.clone(), v)),
                Err(e) => {
                    warn!(
                        session = %self.key,
                        record_type = %record_type,
                        record_id = %id,
                        error = %e,
                        "credential read failed"
                    );
                    None
                }
            }
        });
        Ok(join_all(reads).await.into_iter().flatten().collect())
    }

    async fn set(&self, batch: CredentialBatch) -> Result<(), WotpError> {
        self.apply(batch).await;
        Ok(())
    }
}
