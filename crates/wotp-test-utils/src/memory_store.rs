// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory implementations of the storage traits.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use wotp_core::{
    CoarseStatus, ConnectionStore, ConnectionSummary, CredentialStore, RecordType, SessionKey,
    WotpError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

type RecordKey = (SessionKey, RecordType, String);

/// Credential store backed by a `HashMap`, with injectable write failures.
#[derive(Default)]
pub struct MemoryCredentialStore {
    records: Mutex<HashMap<RecordKey, Vec<u8>>>,
    failing: Mutex<HashSet<RecordType>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes saves of `record_type` fail.
    pub fn fail_writes_for(&self, record_type: RecordType) {
        lock(&self.failing).insert(record_type);
    }

    /// Records stored for `key`.
    pub fn record_count(&self, key: &SessionKey) -> usize {
        lock(&self.records).keys().filter(|(k, _, _)| k == key).count()
    }

    pub fn insert(&self, key: &SessionKey, record_type: RecordType, record_id: &str, value: &[u8]) {
        lock(&self.records).insert((key.clone(), record_type, record_id.to_string()), value.to_vec());
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(
        &self,
        key: &SessionKey,
        record_type: RecordType,
        record_id: &str,
    ) -> Result<Option<Vec<u8>>, WotpError> {
        Ok(lock(&self.records)
            .get(&(key.clone(), record_type, record_id.to_string()))
            .cloned())
    }

    async fn save(
        &self,
        key: &SessionKey,
        record_type: RecordType,
        record_id: &str,
        value: &[u8],
    ) -> Result<(), WotpError> {
        if lock(&self.failing).contains(&record_type) {
            return Err(WotpError::Storage {
                source: format!("injected write failure for {record_type}").into(),
            });
        }
        self.insert(key, record_type, record_id, value);
        Ok(())
    }

    async fn delete(
        &self,
        key: &SessionKey,
        record_type: RecordType,
        record_id: &str,
    ) -> Result<(), WotpError> {
        lock(&self.records).remove(&(key.clone(), record_type, record_id.to_string()));
        Ok(())
    }

    async fn delete_all(&self, key: &SessionKey) -> Result<u64, WotpError> {
        let mut records = lock(&self.records);
        let before = records.len();
        records.retain(|(k, _, _), _| k != key);
        Ok((before - records.len()) as u64)
    }

    async fn count(&self, key: &SessionKey) -> Result<u64, WotpError> {
        Ok(self.record_count(key) as u64)
    }
}

/// Connection store backed by maps, recording every status write.
#[derive(Default)]
pub struct MemoryConnectionStore {
    summaries: Mutex<BTreeMap<SessionKey, ConnectionSummary>>,
    accounts: Mutex<HashMap<String, CoarseStatus>>,
    history: Mutex<Vec<(SessionKey, CoarseStatus)>>,
}

impl MemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a summary, as if persisted by an earlier run.
    pub fn seed(&self, key: &SessionKey, status: CoarseStatus) {
        let summary = self.blank(key, status);
        lock(&self.summaries).insert(key.clone(), summary);
    }

    /// Legacy per-account status field.
    pub fn account_status(&self, account_id: &str) -> Option<CoarseStatus> {
        lock(&self.accounts).get(account_id).copied()
    }

    /// Every status written for `key`, oldest first.
    pub fn status_history(&self, key: &SessionKey) -> Vec<CoarseStatus> {
        lock(&self.history)
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn summary(&self, key: &SessionKey) -> Option<ConnectionSummary> {
        lock(&self.summaries).get(key).cloned()
    }

    fn blank(&self, key: &SessionKey, status: CoarseStatus) -> ConnectionSummary {
        let now = now();
        ConnectionSummary {
            account_id: key.account_id.clone(),
            label: key.label.clone(),
            status,
            phone: None,
            name: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[async_trait]
impl ConnectionStore for MemoryConnectionStore {
    async fn set_status(&self, key: &SessionKey, status: CoarseStatus) -> Result<(), WotpError> {
        let blank = self.blank(key, status);
        let mut summaries = lock(&self.summaries);
        let summary = summaries.entry(key.clone()).or_insert(blank);
        summary.status = status;
        summary.updated_at = now();
        lock(&self.history).push((key.clone(), status));
        Ok(())
    }

    async fn set_identity(
        &self,
        key: &SessionKey,
        phone: &str,
        name: Option<&str>,
    ) -> Result<(), WotpError> {
        let blank = self.blank(key, CoarseStatus::Disconnected);
        let mut summaries = lock(&self.summaries);
        let summary = summaries.entry(key.clone()).or_insert(blank);
        summary.phone = Some(phone.to_string());
        summary.name = name.map(str::to_string);
        summary.updated_at = now();
        Ok(())
    }

    async fn set_account_status(
        &self,
        account_id: &str,
        status: CoarseStatus,
    ) -> Result<(), WotpError> {
        lock(&self.accounts).insert(account_id.to_string(), status);
        Ok(())
    }

    async fn get_summary(&self, key: &SessionKey) -> Result<Option<ConnectionSummary>, WotpError> {
        Ok(self.summary(key))
    }

    async fn list_summaries(
        &self,
        account_id: Option<&str>,
    ) -> Result<Vec<ConnectionSummary>, WotpError> {
        Ok(lock(&self.summaries)
            .values()
            .filter(|s| account_id.is_none_or(|id| s.account_id == id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_all_is_scoped_to_session() {
        let store = MemoryCredentialStore::new();
        let a = SessionKey::default_for("a");
        let b = SessionKey::new("a", "support");
        store.save(&a, RecordType::Creds, "default", b"1").await.unwrap();
        store.save(&a, RecordType::PreKey, "1", b"2").await.unwrap();
        store.save(&b, RecordType::Creds, "default", b"3").await.unwrap();

        assert_eq!(store.delete_all(&a).await.unwrap(), 2);
        assert_eq!(store.count(&a).await.unwrap(), 0);
        assert_eq!(store.count(&b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn status_writes_are_recorded() {
        let store = MemoryConnectionStore::new();
        let key = SessionKey::default_for("a");
        store.set_status(&key, CoarseStatus::Connecting).await.unwrap();
        store.set_status(&key, CoarseStatus::Connected).await.unwrap();
        store.set_identity(&key, "155501", Some("Ada")).await.unwrap();

        assert_eq!(
            store.status_history(&key),
            vec![CoarseStatus::Connecting, CoarseStatus::Connected]
        );
        let summary = store.summary(&key).unwrap();
        assert_eq!(summary.status, CoarseStatus::Connected);
        assert_eq!(summary.phone.as_deref(), Some("155501"));
        assert_eq!(store.list_summaries(Some("other")).await.unwrap().len(), 0);
    }
}
