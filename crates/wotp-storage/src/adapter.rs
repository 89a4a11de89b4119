// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use wotp_config::model::StorageConfig;
use wotp_core::{
    AdapterType, CoarseStatus, ConnectionStore, ConnectionSummary, CredentialStore, HealthStatus,
    PluginAdapter, RecordType, SessionKey, StorageAdapter, WotpError,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// The database is opened on the first call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wraps an already opened database.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Returns the underlying Database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, WotpError> {
        self.db.get().ok_or_else(|| WotpError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, WotpError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), WotpError> {
        if self.db.get().is_some() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), WotpError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| WotpError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), WotpError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for SqliteStorage {
    async fn load(
        &self,
        key: &SessionKey,
        record_type: RecordType,
        record_id: &str,
    ) -> Result<Option<Vec<u8>>, WotpError> {
        queries::credentials::load(self.database()?, key, record_type, record_id).await
    }

    async fn save(
        &self,
        key: &SessionKey,
        record_type: RecordType,
        record_id: &str,
        value: &[u8],
    ) -> Result<(), WotpError> {
        queries::credentials::save(self.database()?, key, record_type, record_id, value).await
    }

    async fn delete(
        &self,
        key: &SessionKey,
        record_type: RecordType,
        record_id: &str,
    ) -> Result<(), WotpError> {
        queries::credentials::delete(self.database()?, key, record_type, record_id).await
    }

    async fn delete_all(&self, key: &SessionKey) -> Result<u64, WotpError> {
        queries::credentials::delete_all(self.database()?, key).await
    }

    async fn count(&self, key: &SessionKey) -> Result<u64, WotpError> {
        queries::credentials::count(self.database()?, key).await
    }
}

#[async_trait]
impl ConnectionStore for SqliteStorage {
    async fn set_status(&self, key: &SessionKey, status: CoarseStatus) -> Result<(), WotpError> {
        queries::connections::set_status(self.database()?, key, status).await
    }

    async fn set_identity(
        &self,
        key: &SessionKey,
        phone: &str,
        name: Option<&str>,
    ) -> Result<(), WotpError> {
        queries::connections::set_identity(self.database()?, key, phone, name).await
    }

    async fn set_account_status(
        &self,
        account_id: &str,
        status: CoarseStatus,
    ) -> Result<(), WotpError> {
        queries::connections::set_account_status(self.database()?, account_id, status).await
    }

    async fn get_summary(&self, key: &SessionKey) -> Result<Option<ConnectionSummary>, WotpError> {
        queries::connections::get_summary(self.database()?, key).await
    }

    async fn list_summaries(
        &self,
        account_id: Option<&str>,
    ) -> Result<Vec<ConnectionSummary>, WotpError> {
        queries::connections::list_summaries(self.database()?, account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        let result = storage.initialize().await;
        assert!(result.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn health_check_requires_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.health_check().await.is_err());
        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn credential_and_connection_traits_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("traits.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let key = SessionKey::default_for("acct");
        let creds: &dyn CredentialStore = &storage;
        creds.save(&key, RecordType::Creds, "default", &[0, 1, 2]).await.unwrap();
        creds.save(&key, RecordType::PreKey, "7", &[9]).await.unwrap();
        assert_eq!(creds.count(&key).await.unwrap(), 2);
        assert_eq!(
            creds.load(&key, RecordType::Creds, "default").await.unwrap(),
            Some(vec![0, 1, 2])
        );
        assert_eq!(creds.delete_all(&key).await.unwrap(), 2);

        let conns: &dyn ConnectionStore = &storage;
        conns.set_status(&key, CoarseStatus::Connecting).await.unwrap();
        conns.set_account_status("acct", CoarseStatus::Connecting).await.unwrap();
        let listed = conns.list_summaries(Some("acct")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, CoarseStatus::Connecting);

        storage.shutdown().await.unwrap();
    }
}
