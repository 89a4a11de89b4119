// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a temp SQLite database behind [`SqliteStorage`]
//! and a [`MockTransportFactory`], so tests can wire a supervisor, workers,
//! or the gateway against real storage without a WhatsApp connection.

use std::sync::Arc;

use wotp_config::model::{StorageConfig, WotpConfig};
use wotp_core::{StorageAdapter, WotpError};
use wotp_storage::{Database, SqliteStorage};

use crate::mock_transport::MockTransportFactory;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: WotpConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: WotpConfig::default(),
        }
    }

    /// Adjust the configuration before the harness is built.
    /// The storage path is always replaced by the temp database.
    pub fn with_config(mut self, edit: impl FnOnce(&mut WotpConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Build the test harness, creating and migrating the temp database.
    pub async fn build(self) -> Result<TestHarness, WotpError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| WotpError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let db = storage.database()?.clone();

        Ok(TestHarness {
            storage: Arc::new(storage),
            db,
            transport: Arc::new(MockTransportFactory::new()),
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A test environment with temp storage and a mock transport.
pub struct TestHarness {
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    /// Scripted transport factory.
    pub transport: Arc<MockTransportFactory>,
    /// Configuration the harness was built with.
    pub config: WotpConfig,
    db: Database,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default configuration.
    pub async fn new() -> Result<Self, WotpError> {
        Self::builder().build().await
    }

    /// The migrated database behind the storage adapter.
    pub fn database(&self) -> &Database {
        &self.db
    }
}
