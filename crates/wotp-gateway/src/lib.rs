// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authenticated HTTP gateway in front of the session supervisor and outbox.
//!
//! API keys map to accounts. Account holders link sessions through a
//! long-polling connect call, inspect and remove them, and queue OTP and
//! transactional sends.

pub mod auth;
pub mod handlers;
pub mod server;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use wotp_core::{AdapterType, HealthStatus, PluginAdapter, WotpError};

pub use crate::auth::{AccountId, AuthConfig};
pub use crate::server::{router, GatewayState, ServerConfig};

/// The gateway server as a managed adapter.
///
/// [`Gateway::start`] spawns the axum server as a background task; it stops
/// when the token passed to `start` is cancelled or on [`PluginAdapter::shutdown`].
pub struct Gateway {
    config: ServerConfig,
    state: GatewayState,
    server_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Gateway {
    pub fn new(config: ServerConfig, state: GatewayState) -> Self {
        Self {
            config,
            state,
            server_handle: Mutex::new(None),
        }
    }

    pub async fn start(&self, cancel: CancellationToken) {
        let config = self.config.clone();
        let state = self.state.clone();
        if state.auth.is_empty() {
            tracing::warn!("gateway has no api keys configured; every api request will be rejected");
        }

        let handle = tokio::spawn(async move {
            if let Err(e) = server::start_server(&config, state, cancel).await {
                tracing::error!("gateway server error: {e}");
            }
        });
        *self.server_handle.lock().await = Some(handle);

        tracing::info!(
            "gateway started on {}:{}",
            self.config.host,
            self.config.port
        );
    }

    /// Waits for the server task to finish after cancellation.
    pub async fn join(&self) {
        let handle = self.server_handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[async_trait]
impl PluginAdapter for Gateway {
    fn name(&self) -> &str {
        "gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Gateway
    }

    async fn health_check(&self) -> Result<HealthStatus, WotpError> {
        let handle = self.server_handle.lock().await;
        match handle.as_ref() {
            Some(h) if !h.is_finished() => Ok(HealthStatus::Healthy),
            Some(_) => Ok(HealthStatus::Unhealthy("server stopped".to_string())),
            None => Ok(HealthStatus::Unhealthy("server not started".to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), WotpError> {
        if let Some(h) = self.server_handle.lock().await.take() {
            h.abort();
        }
        Ok(())
    }
}
