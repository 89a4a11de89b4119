// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wotp serve` command implementation.
//!
//! Opens storage, restores persisted sessions through the bridge transport,
//! starts both worker pools, the maintenance tick and the HTTP gateway, and
//! runs until SIGINT/SIGTERM. On shutdown every live connection is closed
//! without logging out, so credentials survive the restart.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use wotp_bridge::BridgeTransportFactory;
use wotp_config::WotpConfig;
use wotp_core::{JobKind, StorageAdapter, WotpError};
use wotp_gateway::{AuthConfig, Gateway, GatewayState, ServerConfig};
use wotp_queue::{maintenance, Outbox, WorkerPool};
use wotp_storage::SqliteStorage;
use wotp_whatsapp::{Notifier, SessionRegistry, SessionSupervisor, SupervisorSettings};

use crate::shutdown;

/// Runs the `wotp serve` command.
pub async fn run_serve(config: WotpConfig) -> Result<(), WotpError> {
    init_tracing(&config.daemon.log_level);

    info!("starting wotp serve");

    let transport = Arc::new(BridgeTransportFactory::from_config(&config.whatsapp)?);
    info!(url = transport.url(), "using protocol bridge");

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage = Arc::new(storage);
    let db = storage.database()?.clone();

    let supervisor = SessionSupervisor::new(
        SessionRegistry::new(),
        storage.clone(),
        storage.clone(),
        Notifier::new(),
        transport,
        SupervisorSettings::from_config(&config.whatsapp),
    );

    let cancel = shutdown::install_signal_handler();

    match supervisor.restore_persisted().await {
        Ok(restored) => info!(restored, "persisted sessions restored"),
        Err(e) => error!(error = %e, "failed to restore persisted sessions"),
    }

    let mut workers = Vec::new();
    for kind in [JobKind::Otp, JobKind::Message] {
        let pool = WorkerPool::from_config(kind, &config, db.clone(), supervisor.clone());
        workers.extend(pool.spawn(cancel.clone()));
    }
    let maintenance = maintenance::spawn(db.clone(), config.clone(), cancel.clone());

    let gateway = if config.gateway.enabled {
        let state = GatewayState {
            supervisor: supervisor.clone(),
            connections: storage.clone(),
            outbox: Outbox::new(db.clone(), &config.queue),
            otp: config.otp.clone(),
            pairing_wait: config.whatsapp.pairing_wait(),
            auth: AuthConfig::from_keys(&config.gateway.api_keys),
            started_at: Instant::now(),
        };
        let gateway = Gateway::new(
            ServerConfig {
                host: config.gateway.host.clone(),
                port: config.gateway.port,
            },
            state,
        );
        gateway.start(cancel.clone()).await;
        Some(gateway)
    } else {
        info!("gateway disabled");
        None
    };

    cancel.cancelled().await;
    info!("shutting down");

    for worker in workers {
        let _ = worker.await;
    }
    let _ = maintenance.await;
    if let Some(gateway) = &gateway {
        gateway.join().await;
    }

    supervisor.shutdown().await;
    storage.close().await?;

    info!("wotp serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wotp={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
