// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic retention for finished jobs and old delivery log rows.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wotp_config::model::WotpConfig;
use wotp_core::{JobKind, WotpError};
use wotp_storage::queries::{delivery_log, queue};
use wotp_storage::Database;

/// Rows removed by one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub completed_pruned: u64,
    pub failed_pruned: u64,
    pub logs_purged: u64,
}

/// Prunes both queues and purges expired delivery log rows.
pub async fn run_once(db: &Database, config: &WotpConfig) -> Result<MaintenanceReport, WotpError> {
    let mut report = MaintenanceReport::default();
    for kind in [JobKind::Otp, JobKind::Message] {
        let pool = match kind {
            JobKind::Otp => &config.queue.otp,
            JobKind::Message => &config.queue.message,
        };
        report.completed_pruned +=
            queue::prune(db, kind.queue_name(), "completed", pool.keep_completed).await?;
        report.failed_pruned +=
            queue::prune(db, kind.queue_name(), "failed", pool.keep_failed).await?;
    }
    report.logs_purged =
        delivery_log::purge_older_than(db, config.delivery_log.retention_days).await?;
    Ok(report)
}

/// Runs [`run_once`] every `queue.maintenance_interval_secs` until cancelled.
pub fn spawn(db: Database, config: WotpConfig, cancel: CancellationToken) -> JoinHandle<()> {
    let period = Duration::from_secs(config.queue.maintenance_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match run_once(&db, &config).await {
                        Ok(report) if report == MaintenanceReport::default() => {
                            debug!("maintenance pass found nothing to remove");
                        }
                        Ok(report) => info!(
                            completed = report.completed_pruned,
                            failed = report.failed_pruned,
                            logs = report.logs_purged,
                            "maintenance pass complete"
                        ),
                        Err(e) => warn!(error = %e, "maintenance pass failed"),
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("maintenance task stopped");
                    break;
                }
            }
        }
    })
}
