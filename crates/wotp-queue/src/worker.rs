// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker pools draining the `otp` and `message` queues.
//!
//! Each pool runs `concurrency` independent loops. A loop dequeues one job,
//! warms up a dropped session, sends through the supervisor, and settles
//! the job and its delivery log row. Failed jobs go back to the queue with
//! exponential backoff until their attempts are spent.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wotp_config::model::{WorkerPoolConfig, WotpConfig};
use wotp_core::{JobKind, LiveStatus, SessionKey, WotpError};
use wotp_storage::models::{FailOutcome, QueueEntry};
use wotp_storage::queries::{delivery_log, queue};
use wotp_storage::Database;
use wotp_whatsapp::SessionSupervisor;

use crate::job::{JobPayload, OutboundJob};
use crate::otp;

const WARMUP_POLL: Duration = Duration::from_secs(1);

/// Result of processing one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Delivered,
    /// Back in the queue; the log row stays pending.
    Retrying { attempts: u32, delay_ms: u64 },
    /// No attempts left; the log row is `failed`.
    Failed { reason: String },
}

/// A pool of workers for one job kind.
#[derive(Clone)]
pub struct WorkerPool {
    kind: JobKind,
    config: WorkerPoolConfig,
    db: Database,
    supervisor: SessionSupervisor,
    default_template: Arc<str>,
}

impl WorkerPool {
    pub fn new(
        kind: JobKind,
        config: WorkerPoolConfig,
        db: Database,
        supervisor: SessionSupervisor,
        default_template: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            kind,
            config,
            db,
            supervisor,
            default_template: default_template.into(),
        }
    }

    /// Pool for `kind` with its section of the configuration.
    pub fn from_config(
        kind: JobKind,
        config: &WotpConfig,
        db: Database,
        supervisor: SessionSupervisor,
    ) -> Self {
        let pool = match kind {
            JobKind::Otp => config.queue.otp.clone(),
            JobKind::Message => config.queue.message.clone(),
        };
        Self::new(
            kind,
            pool,
            db,
            supervisor,
            config.otp.message_template.as_str(),
        )
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Spawns the worker loops. They exit once `cancel` fires.
    pub fn spawn(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        info!(
            queue = self.kind.queue_name(),
            concurrency = self.config.concurrency,
            "starting worker pool"
        );
        (0..self.config.concurrency.max(1))
            .map(|worker| {
                let pool = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { pool.run_worker(worker, cancel).await })
            })
            .collect()
    }

    async fn run_worker(self, worker: usize, cancel: CancellationToken) {
        let queue_name = self.kind.queue_name();
        debug!(queue = queue_name, worker, "worker started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.process_next().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!(queue = queue_name, worker, error = %e, "worker iteration failed"),
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }
        debug!(queue = queue_name, worker, "worker stopped");
    }

    /// Dequeues and processes a single job, if one is available.
    pub async fn process_next(&self) -> Result<Option<JobOutcome>, WotpError> {
        match queue::dequeue(&self.db, self.kind.queue_name()).await? {
            Some(entry) => self.process(entry).await.map(Some),
            None => Ok(None),
        }
    }

    async fn process(&self, entry: QueueEntry) -> Result<JobOutcome, WotpError> {
        let job = match OutboundJob::from_json(&entry.payload) {
            Ok(job) => job,
            Err(e) => {
                error!(job_id = entry.id, error = %e, "dropping malformed job");
                queue::bury(&self.db, entry.id, &e.to_string()).await?;
                return Ok(JobOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        };
        let key = job.session_key();
        debug!(
            session = %key,
            job_id = entry.id,
            attempt = entry.current_attempt(),
            "processing job"
        );

        self.warm_up(&key).await;
        let log_id = match self.resolve_log_row(&job).await {
            Ok(id) => id,
            Err(e) => {
                warn!(session = %key, job_id = entry.id, error = %e, "delivery log lookup failed");
                return self.record_failure(&key, entry.id, None, e.to_string()).await;
            }
        };

        let result = match self.render(&job) {
            Ok(text) => self.supervisor.send(&key, &job.recipient, &text).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                queue::ack(&self.db, entry.id).await?;
                if let Some(id) = log_id {
                    delivery_log::mark_delivered(&self.db, id).await?;
                }
                info!(session = %key, job_id = entry.id, kind = %self.kind, "delivered");
                Ok(JobOutcome::Delivered)
            }
            // Malformed input never succeeds on retry.
            Err(e @ WotpError::InvalidInput(_)) => {
                let reason = e.to_string();
                warn!(session = %key, job_id = entry.id, reason = %reason, "job rejected");
                queue::bury(&self.db, entry.id, &reason).await?;
                if let Some(id) = log_id {
                    delivery_log::mark_failed(&self.db, id, &reason).await?;
                }
                Ok(JobOutcome::Failed { reason })
            }
            Err(e) => self.record_failure(&key, entry.id, log_id, e.to_string()).await,
        }
    }

    /// Spends one attempt of the job and schedules a retry or fails it for good.
    async fn record_failure(
        &self,
        key: &SessionKey,
        job_id: i64,
        log_id: Option<i64>,
        reason: String,
    ) -> Result<JobOutcome, WotpError> {
        match queue::fail(&self.db, job_id, &reason, self.config.backoff_ms).await? {
            FailOutcome::Retrying { attempts, delay_ms } => {
                warn!(
                    session = %key,
                    job_id,
                    attempts,
                    delay_ms,
                    reason = %reason,
                    "delivery failed, will retry"
                );
                if let Some(id) = log_id {
                    delivery_log::record_retry(&self.db, id, &reason).await?;
                }
                Ok(JobOutcome::Retrying { attempts, delay_ms })
            }
            FailOutcome::Exhausted { attempts } => {
                error!(
                    session = %key,
                    job_id,
                    attempts,
                    reason = %reason,
                    "delivery failed permanently"
                );
                if let Some(id) = log_id {
                    delivery_log::mark_failed(&self.db, id, &reason).await?;
                }
                Ok(JobOutcome::Failed { reason })
            }
        }
    }

    /// Best-effort restart of a dropped session before sending.
    async fn warm_up(&self, key: &SessionKey) {
        if self.supervisor.status(key).await != LiveStatus::Disconnected {
            return;
        }
        info!(session = %key, "session disconnected, restarting before send");
        if let Err(e) = self.supervisor.start_session(key).await {
            warn!(session = %key, error = %e, "warm-up start failed");
            return;
        }
        let deadline = self.config.warmup_secs;
        for _ in 0..deadline {
            tokio::time::sleep(WARMUP_POLL).await;
            if self.supervisor.status(key).await == LiveStatus::Connected {
                debug!(session = %key, "session reconnected");
                return;
            }
        }
        debug!(session = %key, waited_secs = deadline, "warm-up window elapsed");
    }

    async fn resolve_log_row(&self, job: &OutboundJob) -> Result<Option<i64>, WotpError> {
        if job.log_id.is_some() {
            return Ok(job.log_id);
        }
        delivery_log::find_pending(
            &self.db,
            &job.account_id,
            &job.recipient,
            job.kind(),
            job.logged_content(),
        )
        .await
    }

    fn render(&self, job: &OutboundJob) -> Result<String, WotpError> {
        match &job.payload {
            JobPayload::Otp { code, template } => {
                let template = template.as_deref().unwrap_or(&*self.default_template);
                otp::validate_template(template)?;
                Ok(otp::render(template, code))
            }
            JobPayload::Message { body } => Ok(body.clone()),
        }
    }
}
