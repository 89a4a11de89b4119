// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Producer side: records a pending delivery and queues the job.

use serde::Serialize;
use tracing::info;

use wotp_config::model::QueueConfig;
use wotp_core::{JobKind, SessionKey, WotpError};
use wotp_storage::models::NewDeliveryLog;
use wotp_storage::queries::{delivery_log, queue};
use wotp_storage::Database;

use crate::job::{JobPayload, OutboundJob};

/// Identifiers of an accepted send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Enqueued {
    pub log_id: i64,
    pub job_id: i64,
}

/// Writes delivery log rows and queue jobs.
#[derive(Clone)]
pub struct Outbox {
    db: Database,
    otp_max_attempts: u32,
    message_max_attempts: u32,
}

impl Outbox {
    pub fn new(db: Database, config: &QueueConfig) -> Self {
        Self {
            db,
            otp_max_attempts: config.otp.max_attempts,
            message_max_attempts: config.message.max_attempts,
        }
    }

    pub async fn enqueue_otp(
        &self,
        key: &SessionKey,
        recipient: &str,
        code: &str,
        template: Option<String>,
    ) -> Result<Enqueued, WotpError> {
        self.enqueue(
            key,
            recipient,
            JobPayload::Otp {
                code: code.to_string(),
                template,
            },
        )
        .await
    }

    pub async fn enqueue_message(
        &self,
        key: &SessionKey,
        recipient: &str,
        body: &str,
    ) -> Result<Enqueued, WotpError> {
        self.enqueue(
            key,
            recipient,
            JobPayload::Message {
                body: body.to_string(),
            },
        )
        .await
    }

    async fn enqueue(
        &self,
        key: &SessionKey,
        recipient: &str,
        payload: JobPayload,
    ) -> Result<Enqueued, WotpError> {
        let mut job = OutboundJob {
            account_id: key.account_id.clone(),
            label: key.label.clone(),
            recipient: recipient.to_string(),
            payload,
            log_id: None,
        };
        let kind = job.kind();
        let log_id = delivery_log::insert_pending(
            &self.db,
            &NewDeliveryLog {
                account_id: job.account_id.clone(),
                label: job.label.clone(),
                kind,
                recipient: job.recipient.clone(),
                content: job.logged_content().map(str::to_string),
            },
        )
        .await?;
        job.log_id = Some(log_id);

        let max_attempts = match kind {
            JobKind::Otp => self.otp_max_attempts,
            JobKind::Message => self.message_max_attempts,
        };
        let job_id = queue::enqueue(&self.db, kind.queue_name(), &job.to_json()?, max_attempts).await?;
        info!(session = %key, kind = %kind, log_id, job_id, "delivery queued");
        Ok(Enqueued { log_id, job_id })
    }
}
