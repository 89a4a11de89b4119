// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job queue with visibility timeouts and exponential retry backoff.
//!
//! Delivery is at-least-once: a `processing` row whose lock expired (the
//! worker died mid-job) is handed out again by [`dequeue`].

use rusqlite::params;
use wotp_core::WotpError;

use crate::database::Database;
use crate::models::{FailOutcome, QueueCounts, QueueEntry};

/// How long a dequeued job stays invisible to other workers.
pub const LOCK_TIMEOUT: &str = "+5 minutes";

/// Enqueue a new job. Returns the auto-generated queue entry ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    payload: &str,
    max_attempts: u32,
) -> Result<i64, WotpError> {
    let queue_name = queue_name.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queue (queue_name, payload, max_attempts) VALUES (?1, ?2, ?3)",
                params![queue_name, payload, max_attempts.max(1)],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dequeue the next available job from the named queue.
///
/// Picks the oldest pending job whose backoff has elapsed, or a processing
/// job whose lock expired, and marks it `processing` with a fresh lock.
/// Returns `None` if nothing is available.
pub async fn dequeue(db: &Database, queue_name: &str) -> Result<Option<QueueEntry>, WotpError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(
                    "SELECT id, queue_name, payload, status, attempts, max_attempts,
                            last_error, available_at, created_at, updated_at, locked_until
                     FROM queue
                     WHERE queue_name = ?1
                       AND ((status = 'pending'
                             AND available_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                         OR (status = 'processing'
                             AND locked_until < strftime('%Y-%m-%dT%H:%M:%fZ', 'now')))
                     ORDER BY available_at ASC, id ASC
                     LIMIT 1",
                )?;
                stmt.query_row(params![queue_name], |row| {
                    Ok(QueueEntry {
                        id: row.get(0)?,
                        queue_name: row.get(1)?,
                        payload: row.get(2)?,
                        status: row.get(3)?,
                        attempts: row.get(4)?,
                        max_attempts: row.get(5)?,
                        last_error: row.get(6)?,
                        available_at: row.get(7)?,
                        created_at: row.get(8)?,
                        updated_at: row.get(9)?,
                        locked_until: row.get(10)?,
                    })
                })
            };

            match result {
                Ok(entry) => {
                    let locked_until: String = tx.query_row(
                        "UPDATE queue SET status = 'processing',
                         locked_until = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2),
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                         WHERE id = ?1
                         RETURNING locked_until",
                        params![entry.id, LOCK_TIMEOUT],
                        |row| row.get(0),
                    )?;
                    tx.commit()?;

                    Ok(Some(QueueEntry {
                        status: "processing".to_string(),
                        locked_until: Some(locked_until),
                        ..entry
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Acknowledge successful processing: the job becomes `completed`.
pub async fn ack(db: &Database, id: i64) -> Result<(), WotpError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'completed', locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Retry delay after the `attempts`-th failure: `backoff_ms * 2^(attempts-1)`.
pub fn retry_delay_ms(backoff_ms: u64, attempts: u32) -> u64 {
    let exp = attempts.saturating_sub(1).min(20);
    backoff_ms.saturating_mul(1u64 << exp)
}

/// Record a failed attempt.
///
/// Increments attempts. If attempts reach max_attempts the job becomes
/// `failed`; otherwise it returns to `pending` and becomes visible again
/// after the exponential backoff.
pub async fn fail(
    db: &Database,
    id: i64,
    error: &str,
    backoff_ms: u64,
) -> Result<FailOutcome, WotpError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let (attempts, max_attempts): (u32, u32) = tx.query_row(
                "SELECT attempts, max_attempts FROM queue WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            let outcome = if new_attempts >= max_attempts {
                tx.execute(
                    "UPDATE queue SET status = 'failed', attempts = ?1, last_error = ?2,
                     locked_until = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?3",
                    params![new_attempts, error, id],
                )?;
                FailOutcome::Exhausted {
                    attempts: new_attempts,
                }
            } else {
                let delay_ms = retry_delay_ms(backoff_ms, new_attempts);
                let modifier = format!("+{:.3} seconds", delay_ms as f64 / 1000.0);
                tx.execute(
                    "UPDATE queue SET status = 'pending', attempts = ?1, last_error = ?2,
                     locked_until = NULL,
                     available_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?3),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?4",
                    params![new_attempts, error, modifier, id],
                )?;
                FailOutcome::Retrying {
                    attempts: new_attempts,
                    delay_ms,
                }
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fail a job permanently regardless of remaining attempts.
pub async fn bury(db: &Database, id: i64, error: &str) -> Result<(), WotpError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE queue SET status = 'failed', attempts = attempts + 1, last_error = ?1,
                 locked_until = NULL,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![error, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete the oldest jobs in `status` beyond the newest `keep`. Returns the number removed.
pub async fn prune(
    db: &Database,
    queue_name: &str,
    status: &str,
    keep: u32,
) -> Result<u64, WotpError> {
    let queue_name = queue_name.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM queue
                 WHERE queue_name = ?1 AND status = ?2
                   AND id NOT IN (
                       SELECT id FROM queue
                       WHERE queue_name = ?1 AND status = ?2
                       ORDER BY updated_at DESC, id DESC
                       LIMIT ?3)",
                params![queue_name, status, keep],
            )?;
            Ok(n as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Per-status job counts of one queue.
pub async fn counts(db: &Database, queue_name: &str) -> Result<QueueCounts, WotpError> {
    let queue_name = queue_name.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM queue WHERE queue_name = ?1 GROUP BY status",
            )?;
            let mut rows = stmt.query(params![queue_name])?;
            let mut counts = QueueCounts::default();
            while let Some(row) = rows.next()? {
                let status: String = row.get(0)?;
                let n = row.get::<_, i64>(1)? as u64;
                match status.as_str() {
                    "pending" => counts.pending = n,
                    "processing" => counts.processing = n,
                    "completed" => counts.completed = n,
                    "failed" => counts.failed = n,
                    _ => {}
                }
            }
            Ok(counts)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
