// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery log rows: one per enqueued send, `pending` until exactly one
//! terminal transition to `delivered` or `failed`.
//!
//! Terminal updates are guarded by `status = 'pending'`, so a redelivered
//! job can never move a row out of a terminal state or write it twice.

use std::str::FromStr;

use rusqlite::{params, OptionalExtension, Row};
use wotp_core::{DeliveryStatus, JobKind, WotpError};

use crate::database::Database;
use crate::models::{DeliveryLogEntry, NewDeliveryLog};

const LOG_COLUMNS: &str = "id, account_id, label, kind, recipient, content, status, \
     fail_reason, attempts, created_at, updated_at, completed_at";

fn parse_col<T: FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<DeliveryLogEntry> {
    Ok(DeliveryLogEntry {
        id: row.get(0)?,
        account_id: row.get(1)?,
        label: row.get(2)?,
        kind: parse_col(row, 3)?,
        recipient: row.get(4)?,
        content: row.get(5)?,
        status: parse_col(row, 6)?,
        fail_reason: row.get(7)?,
        attempts: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        completed_at: row.get(11)?,
    })
}

/// Insert a new `pending` row. Returns its id.
pub async fn insert_pending(db: &Database, entry: &NewDeliveryLog) -> Result<i64, WotpError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO delivery_log (account_id, label, kind, recipient, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.account_id,
                    entry.label,
                    entry.kind.to_string(),
                    entry.recipient,
                    entry.content,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find the most recent pending row for `(account, recipient, kind)`.
///
/// `content` narrows the match for transactional messages; OTP rows are
/// matched without it.
pub async fn find_pending(
    db: &Database,
    account_id: &str,
    recipient: &str,
    kind: JobKind,
    content: Option<&str>,
) -> Result<Option<i64>, WotpError> {
    let account_id = account_id.to_string();
    let recipient = recipient.to_string();
    let kind = kind.to_string();
    let content = content.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id FROM delivery_log
                 WHERE account_id = ?1 AND recipient = ?2 AND kind = ?3
                   AND status = 'pending'
                   AND (?4 IS NULL OR content = ?4)
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                params![account_id, recipient, kind, content],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a non-final failure: bump `attempts`, keep the row `pending`.
pub async fn record_retry(db: &Database, id: i64, reason: &str) -> Result<bool, WotpError> {
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE delivery_log SET attempts = attempts + 1, fail_reason = ?1,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND status = 'pending'",
                params![reason, id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Move a pending row to `delivered`. Returns `false` if it was already terminal.
pub async fn mark_delivered(db: &Database, id: i64) -> Result<bool, WotpError> {
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE delivery_log SET status = 'delivered', attempts = attempts + 1,
                    completed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1 AND status = 'pending'",
                params![id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Move a pending row to `failed` with the final reason. Returns `false` if
/// it was already terminal.
pub async fn mark_failed(db: &Database, id: i64, reason: &str) -> Result<bool, WotpError> {
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE delivery_log SET status = 'failed', attempts = attempts + 1,
                    fail_reason = ?1,
                    completed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND status = 'pending'",
                params![reason, id],
            )?;
            Ok(n > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get(db: &Database, id: i64) -> Result<Option<DeliveryLogEntry>, WotpError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {LOG_COLUMNS} FROM delivery_log WHERE id = ?1"),
                params![id],
                entry_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recent rows of an account, newest first.
pub async fn list_for_account(
    db: &Database,
    account_id: &str,
    status: Option<DeliveryStatus>,
    limit: u32,
) -> Result<Vec<DeliveryLogEntry>, WotpError> {
    let account_id = account_id.to_string();
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM delivery_log
                 WHERE account_id = ?1 AND (?2 IS NULL OR status = ?2)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![account_id, status, limit], entry_from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete rows created more than `retention_days` ago. Returns the number removed.
pub async fn purge_older_than(db: &Database, retention_days: u32) -> Result<u64, WotpError> {
    let modifier = format!("-{retention_days} days");
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM delivery_log
                 WHERE created_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)",
                params![modifier],
            )?;
            Ok(n as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
