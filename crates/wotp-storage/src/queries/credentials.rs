// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session credential records stored as raw BLOBs.

use rusqlite::{params, OptionalExtension};
use wotp_core::{RecordType, SessionKey, WotpError};

use crate::database::Database;

/// Load one record. Returns `None` when it was never written or was deleted.
pub async fn load(
    db: &Database,
    key: &SessionKey,
    record_type: RecordType,
    record_id: &str,
) -> Result<Option<Vec<u8>>, WotpError> {
    let key = key.clone();
    let record_type = record_type.to_string();
    let record_id = record_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT value FROM session_credentials
                 WHERE account_id = ?1 AND label = ?2 AND record_type = ?3 AND record_id = ?4",
                params![key.account_id, key.label, record_type, record_id],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Create or overwrite one record.
pub async fn save(
    db: &Database,
    key: &SessionKey,
    record_type: RecordType,
    record_id: &str,
    value: &[u8],
) -> Result<(), WotpError> {
    let key = key.clone();
    let record_type = record_type.to_string();
    let record_id = record_id.to_string();
    let value = value.to_vec();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO session_credentials (account_id, label, record_type, record_id, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (account_id, label, record_type, record_id) DO UPDATE SET
                    value = excluded.value,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![key.account_id, key.label, record_type, record_id, value],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete one record. Deleting a missing record is not an error.
pub async fn delete(
    db: &Database,
    key: &SessionKey,
    record_type: RecordType,
    record_id: &str,
) -> Result<(), WotpError> {
    let key = key.clone();
    let record_type = record_type.to_string();
    let record_id = record_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM session_credentials
                 WHERE account_id = ?1 AND label = ?2 AND record_type = ?3 AND record_id = ?4",
                params![key.account_id, key.label, record_type, record_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete every record of a session. Returns the number of rows removed.
pub async fn delete_all(db: &Database, key: &SessionKey) -> Result<u64, WotpError> {
    let key = key.clone();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "DELETE FROM session_credentials WHERE account_id = ?1 AND label = ?2",
                params![key.account_id, key.label],
            )?;
            Ok(n as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of records held for a session.
pub async fn count(db: &Database, key: &SessionKey) -> Result<u64, WotpError> {
    let key = key.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM session_credentials WHERE account_id = ?1 AND label = ?2",
                params![key.account_id, key.label],
                |row| row.get::<_, i64>(0),
            )
        })
        .await
        .map(|n| n as u64)
        .map_err(crate::database::map_tr_err)
}
