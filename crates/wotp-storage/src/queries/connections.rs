// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection summaries and the legacy per-account status field.

use std::str::FromStr;

use rusqlite::{params, OptionalExtension, Row};
use wotp_core::{CoarseStatus, SessionKey, WotpError};

use crate::database::Database;
use crate::models::ConnectionSummary;

const SUMMARY_COLUMNS: &str =
    "account_id, label, status, phone, name, created_at, updated_at";

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<ConnectionSummary> {
    let status: String = row.get(2)?;
    let status = CoarseStatus::from_str(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ConnectionSummary {
        account_id: row.get(0)?,
        label: row.get(1)?,
        status,
        phone: row.get(3)?,
        name: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Upsert the coarse status of a session.
pub async fn set_status(
    db: &Database,
    key: &SessionKey,
    status: CoarseStatus,
) -> Result<(), WotpError> {
    let key = key.clone();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO connection_summaries (account_id, label, status)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (account_id, label) DO UPDATE SET
                    status = excluded.status,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![key.account_id, key.label, status],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the linked phone number and display name of a session.
pub async fn set_identity(
    db: &Database,
    key: &SessionKey,
    phone: &str,
    name: Option<&str>,
) -> Result<(), WotpError> {
    let key = key.clone();
    let phone = phone.to_string();
    let name = name.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO connection_summaries (account_id, label, phone, name)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (account_id, label) DO UPDATE SET
                    phone = excluded.phone,
                    name = excluded.name,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![key.account_id, key.label, phone, name],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_summary(
    db: &Database,
    key: &SessionKey,
) -> Result<Option<ConnectionSummary>, WotpError> {
    let key = key.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {SUMMARY_COLUMNS} FROM connection_summaries
                     WHERE account_id = ?1 AND label = ?2"
                ),
                params![key.account_id, key.label],
                summary_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List summaries, optionally for one account, ordered by account then label.
pub async fn list_summaries(
    db: &Database,
    account_id: Option<&str>,
) -> Result<Vec<ConnectionSummary>, WotpError> {
    let account_id = account_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUMMARY_COLUMNS} FROM connection_summaries
                 WHERE ?1 IS NULL OR account_id = ?1
                 ORDER BY account_id, label"
            ))?;
            let rows = stmt.query_map(params![account_id], summary_from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Write the legacy single-session status field of an account.
pub async fn set_account_status(
    db: &Database,
    account_id: &str,
    status: CoarseStatus,
) -> Result<(), WotpError> {
    let account_id = account_id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO accounts (id, whatsapp_status) VALUES (?1, ?2)
                 ON CONFLICT (id) DO UPDATE SET
                    whatsapp_status = excluded.whatsapp_status,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![account_id, status],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_account_status(
    db: &Database,
    account_id: &str,
) -> Result<Option<CoarseStatus>, WotpError> {
    let account_id = account_id.to_string();
    let status: Option<String> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT whatsapp_status FROM accounts WHERE id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    status
        .map(|s| CoarseStatus::from_str(&s).map_err(|e| WotpError::Storage { source: Box::new(e) }))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn status_upsert_keeps_identity() {
        let (db, _dir) = setup_db().await;
        let key = SessionKey::default_for("acct-1");

        set_status(&db, &key, CoarseStatus::Connecting).await.unwrap();
        set_identity(&db, &key, "15551234567", Some("Ada")).await.unwrap();
        set_status(&db, &key, CoarseStatus::Connected).await.unwrap();

        let summary = get_summary(&db, &key).await.unwrap().unwrap();
        assert_eq!(summary.status, CoarseStatus::Connected);
        assert_eq!(summary.phone.as_deref(), Some("15551234567"));
        assert_eq!(summary.name.as_deref(), Some("Ada"));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_filters_by_account() {
        let (db, _dir) = setup_db().await;
        set_status(&db, &SessionKey::default_for("a"), CoarseStatus::Connected)
            .await
            .unwrap();
        set_status(&db, &SessionKey::new("a", "sales"), CoarseStatus::Disconnected)
            .await
            .unwrap();
        set_status(&db, &SessionKey::default_for("b"), CoarseStatus::Connecting)
            .await
            .unwrap();

        let all = list_summaries(&db, None).await.unwrap();
        assert_eq!(all.len(), 3);

        let a = list_summaries(&db, Some("a")).await.unwrap();
        let labels: Vec<_> = a.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["default", "sales"]);

        assert!(get_summary(&db, &SessionKey::new("b", "x")).await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn account_status_round_trip() {
        let (db, _dir) = setup_db().await;
        assert!(get_account_status(&db, "acct").await.unwrap().is_none());
        set_account_status(&db, "acct", CoarseStatus::Connecting).await.unwrap();
        set_account_status(&db, "acct", CoarseStatus::Connected).await.unwrap();
        assert_eq!(
            get_account_status(&db, "acct").await.unwrap(),
            Some(CoarseStatus::Connected)
        );
        db.close().await.unwrap();
    }
}
