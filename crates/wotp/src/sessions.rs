// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wotp sessions` command implementation.
//!
//! Reads connection summaries straight from the database, so it works
//! whether or not `wotp serve` is running. Statuses are the persisted
//! coarse ones.

use std::io::IsTerminal;

use wotp_config::WotpConfig;
use wotp_core::{CoarseStatus, ConnectionStore, ConnectionSummary, StorageAdapter, WotpError};
use wotp_storage::SqliteStorage;

/// Runs the `wotp sessions` command.
pub async fn run_sessions(
    config: &WotpConfig,
    account: Option<&str>,
    json: bool,
    plain: bool,
) -> Result<(), WotpError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let summaries = storage.list_summaries(account).await;
    storage.close().await?;
    let summaries = summaries?;

    if json {
        let out = serde_json::to_string_pretty(&summaries)
            .map_err(|e| WotpError::Internal(format!("failed to encode sessions: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    let use_color = !plain && std::io::stdout().is_terminal();
    print!("{}", render_table(&summaries, use_color));
    Ok(())
}

fn status_cell(status: CoarseStatus, use_color: bool) -> String {
    let text = format!("{:<12}", status.to_string());
    if !use_color {
        return text;
    }
    use colored::Colorize;
    match status {
        CoarseStatus::Connected => text.green().to_string(),
        CoarseStatus::Connecting => text.yellow().to_string(),
        CoarseStatus::Disconnected => text.red().to_string(),
    }
}

/// One line per session, newest update last.
fn render_table(summaries: &[ConnectionSummary], use_color: bool) -> String {
    if summaries.is_empty() {
        return "no sessions\n".to_string();
    }
    let mut out = format!(
        "{:<20} {:<16} {:<12} {:<16} {}\n",
        "ACCOUNT", "LABEL", "STATUS", "PHONE", "UPDATED"
    );
    for s in summaries {
        out.push_str(&format!(
            "{:<20} {:<16} {} {:<16} {}\n",
            s.account_id,
            s.label,
            status_cell(s.status, use_color),
            s.phone.as_deref().unwrap_or("-"),
            s.updated_at
        ));
    }
    out
}
