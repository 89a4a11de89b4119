// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the WOTP daemon.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for session
//! credentials, connection summaries, the delivery log, and a crash-safe job
//! queue. All writes are serialized through the one background thread owned
//! by [`Database`]; query modules never open their own connections.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use models::*;
