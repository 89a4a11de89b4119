// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for WOTP integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a real WhatsApp connection.
//!
//! # Components
//!
//! - [`MockTransportFactory`] - Scripted transport with event injection and send capture
//! - [`MemoryCredentialStore`] / [`MemoryConnectionStore`] - In-memory storage traits
//! - [`TestHarness`] - Temp SQLite storage plus a mock transport

pub mod harness;
pub mod memory_store;
pub mod mock_transport;

pub use harness::TestHarness;
pub use memory_store::{MemoryConnectionStore, MemoryCredentialStore};
pub use mock_transport::{MockConnection, MockTransport, MockTransportFactory, SentMessage};
