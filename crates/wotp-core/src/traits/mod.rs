// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Backends extend the [`PluginAdapter`] base trait where they have a
//! lifecycle, and use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod storage;
pub mod transport;

pub use adapter::PluginAdapter;
pub use storage::{ConnectionStore, CredentialStore, StorageAdapter};
pub use transport::{AuthState, SignalKeyStore, TransportConnection, TransportFactory, TransportHandle};
