// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp transport that speaks JSON over a WebSocket to a protocol sidecar.
//!
//! The sidecar owns the WhatsApp wire protocol. This crate forwards opens,
//! sends and logouts to it, and relays pairing codes, connection state and
//! credential changes back to the session supervisor.

pub mod protocol;
pub mod transport;

pub use protocol::{BridgeEvent, BridgeOp};
pub use transport::BridgeTransportFactory;
