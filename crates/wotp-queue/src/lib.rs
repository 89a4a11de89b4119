// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery for WOTP.
//!
//! Sends are accepted by the [`Outbox`], which records a pending delivery
//! log row and a durable queue job. [`WorkerPool`]s drain the `otp` and
//! `message` queues through the session supervisor, and the maintenance
//! task keeps both tables bounded.

pub mod job;
pub mod maintenance;
pub mod otp;
pub mod outbox;
pub mod worker;

pub use job::{JobPayload, OutboundJob};
pub use maintenance::MaintenanceReport;
pub use otp::OtpKind;
pub use outbox::{Enqueued, Outbox};
pub use worker::{JobOutcome, WorkerPool};
