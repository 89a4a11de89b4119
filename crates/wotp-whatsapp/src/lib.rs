// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp session supervision for WOTP.
//!
//! The [`SessionSupervisor`] owns the lifecycle of every linked session:
//! it opens transport connections from stored credentials, reconnects with
//! capped backoff, tears down sessions that are logged out or stuck, and
//! publishes pairing progress through the [`Notifier`].

pub mod credentials;
pub mod jid;
pub mod notifier;
pub mod policy;
pub mod supervisor;

pub use credentials::SessionCredentials;
pub use jid::recipient_jid;
pub use notifier::{pairing_topic, Notifier, Subscription};
pub use policy::{
    CloseDecision, ReconnectPolicy, SupervisorSettings, REASON_FAILED, REASON_MAX_ATTEMPTS,
    REASON_UNAUTHORIZED,
};
pub use supervisor::{SessionRegistry, SessionSlot, SessionSupervisor};
