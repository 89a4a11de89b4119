// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.
//!
//! Types that cross adapter trait boundaries (`ConnectionSummary`) live in
//! `wotp-core` and are re-exported here.

use serde::{Deserialize, Serialize};

pub use wotp_core::types::ConnectionSummary;
use wotp_core::{DeliveryStatus, JobKind};

/// A row of the durable job queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    /// Failed attempts so far.
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub available_at: String,
    pub created_at: String,
    pub updated_at: String,
    pub locked_until: Option<String>,
}

impl QueueEntry {
    /// 1-based number of the attempt currently being processed.
    pub fn current_attempt(&self) -> u32 {
        self.attempts + 1
    }

    /// Whether a failure of the current attempt exhausts the job.
    pub fn is_final_attempt(&self) -> bool {
        self.current_attempt() >= self.max_attempts
    }
}

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Back to pending, visible again after `delay_ms`.
    Retrying { attempts: u32, delay_ms: u64 },
    /// Attempts exhausted; the job is now `failed`.
    Exhausted { attempts: u32 },
}

/// Per-status job counts for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Fields of a new delivery log row; it starts out `pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeliveryLog {
    pub account_id: String,
    pub label: String,
    pub kind: JobKind,
    pub recipient: String,
    /// Message body for `message` rows; `None` for OTP rows.
    pub content: Option<String>,
}

/// A delivery log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub id: i64,
    pub account_id: String,
    pub label: String,
    pub kind: JobKind,
    pub recipient: String,
    pub content: Option<String>,
    pub status: DeliveryStatus,
    pub fail_reason: Option<String>,
    pub attempts: u32,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(attempts: u32, max_attempts: u32) -> QueueEntry {
        QueueEntry {
            id: 1,
            queue_name: "otp".into(),
            payload: "{}".into(),
            status: "processing".into(),
            attempts,
            max_attempts,
            last_error: None,
            available_at: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
            locked_until: None,
        }
    }

    #[test]
    fn final_attempt_detection() {
        assert!(!entry(0, 3).is_final_attempt());
        assert!(!entry(1, 3).is_final_attempt());
        assert!(entry(2, 3).is_final_attempt());
        assert!(entry(0, 1).is_final_attempt());
        assert_eq!(entry(2, 3).current_attempt(), 3);
    }
}
