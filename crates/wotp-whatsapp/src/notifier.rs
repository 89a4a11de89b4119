// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process pub/sub for pairing codes and terminal connection events.
//!
//! Each topic is a `broadcast` channel created by its first subscriber and
//! removed when the last subscription drops. Publishing to a topic nobody
//! listens on is a no-op.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use wotp_core::{PairingEvent, SessionKey};

const TOPIC_CAPACITY: usize = 16;

/// Topic name for a session's pairing events.
pub fn pairing_topic(key: &SessionKey) -> String {
    format!("whatsapp:pairing:{}:{}", key.account_id, key.label)
}

/// Fan-out notifier shared by the supervisor and waiting HTTP handlers.
#[derive(Clone, Default)]
pub struct Notifier {
    topics: Arc<DashMap<String, broadcast::Sender<PairingEvent>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes to every current subscriber of `topic`. Returns how many received it.
    pub fn publish(&self, topic: &str, event: PairingEvent) -> usize {
        let Some(tx) = self.topics.get(topic).map(|tx| tx.clone()) else {
            debug!(topic, "no subscribers, dropping event");
            return 0;
        };
        tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self, topic: &str) -> Subscription {
        let rx = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe();
        Subscription {
            topic: topic.to_string(),
            rx,
            notifier: self.clone(),
        }
    }

    /// Number of live topics.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

/// A subscription to one topic. Dropping it unsubscribes.
pub struct Subscription {
    topic: String,
    rx: broadcast::Receiver<PairingEvent>,
    notifier: Notifier,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next event, or `None` once the topic is gone.
    pub async fn next(&mut self) -> Option<PairingEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Waits for the first event (pairing code, connected, or error) or
    /// until `timeout` elapses, then unsubscribes.
    pub async fn wait_for_outcome(mut self, timeout: Duration) -> Option<PairingEvent> {
        tokio::time::timeout(timeout, self.next()).await.ok().flatten()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Our own receiver is still counted here.
        self.notifier
            .topics
            .remove_if(&self.topic, |_, tx| tx.receiver_count() <= 1);
    }
}
