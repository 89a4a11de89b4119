// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`TransportFactory`] backed by the protocol sidecar.
//!
//! Every session gets its own WebSocket to the sidecar. A writer task owns
//! the sink and a reader task turns inbound frames into [`TransportEvent`]s,
//! answers key lookups from the session's credential store, and resolves
//! pending send/logout requests by id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use wotp_config::model::WhatsAppConfig;
use wotp_core::{
    AdapterType, AuthState, CloseReason, HealthStatus, PluginAdapter, SessionKey, SignalKeyStore,
    TransportConnection, TransportEvent, TransportFactory, TransportHandle, WotpError,
};

use crate::protocol::{BridgeEvent, BridgeOp};

const EVENT_BUFFER: usize = 64;
const OUTGOING_BUFFER: usize = 64;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingRequests = Arc<DashMap<String, oneshot::Sender<Result<(), String>>>>;

enum Outgoing {
    Frame(String),
    Close,
}

/// Opens sessions through the sidecar at `url`.
#[derive(Debug, Clone)]
pub struct BridgeTransportFactory {
    url: String,
    request_timeout: Duration,
    browser: String,
}

impl BridgeTransportFactory {
    pub fn new(url: impl Into<String>, request_timeout: Duration, browser: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout,
            browser: browser.into(),
        }
    }

    /// Fails when no `bridge_url` is configured.
    pub fn from_config(config: &WhatsAppConfig) -> Result<Self, WotpError> {
        let url = config.bridge_url.as_deref().ok_or_else(|| {
            WotpError::Config("whatsapp.bridge_url must be set to open sessions".into())
        })?;
        Ok(Self::new(
            url,
            config.bridge_request_timeout(),
            config.browser_name.as_str(),
        ))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PluginAdapter for BridgeTransportFactory {
    fn name(&self) -> &str {
        "bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, WotpError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), WotpError> {
        Ok(())
    }
}

#[async_trait]
impl TransportFactory for BridgeTransportFactory {
    async fn open(
        &self,
        key: &SessionKey,
        auth: AuthState,
    ) -> Result<TransportConnection, WotpError> {
        let connect = tokio_tungstenite::connect_async(self.url.as_str());
        let (socket, _response) = tokio::time::timeout(self.request_timeout, connect)
            .await
            .map_err(|_| WotpError::Timeout {
                duration: self.request_timeout,
            })?
            .map_err(|e| WotpError::Transport {
                message: format!("connect to bridge at {}: {e}", self.url),
                source: Some(Box::new(e)),
            })?;
        let (mut sink, stream) = socket.split();

        let hello = BridgeOp::open(key.to_string(), auth.identity.as_deref(), self.browser.clone())
            .to_json()?;
        sink.send(Message::text(hello))
            .await
            .map_err(|e| WotpError::Transport {
                message: format!("open session {key} on bridge: {e}"),
                source: Some(Box::new(e)),
            })?;
        info!(session = %key, url = %self.url, "bridge session opened");

        let (out_tx, mut out_rx) = mpsc::channel::<Outgoing>(OUTGOING_BUFFER);
        tokio::spawn(async move {
            while let Some(out) = out_rx.recv().await {
                match out {
                    Outgoing::Frame(text) => {
                        if sink.send(Message::text(text)).await.is_err() {
                            break;
                        }
                    }
                    Outgoing::Close => {
                        let _ = sink.close().await;
                        break;
                    }
                }
            }
        });

        let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
        let pending: PendingRequests = Arc::new(DashMap::new());
        tokio::spawn(read_loop(
            key.clone(),
            stream,
            event_tx,
            out_tx.clone(),
            pending.clone(),
            auth.keys,
        ));

        let handle = BridgeHandle {
            session: key.clone(),
            out: out_tx,
            pending,
            request_timeout: self.request_timeout,
        };
        Ok(TransportConnection {
            handle: Arc::new(handle),
            events,
        })
    }
}

async fn read_loop(
    key: SessionKey,
    mut stream: SplitStream<Socket>,
    events: mpsc::Sender<TransportEvent>,
    out: mpsc::Sender<Outgoing>,
    pending: PendingRequests,
    keys: Arc<dyn SignalKeyStore>,
) {
    let mut closed = false;
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(session = %key, error = %e, "bridge socket error");
                break;
            }
        };
        let event = match BridgeEvent::parse(text.as_str()) {
            Ok(event) => event,
            Err(e) => {
                warn!(session = %key, error = %e, "ignoring bridge frame");
                continue;
            }
        };

        match event {
            BridgeEvent::Ack { id, ok, error } => {
                if let Some((_, waiter)) = pending.remove(&id) {
                    let result = if ok {
                        Ok(())
                    } else {
                        Err(error.unwrap_or_else(|| "rejected by bridge".into()))
                    };
                    let _ = waiter.send(result);
                }
            }
            BridgeEvent::KeysGet {
                id,
                record_type,
                ids,
            } => {
                let keys = keys.clone();
                let out = out.clone();
                let session = key.clone();
                tokio::spawn(async move {
                    let records = match keys.get(record_type, &ids).await {
                        Ok(records) => records,
                        Err(e) => {
                            warn!(session = %session, record_type = %record_type, error = %e, "key lookup failed");
                            HashMap::new()
                        }
                    };
                    match BridgeOp::keys(id, records).to_json() {
                        Ok(frame) => {
                            let _ = out.send(Outgoing::Frame(frame)).await;
                        }
                        Err(e) => warn!(session = %session, error = %e, "key reply not sent"),
                    }
                });
            }
            other => match other.into_transport_event() {
                Ok(Some(event)) => {
                    let is_close = matches!(event, TransportEvent::Closed(_));
                    if events.send(event).await.is_err() {
                        break;
                    }
                    if is_close {
                        closed = true;
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(session = %key, error = %e, "ignoring bridge event"),
            },
        }
    }

    // Waiters see a dropped sender.
    pending.clear();
    if !closed {
        let _ = events
            .send(TransportEvent::Closed(CloseReason::other(
                "bridge connection closed",
            )))
            .await;
    }
    let _ = out.send(Outgoing::Close).await;
    debug!(session = %key, "bridge reader stopped");
}

/// Control handle for one bridge session.
struct BridgeHandle {
    session: SessionKey,
    out: mpsc::Sender<Outgoing>,
    pending: PendingRequests,
    request_timeout: Duration,
}

impl BridgeHandle {
    async fn request(&self, id: String, op: BridgeOp) -> Result<(), WotpError> {
        let frame = op.to_json()?;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);
        if self.out.send(Outgoing::Frame(frame)).await.is_err() {
            self.pending.remove(&id);
            return Err(WotpError::transport("bridge connection closed"));
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(WotpError::transport(reason)),
            Ok(Err(_)) => Err(WotpError::transport("bridge connection closed")),
            Err(_) => {
                self.pending.remove(&id);
                Err(WotpError::Timeout {
                    duration: self.request_timeout,
                })
            }
        }
    }
}

#[async_trait]
impl TransportHandle for BridgeHandle {
    async fn send_text(&self, jid: &str, text: &str) -> Result<(), WotpError> {
        let id = uuid::Uuid::new_v4().to_string();
        debug!(session = %self.session, request = %id, "bridge send");
        self.request(
            id.clone(),
            BridgeOp::Send {
                id,
                jid: jid.to_string(),
                text: text.to_string(),
            },
        )
        .await
    }

    async fn logout(&self) -> Result<(), WotpError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.request(id.clone(), BridgeOp::Logout { id }).await
    }

    async fn close(&self) {
        let _ = self.out.send(Outgoing::Close).await;
    }
}
