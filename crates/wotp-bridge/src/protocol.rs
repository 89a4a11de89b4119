// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON frames exchanged with the protocol sidecar.
//!
//! WOTP -> sidecar:
//! ```json
//! {"op": "open", "session": "acct:default", "identity": "<base64>", "browser": "WOTP"}
//! {"op": "send", "id": "<uuid>", "jid": "15550100@s.whatsapp.net", "text": "..."}
//! {"op": "logout", "id": "<uuid>"}
//! {"op": "keys", "id": "<request id>", "records": {"1": "<base64>"}}
//! ```
//!
//! Sidecar -> WOTP:
//! ```json
//! {"event": "pairing", "code": "ABCD-1234"}
//! {"event": "open", "jid": "15550001:3@s.whatsapp.net", "name": "Ada"}
//! {"event": "close", "code": 401, "reason": "logged out"}
//! {"event": "creds", "updates": [{"type": "pre-key", "id": "1", "value": "<base64>|null"}]}
//! {"event": "keys.get", "id": "r1", "type": "session", "ids": ["..."]}
//! {"event": "ack", "id": "<uuid>", "ok": true}
//! ```

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use wotp_core::{
    CloseReason, CredentialBatch, CredentialUpdate, LinkedIdentity, RecordType, TransportEvent,
    WotpError,
};

/// Frame sent to the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum BridgeOp {
    Open {
        session: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        identity: Option<String>,
        browser: String,
    },
    Send {
        id: String,
        jid: String,
        text: String,
    },
    Logout {
        id: String,
    },
    Keys {
        id: String,
        records: HashMap<String, String>,
    },
}

impl BridgeOp {
    pub fn open(session: String, identity: Option<&[u8]>, browser: String) -> Self {
        BridgeOp::Open {
            session,
            identity: identity.map(|bytes| STANDARD.encode(bytes)),
            browser,
        }
    }

    pub fn keys(id: String, records: HashMap<String, Vec<u8>>) -> Self {
        BridgeOp::Keys {
            id,
            records: records
                .into_iter()
                .map(|(k, v)| (k, STANDARD.encode(v)))
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, WotpError> {
        serde_json::to_string(self)
            .map_err(|e| WotpError::transport(format!("encode bridge frame: {e}")))
    }
}

/// One credential change as sent by the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WireUpdate {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub id: String,
    pub value: Option<String>,
}

/// Frame received from the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event")]
pub enum BridgeEvent {
    #[serde(rename = "pairing")]
    Pairing { code: String },
    #[serde(rename = "open")]
    Open {
        jid: String,
        #[serde(default)]
        name: Option<String>,
    },
    #[serde(rename = "close")]
    Close {
        #[serde(default)]
        code: Option<u16>,
        #[serde(default)]
        reason: String,
    },
    #[serde(rename = "creds")]
    Creds { updates: Vec<WireUpdate> },
    #[serde(rename = "keys.get")]
    KeysGet {
        id: String,
        #[serde(rename = "type")]
        record_type: RecordType,
        ids: Vec<String>,
    },
    #[serde(rename = "ack")]
    Ack {
        id: String,
        ok: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

impl BridgeEvent {
    pub fn parse(text: &str) -> Result<Self, WotpError> {
        serde_json::from_str(text)
            .map_err(|e| WotpError::transport(format!("decode bridge frame: {e}")))
    }

    /// Converts lifecycle events for the supervisor. `keys.get` and `ack`
    /// are handled by the connection itself and yield `None`.
    pub fn into_transport_event(self) -> Result<Option<TransportEvent>, WotpError> {
        Ok(match self {
            BridgeEvent::Pairing { code } => Some(TransportEvent::PairingCode(code)),
            BridgeEvent::Open { jid, name } => {
                Some(TransportEvent::Open(LinkedIdentity::from_jid(jid, name)))
            }
            BridgeEvent::Close { code, reason } => Some(TransportEvent::Closed(CloseReason {
                code,
                detail: reason,
            })),
            BridgeEvent::Creds { updates } => {
                Some(TransportEvent::CredentialsUpdated(decode_updates(updates)?))
            }
            BridgeEvent::KeysGet { .. } | BridgeEvent::Ack { .. } => None,
        })
    }
}

fn decode_updates(updates: Vec<WireUpdate>) -> Result<CredentialBatch, WotpError> {
    updates
        .into_iter()
        .map(|u| {
            let value = match u.value {
                Some(encoded) => Some(STANDARD.decode(encoded).map_err(|e| {
                    WotpError::transport(format!("invalid base64 in {} {}: {e}", u.record_type, u.id))
                })?),
                None => None,
            };
            Ok(CredentialUpdate {
                record_type: u.record_type,
                record_id: u.id,
                value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_serialize_with_op_tag() {
        let open = BridgeOp::open("a:default".into(), Some(&b"id"[..]), "WOTP".into());
        let json: serde_json::Value = serde_json::from_str(&open.to_json().unwrap()).unwrap();
        assert_eq!(json["op"], "open");
        assert_eq!(json["identity"], "aWQ=");

        let fresh = BridgeOp::open("a:default".into(), None, "WOTP".into());
        let json: serde_json::Value = serde_json::from_str(&fresh.to_json().unwrap()).unwrap();
        assert!(json.get("identity").is_none());

        let keys = BridgeOp::keys("r1".into(), HashMap::from([("1".to_string(), vec![1, 2])]));
        let json: serde_json::Value = serde_json::from_str(&keys.to_json().unwrap()).unwrap();
        assert_eq!(json["op"], "keys");
        assert_eq!(json["records"]["1"], "AQI=");
    }

    #[test]
    fn lifecycle_events_map_to_transport_events() {
        let open = BridgeEvent::parse(r#"{"event":"open","jid":"15550001:3@s.whatsapp.net"}"#)
            .unwrap()
            .into_transport_event()
            .unwrap();
        match open {
            Some(TransportEvent::Open(identity)) => assert_eq!(identity.phone, "15550001"),
            other => panic!("unexpected {other:?}"),
        }

        let close = BridgeEvent::parse(r#"{"event":"close","code":401,"reason":"logged out"}"#)
            .unwrap()
            .into_transport_event()
            .unwrap();
        assert_eq!(close, Some(TransportEvent::Closed(CloseReason::logged_out())));
    }

    #[test]
    fn creds_are_base64_decoded() {
        let event = BridgeEvent::parse(
            r#"{"event":"creds","updates":[
                {"type":"creds","id":"default","value":"aWQ="},
                {"type":"pre-key","id":"4","value":null}]}"#,
        )
        .unwrap();
        let Some(TransportEvent::CredentialsUpdated(batch)) =
            event.into_transport_event().unwrap()
        else {
            panic!("expected credential batch");
        };
        assert_eq!(batch[0].record_type, RecordType::Creds);
        assert_eq!(batch[0].value.as_deref(), Some(&b"id"[..]));
        assert_eq!(batch[1].value, None);

        let bad = BridgeEvent::parse(
            r#"{"event":"creds","updates":[{"type":"session","id":"x","value":"!!"}]}"#,
        )
        .unwrap();
        assert!(bad.into_transport_event().is_err());
    }

    #[test]
    fn keys_get_and_ack_stay_internal() {
        let get = BridgeEvent::parse(
            r#"{"event":"keys.get","id":"r1","type":"sender-key","ids":["g1"]}"#,
        )
        .unwrap();
        assert!(matches!(
            get,
            BridgeEvent::KeysGet {
                record_type: RecordType::SenderKey,
                ..
            }
        ));
        assert_eq!(get.into_transport_event().unwrap(), None);
        let ack = BridgeEvent::parse(r#"{"event":"ack","id":"x","ok":false,"error":"bad jid"}"#)
            .unwrap();
        assert!(matches!(ack, BridgeEvent::Ack { ok: false, .. }));
    }
}
