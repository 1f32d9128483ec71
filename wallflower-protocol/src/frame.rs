//! Transport framing: the JSON envelope carried over the WebSocket.
//!
//! Outbound application payloads are message-encoded, base64-wrapped, and
//! placed in a small JSON object alongside the session and connection
//! identifiers:
//!
//! ```text
//! { "t": "ToBackend", "s": <sessionId>, "c": <connectionId>, "b": <base64> }
//! ```
//!
//! Inbound text frames are classified into exactly one of four kinds;
//! classification is total and never raises, so the connection layer above
//! it never observes a decode error.

use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use serde_json::Value;

use crate::error::ProtocolError;
use crate::message;

/// Type marker on every outbound application frame.
pub const OUTBOUND_TYPE: &str = "ToBackend";

/// Type marker the host uses for leader election announcements.
const ELECTION_TYPE: &str = "e";

#[derive(Debug, Serialize)]
struct ToBackendEnvelope<'a> {
    t: &'static str,
    s: &'a str,
    c: &'a str,
    b: String,
}

/// Frames an application payload for the wire.
///
/// `connection_id` falls back to the session identifier while the handshake
/// has not yet delivered one; the host accepts either during connect.
pub fn encode_frame(
    payload: &str,
    tag: u8,
    session_id: &str,
    connection_id: Option<&str>,
) -> Result<String, ProtocolError> {
    let encoded = message::encode_message(payload, tag);
    let envelope = ToBackendEnvelope {
        t: OUTBOUND_TYPE,
        s: session_id,
        c: connection_id.unwrap_or(session_id),
        b: general_purpose::STANDARD.encode(&encoded),
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Classification of an inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Leader election announcement. The host omits the leader value in
    /// some transitional announcements, hence the `Option`.
    Election { leader_id: Option<String> },
    /// An application message addressed to this client.
    Message {
        data: String,
        session_id: Option<String>,
        connection_id: Option<String>,
    },
    /// Any other well-formed protocol frame (the handshake among them).
    Control {
        data: Value,
        session_id: Option<String>,
        connection_id: Option<String>,
    },
    /// The frame was not valid JSON.
    ParseError { raw: String },
}

/// Classifies an inbound text frame. Total: every input maps to a kind.
pub fn classify_frame(text: &str, expected_tag: u8) -> Inbound {
    let parsed: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => {
            return Inbound::ParseError {
                raw: text.to_owned(),
            }
        }
    };

    if parsed.get("t").and_then(Value::as_str) == Some(ELECTION_TYPE) {
        let leader_id = parsed.get("l").and_then(Value::as_str).map(str::to_owned);
        return Inbound::Election { leader_id };
    }

    let session_id = string_field(&parsed, "s");
    let connection_id = string_field(&parsed, "c");

    if let Some(b) = parsed.get("b").and_then(Value::as_str) {
        if let Ok(bytes) = general_purpose::STANDARD.decode(b) {
            if let Some(data) = message::decode_message(&bytes, expected_tag) {
                return Inbound::Message {
                    data,
                    session_id,
                    connection_id,
                };
            }
        }
    }

    Inbound::Control {
        data: parsed,
        session_id,
        connection_id,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base64_of(payload: &str, tag: u8) -> String {
        general_purpose::STANDARD.encode(message::encode_message(payload, tag))
    }

    #[test]
    fn test_outbound_envelope_fields() {
        let framed = encode_frame("hello", 0, "sess-1", Some("conn-1")).unwrap();
        let parsed: Value = serde_json::from_str(&framed).unwrap();
        assert_eq!(parsed["t"], "ToBackend");
        assert_eq!(parsed["s"], "sess-1");
        assert_eq!(parsed["c"], "conn-1");

        let bytes = general_purpose::STANDARD
            .decode(parsed["b"].as_str().unwrap())
            .unwrap();
        assert_eq!(bytes, message::encode_message("hello", 0).to_vec());
    }

    #[test]
    fn test_outbound_connection_id_falls_back_to_session() {
        let framed = encode_frame("x", 0, "sess-1", None).unwrap();
        let parsed: Value = serde_json::from_str(&framed).unwrap();
        assert_eq!(parsed["c"], "sess-1");
    }

    #[test]
    fn test_classify_election() {
        assert_eq!(
            classify_frame(r#"{"t":"e","l":"leader-9"}"#, 0),
            Inbound::Election {
                leader_id: Some("leader-9".to_owned())
            }
        );
        assert_eq!(
            classify_frame(r#"{"t":"e"}"#, 0),
            Inbound::Election { leader_id: None }
        );
    }

    #[test]
    fn test_classify_election_ignores_unknown_keys() {
        assert_eq!(
            classify_frame(r#"{"t":"e","l":"x","epoch":12}"#, 0),
            Inbound::Election {
                leader_id: Some("x".to_owned())
            }
        );
    }

    #[test]
    fn test_classify_message() {
        let text = format!(
            r#"{{"s":"sess-1","c":"conn-1","b":"{}"}}"#,
            base64_of("ping", 0)
        );
        assert_eq!(
            classify_frame(&text, 0),
            Inbound::Message {
                data: "ping".to_owned(),
                session_id: Some("sess-1".to_owned()),
                connection_id: Some("conn-1".to_owned()),
            }
        );
    }

    #[test]
    fn test_classify_wrong_tag_falls_back_to_control() {
        let text = format!(r#"{{"c":"conn-1","b":"{}"}}"#, base64_of("ping", 3));
        assert!(matches!(
            classify_frame(&text, 0),
            Inbound::Control {
                connection_id: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_classify_invalid_base64_falls_back_to_control() {
        assert!(matches!(
            classify_frame(r#"{"b":"%%% not base64 %%%"}"#, 0),
            Inbound::Control { .. }
        ));
    }

    #[test]
    fn test_classify_control() {
        let frame = classify_frame(r#"{"s":"sess-1","c":"conn-1","v":2}"#, 0);
        match frame {
            Inbound::Control {
                data,
                session_id,
                connection_id,
            } => {
                assert_eq!(data["v"], 2);
                assert_eq!(session_id.as_deref(), Some("sess-1"));
                assert_eq!(connection_id.as_deref(), Some("conn-1"));
            }
            other => panic!("expected control frame, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_parse_error_preserves_raw() {
        let raw = "definitely {not json";
        assert_eq!(
            classify_frame(raw, 0),
            Inbound::ParseError {
                raw: raw.to_owned()
            }
        );
    }

    #[test]
    fn test_outbound_roundtrips_through_classifier() {
        let framed = encode_frame("round trip", 0, "sess-7", Some("conn-7")).unwrap();
        assert_eq!(
            classify_frame(&framed, 0),
            Inbound::Message {
                data: "round trip".to_owned(),
                session_id: Some("sess-7".to_owned()),
                connection_id: Some("conn-7".to_owned()),
            }
        );
    }
}
