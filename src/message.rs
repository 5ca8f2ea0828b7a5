//! Inbound WebSocket messages.
//!
//! Every text frame is decoded as arbitrary JSON first. Objects whose `type`
//! names a known kind are also classified into a [`ClientEvent`]; anything
//! else stays untyped and is still a valid message.

use crate::error::InboundError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tagged envelope for the messages a voice client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Start of an audio session
    Start,
    /// One chunk of audio, base64 encoded. The payload is passed on opaquely.
    Audio { data: String },
    /// End of an audio session
    Stop,
}

impl ClientEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::Start => "start",
            ClientEvent::Audio { .. } => "audio",
            ClientEvent::Stop => "stop",
        }
    }
}

/// A successfully decoded message. Lives only for one handling call.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub raw: String,
    pub payload: Value,
    pub event: Option<ClientEvent>,
}

impl InboundMessage {
    /// Decode a text frame.
    pub fn parse(raw: &str) -> Result<Self, InboundError> {
        let payload: Value = serde_json::from_str(raw)?;
        let event = classify(&payload);

        Ok(Self {
            raw: raw.to_string(),
            payload,
            event,
        })
    }

    /// Decode a binary frame. Valid UTF-8 is handled exactly like text.
    pub fn parse_bytes(raw: &[u8]) -> Result<Self, InboundError> {
        let text = std::str::from_utf8(raw)?;
        Self::parse(text)
    }
}

fn classify(payload: &Value) -> Option<ClientEvent> {
    // Tagged deserialization buffers the whole value; skip untagged payloads early.
    payload.get("type")?;
    ClientEvent::deserialize(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_is_decoded() {
        let msg = InboundMessage::parse(r#"{"hello":"world","n":3}"#).unwrap();
        assert_eq!(msg.payload, json!({"hello": "world", "n": 3}));
        assert_eq!(msg.event, None);
        assert_eq!(msg.raw, r#"{"hello":"world","n":3}"#);
    }

    #[test]
    fn test_non_object_json_is_still_valid() {
        assert_eq!(InboundMessage::parse("[1,2,3]").unwrap().payload, json!([1, 2, 3]));
        assert_eq!(InboundMessage::parse("42").unwrap().payload, json!(42));
        assert_eq!(InboundMessage::parse("\"hi\"").unwrap().payload, json!("hi"));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        for raw in ["", "{", "not json", "{\"a\":}", "{'single':'quotes'}"] {
            let err = InboundMessage::parse(raw).unwrap_err();
            assert!(matches!(err, InboundError::Json(_)), "{raw:?} should be a JSON error");
        }
    }

    #[test]
    fn test_known_envelopes_are_classified() {
        let start = InboundMessage::parse(r#"{"type":"start"}"#).unwrap();
        assert_eq!(start.event, Some(ClientEvent::Start));

        let audio = InboundMessage::parse(r#"{"type":"audio","data":"AAEC"}"#).unwrap();
        assert_eq!(audio.event, Some(ClientEvent::Audio { data: "AAEC".to_string() }));
        assert_eq!(audio.event.as_ref().map(ClientEvent::kind), Some("audio"));

        let stop = InboundMessage::parse(r#"{"type":"stop","reason":"user"}"#).unwrap();
        assert_eq!(stop.event, Some(ClientEvent::Stop));
    }

    #[test]
    fn test_unknown_or_incomplete_envelopes_stay_untyped() {
        let unknown = InboundMessage::parse(r#"{"type":"dance"}"#).unwrap();
        assert_eq!(unknown.event, None);

        // audio without its payload is valid JSON but not a valid envelope
        let incomplete = InboundMessage::parse(r#"{"type":"audio"}"#).unwrap();
        assert_eq!(incomplete.event, None);
        assert_eq!(incomplete.payload, json!({"type": "audio"}));
    }

    #[test]
    fn test_binary_frames() {
        let msg = InboundMessage::parse_bytes(br#"{"type":"stop"}"#).unwrap();
        assert_eq!(msg.event, Some(ClientEvent::Stop));

        let err = InboundMessage::parse_bytes(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, InboundError::Utf8(_)));
    }
}
