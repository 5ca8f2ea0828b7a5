//! Hand-off point between the WebSocket ingress and the streaming voice agent.
//!
//! The agent itself is not part of this service; [`LogForwarder`] records what
//! would be sent to it.

use crate::message::InboundMessage;
use std::fmt;
use tracing::info;
use uuid::Uuid;

/// Receives every decoded inbound message, in per-connection receipt order.
///
/// Called from the connection's event loop, so implementations must not block.
pub trait Forwarder: fmt::Debug + Send + Sync {
    fn forward(&self, connection_id: Uuid, message: &InboundMessage);
}

/// Logs decoded messages instead of forwarding them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogForwarder;

impl Forwarder for LogForwarder {
    fn forward(&self, connection_id: Uuid, message: &InboundMessage) {
        match &message.event {
            Some(event) => info!(
                connection_id = %connection_id,
                kind = event.kind(),
                payload = %message.payload,
                "Received client event"
            ),
            None => info!(
                connection_id = %connection_id,
                payload = %message.payload,
                "Received message"
            ),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingForwarder;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_forwarder_accepts_typed_and_untyped() {
        let forwarder = LogForwarder;
        forwarder.forward(Uuid::new_v4(), &InboundMessage::parse(r#"{"type":"start"}"#).unwrap());
        forwarder.forward(Uuid::new_v4(), &InboundMessage::parse(r#"{"x":1}"#).unwrap());
    }

    #[test]
    fn test_recording_forwarder_keeps_order() {
        let recorder = RecordingForwarder::default();
        let id = Uuid::new_v4();
        for raw in [r#"{"seq":1}"#, r#"{"seq":2}"#, r#"{"seq":3}"#] {
            recorder.forward(id, &InboundMessage::parse(raw).unwrap());
        }
        assert_eq!(
            recorder.payloads(),
            vec![json!({"seq": 1}), json!({"seq": 2}), json!({"seq": 3})]
        );
        assert!(recorder.connection_ids().iter().all(|c| *c == id));
    }
}
