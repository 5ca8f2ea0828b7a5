//! # WebSocket Ingress
//!
//! Accepts WebSocket upgrades and hands every decoded message to the
//! configured [`Forwarder`](crate::forward::Forwarder).
//!
//! ## Connection lifecycle:
//! 1. **Upgrade**: any `GET` carrying `Upgrade: websocket` is handed to
//!    [`websocket_entry`], which starts one [`ClientSocket`] actor
//! 2. **Open**: text frames (and UTF-8 binary frames) are decoded as JSON.
//!    Fragmented messages are reassembled first, up to the configured
//!    `max_frame_size`
//! 3. **Closed**: a close frame from the client, or a protocol error, stops the actor
//!
//! ## Tolerant parsing:
//! A frame that is not valid JSON is logged and counted, and nothing else
//! happens. The server never replies to what a client sent, and only closes
//! the connection for a message larger than `max_frame_size`.

use crate::error::InboundError;
use crate::message::InboundMessage;
use crate::state::AppState;

use actix::prelude::*;
use actix_http::ws::Item;
use actix_web::http::header::{self, HeaderMap};
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One actor per WebSocket connection.
///
/// ## Actor Model:
/// Each actor runs on its worker's event loop and processes frames one at a
/// time, so messages from one client are handled in the order they arrived.
/// Actors share nothing with each other apart from the metrics in [`AppState`].
pub struct ClientSocket {
    /// Random id used to correlate log lines of one connection
    id: Uuid,

    /// Remote address as reported by the connection, for logging
    peer: String,

    /// Payload of a fragmented message received so far
    fragments: Option<Vec<u8>>,

    /// Largest message accepted, single frame or reassembled
    max_message_size: usize,

    state: AppState,
}

/// Result of feeding one continuation frame to [`ClientSocket::push_fragment`].
#[derive(Debug, PartialEq, Eq)]
enum Reassembly {
    /// More frames are needed
    Pending,
    /// The final frame arrived; holds the whole payload
    Complete(Vec<u8>),
    /// The message would exceed the size limit; holds the size it reached
    TooLarge(usize),
    /// A continuation arrived without a first frame
    Orphan,
}

impl ClientSocket {
    pub fn new(state: AppState, peer: String) -> Self {
        let max_message_size = state.get_config().server.max_frame_size;
        Self {
            id: Uuid::new_v4(),
            peer,
            fragments: None,
            max_message_size,
            state,
        }
    }

    /// Append one frame of a fragmented message.
    fn push_fragment(&mut self, item: Item) -> Reassembly {
        let (data, last) = match item {
            Item::FirstText(data) | Item::FirstBinary(data) => {
                if self.fragments.is_some() {
                    warn!(connection_id = %self.id, "Dropping unfinished fragmented message");
                }
                self.fragments = Some(Vec::new());
                (data, false)
            }
            Item::Continue(data) => (data, false),
            Item::Last(data) => (data, true),
        };

        let Some(buffer) = self.fragments.as_mut() else {
            return Reassembly::Orphan;
        };

        let size = buffer.len() + data.len();
        if size > self.max_message_size {
            self.fragments = None;
            return Reassembly::TooLarge(size);
        }
        buffer.extend_from_slice(&data);

        if last {
            self.fragments.take().map_or(Reassembly::Orphan, Reassembly::Complete)
        } else {
            Reassembly::Pending
        }
    }

    /// Handle the outcome of decoding one frame.
    ///
    /// Returns the decoded message so callers (and tests) can see what was
    /// accepted; a decode failure is fully handled here.
    fn on_frame(&self, decoded: Result<InboundMessage, InboundError>) -> Option<InboundMessage> {
        match decoded {
            Ok(message) => {
                self.state.message_received();
                debug!(connection_id = %self.id, bytes = message.raw.len(), "Decoded message");
                self.state.forwarder.forward(self.id, &message);
                Some(message)
            }
            Err(err) => {
                self.state.message_malformed();
                error!(connection_id = %self.id, error = %err, "Error processing message");
                None
            }
        }
    }
}

impl Actor for ClientSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        self.state.connection_opened();
        info!(connection_id = %self.id, peer = %self.peer, "New WebSocket connection");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.state.connection_closed();
        info!(connection_id = %self.id, peer = %self.peer, "Client disconnected");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ClientSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.on_frame(InboundMessage::parse(&text));
            }
            Ok(ws::Message::Binary(data)) => {
                self.on_frame(InboundMessage::parse_bytes(&data));
            }
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Close(reason)) => {
                debug!(connection_id = %self.id, ?reason, "Close frame received");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(item)) => match self.push_fragment(item) {
                Reassembly::Pending => {}
                Reassembly::Complete(payload) => {
                    self.on_frame(InboundMessage::parse_bytes(&payload));
                }
                Reassembly::TooLarge(size) => {
                    error!(
                        connection_id = %self.id,
                        size,
                        limit = self.max_message_size,
                        "Fragmented message too large, closing connection"
                    );
                    ctx.close(Some(ws::CloseReason {
                        code: ws::CloseCode::Size,
                        description: Some("message too large".to_string()),
                    }));
                    ctx.stop();
                }
                Reassembly::Orphan => {
                    warn!(connection_id = %self.id, "Continuation frame without a first frame");
                }
            },
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(connection_id = %self.id, error = %err, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// True when the request asks for a WebSocket upgrade.
///
/// Browsers send `websocket`, but the token is case-insensitive.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

/// Upgrade handler, mounted on every path of the listener.
pub async fn websocket_entry(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let peer = req
        .connection_info()
        .peer_addr()
        .unwrap_or("unknown")
        .to_string();
    debug!(%peer, path = %req.path(), "WebSocket upgrade requested");

    let socket = ClientSocket::new(state.get_ref().clone(), peer);
    ws::WsResponseBuilder::new(socket, &req, stream)
        .frame_size(state.get_config().server.max_frame_size)
        .start()
}
