//! WebSocket streaming handler.
//!
//! One connection is one translation session. The client streams frames as
//! `{"kind": "frame", "image": ...}` text messages; the server answers with
//! `result`, `partial` or `error` messages (see [`crate::messages`]).
//!
//! At most one classification runs per connection. A frame that would be
//! admitted while a call is running is parked in a single pending slot
//! (newest wins) and re-evaluated when the call resolves.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use signlens_application::{FrameDecision, Reply, SessionHandle, TranslationPipeline};
use signlens_core::Frame;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::messages::{Inbound, ServerMessage, parse_inbound};

type Sender = SplitSink<WebSocket, Message>;
type InFlight = JoinHandle<Option<Reply>>;

/// `GET /ws` with `Upgrade: websocket`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection processing state.
struct Connection {
    pipeline: Arc<TranslationPipeline>,
    session: SessionHandle,
    in_flight: Option<InFlight>,
    pending: Option<Frame>,
}

impl Connection {
    /// Runs admission for a frame and returns the message to send, if any.
    fn submit(&mut self, frame: Frame) -> Option<ServerMessage> {
        match self.pipeline.evaluate(&self.session, &frame) {
            FrameDecision::Reply(reply) => Some(reply.into()),
            FrameDecision::Dispatch => {
                let pipeline = Arc::clone(&self.pipeline);
                let session = self.session.clone();
                self.in_flight = Some(tokio::spawn(async move {
                    pipeline.dispatch(&session, frame).await
                }));
                None
            }
            FrameDecision::Drop => {
                if self.in_flight.is_some() {
                    self.pending = Some(frame);
                }
                None
            }
        }
    }

    /// Handles completion of the in-flight call, then the pending frame.
    fn complete(&mut self, joined: Result<Option<Reply>, JoinError>) -> Vec<ServerMessage> {
        self.in_flight = None;
        let mut out = Vec::with_capacity(2);

        match joined {
            Ok(Some(reply)) => out.push(reply.into()),
            Ok(None) => {}
            Err(e) => {
                error!(session_id = self.session.id(), error = %e, "classification task failed");
                self.session.lock().end_inference();
                out.push(ServerMessage::error("classification task failed"));
            }
        }

        if let Some(frame) = self.pending.take() {
            out.extend(self.submit(frame));
        }
        out
    }
}

/// Resolves when the in-flight task finishes; never resolves when idle.
async fn join_in_flight(task: &mut Option<InFlight>) -> Result<Option<Reply>, JoinError> {
    match task.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Sends one message; `false` once the client is gone.
async fn send(sender: &mut Sender, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize message: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let session = state.pipeline.open_session().await;
    let mut conn = Connection {
        pipeline: Arc::clone(&state.pipeline),
        session,
        in_flight: None,
        pending: None,
    };

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let outgoing = match msg {
                    Some(Ok(Message::Text(text))) => match parse_inbound(text.as_str()) {
                        Inbound::Frame(frame) => conn.submit(frame),
                        Inbound::Invalid(reason) => {
                            debug!(session_id = conn.session.id(), %reason, "rejected frame message");
                            Some(ServerMessage::error(reason))
                        }
                        Inbound::Ignored => {
                            debug!(session_id = conn.session.id(), "ignoring unrecognised message");
                            None
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                        None
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(session_id = conn.session.id(), "client sent close message");
                        break;
                    }
                    Some(Ok(_)) => None,
                    Some(Err(e)) => {
                        warn!(session_id = conn.session.id(), error = %e, "websocket error");
                        break;
                    }
                    None => {
                        debug!(session_id = conn.session.id(), "websocket stream ended");
                        break;
                    }
                };

                if let Some(message) = outgoing
                    && !send(&mut sender, &message).await
                {
                    debug!(session_id = conn.session.id(), "client disconnected");
                    break;
                }
            }

            joined = join_in_flight(&mut conn.in_flight) => {
                let mut open = true;
                for message in conn.complete(joined) {
                    if !send(&mut sender, &message).await {
                        open = false;
                        break;
                    }
                }
                if !open {
                    debug!(session_id = conn.session.id(), "client disconnected");
                    break;
                }
            }
        }
    }

    // An in-flight call keeps running; its result is discarded once the
    // session is gone from the registry.
    conn.pipeline.close_session(&conn.session).await;
    info!(session_id = conn.session.id(), "websocket session closed");
}
