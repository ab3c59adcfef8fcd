//! WebSocket wire messages.
//!
//! ```json
//! // Client → Server
//! { "kind": "frame", "image": "<base64 or data URL>" }
//!
//! // Server → Client
//! { "kind": "result", "text": "hello", "confidence": 0.9, "analysis": { ... } }
//! { "kind": "partial", "text": "hello", "confidence": 0.9, "skipped": true, "throttled": true, "reason": "throttled" }
//! { "kind": "error", "message": "...", "fatal": true }
//! ```

use serde::{Deserialize, Serialize};
use signlens_application::Reply;
use signlens_core::Frame;
use signlens_core::translation::ClassificationResult;

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum ClientMessage {
    Frame {
        #[serde(default, alias = "imageFrame")]
        image: Option<String>,
    },
}

/// A parsed inbound text message.
#[derive(Debug)]
pub enum Inbound {
    Frame(Frame),
    /// A frame message that cannot be used; answered with a non-fatal error.
    Invalid(String),
    /// Not JSON, or a kind this server does not handle.
    Ignored,
}

pub fn parse_inbound(text: &str) -> Inbound {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(_) => return Inbound::Ignored,
    };

    match message {
        ClientMessage::Frame { image: None } => {
            Inbound::Invalid("frame message is missing its image".to_string())
        }
        ClientMessage::Frame { image: Some(image) } => match Frame::from_encoded(&image) {
            Ok(frame) => Inbound::Frame(frame),
            Err(e) => Inbound::Invalid(e.to_string()),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ServerMessage {
    Result {
        text: String,
        confidence: f64,
        analysis: ClassificationResult,
    },
    Partial {
        text: String,
        confidence: f64,
        skipped: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        throttled: Option<bool>,
        reason: &'static str,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        fatal: Option<bool>,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            fatal: None,
        }
    }
}

impl From<Reply> for ServerMessage {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Result(result) => Self::Result {
                text: result.display_text().to_string(),
                confidence: result.confidence,
                analysis: result,
            },
            Reply::Cached(cached) => Self::Partial {
                throttled: cached.throttled().then_some(true),
                text: cached.text,
                confidence: cached.confidence,
                skipped: true,
                reason: cached.reason.as_str(),
            },
            Reply::Error { message, fatal } => Self::Error {
                message,
                fatal: fatal.then_some(true),
            },
        }
    }
}
