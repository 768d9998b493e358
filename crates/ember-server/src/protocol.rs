//! Inbound message decoding and the request/response dispatch table.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use ember_core::{resolve_persona, ChatHandler, Frame, FrameKind, Sanitizer};

/// Every message kind a client may send, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    ChatMessage {
        content: String,
        #[serde(default)]
        persona: Option<String>,
    },
    Ping,
    Typing {
        #[serde(default)]
        content: Option<String>,
    },
}

const KNOWN_TYPES: [&str; 3] = ["chat_message", "ping", "typing"];

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid message format")]
    Malformed,
    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

/// Decode one line of client input.
pub fn decode(line: &str) -> Result<InboundMessage, DecodeError> {
    let value: Value = serde_json::from_str(line).map_err(|_| DecodeError::Malformed)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::Malformed)?;
    if !KNOWN_TYPES.contains(&kind) {
        return Err(DecodeError::UnknownType(kind.to_string()));
    }
    serde_json::from_value(value).map_err(|_| DecodeError::Malformed)
}

/// Shared state every connection task consults.
pub struct Dispatcher {
    sanitizer: Arc<dyn Sanitizer>,
    chat: RwLock<Option<Arc<dyn ChatHandler>>>,
}

impl Dispatcher {
    pub fn new(sanitizer: Arc<dyn Sanitizer>) -> Self {
        Self {
            sanitizer,
            chat: RwLock::new(None),
        }
    }

    pub fn set_chat_handler(&self, handler: Option<Arc<dyn ChatHandler>>) {
        *self.chat.write() = handler;
    }

    /// Frame with sanitized content.
    pub fn frame(&self, kind: FrameKind, content: &str) -> Frame {
        Frame::new(kind, self.sanitizer.sanitize(content))
    }

    /// Produce the single response frame for one inbound line.
    pub async fn respond(&self, line: &str) -> Frame {
        match decode(line) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                debug!(error = %e, "rejected inbound frame");
                self.frame(FrameKind::Error, &e.to_string())
            }
        }
    }

    async fn handle(&self, message: InboundMessage) -> Frame {
        match message {
            InboundMessage::Ping => self.frame(FrameKind::Pong, "pong"),
            InboundMessage::Typing { content } => {
                self.frame(FrameKind::TypingAck, content.as_deref().unwrap_or_default())
            }
            InboundMessage::ChatMessage { content, persona } => {
                if !self.sanitizer.is_valid(&content) {
                    return self.frame(FrameKind::Error, "Invalid message content");
                }
                let handler = self.chat.read().clone();
                let Some(handler) = handler else {
                    return self.frame(FrameKind::Error, "Assistant unavailable");
                };
                let persona = resolve_persona(persona.as_deref());
                let reply = handler.handle_chat(content, persona).await;
                self.frame(FrameKind::ChatResponse, &reply)
            }
        }
    }
}
