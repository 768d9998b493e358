use serde::{Deserialize, Serialize};

/// Outbound frame kinds written by the protocol engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Welcome,
    ChatResponse,
    Pong,
    TypingAck,
    Broadcast,
    Error,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::ChatResponse => "chat_response",
            Self::Pong => "pong",
            Self::TypingAck => "typing_ack",
            Self::Broadcast => "broadcast",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `{type, content, timestamp}` unit on the wire.
///
/// Callers are responsible for sanitizing `content` before constructing a
/// frame that will be written to a socket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub timestamp: i64,
}

impl Frame {
    pub fn new(kind: FrameKind, content: impl Into<String>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            content: content.into(),
            timestamp: crate::now_ms(),
        }
    }

    /// Serialize as one line of JSON, without the terminator.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"type":"error","content":"frame encoding failed","timestamp":{}}}"#,
                self.timestamp
            )
        })
    }

    pub fn is(&self, kind: FrameKind) -> bool {
        self.kind == kind.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_serializes_flat_shape() {
        let frame = Frame::new(FrameKind::ChatResponse, "hi");
        let value: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "chat_response");
        assert_eq!(value["content"], "hi");
        assert!(value["timestamp"].as_i64().unwrap() > 0);
        assert_eq!(value.as_object().unwrap().len(), 3);
    }

    #[test]
    fn to_json_is_a_single_line() {
        let line = Frame::new(FrameKind::Pong, "line one\nline two").to_json();
        assert!(!line.contains('\n'));
        let parsed: Frame = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.content, "line one\nline two");
        assert!(parsed.is(FrameKind::Pong));
    }

    #[test]
    fn kind_names_are_snake_case() {
        assert_eq!(FrameKind::TypingAck.to_string(), "typing_ack");
        assert_eq!(
            serde_json::to_string(&FrameKind::ChatResponse).unwrap(),
            "\"chat_response\""
        );
    }
}
