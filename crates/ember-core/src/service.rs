//! Seams between the lifecycle coordinator and the things it manages.
//!
//! Every long-lived server is reached through these traits so the
//! coordinator can own concrete instances and hand out capabilities
//! explicitly instead of through process-wide statics.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{service}: bind failed on port {port}: {reason}")]
    Bind {
        service: String,
        port: u16,
        reason: String,
    },
    #[error("{service}: {reason}")]
    Start { service: String, reason: String },
    #[error("{service}: stop failed: {reason}")]
    Stop { service: String, reason: String },
}

/// A server whose lifecycle is driven by the coordinator.
pub trait ManagedService: Send + Sync {
    fn name(&self) -> &str;
    fn start(&self) -> Result<(), ServiceError>;
    fn stop(&self) -> Result<(), ServiceError>;
    fn is_running(&self) -> bool;
}

/// Wake-word detection lives in the host; the runtime only switches it on and off.
pub trait WakeWordListener: Send + Sync {
    fn start(&self) -> Result<(), ServiceError>;
    fn stop(&self) -> Result<(), ServiceError>;
    fn is_running(&self) -> bool;
}

/// Result of one fan-out to every connected client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub attempted: usize,
    pub delivered: usize,
}

impl BroadcastOutcome {
    pub fn failed(&self) -> usize {
        self.attempted.saturating_sub(self.delivered)
    }
}

/// Capability to push text to every connected client.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, text: &str) -> BroadcastOutcome;
}

/// Persona tag used when a chat message does not name one.
pub const DEFAULT_PERSONA: &str = "assistant";

/// Normalize an optional inbound persona tag; blank means [`DEFAULT_PERSONA`].
pub fn resolve_persona(tag: Option<&str>) -> String {
    match tag.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => DEFAULT_PERSONA.to_string(),
    }
}

/// Turns a chat message into a reply. Implementations must not fail;
/// errors are folded into the returned text.
#[async_trait]
pub trait ChatHandler: Send + Sync {
    async fn handle_chat(&self, message: String, persona: String) -> String;
}
