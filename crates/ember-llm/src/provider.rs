use async_trait::async_trait;
use secrecy::SecretString;
use serde::Serialize;

use ember_core::GatewayError;

/// One non-streaming completion call.
#[derive(Debug)]
pub struct CompletionRequest {
    pub model: String,
    pub message: String,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub api_key: SecretString,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, message: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            model: model.into(),
            message: message.into(),
            system_prompt: None,
            max_tokens: None,
            api_key,
        }
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens.filter(|n| *n > 0);
        self
    }

    /// Chat transcript sent upstream: optional system turn, then the user turn.
    pub fn messages(&self) -> Vec<ChatMessage<'_>> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &self.message,
        });
        messages
    }
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// An upstream service that turns a prompt into text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretString {
        SecretString::from("sk".to_string())
    }

    #[test]
    fn messages_without_system_prompt() {
        let req = CompletionRequest::new("m", "hi", key());
        let msgs = req.messages();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, "user");
        assert_eq!(msgs[0].content, "hi");
    }

    #[test]
    fn system_prompt_goes_first() {
        let req = CompletionRequest::new("m", "hi", key())
            .with_system_prompt(Some("Be brief.".into()));
        let msgs = req.messages();
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].role, "user");
    }

    #[test]
    fn blank_system_prompt_and_zero_tokens_are_dropped() {
        let req = CompletionRequest::new("m", "hi", key())
            .with_system_prompt(Some("  ".into()))
            .with_max_tokens(Some(0));
        assert!(req.system_prompt.is_none());
        assert!(req.max_tokens.is_none());
    }
}
