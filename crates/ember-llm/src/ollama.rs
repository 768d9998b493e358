use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use ember_core::GatewayError;

use crate::http;
use crate::provider::{ChatMessage, CompletionProvider, CompletionRequest};

pub const OLLAMA_CHAT_URL: &str = "https://ollama.com/api/chat";

/// Ollama native chat API (`/api/chat`, non-streaming).
pub struct OllamaChatProvider {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize)]
struct ChatOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatReply {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl OllamaChatProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, GatewayError> {
        Ok(Self::with_client(http::build_client()?, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CompletionProvider for OllamaChatProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        let body = ChatBody {
            model: &request.model,
            messages: request.messages(),
            stream: false,
            options: request.max_tokens.map(|num_predict| ChatOptions { num_predict }),
        };
        let reply: ChatReply = http::post_json(&self.client, &self.url, &request.api_key, &body).await?;
        http::non_empty(reply.message.and_then(|m| m.content), self.name())
    }
}
