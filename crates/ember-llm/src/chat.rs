use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use ember_core::GatewayError;

use crate::http;
use crate::provider::{ChatMessage, CompletionProvider, CompletionRequest};

pub const CHAT_COMPLETIONS_URL: &str = "https://ollama.com/v1/chat/completions";

/// Any endpoint speaking the `/v1/chat/completions` request and response shape.
pub struct ChatCompletionsProvider {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct CompletionsBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct CompletionsReply {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatCompletionsProvider {
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
impl CompletionProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        "chat-completions"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        let body = CompletionsBody {
            model: &request.model,
            messages: request.messages(),
            stream: false,
            max_tokens: request.max_tokens,
        };
        let reply: CompletionsReply =
            http::post_json(&self.client, &self.url, &request.api_key, &body).await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content);
        http::non_empty(content, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest::new("gpt-oss:120b", "what is rust", SecretString::from("sk-b".to_string()))
            .with_max_tokens(Some(1024))
    }

    fn provider(server: &MockServer) -> ChatCompletionsProvider {
        ChatCompletionsProvider::new(format!("{}/v1/chat/completions", server.uri())).unwrap()
    }

    #[tokio::test]
    async fn reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-b"))
            .and(body_partial_json(json!({
                "model": "gpt-oss:120b",
                "max_tokens": 1024,
                "messages": [{ "role": "user", "content": "what is rust" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    { "index": 0, "message": { "role": "assistant", "content": "A language." } },
                    { "index": 1, "message": { "role": "assistant", "content": "ignored" } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(provider(&server).complete(&request()).await.unwrap(), "A language.");
    }

    #[tokio::test]
    async fn no_choices_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = provider(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn server_error_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = provider(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::ServerError { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn garbage_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = provider(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }
}
