//! Upstream completion providers.
//!
//! Two HTTP providers share the same bearer-auth JSON plumbing in [`http`]:
//! the Ollama native chat API and the generic chat-completions shape.

pub mod chat;
pub mod http;
pub mod ollama;
pub mod provider;

pub mod mock;

pub use chat::{ChatCompletionsProvider, CHAT_COMPLETIONS_URL};
pub use mock::{MockProvider, MockResponse};
pub use ollama::{OllamaChatProvider, OLLAMA_CHAT_URL};
pub use provider::{CompletionProvider, CompletionRequest};
