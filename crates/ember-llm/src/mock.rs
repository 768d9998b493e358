use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use ember_core::GatewayError;

use crate::provider::{CompletionProvider, CompletionRequest};

/// Pre-programmed responses for deterministic testing without API calls.
#[derive(Clone, Debug)]
pub enum MockResponse {
    Text(String),
    Error(GatewayError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
    /// Panic inside `complete`.
    Panic,
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// What a [`MockProvider`] was asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub model: String,
    pub message: String,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
}

/// Mock provider that returns pre-programmed responses in sequence.
///
/// Once the queue is drained every call fails with `InvalidRequest`.
pub struct MockProvider {
    name: String,
    responses: Mutex<VecDeque<MockResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
    call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &str, responses: Vec<MockResponse>) -> Self {
        Self {
            name: name.to_string(),
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Provider with nothing scripted; every call fails.
    pub fn failing(name: &str) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.calls.lock().push(RecordedCall {
            model: request.model.clone(),
            message: request.message.clone(),
            system_prompt: request.system_prompt.clone(),
            max_tokens: request.max_tokens,
        });

        let Some(mut response) = self.responses.lock().pop_front() else {
            return Err(GatewayError::InvalidRequest(format!(
                "MockProvider: no response configured for call {idx}"
            )));
        };

        loop {
            match response {
                MockResponse::Text(text) => return Ok(text),
                MockResponse::Error(e) => return Err(e),
                MockResponse::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    response = *inner;
                }
                MockResponse::Panic => panic!("MockProvider: scripted panic on call {idx}"),
            }
        }
    }
}
