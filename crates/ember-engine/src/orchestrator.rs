use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use ember_core::{Broadcaster, ChatHandler, Sanitizer};
use ember_llm::{CompletionProvider, CompletionRequest};
use ember_store::CachedResponse;

use crate::cache::{self, ResponseCache, CACHE_TTL};
use crate::credentials::{CredentialSource, ProviderSettings};
use crate::error::EngineError;
use crate::fallback;
use crate::persona;

/// Size of the completion worker pool.
pub const WORKER_THREADS: usize = 4;

/// Returned when a completion task fails internally.
pub const APOLOGY: &str =
    "Sorry, something went wrong while preparing a response. Please try again in a moment.";

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub workers: usize,
    pub cache_ttl: Duration,
    /// Push every result to all connected clients.
    pub broadcast_results: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: WORKER_THREADS,
            cache_ttl: CACHE_TTL,
            broadcast_results: true,
        }
    }
}

/// The two upstream providers, tried in order.
#[derive(Clone)]
pub struct ProviderChain {
    pub primary: Arc<dyn CompletionProvider>,
    pub secondary: Arc<dyn CompletionProvider>,
}

/// Collaborators every completion needs.
struct Pipeline {
    credentials: Arc<dyn CredentialSource>,
    cache: Arc<dyn ResponseCache>,
    providers: ProviderChain,
    sanitizer: Arc<dyn Sanitizer>,
    broadcaster: RwLock<Option<Weak<dyn Broadcaster>>>,
    cache_ttl: Duration,
    broadcast_results: bool,
}

/// Resolves to the response text for one [`Orchestrator::complete`] call.
pub struct CompletionHandle {
    inner: Option<JoinHandle<String>>,
}

impl CompletionHandle {
    fn failed() -> Self {
        Self { inner: None }
    }

    /// Wait for the response. Internal failures resolve to [`APOLOGY`].
    pub async fn wait(self) -> String {
        let Some(handle) = self.inner else {
            return APOLOGY.to_string();
        };
        match handle.await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, panicked = e.is_panic(), "completion task failed");
                APOLOGY.to_string()
            }
        }
    }
}

/// Turns chat messages into responses: cache, provider A, provider B, then a
/// synthetic fallback, decorated in the persona's voice.
///
/// Work runs on a dedicated multi-thread runtime so the caller's event loop
/// only ever awaits a [`CompletionHandle`].
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    runtime: Option<Runtime>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        credentials: Arc<dyn CredentialSource>,
        cache: Arc<dyn ResponseCache>,
        providers: ProviderChain,
        sanitizer: Arc<dyn Sanitizer>,
    ) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.workers.max(1))
            .thread_name("ember-completion")
            .enable_all()
            .build()?;
        info!(workers = config.workers, "completion worker pool started");

        let ttl_ms = i64::try_from(config.cache_ttl.as_millis()).unwrap_or(i64::MAX);
        let purged = cache.purge_older_than(ember_core::now_ms().saturating_sub(ttl_ms));
        if purged > 0 {
            info!(purged, "dropped expired cache entries");
        }

        Ok(Self {
            pipeline: Arc::new(Pipeline {
                credentials,
                cache,
                providers,
                sanitizer,
                broadcaster: RwLock::new(None),
                cache_ttl: config.cache_ttl,
                broadcast_results: config.broadcast_results,
            }),
            runtime: Some(runtime),
        })
    }

    /// Route results through `broadcaster`. Held weakly; a dropped engine
    /// simply stops receiving them.
    pub fn set_broadcaster(&self, broadcaster: Weak<dyn Broadcaster>) {
        *self.pipeline.broadcaster.write() = Some(broadcaster);
    }

    /// Submit a completion. Never blocks the caller.
    pub fn complete(&self, message: &str, persona: &str) -> CompletionHandle {
        let Some(runtime) = &self.runtime else {
            warn!("completion submitted after shutdown");
            return CompletionHandle::failed();
        };
        let pipeline = Arc::clone(&self.pipeline);
        let message = message.to_string();
        let persona = persona.to_string();
        CompletionHandle {
            inner: Some(runtime.spawn(async move { pipeline.run(message, persona).await })),
        }
    }

    /// Stop the worker pool. Pending handles resolve to [`APOLOGY`].
    pub fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            info!("completion worker pool stopped");
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl ChatHandler for Orchestrator {
    async fn handle_chat(&self, message: String, persona: String) -> String {
        self.complete(&message, &persona).wait().await
    }
}

impl Pipeline {
    #[instrument(skip_all, fields(persona = %persona))]
    async fn run(&self, message: String, persona: String) -> String {
        let fingerprint = cache::fingerprint(&message, &persona);
        if let Some(hit) = self.cached(&fingerprint) {
            debug!("cache hit");
            self.broadcast(&hit);
            return hit;
        }

        let sanitized = self.sanitizer.sanitize(&message);
        let generated = match self.credentials.provider_settings(&persona) {
            Some(settings) => self.ask_providers(&message, &sanitized, &persona, &settings).await,
            None => {
                debug!("no credential configured, using fallback");
                None
            }
        };
        let text = generated.unwrap_or_else(|| fallback::synthesize(&sanitized));
        let response = persona::decorate(&persona, &text);

        self.cache.put(
            &fingerprint,
            CachedResponse {
                response: response.clone(),
                created_at_ms: ember_core::now_ms(),
            },
        );
        self.broadcast(&response);
        response
    }

    fn cached(&self, fingerprint: &str) -> Option<String> {
        let entry = self.cache.get(fingerprint)?;
        if cache::is_fresh(entry.created_at_ms, ember_core::now_ms(), self.cache_ttl) {
            Some(entry.response)
        } else {
            debug!("cache entry expired");
            self.cache.delete(fingerprint);
            None
        }
    }

    async fn ask_providers(
        &self,
        message: &str,
        sanitized: &str,
        persona: &str,
        settings: &ProviderSettings,
    ) -> Option<String> {
        let primary = CompletionRequest::new(persona::model_for(persona), message, settings.api_key.clone())
            .with_system_prompt(settings.system_prompt.clone())
            .with_max_tokens(settings.max_tokens);
        match self.providers.primary.complete(&primary).await {
            Ok(text) => return Some(text),
            Err(e) => warn!(
                provider = self.providers.primary.name(),
                kind = e.error_kind(),
                error = %e,
                "primary provider failed"
            ),
        }

        let secondary = CompletionRequest::new(settings.chat_model.as_str(), sanitized, settings.api_key.clone())
            .with_system_prompt(settings.system_prompt.clone())
            .with_max_tokens(settings.max_tokens);
        match self.providers.secondary.complete(&secondary).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(
                    provider = self.providers.secondary.name(),
                    kind = e.error_kind(),
                    error = %e,
                    "secondary provider failed"
                );
                None
            }
        }
    }

    fn broadcast(&self, text: &str) {
        if !self.broadcast_results {
            return;
        }
        let target = self.broadcaster.read().as_ref().and_then(Weak::upgrade);
        if let Some(broadcaster) = target {
            let outcome = broadcaster.broadcast(text);
            debug!(attempted = outcome.attempted, delivered = outcome.delivered, "result broadcast");
        }
    }
}
