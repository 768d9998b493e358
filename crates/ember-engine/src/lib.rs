//! AI request orchestration: response cache, provider fallback chain,
//! persona voices and the completion worker pool.

pub mod cache;
pub mod credentials;
pub mod error;
pub mod fallback;
pub mod orchestrator;
pub mod persona;

pub use cache::{InMemoryCache, ResponseCache, CACHE_TTL};
pub use credentials::{CredentialSource, ProviderSettings, StaticCredentials};
pub use error::EngineError;
pub use orchestrator::{
    CompletionHandle, Orchestrator, OrchestratorConfig, ProviderChain, APOLOGY, WORKER_THREADS,
};
