//! Starts, stops and restarts every long-lived service as a unit.
//!
//! The coordinator owns each service instance. Nothing is reachable through
//! process-wide state; the orchestrator gets a weak broadcast handle to the
//! protocol engine and the engine gets the orchestrator as its chat handler.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use ember_core::{
    Broadcaster, ChatHandler, ManagedService, Sanitizer, TextSanitizer, WakeWordListener,
};
use ember_engine::{Orchestrator, OrchestratorConfig, ProviderChain, ResponseCache};
use ember_llm::{ChatCompletionsProvider, OllamaChatProvider};
use ember_server::{ProtocolConfig, ProtocolEngine, StatusServer};
use ember_settings::{ConfigSynchronizer, PreferenceStore};
use ember_store::{CacheRepo, Database, PreferenceRepo};

use crate::config::RuntimeConfig;
use crate::control::ControlAction;
use crate::error::RuntimeError;
use crate::wakeword::ConfiguredWakeWord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        })
    }
}

/// Builds the file and asset servers for each start.
pub trait ServiceFactory: Send + Sync {
    fn file_server(&self, config: &RuntimeConfig) -> Arc<dyn ManagedService>;
    fn asset_server(&self, config: &RuntimeConfig) -> Arc<dyn ManagedService>;
}

/// Health-only HTTP servers holding the file and asset ports.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatusServices;

impl ServiceFactory for StatusServices {
    fn file_server(&self, config: &RuntimeConfig) -> Arc<dyn ManagedService> {
        Arc::new(StatusServer::new("files", config.bind_addr, config.file_port))
    }

    fn asset_server(&self, config: &RuntimeConfig) -> Arc<dyn ManagedService> {
        Arc::new(StatusServer::new("assets", config.bind_addr, config.asset_port))
    }
}

/// Long-lived collaborators shared across restarts.
pub struct Collaborators {
    pub settings: Arc<ConfigSynchronizer>,
    pub cache: Arc<dyn ResponseCache>,
    pub providers: ProviderChain,
    pub sanitizer: Arc<dyn Sanitizer>,
    pub services: Arc<dyn ServiceFactory>,
    pub wake_word: Arc<dyn WakeWordListener>,
    pub orchestrator: OrchestratorConfig,
}

impl Collaborators {
    /// Production wiring: SQLite mirror and cache under the data dir, both
    /// HTTP providers, status servers and the config-driven wake word.
    pub fn open(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let db = Database::open(&config.database_path())?;
        let prefs: Arc<dyn PreferenceStore> = Arc::new(PreferenceRepo::new(db.clone()));
        let settings = Arc::new(ConfigSynchronizer::new(config.config_paths(), prefs));
        let providers = ProviderChain {
            primary: Arc::new(OllamaChatProvider::new(config.ollama_url.clone())?),
            secondary: Arc::new(ChatCompletionsProvider::new(config.chat_url.clone())?),
        };
        Ok(Self {
            wake_word: Arc::new(ConfiguredWakeWord::new(Arc::clone(&settings))),
            settings,
            cache: Arc::new(CacheRepo::new(db)),
            providers,
            sanitizer: Arc::new(TextSanitizer::default()),
            services: Arc::new(StatusServices),
            orchestrator: OrchestratorConfig::default(),
        })
    }
}

/// Services created by one `start_all`.
struct Active {
    engine: Arc<ProtocolEngine>,
    file_server: Arc<dyn ManagedService>,
    asset_server: Arc<dyn ManagedService>,
    orchestrator: Option<Arc<Orchestrator>>,
}

pub struct LifecycleCoordinator {
    config: RuntimeConfig,
    deps: Collaborators,
    state: LifecycleState,
    active: Option<Active>,
}

impl LifecycleCoordinator {
    pub fn new(config: RuntimeConfig, deps: Collaborators) -> Self {
        Self {
            config,
            deps,
            state: LifecycleState::Stopped,
            active: None,
        }
    }

    /// Coordinator with production collaborators.
    pub fn open(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let deps = Collaborators::open(&config)?;
        Ok(Self::new(config, deps))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn settings(&self) -> &Arc<ConfigSynchronizer> {
        &self.deps.settings
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Bound protocol port while the engine is running.
    pub fn protocol_port(&self) -> Option<u16> {
        self.active.as_ref().and_then(|a| a.engine.port())
    }

    pub fn engine(&self) -> Option<&Arc<ProtocolEngine>> {
        self.active.as_ref().map(|a| &a.engine)
    }

    /// Point-in-time check that the engine and both HTTP servers are up.
    pub fn all_running(&self) -> bool {
        self.active.as_ref().is_some_and(|a| {
            a.engine.running() && a.file_server.is_running() && a.asset_server.is_running()
        })
    }

    /// Create and start every service; the wake word goes last.
    ///
    /// The first failure is logged and returned. Services that already
    /// started keep running until [`stop_all`](Self::stop_all) or the next
    /// start, which tears the partial set down before building a fresh one.
    pub fn start_all(&mut self) -> Result<(), RuntimeError> {
        if self.state == LifecycleState::Running && self.all_running() {
            debug!("start requested while already running");
            return Ok(());
        }
        if self.active.is_some() {
            warn!(state = %self.state, "replacing partially started services");
            self.stop_all();
        }
        self.state = LifecycleState::Starting;
        match self.start_sequence() {
            Ok(()) => {
                self.state = LifecycleState::Running;
                info!(port = ?self.protocol_port(), "all services running");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "startup aborted");
                self.state = LifecycleState::Stopped;
                Err(e)
            }
        }
    }

    fn start_sequence(&mut self) -> Result<(), RuntimeError> {
        self.deps.settings.ensure_file();

        let engine = Arc::new(ProtocolEngine::new(
            ProtocolConfig {
                bind_addr: self.config.bind_addr,
                port: self.config.protocol_port,
                ..ProtocolConfig::default()
            },
            Arc::clone(&self.deps.sanitizer),
        ));
        let file_server = self.deps.services.file_server(&self.config);
        let asset_server = self.deps.services.asset_server(&self.config);

        let orchestrator = Arc::new(Orchestrator::new(
            self.deps.orchestrator.clone(),
            self.deps.settings.clone(),
            Arc::clone(&self.deps.cache),
            self.deps.providers.clone(),
            Arc::clone(&self.deps.sanitizer),
        )?);
        let broadcaster: Arc<dyn Broadcaster> = engine.clone();
        orchestrator.set_broadcaster(Arc::downgrade(&broadcaster));
        let handler: Arc<dyn ChatHandler> = orchestrator.clone();
        engine.set_chat_handler(Some(handler));

        let active = self.active.insert(Active {
            engine,
            file_server,
            asset_server,
            orchestrator: Some(orchestrator),
        });

        active.engine.start(self.config.protocol_port)?;
        active.file_server.start()?;
        active.asset_server.start()?;
        self.deps.wake_word.start()?;
        Ok(())
    }

    /// Stop every service independently. Failures are logged and the
    /// remaining services are still stopped.
    pub fn stop_all(&mut self) {
        self.state = LifecycleState::Stopping;
        if let Some(mut active) = self.active.take() {
            if let Err(e) = active.engine.stop() {
                error!(service = "protocol", error = %e, "stop failed");
            }
            for server in [&active.file_server, &active.asset_server] {
                if let Err(e) = server.stop() {
                    error!(service = server.name(), error = %e, "stop failed");
                }
            }
            active.engine.set_chat_handler(None);
            // Last strong reference; dropping it shuts the worker pool down.
            drop(active.orchestrator.take());
        }
        if let Err(e) = self.deps.wake_word.stop() {
            error!(service = "wakeword", error = %e, "stop failed");
        }
        self.state = LifecycleState::Stopped;
        info!("all services stopped");
    }

    pub fn restart_all(&mut self) -> Result<(), RuntimeError> {
        info!("restarting all services");
        self.stop_all();
        self.start_all()
    }

    pub fn start_wake_word(&self) -> Result<(), RuntimeError> {
        self.deps.wake_word.start().map_err(|e| {
            error!(error = %e, "wake word start failed");
            RuntimeError::from(e)
        })
    }

    pub fn stop_wake_word(&self) -> Result<(), RuntimeError> {
        self.deps.wake_word.stop().map_err(|e| {
            error!(error = %e, "wake word stop failed");
            RuntimeError::from(e)
        })
    }

    pub fn restart_wake_word(&self) -> Result<(), RuntimeError> {
        self.stop_wake_word()?;
        self.start_wake_word()
    }

    pub fn wake_word_running(&self) -> bool {
        self.deps.wake_word.is_running()
    }

    /// Run one control-surface action.
    pub fn perform(&mut self, action: ControlAction) -> Result<(), RuntimeError> {
        info!(action = %action, "control action");
        match action {
            ControlAction::Start => self.start_all(),
            ControlAction::Stop => {
                self.stop_all();
                Ok(())
            }
            ControlAction::Restart => self.restart_all(),
            ControlAction::WakeWordStart => self.start_wake_word(),
            ControlAction::WakeWordStop => self.stop_wake_word(),
            ControlAction::WakeWordRestart => self.restart_wake_word(),
        }
    }
}

impl Drop for LifecycleCoordinator {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.stop_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(LifecycleState::Stopped.to_string(), "stopped");
        assert_eq!(LifecycleState::Running.to_string(), "running");
    }

    #[test]
    fn status_services_use_configured_ports() {
        let config = RuntimeConfig {
            file_port: 18080,
            asset_port: 18081,
            ..RuntimeConfig::default()
        };
        let files = StatusServices.file_server(&config);
        let assets = StatusServices.asset_server(&config);
        assert_eq!(files.name(), "files");
        assert_eq!(assets.name(), "assets");
        assert!(!files.is_running());
    }
}
