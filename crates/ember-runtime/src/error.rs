use ember_core::{GatewayError, ServiceError};
use ember_engine::EngineError;
use ember_server::ServerError;
use ember_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("protocol engine: {0}")]
    Server(#[from] ServerError),

    #[error("orchestrator: {0}")]
    Engine(#[from] EngineError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("provider: {0}")]
    Gateway(#[from] GatewayError),

    #[error("unknown control action: {0}")]
    UnknownAction(String),
}
