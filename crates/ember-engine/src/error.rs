#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] std::io::Error),

    #[error("provider setup failed: {0}")]
    Provider(#[from] ember_core::GatewayError),
}
