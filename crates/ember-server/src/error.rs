use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bind failed on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ServerError {
    /// Convert into the coordinator-facing error for `service`.
    pub fn into_service_error(self, service: &str) -> ember_core::ServiceError {
        match self {
            Self::Bind { port, source } => ember_core::ServiceError::Bind {
                service: service.to_string(),
                port,
                reason: source.to_string(),
            },
            other => ember_core::ServiceError::Start {
                service: service.to_string(),
                reason: other.to_string(),
            },
        }
    }
}
