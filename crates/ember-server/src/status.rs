//! Minimal HTTP service used for the file and asset endpoints.
//!
//! Serving content is the host's job; the runtime only needs the port held
//! and a `/health` route that proves the service is up.

use std::net::{IpAddr, SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use ember_core::{ManagedService, ServiceError};

use crate::error::ServerError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub uptime_secs: u64,
}

#[derive(Clone)]
struct AppState {
    service: Arc<str>,
    started: Instant,
}

struct Running {
    cancel: CancellationToken,
    thread: JoinHandle<()>,
    port: u16,
}

pub struct StatusServer {
    name: String,
    bind_addr: IpAddr,
    port: u16,
    running: Mutex<Option<Running>>,
}

impl StatusServer {
    pub fn new(name: impl Into<String>, bind_addr: IpAddr, port: u16) -> Self {
        Self {
            name: name.into(),
            bind_addr,
            port,
            running: Mutex::new(None),
        }
    }

    pub fn router(&self) -> Router {
        router(AppState {
            service: Arc::from(self.name.as_str()),
            started: Instant::now(),
        })
    }

    /// Port actually bound, while running.
    pub fn bound_port(&self) -> Option<u16> {
        self.running.lock().as_ref().map(|r| r.port)
    }

    fn launch(&self) -> Result<Running, ServerError> {
        let listener = StdTcpListener::bind(SocketAddr::new(self.bind_addr, self.port))
            .map_err(|source| ServerError::Bind {
                port: self.port,
                source,
            })?;
        listener.set_nonblocking(true)?;
        let port = listener.local_addr()?.port();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let router = self.router();
        let name = self.name.clone();

        let thread = std::thread::Builder::new()
            .name(format!("ember-{name}"))
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(l) => l,
                        Err(e) => {
                            error!(service = %name, error = %e, "failed to register listener");
                            return;
                        }
                    };
                    let served = axum::serve(listener, router)
                        .with_graceful_shutdown(async move { shutdown.cancelled().await })
                        .await;
                    if let Err(e) = served {
                        error!(service = %name, error = %e, "http service failed");
                    }
                });
            })?;

        Ok(Running {
            cancel,
            thread,
            port,
        })
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        service: state.service.to_string(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

impl ManagedService for StatusServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<(), ServiceError> {
        let mut slot = self.running.lock();
        if slot.is_some() {
            return Ok(());
        }
        let running = self.launch().map_err(|e| {
            error!(service = %self.name, port = self.port, error = %e, "start failed");
            e.into_service_error(&self.name)
        })?;
        info!(service = %self.name, port = running.port, "http service listening");
        *slot = Some(running);
        Ok(())
    }

    fn stop(&self) -> Result<(), ServiceError> {
        let Some(running) = self.running.lock().take() else {
            return Ok(());
        };
        running.cancel.cancel();
        if running.thread.join().is_err() {
            return Err(ServiceError::Stop {
                service: self.name.clone(),
                reason: "service thread panicked".into(),
            });
        }
        info!(service = %self.name, "http service stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

impl Drop for StatusServer {
    fn drop(&mut self) {
        let _ = ManagedService::stop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn server() -> StatusServer {
        StatusServer::new("files", IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[tokio::test]
    async fn health_reports_service_name() {
        let server = server();
        server.start().unwrap();
        let port = server.bound_port().unwrap();

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: HealthResponse = resp.json().await.unwrap();
        assert_eq!(body.status, "ok");
        assert_eq!(body.service, "files");

        server.stop().unwrap();
        assert!(!server.is_running());
        assert!(server.bound_port().is_none());
    }

    #[test]
    fn occupied_port_is_bind_error() {
        let blocker = StdTcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = blocker.local_addr().unwrap().port();
        let server = StatusServer::new("assets", IpAddr::V4(Ipv4Addr::LOCALHOST), port);

        let err = server.start().unwrap_err();
        assert!(matches!(err, ServiceError::Bind { port: p, .. } if p == port));
        assert!(!server.is_running());
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let server = server();
        server.start().unwrap();
        let port = server.bound_port();
        server.start().unwrap();
        assert_eq!(server.bound_port(), port);

        server.stop().unwrap();
        server.stop().unwrap();
    }
}
