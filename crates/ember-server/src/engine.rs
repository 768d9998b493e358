//! The realtime protocol engine: newline-delimited JSON frames over TCP.
//!
//! One OS thread runs a single-threaded tokio runtime that owns the listener
//! and every connection. Other threads reach clients only through the
//! registry's per-client queues.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ember_core::{
    BroadcastOutcome, Broadcaster, ChatHandler, FrameKind, ManagedService, Sanitizer, ServiceError,
};

use crate::client::{ClientRegistry, Registration};
use crate::codec::{FrameCodec, InboundLine};
use crate::error::ServerError;
use crate::protocol::{DecodeError, Dispatcher};

pub const DEFAULT_PROTOCOL_PORT: u16 = 8765;
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;
pub const DEFAULT_SEND_QUEUE: usize = 256;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Clone, Debug)]
pub struct ProtocolConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub max_frame_len: usize,
    pub max_send_queue: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PROTOCOL_PORT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_send_queue: DEFAULT_SEND_QUEUE,
        }
    }
}

struct LoopHandle {
    cancel: CancellationToken,
    thread: JoinHandle<()>,
    port: u16,
}

pub struct ProtocolEngine {
    config: ProtocolConfig,
    registry: Arc<ClientRegistry>,
    dispatcher: Arc<Dispatcher>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<LoopHandle>>,
}

impl ProtocolEngine {
    pub fn new(config: ProtocolConfig, sanitizer: Arc<dyn Sanitizer>) -> Self {
        Self {
            registry: Arc::new(ClientRegistry::new(config.max_send_queue)),
            dispatcher: Arc::new(Dispatcher::new(sanitizer)),
            config,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Route chat messages to `handler`. `None` answers them with an error frame.
    pub fn set_chat_handler(&self, handler: Option<Arc<dyn ChatHandler>>) {
        self.dispatcher.set_chat_handler(handler);
    }

    /// Bind `port` (or `port + 1` if it is taken) and start the event loop.
    /// Returns the bound port. Starting a running engine is a no-op.
    pub fn start(&self, port: u16) -> Result<u16, ServerError> {
        let mut slot = self.handle.lock();
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.port);
        }

        let listener = bind_with_retry(self.config.bind_addr, port)?;
        listener.set_nonblocking(true)?;
        let bound = listener.local_addr()?.port();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let cancel = CancellationToken::new();
        let ctx = LoopContext {
            registry: Arc::clone(&self.registry),
            dispatcher: Arc::clone(&self.dispatcher),
            max_frame_len: self.config.max_frame_len,
            cancel: cancel.clone(),
            running: Arc::clone(&self.running),
        };

        self.running.store(true, Ordering::SeqCst);
        let thread = std::thread::Builder::new()
            .name("ember-protocol".into())
            .spawn(move || run_loop(runtime, listener, ctx))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                ServerError::Io(e)
            })?;

        info!(port = bound, "protocol engine listening");
        *slot = Some(LoopHandle {
            cancel,
            thread,
            port: bound,
        });
        Ok(bound)
    }

    /// Stop the loop and close the listener. In-flight reads are abandoned.
    pub fn stop(&self) -> Result<(), ServerError> {
        let Some(handle) = self.handle.lock().take() else {
            return Ok(());
        };
        self.running.store(false, Ordering::SeqCst);
        handle.cancel.cancel();
        let joined = handle.thread.join();
        self.registry.clear();
        if joined.is_err() {
            error!(port = handle.port, "protocol thread panicked");
            return Err(ServerError::Runtime("protocol thread panicked".into()));
        }
        info!(port = handle.port, "protocol engine stopped");
        Ok(())
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bound port while running.
    pub fn port(&self) -> Option<u16> {
        self.handle.lock().as_ref().map(|h| h.port)
    }

    pub fn client_count(&self) -> usize {
        self.registry.count()
    }
}

impl Broadcaster for ProtocolEngine {
    fn broadcast(&self, text: &str) -> BroadcastOutcome {
        let line = self.dispatcher.frame(FrameKind::Broadcast, text).to_json();
        let outcome = self.registry.broadcast(&line);
        if outcome.failed() > 0 {
            warn!(
                attempted = outcome.attempted,
                failed = outcome.failed(),
                "broadcast not delivered to every client"
            );
        }
        outcome
    }
}

impl ManagedService for ProtocolEngine {
    fn name(&self) -> &str {
        "protocol"
    }

    fn start(&self) -> Result<(), ServiceError> {
        ProtocolEngine::start(self, self.config.port)
            .map(|_| ())
            .map_err(|e| e.into_service_error("protocol"))
    }

    fn stop(&self) -> Result<(), ServiceError> {
        ProtocolEngine::stop(self).map_err(|e| ServiceError::Stop {
            service: "protocol".into(),
            reason: e.to_string(),
        })
    }

    fn is_running(&self) -> bool {
        self.running()
    }
}

impl Drop for ProtocolEngine {
    fn drop(&mut self) {
        let _ = ProtocolEngine::stop(self);
    }
}

/// Bind, retrying exactly once on the next port when the address is taken.
pub fn bind_with_retry(addr: IpAddr, port: u16) -> Result<StdTcpListener, ServerError> {
    match StdTcpListener::bind((addr, port)) {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == io::ErrorKind::AddrInUse && port != 0 => {
            let Some(next) = port.checked_add(1) else {
                return Err(ServerError::Bind { port, source: e });
            };
            warn!(port, retry = next, "port in use, retrying once");
            StdTcpListener::bind((addr, next)).map_err(|source| {
                error!(port = next, error = %source, "retry bind failed");
                ServerError::Bind { port: next, source }
            })
        }
        Err(source) => {
            error!(port, error = %source, "bind failed");
            Err(ServerError::Bind { port, source })
        }
    }
}

struct LoopContext {
    registry: Arc<ClientRegistry>,
    dispatcher: Arc<Dispatcher>,
    max_frame_len: usize,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
}

fn run_loop(runtime: Runtime, listener: StdTcpListener, ctx: LoopContext) {
    let ctx = Arc::new(ctx);
    let loop_ctx = Arc::clone(&ctx);
    runtime.block_on(async move {
        let listener = match TcpListener::from_std(listener) {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "failed to register listener");
                return;
            }
        };

        loop {
            tokio::select! {
                () = loop_ctx.cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        drop(tokio::spawn(serve_connection(stream, peer, Arc::clone(&loop_ctx))));
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }
    });
    ctx.running.store(false, Ordering::SeqCst);
    // Dropping the runtime tears down every connection task.
    drop(runtime);
    debug!("protocol loop exited");
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, ctx: Arc<LoopContext>) {
    let (id, mut outbound) = ctx.registry.register(peer);
    let _registration = Registration::new(Arc::clone(&ctx.registry), id.clone());
    info!(client_id = %id, peer = %peer, "client connected");

    let mut framed = Framed::new(stream, FrameCodec::new(ctx.max_frame_len));
    let welcome = ctx
        .dispatcher
        .frame(FrameKind::Welcome, &format!("Connected as {id}"));
    if framed.send(welcome.to_json()).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            inbound = framed.next() => match inbound {
                None => {
                    debug!(client_id = %id, "client closed connection");
                    break;
                }
                Some(Ok(inbound)) => {
                    let reply = match inbound {
                        InboundLine::Text(line) if line.trim().is_empty() => continue,
                        InboundLine::Text(line) => ctx.dispatcher.respond(&line).await,
                        InboundLine::InvalidUtf8 => {
                            debug!(client_id = %id, "rejected non UTF-8 frame");
                            ctx.dispatcher
                                .frame(FrameKind::Error, &DecodeError::Malformed.to_string())
                        }
                        InboundLine::TooLong => ctx.dispatcher.frame(FrameKind::Error, "Frame too long"),
                    };
                    if framed.send(reply.to_json()).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    debug!(client_id = %id, error = %e, "read failed");
                    break;
                }
            },
            queued = outbound.recv() => match queued {
                Some(line) => {
                    if framed.send(line).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }
    info!(client_id = %id, "client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ember_core::{Frame, TextSanitizer};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

    struct Upper;

    #[async_trait]
    impl ChatHandler for Upper {
        async fn handle_chat(&self, message: String, _persona: String) -> String {
            message.to_uppercase()
        }
    }

    fn engine() -> ProtocolEngine {
        ProtocolEngine::new(
            ProtocolConfig {
                bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port: 0,
                ..ProtocolConfig::default()
            },
            Arc::new(TextSanitizer::default()),
        )
    }

    struct TestClient {
        lines: tokio::io::Lines<BufReader<OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    }

    impl TestClient {
        async fn connect(port: u16) -> Self {
            let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
            let (read, writer) = stream.into_split();
            let mut client = Self {
                lines: BufReader::new(read).lines(),
                writer,
            };
            let welcome = client.recv().await;
            assert!(welcome.is(FrameKind::Welcome));
            assert!(welcome.content.starts_with("Connected as client_"));
            client
        }

        async fn send(&mut self, line: &str) {
            self.send_bytes(line.as_bytes()).await;
        }

        async fn send_bytes(&mut self, line: &[u8]) {
            self.writer.write_all(line).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
        }

        async fn recv(&mut self) -> Frame {
            let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
                .await
                .expect("timed out waiting for frame")
                .unwrap()
                .expect("connection closed");
            serde_json::from_str(&line).unwrap()
        }
    }

    async fn wait_for_clients(engine: &ProtocolEngine, n: usize) {
        for _ in 0..200 {
            if engine.client_count() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {n} clients, have {}", engine.client_count());
    }

    #[tokio::test]
    async fn ping_pong_and_errors_keep_connection_open() {
        let engine = engine();
        let port = engine.start(0).unwrap();
        assert!(engine.running());
        let mut client = TestClient::connect(port).await;

        client.send(r#"{"type":"ping"}"#).await;
        assert!(client.recv().await.is(FrameKind::Pong));

        client.send(r#"{"type":"launch_rom"}"#).await;
        let err = client.recv().await;
        assert!(err.is(FrameKind::Error));
        assert_eq!(err.content, "Unknown message type: launch_rom");

        client.send("{{{").await;
        assert!(client.recv().await.is(FrameKind::Error));

        client.send(r#"{"type":"ping"}"#).await;
        assert!(client.recv().await.is(FrameKind::Pong));

        engine.stop().unwrap();
        assert!(!engine.running());
    }

    #[tokio::test]
    async fn responses_arrive_in_order() {
        let engine = engine();
        engine.set_chat_handler(Some(Arc::new(Upper)));
        let port = engine.start(0).unwrap();
        let mut client = TestClient::connect(port).await;

        client.send(r#"{"type":"chat_message","content":"one"}"#).await;
        client.send(r#"{"type":"ping"}"#).await;
        client.send(r#"{"type":"chat_message","content":"two"}"#).await;

        assert_eq!(client.recv().await.content, "ONE");
        assert!(client.recv().await.is(FrameKind::Pong));
        assert_eq!(client.recv().await.content, "TWO");
        engine.stop().unwrap();
    }

    #[tokio::test]
    async fn over_long_line_gets_error_frame() {
        let engine = ProtocolEngine::new(
            ProtocolConfig {
                bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
                max_frame_len: 64,
                ..ProtocolConfig::default()
            },
            Arc::new(TextSanitizer::default()),
        );
        let port = engine.start(0).unwrap();
        let mut client = TestClient::connect(port).await;

        client.send(&format!(r#"{{"type":"typing","content":"{}"}}"#, "x".repeat(200))).await;
        let err = client.recv().await;
        assert!(err.is(FrameKind::Error));
        assert_eq!(err.content, "Frame too long");

        client.send(r#"{"type":"ping"}"#).await;
        assert!(client.recv().await.is(FrameKind::Pong));
        engine.stop().unwrap();
    }

    #[tokio::test]
    async fn non_utf8_line_gets_error_frame_and_connection_survives() {
        let engine = engine();
        let port = engine.start(0).unwrap();
        let mut client = TestClient::connect(port).await;

        client
            .send_bytes(b"{\"type\":\"chat_message\",\"content\":\"\xff\xfe\"}")
            .await;
        let err = client.recv().await;
        assert!(err.is(FrameKind::Error));
        assert_eq!(err.content, "Invalid message format");

        client.send(r#"{"type":"ping"}"#).await;
        assert!(client.recv().await.is(FrameKind::Pong));
        engine.stop().unwrap();
    }

    #[tokio::test]
    async fn broadcast_fans_out_to_every_client() {
        let engine = engine();
        let port = engine.start(0).unwrap();
        let mut clients = Vec::new();
        for _ in 0..3 {
            clients.push(TestClient::connect(port).await);
        }
        wait_for_clients(&engine, 3).await;

        let outcome = engine.broadcast("<b>news</b>");
        assert_eq!(outcome, BroadcastOutcome { attempted: 3, delivered: 3 });
        for client in &mut clients {
            let frame = client.recv().await;
            assert!(frame.is(FrameKind::Broadcast));
            assert_eq!(frame.content, "news");
        }
        engine.stop().unwrap();
    }

    #[tokio::test]
    async fn end_of_stream_deregisters_client() {
        let engine = engine();
        let port = engine.start(0).unwrap();
        let client = TestClient::connect(port).await;
        wait_for_clients(&engine, 1).await;

        drop(client);
        wait_for_clients(&engine, 0).await;
        engine.stop().unwrap();
    }

    #[test]
    fn port_in_use_retries_next_port_once() {
        let blocker = StdTcpListener::bind(("127.0.0.1", 0)).unwrap();
        let taken = blocker.local_addr().unwrap().port();
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let Ok(listener) = bind_with_retry(localhost, taken) else {
            // Next port happened to be busy too; nothing to assert.
            return;
        };
        assert_eq!(listener.local_addr().unwrap().port(), taken + 1);
    }

    #[test]
    fn second_failure_is_fatal() {
        let first = StdTcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = first.local_addr().unwrap().port();
        let Ok(_second) = StdTcpListener::bind(("127.0.0.1", port + 1)) else {
            return;
        };
        let engine = engine();
        let err = engine.start(port).unwrap_err();
        assert!(matches!(err, ServerError::Bind { port: p, .. } if p == port + 1));
        assert!(!engine.running());
    }

    #[test]
    fn start_is_idempotent_and_stop_clears_state() {
        let engine = engine();
        let port = engine.start(0).unwrap();
        assert_eq!(engine.start(0).unwrap(), port);
        assert_eq!(engine.port(), Some(port));

        engine.stop().unwrap();
        assert_eq!(engine.port(), None);
        engine.stop().unwrap();
    }

    #[test]
    fn managed_service_uses_configured_port() {
        let engine = engine();
        ManagedService::start(&engine).unwrap();
        assert!(engine.is_running());
        ManagedService::stop(&engine).unwrap();
        assert!(!engine.is_running());
    }
}
