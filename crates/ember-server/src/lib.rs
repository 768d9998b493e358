//! Network surfaces: the realtime protocol engine and the HTTP status services.
//!
//! The protocol engine speaks newline-delimited JSON frames over plain TCP.
//! Each inbound line gets exactly one response frame on the same connection;
//! broadcasts are queued per client and written by that client's task.

pub mod client;
pub mod codec;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod status;

pub use client::ClientRegistry;
pub use engine::{
    bind_with_retry, ProtocolConfig, ProtocolEngine, DEFAULT_MAX_FRAME_LEN, DEFAULT_PROTOCOL_PORT,
    DEFAULT_SEND_QUEUE,
};
pub use error::ServerError;
pub use protocol::{decode, DecodeError, Dispatcher, InboundMessage};
pub use status::{HealthResponse, StatusServer};
