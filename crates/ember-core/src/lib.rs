pub mod errors;
pub mod frame;
pub mod ids;
pub mod prefs;
pub mod sanitize;
pub mod service;

pub use errors::GatewayError;
pub use frame::{Frame, FrameKind};
pub use ids::ClientId;
pub use prefs::PrefValue;
pub use sanitize::{Sanitizer, TextSanitizer};
pub use service::{
    resolve_persona, BroadcastOutcome, Broadcaster, ChatHandler, ManagedService, ServiceError,
    WakeWordListener, DEFAULT_PERSONA,
};

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
