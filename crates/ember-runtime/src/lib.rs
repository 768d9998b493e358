//! # ember-runtime
//!
//! Wires the configuration synchronizer, protocol engine, completion
//! orchestrator and HTTP services together and drives their lifecycle.
//!
//! ```no_run
//! use ember_runtime::{LifecycleCoordinator, RuntimeConfig};
//!
//! let mut runtime = LifecycleCoordinator::open(RuntimeConfig::from_env())?;
//! runtime.start_all()?;
//! # Ok::<(), ember_runtime::RuntimeError>(())
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod control;
pub mod coordinator;
pub mod error;
pub mod wakeword;

pub use config::RuntimeConfig;
pub use control::ControlAction;
pub use coordinator::{
    Collaborators, LifecycleCoordinator, LifecycleState, ServiceFactory, StatusServices,
};
pub use error::RuntimeError;
pub use wakeword::ConfiguredWakeWord;
