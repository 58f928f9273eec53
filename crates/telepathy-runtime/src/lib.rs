//! Telepathy Runtime - async execution of protocol runs
//!
//! Wraps the blocking [`telepathy_protocol::ProtocolRunner`] for tokio:
//! - [`ConcurrentRunner`] puts provider work on blocking tasks, optionally
//!   measures Alice and Bob at the same time, and enforces a run deadline
//! - [`RuntimeConfig`] loads settings from defaults, JSON or the environment
//! - [`init_logging`] installs the `tracing` subscriber

pub mod config;
pub mod executor;
pub mod logging;

pub use config::{ConfigError, LogConfig, LogFormat, RuntimeConfig};
pub use executor::{ConcurrentRunner, RuntimeStats};
pub use logging::init_logging;
