//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty stdout
//! - Rolling JSON log files via tracing-appender

/// Logging settings.
pub mod config;
/// Subscriber setup.
pub mod logger;

pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
