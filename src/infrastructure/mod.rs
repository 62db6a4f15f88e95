//! Infrastructure layer module
//!
//! Process-level concerns that sit outside the training domain:
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod logging;
