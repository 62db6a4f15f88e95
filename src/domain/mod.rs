//! Domain layer for the organism trainer
//!
//! This module contains the training models, the pure regime and threshold
//! logic, and the ports the services depend on.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
