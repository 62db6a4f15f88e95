//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces the training services depend on:
//! - Organism: the external system being trained
//! - FieldSignalProxy: derivation of field signals the organism omits
//! - TrainingStore: checkpoint and result persistence
//!
//! Adapters implementing these live in `crate::adapters`.

pub mod organism;
pub mod signal_proxy;
/// Checkpoint and result persistence.
pub mod training_store;

pub use organism::{ExplorationContext, Organism, OrganismResponse, DEFAULT_CRISIS_ZONE};
pub use signal_proxy::{FieldSignalProxy, FieldSignals, LinearFieldProxy};
pub use training_store::TrainingStore;
