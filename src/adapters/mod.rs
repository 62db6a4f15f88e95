//! Adapters implementing the domain ports.

pub mod json_store;
pub mod scripted_organism;

pub use json_store::JsonTrainingStore;
pub use scripted_organism::{ScriptStep, ScriptedOrganism};
