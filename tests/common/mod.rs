//! Common test utilities for integration tests
//!
//! Provides shared organism scripts, corpora, and orchestrator setup used
//! across multiple integration test files.
#![allow(dead_code)]

use std::sync::Arc;

use organism_trainer::adapters::{JsonTrainingStore, ScriptStep, ScriptedOrganism};
use organism_trainer::domain::ports::OrganismResponse;
use organism_trainer::services::{EpochOrchestrator, OrchestratorConfig};
use organism_trainer::TrainingPair;
use tempfile::TempDir;

pub type TestOrchestrator = EpochOrchestrator<ScriptedOrganism, JsonTrainingStore>;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// High, settled response that halts after warm-up
pub fn steady_response() -> OrganismResponse {
    OrganismResponse::new(0.85, 0.1, 2, 0.9)
        .with_field_coherence(0.85)
        .with_spatial_variance(0.001)
}

/// Alternating satisfaction with high V0 energy; never stabilises
pub fn noisy_script(len: usize) -> Vec<ScriptStep> {
    (0..len)
        .map(|i| {
            let satisfaction = if i % 2 == 0 { 0.2 } else { 0.9 };
            OrganismResponse::new(satisfaction, 0.9, 6, 0.4).into()
        })
        .collect()
}

/// Organism that answers every input with [`steady_response`]
pub fn steady_organism() -> ScriptedOrganism {
    ScriptedOrganism::constant(steady_response())
        .with_coupling_matrix(vec![vec![0.2, 0.4], vec![0.4, 0.2]])
        .with_family_count(5)
}

/// `n` pairs with ids `pair-<i>` and inputs `input <i>`
pub fn corpus(n: usize) -> Vec<TrainingPair> {
    (0..n)
        .map(|i| TrainingPair::new(format!("pair-{i}"), format!("input {i}")))
        .collect()
}

/// Seeded orchestrator writing into `dir`
pub async fn orchestrator(organism: ScriptedOrganism, dir: &TempDir) -> TestOrchestrator {
    let config = OrchestratorConfig {
        seed: Some(7),
        ..OrchestratorConfig::default()
    };
    EpochOrchestrator::new(
        Arc::new(organism),
        Arc::new(JsonTrainingStore::new(dir.path())),
        config,
    )
    .await
    .expect("Failed to build orchestrator")
}
