//! Deterministic organism that replays scripted responses.
//!
//! Each input text has its own script. Calls for an input advance through its
//! script and repeat the last step once the script is exhausted. Inputs with no
//! script fall back to the default script.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{ExplorationContext, Organism, OrganismResponse};

/// Coupling weights drift toward each response's satisfaction at this rate.
const COUPLING_LEARNING_RATE: f64 = 0.05;

/// One scripted call outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Return this response.
    Respond(OrganismResponse),
    /// Fail with this reason.
    Fail(String),
}

impl From<OrganismResponse> for ScriptStep {
    fn from(response: OrganismResponse) -> Self {
        Self::Respond(response)
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    cursors: HashMap<String, usize>,
    contexts: Vec<ExplorationContext>,
    coupling: Option<Vec<Vec<f64>>>,
}

/// Replays per-input response scripts.
#[derive(Debug, Default)]
pub struct ScriptedOrganism {
    scripts: HashMap<String, Vec<ScriptStep>>,
    default_script: Vec<ScriptStep>,
    families: Option<u64>,
    calls: AtomicUsize,
    state: Mutex<ScriptState>,
}

impl ScriptedOrganism {
    /// Organism with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Organism that gives the same response to every call.
    pub fn constant(response: OrganismResponse) -> Self {
        Self::new().with_default_script(vec![ScriptStep::Respond(response)])
    }

    /// Script used for inputs without their own script.
    #[must_use]
    pub fn with_default_script(mut self, steps: Vec<ScriptStep>) -> Self {
        self.default_script = steps;
        self
    }

    /// Script for one input text.
    #[must_use]
    pub fn with_script(mut self, input_text: impl Into<String>, steps: Vec<ScriptStep>) -> Self {
        self.scripts.insert(input_text.into(), steps);
        self
    }

    /// Expose a coupling matrix that learns from each response.
    #[must_use]
    pub fn with_coupling_matrix(mut self, matrix: Vec<Vec<f64>>) -> Self {
        self.state.get_mut().coupling = Some(matrix);
        self
    }

    /// Report a fixed family count.
    #[must_use]
    pub fn with_family_count(mut self, families: u64) -> Self {
        self.families = Some(families);
        self
    }

    /// Total `process` calls, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Contexts received, in call order.
    pub async fn contexts(&self) -> Vec<ExplorationContext> {
        self.state.lock().await.contexts.clone()
    }
}

#[async_trait]
impl Organism for ScriptedOrganism {
    async fn process(
        &self,
        input_text: &str,
        context: &ExplorationContext,
    ) -> DomainResult<OrganismResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let script = self
            .scripts
            .get(input_text)
            .unwrap_or(&self.default_script);

        let mut state = self.state.lock().await;
        state.contexts.push(*context);

        let cursor = state.cursors.entry(input_text.to_string()).or_insert(0);
        let Some(step) = script.get(*cursor).or_else(|| script.last()) else {
            return Err(DomainError::OrganismFailure(format!(
                "no script for input '{input_text}'"
            )));
        };
        *cursor += 1;

        match step {
            ScriptStep::Fail(reason) => Err(DomainError::OrganismFailure(reason.clone())),
            ScriptStep::Respond(response) => {
                if let Some(matrix) = state.coupling.as_mut() {
                    for weight in matrix.iter_mut().flatten() {
                        *weight += COUPLING_LEARNING_RATE * (response.satisfaction - *weight);
                    }
                }
                Ok(response.clone())
            }
        }
    }

    async fn coupling_matrix(&self) -> Option<Vec<Vec<f64>>> {
        self.state.lock().await.coupling.clone()
    }

    async fn family_count(&self) -> Option<u64> {
        self.families
    }
}
