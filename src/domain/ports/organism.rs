//! Organism port
//!
//! The organism is the external system being trained: it takes one input text,
//! runs its internal convergence cycles, and reports how satisfied it was with
//! the result. It owns its learned state (coupling matrix, families) and
//! mutates it on every call, so callers must await one `process` at a time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::training::{AppetitivePhase, Regime};

/// Default crisis zone passed to the organism.
pub const DEFAULT_CRISIS_ZONE: u8 = 1;

/// Steering hints passed to the organism on each call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplorationContext {
    /// Regime of the previous iteration (`Exploring` on the first).
    pub regime: Regime,
    /// Exploration pressure from the epoch's regime config.
    pub urgency: f64,
    /// Crisis zone the organism should operate in.
    pub crisis_zone: u8,
}

impl ExplorationContext {
    /// Context in the default crisis zone.
    pub const fn new(regime: Regime, urgency: f64) -> Self {
        Self {
            regime,
            urgency,
            crisis_zone: DEFAULT_CRISIS_ZONE,
        }
    }
}

/// One processing outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganismResponse {
    /// Satisfaction with the produced response (0.0 -- 1.0).
    pub satisfaction: f64,
    /// V0 energy at the end of the convergence cycles.
    pub v0_final_energy: f64,
    /// Internal convergence cycles run.
    pub convergence_cycles: u32,
    /// Confidence in the emitted response (0.0 -- 1.0).
    pub emission_confidence: f64,
    /// Measured field coherence, when the organism reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_coherence: Option<f64>,
    /// Measured spatial variance, when the organism reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_variance: Option<f64>,
    /// Current wave-training phase, when the organism runs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appetitive_phase: Option<AppetitivePhase>,
}

impl OrganismResponse {
    /// Response carrying only the signals every organism reports.
    pub const fn new(
        satisfaction: f64,
        v0_final_energy: f64,
        convergence_cycles: u32,
        emission_confidence: f64,
    ) -> Self {
        Self {
            satisfaction,
            v0_final_energy,
            convergence_cycles,
            emission_confidence,
            field_coherence: None,
            spatial_variance: None,
            appetitive_phase: None,
        }
    }

    /// Attach a measured field coherence.
    #[must_use]
    pub fn with_field_coherence(mut self, field_coherence: f64) -> Self {
        self.field_coherence = Some(field_coherence);
        self
    }

    /// Attach a measured spatial variance.
    #[must_use]
    pub fn with_spatial_variance(mut self, spatial_variance: f64) -> Self {
        self.spatial_variance = Some(spatial_variance);
        self
    }

    /// Attach the current appetitive phase.
    #[must_use]
    pub fn with_phase(mut self, phase: AppetitivePhase) -> Self {
        self.appetitive_phase = Some(phase);
        self
    }
}

/// The system under training.
#[async_trait]
pub trait Organism: Send + Sync {
    /// Process one input under the given exploration context.
    async fn process(
        &self,
        input_text: &str,
        context: &ExplorationContext,
    ) -> DomainResult<OrganismResponse>;

    /// Current organ-coupling matrix, if the organism keeps one.
    async fn coupling_matrix(&self) -> Option<Vec<Vec<f64>>> {
        None
    }

    /// Number of learned families, if the organism clusters them.
    async fn family_count(&self) -> Option<u64> {
        None
    }
}
