//! Tau (acceptance threshold) evolution.
//!
//! After each classified iteration the trainer nudges tau toward the
//! satisfaction the organism actually reached. The raw step is proportional to
//! the distance from the target and the regime's evolution rate; three
//! independent factors then damp or amplify it:
//!
//! - **Appetitive phase** -- EXPANSIVE x0.7, NAVIGATION x1.0, CONCRESCENCE x1.3.
//! - **High spatial variance** -- x0.5 while the organism is still spread out.
//! - **Low field coherence** -- x0.6, applied only when tau would rise.
//!
//! The factors compound. The result is clamped to [`MIN_TAU`, `MAX_TAU`].

use serde::{Deserialize, Serialize};

use super::regime::{AppetitivePhase, Regime};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Lower safety bound for tau.
pub const MIN_TAU: f64 = 0.30;

/// Upper safety bound for tau.
pub const MAX_TAU: f64 = 0.75;

/// Scale applied to every raw tau step.
pub const BASE_SCALE: f64 = 0.10;

/// Spatial variance above which evolution is halved.
pub const HIGH_SPATIAL_VARIANCE: f64 = 0.005;

/// Multiplier applied while spatial variance is high.
pub const HIGH_VARIANCE_FACTOR: f64 = 0.5;

/// Field coherence below which raising tau is damped.
pub const LOW_FIELD_COHERENCE: f64 = 0.60;

/// Multiplier applied to a rising step while coherence is low.
pub const LOW_COHERENCE_FACTOR: f64 = 0.6;

// ---------------------------------------------------------------------------
// TauEvolutionRequest
// ---------------------------------------------------------------------------

/// Inputs for one tau evolution step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TauEvolutionRequest {
    /// Current tau.
    pub tau: f64,
    /// Satisfaction reached on this iteration.
    pub satisfaction: f64,
    /// Satisfaction the pair is trained toward.
    pub target: f64,
    /// Regime the pair is in.
    pub regime: Regime,
    /// Explicit evolution rate; defaults to the regime's rate.
    pub rate: Option<f64>,
    /// Appetitive phase, if the organism reported one.
    pub phase: Option<AppetitivePhase>,
    /// Spatial variance of the organism's field.
    pub spatial_variance: Option<f64>,
    /// Field coherence of the organism's field.
    pub field_coherence: Option<f64>,
}

impl TauEvolutionRequest {
    /// Create a request with no modulation inputs.
    pub const fn new(tau: f64, satisfaction: f64, target: f64, regime: Regime) -> Self {
        Self {
            tau,
            satisfaction,
            target,
            regime,
            rate: None,
            phase: None,
            spatial_variance: None,
            field_coherence: None,
        }
    }

    /// Override the regime's evolution rate.
    #[must_use]
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Attach an appetitive phase.
    #[must_use]
    pub fn with_phase(mut self, phase: AppetitivePhase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Attach a phase by label. Unrecognised labels are ignored.
    #[must_use]
    pub fn with_phase_label(mut self, label: &str) -> Self {
        self.phase = label.parse().ok();
        self
    }

    /// Attach the field's spatial variance.
    #[must_use]
    pub fn with_spatial_variance(mut self, spatial_variance: f64) -> Self {
        self.spatial_variance = Some(spatial_variance);
        self
    }

    /// Attach the field's coherence.
    #[must_use]
    pub fn with_field_coherence(mut self, field_coherence: f64) -> Self {
        self.field_coherence = Some(field_coherence);
        self
    }
}

// ---------------------------------------------------------------------------
// TauEvolutionResult
// ---------------------------------------------------------------------------

/// A modulation factor that was active during an evolution step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "factor", rename_all = "snake_case")]
pub enum ModulationFactor {
    /// Appetitive phase factor.
    Phase {
        /// The reported phase.
        phase: AppetitivePhase,
        /// Its multiplier.
        multiplier: f64,
    },
    /// Spatial variance above [`HIGH_SPATIAL_VARIANCE`].
    HighSpatialVariance {
        /// The observed spatial variance.
        spatial_variance: f64,
    },
    /// Coherence below [`LOW_FIELD_COHERENCE`] while raising tau.
    LowFieldCoherence {
        /// The observed coherence.
        field_coherence: f64,
    },
}

impl ModulationFactor {
    /// The multiplier this factor contributes.
    pub const fn multiplier(&self) -> f64 {
        match self {
            Self::Phase { multiplier, .. } => *multiplier,
            Self::HighSpatialVariance { .. } => HIGH_VARIANCE_FACTOR,
            Self::LowFieldCoherence { .. } => LOW_COHERENCE_FACTOR,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Phase { phase, multiplier } => format!("phase {phase} x{multiplier:.1}"),
            Self::HighSpatialVariance { spatial_variance } => format!(
                "spatial variance {spatial_variance:.4} > {HIGH_SPATIAL_VARIANCE} \
                 x{HIGH_VARIANCE_FACTOR}"
            ),
            Self::LowFieldCoherence { field_coherence } => format!(
                "field coherence {field_coherence:.3} < {LOW_FIELD_COHERENCE} while raising \
                 x{LOW_COHERENCE_FACTOR}"
            ),
        }
    }
}

/// Outcome of one tau evolution step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TauEvolutionResult {
    /// Tau before the step.
    pub tau_old: f64,
    /// Tau after the step, within [`MIN_TAU`, `MAX_TAU`].
    pub tau_new: f64,
    /// Signed step after modulation, before clamping.
    pub adjustment: f64,
    /// Sign of `satisfaction - target`.
    pub direction: i8,
    /// `|satisfaction - target|`.
    pub magnitude: f64,
    /// Evolution rate used.
    pub evolution_rate: f64,
    /// Regime the step was taken in.
    pub regime: Regime,
    /// Product of all active modulation factors.
    pub modulation: f64,
    /// Active modulation factors, in application order.
    pub factors: Vec<ModulationFactor>,
    /// Whether clamping changed the unbounded result.
    pub bounded: bool,
    /// Audit-trail explanation naming every active factor.
    pub reasoning: String,
}

// ---------------------------------------------------------------------------
// evolve_tau
// ---------------------------------------------------------------------------

/// Compute the next tau for a pair.
///
/// Pure and total. A satisfaction exactly at target produces a zero step, so
/// tau only changes if it was already outside the safety bounds.
pub fn evolve_tau(request: &TauEvolutionRequest) -> TauEvolutionResult {
    let delta = request.satisfaction - request.target;
    let direction: i8 = if delta > 0.0 {
        1
    } else if delta < 0.0 {
        -1
    } else {
        0
    };
    let magnitude = delta.abs();
    let rate = request.rate.unwrap_or_else(|| request.regime.evolution_rate());

    let base_adjustment = f64::from(direction) * magnitude * rate * BASE_SCALE;

    let mut factors = Vec::new();
    if let Some(phase) = request.phase {
        factors.push(ModulationFactor::Phase {
            phase,
            multiplier: phase.tau_factor(),
        });
    }
    if let Some(spatial_variance) = request.spatial_variance {
        if spatial_variance > HIGH_SPATIAL_VARIANCE {
            factors.push(ModulationFactor::HighSpatialVariance { spatial_variance });
        }
    }
    if let Some(field_coherence) = request.field_coherence {
        if field_coherence < LOW_FIELD_COHERENCE && direction > 0 {
            factors.push(ModulationFactor::LowFieldCoherence { field_coherence });
        }
    }

    let modulation: f64 = factors.iter().map(ModulationFactor::multiplier).product();
    let adjustment = base_adjustment * modulation;
    let unbounded = request.tau + adjustment;
    let tau_new = unbounded.clamp(MIN_TAU, MAX_TAU);
    #[allow(clippy::float_cmp)]
    let bounded = tau_new != unbounded;

    let verb = match direction {
        1 => "raise",
        -1 => "lower",
        _ => "hold",
    };
    let mut reasoning = format!(
        "{} regime: satisfaction {:.3} vs target {:.3} -> {verb} tau by {:+.5} \
         (rate {rate:.2}, modulation x{modulation:.3})",
        request.regime, request.satisfaction, request.target, adjustment
    );
    if !factors.is_empty() {
        let described: Vec<String> = factors.iter().map(ModulationFactor::describe).collect();
        reasoning.push_str(&format!("; factors: {}", described.join(", ")));
    }
    if bounded {
        reasoning.push_str(&format!(
            "; clamped {unbounded:.4} to [{MIN_TAU}, {MAX_TAU}]"
        ));
    }

    TauEvolutionResult {
        tau_old: request.tau,
        tau_new,
        adjustment,
        direction,
        magnitude,
        evolution_rate: rate,
        regime: request.regime,
        modulation,
        factors,
        bounded,
        reasoning,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
