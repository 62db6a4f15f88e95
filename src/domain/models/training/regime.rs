//! Regime classification for a training pair's satisfaction history.
//!
//! Every pair's training run moves through a small set of dynamical regimes:
//! warming up, exploring, converging, holding a stable high level, committing
//! to that level, or stalling on a low plateau. The classifier looks at the
//! satisfaction series recorded so far and names the regime, together with an
//! **evolution rate** that the threshold evolver uses to scale its tau step.
//!
//! ## Classification Algorithm
//!
//! An ordered rule cascade; the first matching rule wins:
//!
//! 1. **Initializing** -- empty history, or fewer than [`WARMUP_ITERATIONS`]
//!    iterations completed (warm-up gate, independent of the statistics).
//! 2. **Committed** -- at least [`COMMITTED_MIN_ITERATIONS`] iterations, high
//!    and tight window, flat overall trend.
//! 3. **Plateaued** -- at least [`PLATEAUED_MIN_ITERATIONS`] iterations, flat
//!    trend, window mean below [`HIGH_SATISFACTION`].
//! 4. **Stable** -- high and tight window without the commitment evidence.
//! 5. **Converging** -- rising trend while the window variance shrinks relative
//!    to the whole history.
//! 6. **Exploring** -- fallback.
//!
//! The wave-aware variant ([`classify_regime_with_wave`]) never changes the
//! regime. It only strengthens or weakens confidence using the organism's
//! appetitive phase, spatial variance, and field coherence.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::statistics::{linear_trend, mean, std_dev, trailing, variance};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Window mean at or above which satisfaction counts as "high".
pub const HIGH_SATISFACTION: f64 = 0.65;

/// Window standard deviation at or below which satisfaction counts as "tight".
pub const LOW_VARIANCE: f64 = 0.05;

/// Trend at or above which the history counts as rising.
pub const CONVERGING_TREND: f64 = 0.02;

/// Absolute trend at or below which the history counts as flat.
pub const PLATEAU_BAND: f64 = 0.005;

/// Size of the trailing window used for local statistics.
pub const CLASSIFIER_WINDOW: usize = 5;

/// Iterations that must complete before any regime other than Initializing.
pub const WARMUP_ITERATIONS: usize = 3;

/// Iterations required before a pair may be classified as Committed.
pub const COMMITTED_MIN_ITERATIONS: usize = 10;

/// Iterations required before a pair may be classified as Plateaued.
pub const PLATEAUED_MIN_ITERATIONS: usize = 15;

/// Latest spatial variance above which the organism is still spreading out.
const WAVE_HIGH_SPATIAL_VARIANCE: f64 = 0.005;

/// Latest field coherence at or above which the field reads as organised.
const WAVE_HIGH_COHERENCE: f64 = 0.70;

/// Latest field coherence below which the field reads as fragmented.
const WAVE_LOW_COHERENCE: f64 = 0.60;

// ---------------------------------------------------------------------------
// Regime
// ---------------------------------------------------------------------------

/// The training dynamics a pair is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    /// Warm-up; not enough iterations to say anything.
    Initializing,
    /// Mixed or noisy satisfaction; the organism is still searching.
    Exploring,
    /// Satisfaction is rising and settling.
    Converging,
    /// High, low-noise satisfaction.
    Stable,
    /// High, low-noise, flat satisfaction sustained over many iterations.
    Committed,
    /// Flat satisfaction stuck below the high band.
    Plateaued,
}

impl Regime {
    /// All regimes, in cascade-independent declaration order.
    pub const ALL: [Self; 6] = [
        Self::Initializing,
        Self::Exploring,
        Self::Converging,
        Self::Stable,
        Self::Committed,
        Self::Plateaued,
    ];

    /// Multiplier applied to tau evolution while in this regime.
    ///
    /// Plateaued uses the full rate as an aggressive escape signal; settled
    /// regimes move tau slowly.
    pub const fn evolution_rate(self) -> f64 {
        match self {
            Self::Initializing | Self::Committed => 0.1,
            Self::Exploring => 0.3,
            Self::Converging => 0.5,
            Self::Stable => 0.2,
            Self::Plateaued => 1.0,
        }
    }

    /// Whether a pair in this regime must keep iterating regardless of
    /// stability.
    pub const fn forces_continue(self) -> bool {
        matches!(self, Self::Initializing | Self::Exploring)
    }

    /// Upper-case label used in logs and persisted artifacts.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "INITIALIZING",
            Self::Exploring => "EXPLORING",
            Self::Converging => "CONVERGING",
            Self::Stable => "STABLE",
            Self::Committed => "COMMITTED",
            Self::Plateaued => "PLATEAUED",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Regime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown regime: {s}"))
    }
}

// ---------------------------------------------------------------------------
// AppetitivePhase
// ---------------------------------------------------------------------------

/// The organism's wave-training phase for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppetitivePhase {
    /// Reaching outward; evolution is damped.
    Expansive,
    /// Steering between options; neutral.
    Navigation,
    /// Drawing together into a decision; evolution is amplified.
    Concrescence,
}

impl AppetitivePhase {
    /// Multiplier this phase contributes to tau modulation.
    pub const fn tau_factor(self) -> f64 {
        match self {
            Self::Expansive => 0.7,
            Self::Navigation => 1.0,
            Self::Concrescence => 1.3,
        }
    }

    /// Upper-case label used in logs and reasoning strings.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Expansive => "EXPANSIVE",
            Self::Navigation => "NAVIGATION",
            Self::Concrescence => "CONCRESCENCE",
        }
    }
}

impl fmt::Display for AppetitivePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppetitivePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EXPANSIVE" => Ok(Self::Expansive),
            "NAVIGATION" => Ok(Self::Navigation),
            "CONCRESCENCE" => Ok(Self::Concrescence),
            other => Err(format!("unknown appetitive phase: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// WaveContext
// ---------------------------------------------------------------------------

/// Per-iteration wave-training signals that accompany a satisfaction history.
///
/// Every series is optional in practice; an empty vector simply contributes
/// nothing to the confidence adjustment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveContext {
    /// Appetitive phase for each iteration, `None` where none was reported.
    pub phases: Vec<Option<AppetitivePhase>>,
    /// Spatial variance for each iteration.
    pub spatial_variance: Vec<f64>,
    /// Field coherence for each iteration.
    pub field_coherence: Vec<f64>,
}

// ---------------------------------------------------------------------------
// RegimeClassification
// ---------------------------------------------------------------------------

/// Result of classifying a satisfaction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeClassification {
    /// The classified regime.
    pub regime: Regime,

    /// Tau evolution multiplier for this regime.
    pub evolution_rate: f64,

    /// Heuristic confidence in the classification (0.0 -- 1.0).
    pub confidence: f64,

    /// Human-readable explanation of the rule that fired.
    pub reasoning: String,

    /// Mean of the whole satisfaction history.
    pub mean_satisfaction: f64,

    /// Population variance of the whole satisfaction history.
    pub satisfaction_variance: f64,

    /// OLS slope of satisfaction against iteration index.
    pub trend: f64,

    /// Mean of the trailing stability window.
    pub window_mean: f64,

    /// Standard deviation of the trailing stability window.
    pub window_std: f64,
}

impl RegimeClassification {
    fn initializing(confidence: f64, reasoning: String) -> Self {
        Self {
            regime: Regime::Initializing,
            evolution_rate: Regime::Initializing.evolution_rate(),
            confidence,
            reasoning,
            mean_satisfaction: 0.0,
            satisfaction_variance: 0.0,
            trend: 0.0,
            window_mean: 0.0,
            window_std: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// classify_regime
// ---------------------------------------------------------------------------

/// Classify the training regime of a satisfaction history.
///
/// `iteration_count` is the 1-based number of iterations completed. It gates
/// warm-up on its own, so an artificially long history with a small count is
/// still Initializing.
///
/// Pure and total: every input yields a classification.
pub fn classify_regime(
    satisfaction_history: &[f64],
    iteration_count: usize,
) -> RegimeClassification {
    if satisfaction_history.is_empty() {
        return RegimeClassification::initializing(
            1.0,
            String::from("No satisfaction history yet"),
        );
    }

    if iteration_count < WARMUP_ITERATIONS {
        let mut warmup = RegimeClassification::initializing(
            0.9,
            format!(
                "Warm-up: {iteration_count} of {WARMUP_ITERATIONS} iterations completed"
            ),
        );
        warmup.mean_satisfaction = mean(satisfaction_history);
        warmup.satisfaction_variance = variance(satisfaction_history);
        return warmup;
    }

    let window = trailing(satisfaction_history, CLASSIFIER_WINDOW);
    let window_mean = mean(window);
    let window_std = std_dev(window);
    let overall_mean = mean(satisfaction_history);
    let overall_variance = variance(satisfaction_history);
    let overall_std = overall_variance.sqrt();
    let trend = linear_trend(satisfaction_history);

    let high = window_mean >= HIGH_SATISFACTION;
    let tight = window_std <= LOW_VARIANCE;
    let flat = trend.abs() <= PLATEAU_BAND;

    let (regime, confidence, reasoning) = if iteration_count >= COMMITTED_MIN_ITERATIONS
        && high
        && tight
        && flat
    {
        (
            Regime::Committed,
            0.9,
            format!(
                "Committed after {iteration_count} iterations: window mean {window_mean:.3} \
                 >= {HIGH_SATISFACTION}, std {window_std:.4} <= {LOW_VARIANCE}, \
                 trend {trend:+.4} within +/-{PLATEAU_BAND}"
            ),
        )
    } else if iteration_count >= PLATEAUED_MIN_ITERATIONS && flat && !high {
        let extra = (iteration_count - PLATEAUED_MIN_ITERATIONS) as f64;
        (
            Regime::Plateaued,
            (0.7 + extra * 0.02).min(0.9),
            format!(
                "Plateaued after {iteration_count} iterations: trend {trend:+.4} flat \
                 but window mean {window_mean:.3} below {HIGH_SATISFACTION}"
            ),
        )
    } else if high && tight {
        (
            Regime::Stable,
            0.8,
            format!(
                "Stable: window mean {window_mean:.3} >= {HIGH_SATISFACTION}, \
                 std {window_std:.4} <= {LOW_VARIANCE}"
            ),
        )
    } else if trend >= CONVERGING_TREND && window_std < overall_std {
        (
            Regime::Converging,
            (0.5 + trend * 5.0).min(0.9),
            format!(
                "Converging: trend {trend:+.4} >= {CONVERGING_TREND}, window std \
                 {window_std:.4} shrinking below overall {overall_std:.4}"
            ),
        )
    } else {
        (
            Regime::Exploring,
            0.4,
            format!(
                "Exploring: window mean {window_mean:.3}, std {window_std:.4}, \
                 trend {trend:+.4}; no settled pattern"
            ),
        )
    };

    RegimeClassification {
        regime,
        evolution_rate: regime.evolution_rate(),
        confidence,
        reasoning,
        mean_satisfaction: overall_mean,
        satisfaction_variance: overall_variance,
        trend,
        window_mean,
        window_std,
    }
}

// ---------------------------------------------------------------------------
// classify_regime_with_wave
// ---------------------------------------------------------------------------

/// Classify a satisfaction history, adjusting confidence with wave signals.
///
/// The regime and evolution rate are always those of [`classify_regime`]; only
/// `confidence` and `reasoning` change, based on the latest entry of each wave
/// series.
pub fn classify_regime_with_wave(
    satisfaction_history: &[f64],
    iteration_count: usize,
    wave: &WaveContext,
) -> RegimeClassification {
    let mut classification = classify_regime(satisfaction_history, iteration_count);
    if classification.regime == Regime::Initializing {
        return classification;
    }

    let settled = matches!(classification.regime, Regime::Stable | Regime::Committed);
    let mut delta = 0.0;
    let mut notes = Vec::new();

    if let Some(&Some(phase)) = wave.phases.last() {
        let shift = match (phase, classification.regime) {
            (AppetitivePhase::Concrescence, _) if settled => 0.1,
            (AppetitivePhase::Concrescence, Regime::Exploring) => -0.1,
            (AppetitivePhase::Expansive, Regime::Exploring) => 0.1,
            (AppetitivePhase::Expansive, _) if settled => -0.1,
            (AppetitivePhase::Navigation, Regime::Converging) => 0.1,
            _ => 0.0,
        };
        if shift != 0.0 {
            delta += shift;
            notes.push(format!("phase {phase} {shift:+.2}"));
        }
    }

    if let Some(&sv) = wave.spatial_variance.last() {
        if sv > WAVE_HIGH_SPATIAL_VARIANCE {
            let shift = if settled {
                -0.1
            } else if classification.regime == Regime::Exploring {
                0.05
            } else {
                0.0
            };
            if shift != 0.0 {
                delta += shift;
                notes.push(format!("spatial variance {sv:.4} {shift:+.2}"));
            }
        }
    }

    if let Some(&fc) = wave.field_coherence.last() {
        let shift = if fc >= WAVE_HIGH_COHERENCE
            && (settled || classification.regime == Regime::Converging)
        {
            0.05
        } else if fc < WAVE_LOW_COHERENCE && settled {
            -0.05
        } else {
            0.0
        };
        if shift != 0.0 {
            delta += shift;
            notes.push(format!("coherence {fc:.3} {shift:+.2}"));
        }
    }

    if !notes.is_empty() {
        classification.confidence = (classification.confidence + delta).clamp(0.0, 1.0);
        classification.reasoning = format!(
            "{} [wave: {}]",
            classification.reasoning,
            notes.join(", ")
        );
    }

    classification
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
