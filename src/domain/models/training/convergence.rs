//! Per-pair convergence tracking.
//!
//! A [`ConvergenceTracker`] owns the append-only iteration log for one training
//! pair and decides, after each iteration, whether the pair has converged.
//!
//! ## Decision Order
//!
//! 1. Fewer than `min_iterations` records -> `Continue`.
//! 2. `max_iterations` reached -> `MaxIterations` (a terminal state, but never
//!    a successful halt).
//! 3. Fewer than `min_iterations_for_stability` records -> `Continue`.
//! 4. Over the trailing stability window, three independent checks:
//!    satisfaction (low variance, mean at or above target), coherence (low
//!    variance, high mean), and spatial variance (low mean, and low variance of
//!    the variance series itself).
//! 5. A latest regime of Initializing or Exploring forces `Continue`.
//! 6. All three checks pass -> `Halt`; otherwise `Continue`, naming what failed.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::regime::Regime;
use super::statistics::{mean, trailing, variance};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Records required before any decision other than `Continue`.
pub const MIN_ITERATIONS: usize = 2;

/// Records required before stability is evaluated.
pub const MIN_ITERATIONS_FOR_STABILITY: usize = 3;

/// Default trailing window for stability statistics.
pub const STABILITY_WINDOW: usize = 5;

/// Default iteration cap per pair.
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Default satisfaction target.
pub const DEFAULT_SATISFACTION_TARGET: f64 = 0.75;

// ---------------------------------------------------------------------------
// ConvergenceCriteria
// ---------------------------------------------------------------------------

/// Thresholds for the stability checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceCriteria {
    /// Trailing window size for stability statistics.
    pub stability_window: usize,
    /// Records required before any terminal decision.
    pub min_iterations: usize,
    /// Records required before stability is evaluated.
    pub min_iterations_for_stability: usize,
    /// Satisfaction variance must be strictly below this.
    pub max_satisfaction_variance: f64,
    /// Coherence variance must be strictly below this.
    pub max_coherence_variance: f64,
    /// Coherence mean must be at or above this.
    pub min_coherence: f64,
    /// Spatial variance mean must be strictly below this.
    pub max_spatial_variance: f64,
    /// Variance of the spatial variance series must be strictly below this.
    pub max_spatial_variance_variance: f64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            stability_window: STABILITY_WINDOW,
            min_iterations: MIN_ITERATIONS,
            min_iterations_for_stability: MIN_ITERATIONS_FOR_STABILITY,
            max_satisfaction_variance: 0.01,
            max_coherence_variance: 0.015,
            min_coherence: 0.70,
            max_spatial_variance: 0.005,
            max_spatial_variance_variance: 0.0005,
        }
    }
}

// ---------------------------------------------------------------------------
// IterationRecord
// ---------------------------------------------------------------------------

/// Measurements from one iteration, before they are indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationInput {
    /// Satisfaction (0.0 -- 1.0).
    pub satisfaction: f64,
    /// Field coherence (0.0 -- 1.0).
    pub field_coherence: f64,
    /// Spatial variance (>= 0.0).
    pub spatial_variance: f64,
    /// Emission confidence (0.0 -- 1.0).
    pub emission_confidence: f64,
    /// Final V0 descent energy; lower is more settled.
    pub v0_final: f64,
    /// Descent cycles the organism needed.
    pub convergence_cycles: u32,
    /// Regime assigned to this iteration.
    pub regime: Option<Regime>,
    /// Tau in effect after this iteration.
    pub tau: Option<f64>,
}

/// One recorded iteration. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Zero-based position in the tracker's log.
    pub iteration: usize,
    /// Satisfaction (0.0 -- 1.0).
    pub satisfaction: f64,
    /// Field coherence (0.0 -- 1.0).
    pub field_coherence: f64,
    /// Spatial variance (>= 0.0).
    pub spatial_variance: f64,
    /// Emission confidence (0.0 -- 1.0).
    pub emission_confidence: f64,
    /// Final V0 descent energy.
    pub v0_final: f64,
    /// Descent cycles the organism needed.
    pub convergence_cycles: u32,
    /// Regime assigned to this iteration.
    pub regime: Option<Regime>,
    /// Tau in effect after this iteration.
    pub tau: Option<f64>,
}

// ---------------------------------------------------------------------------
// ConvergenceDecision / ConvergenceResult
// ---------------------------------------------------------------------------

/// What the trainer should do after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConvergenceDecision {
    /// Keep iterating.
    Continue,
    /// Converged; stop.
    Halt,
    /// Iteration cap reached without converging; stop.
    MaxIterations,
}

impl ConvergenceDecision {
    /// Whether this decision ends the pair's loop.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Continue)
    }
}

impl fmt::Display for ConvergenceDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Continue => "CONTINUE",
            Self::Halt => "HALT",
            Self::MaxIterations => "MAX_ITERATIONS",
        })
    }
}

/// Mean and variance of one series over the stability window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Window mean.
    pub mean: f64,
    /// Window population variance.
    pub variance: f64,
}

impl WindowStats {
    fn of(values: &[f64]) -> Self {
        Self {
            mean: mean(values),
            variance: variance(values),
        }
    }
}

/// Outcome of evaluating a tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceResult {
    /// The decision.
    pub decision: ConvergenceDecision,
    /// Records evaluated.
    pub iteration_count: usize,
    /// Iteration count at which the pair first halted.
    pub converged_at: Option<usize>,
    /// Explanation, naming failed checks on `Continue`.
    pub reasoning: String,
    /// Satisfaction check passed.
    pub satisfaction_stable: bool,
    /// Coherence check passed.
    pub coherence_stable: bool,
    /// Spatial variance check passed.
    pub variance_stable: bool,
    /// Window statistics for satisfaction.
    pub satisfaction_window: WindowStats,
    /// Window statistics for coherence.
    pub coherence_window: WindowStats,
    /// Window statistics for spatial variance.
    pub spatial_variance_window: WindowStats,
    /// Latest satisfaction.
    pub final_satisfaction: f64,
    /// Latest coherence.
    pub final_coherence: f64,
    /// Latest spatial variance.
    pub final_spatial_variance: f64,
    /// Latest emission confidence.
    pub final_confidence: f64,
    /// Latest regime.
    pub final_regime: Option<Regime>,
    /// Latest tau.
    pub final_tau: Option<f64>,
}

impl ConvergenceResult {
    /// Whether all three stability checks passed.
    pub const fn fully_stable(&self) -> bool {
        self.satisfaction_stable && self.coherence_stable && self.variance_stable
    }
}

// ---------------------------------------------------------------------------
// ConvergenceTracker
// ---------------------------------------------------------------------------

/// Append-only iteration log and convergence state for one training pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceTracker {
    satisfaction_target: f64,
    max_iterations: usize,
    criteria: ConvergenceCriteria,
    records: Vec<IterationRecord>,
    converged: bool,
    converged_at: Option<usize>,
}

impl ConvergenceTracker {
    /// Create a tracker with default criteria.
    pub fn new(satisfaction_target: f64, max_iterations: usize) -> Self {
        Self::with_criteria(satisfaction_target, max_iterations, ConvergenceCriteria::default())
    }

    /// Create a tracker with explicit criteria.
    pub const fn with_criteria(
        satisfaction_target: f64,
        max_iterations: usize,
        criteria: ConvergenceCriteria,
    ) -> Self {
        Self {
            satisfaction_target,
            max_iterations,
            criteria,
            records: Vec::new(),
            converged: false,
            converged_at: None,
        }
    }

    /// Append an iteration and return the stored record.
    pub fn record_iteration(&mut self, input: IterationInput) -> &IterationRecord {
        let record = IterationRecord {
            iteration: self.records.len(),
            satisfaction: input.satisfaction,
            field_coherence: input.field_coherence,
            spatial_variance: input.spatial_variance,
            emission_confidence: input.emission_confidence,
            v0_final: input.v0_final,
            convergence_cycles: input.convergence_cycles,
            regime: input.regime,
            tau: input.tau,
        };
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Decide whether the pair should keep iterating.
    ///
    /// Sets the terminal flag on `Halt` or `MaxIterations`. `converged_at` is
    /// written only on the first `Halt`.
    pub fn evaluate_convergence(&mut self) -> ConvergenceResult {
        let count = self.records.len();

        if count < self.criteria.min_iterations {
            return self.early_result(
                ConvergenceDecision::Continue,
                format!(
                    "Minimum not met: {count} of {} iterations",
                    self.criteria.min_iterations
                ),
            );
        }

        if count >= self.max_iterations {
            self.converged = true;
            return self.early_result(
                ConvergenceDecision::MaxIterations,
                format!("Max reached: {count} of {} iterations", self.max_iterations),
            );
        }

        if count < self.criteria.min_iterations_for_stability {
            return self.early_result(
                ConvergenceDecision::Continue,
                format!(
                    "Too few iterations for stability: {count} of {}",
                    self.criteria.min_iterations_for_stability
                ),
            );
        }

        let window = self.criteria.stability_window.max(1);
        let satisfaction = self.satisfaction_history();
        let coherence = self.coherence_history();
        let spatial = self.spatial_variance_history();

        let satisfaction_window = WindowStats::of(trailing(&satisfaction, window));
        let coherence_window = WindowStats::of(trailing(&coherence, window));
        let spatial_variance_window = WindowStats::of(trailing(&spatial, window));

        let satisfaction_stable = satisfaction_window.variance
            < self.criteria.max_satisfaction_variance
            && satisfaction_window.mean >= self.satisfaction_target;
        let coherence_stable = coherence_window.variance < self.criteria.max_coherence_variance
            && coherence_window.mean >= self.criteria.min_coherence;
        let variance_stable = spatial_variance_window.mean < self.criteria.max_spatial_variance
            && spatial_variance_window.variance < self.criteria.max_spatial_variance_variance;

        let mut result = self.early_result(ConvergenceDecision::Continue, String::new());
        result.satisfaction_stable = satisfaction_stable;
        result.coherence_stable = coherence_stable;
        result.variance_stable = variance_stable;
        result.satisfaction_window = satisfaction_window;
        result.coherence_window = coherence_window;
        result.spatial_variance_window = spatial_variance_window;

        let stable_count = [satisfaction_stable, coherence_stable, variance_stable]
            .iter()
            .filter(|s| **s)
            .count();

        if let Some(regime) = result.final_regime.filter(|r| r.forces_continue()) {
            result.reasoning = format!(
                "Regime {regime} forces continue ({stable_count}/3 stable)"
            );
            return result;
        }

        if result.fully_stable() {
            self.converged = true;
            if self.converged_at.is_none() {
                self.converged_at = Some(count);
            }
            result.decision = ConvergenceDecision::Halt;
            result.converged_at = self.converged_at;
            result.reasoning = format!(
                "Converged at iteration {count}: satisfaction {:.3} (var {:.5}), \
                 coherence {:.3} (var {:.5}), spatial variance {:.5} (var {:.7})",
                satisfaction_window.mean,
                satisfaction_window.variance,
                coherence_window.mean,
                coherence_window.variance,
                spatial_variance_window.mean,
                spatial_variance_window.variance,
            );
            return result;
        }

        let mut failures = Vec::new();
        if !satisfaction_stable {
            failures.push(if satisfaction_window.mean < self.satisfaction_target {
                format!(
                    "satisfaction {:.3} below target {:.3}",
                    satisfaction_window.mean, self.satisfaction_target
                )
            } else {
                format!(
                    "satisfaction still noisy (var {:.5})",
                    satisfaction_window.variance
                )
            });
        }
        if !coherence_stable {
            failures.push(if coherence_window.mean < self.criteria.min_coherence {
                format!("coherence {:.3} still low", coherence_window.mean)
            } else {
                format!("coherence still noisy (var {:.5})", coherence_window.variance)
            });
        }
        if !variance_stable {
            failures.push(
                if spatial_variance_window.mean >= self.criteria.max_spatial_variance {
                    format!(
                        "spatial variance still high ({:.5})",
                        spatial_variance_window.mean
                    )
                } else {
                    format!(
                        "spatial variance still fluctuating (var {:.7})",
                        spatial_variance_window.variance
                    )
                },
            );
        }

        result.reasoning = format!("{stable_count}/3 stable, {}", failures.join(", "));
        result
    }

    /// Result carrying only the decision, reasoning, and final snapshot.
    fn early_result(&self, decision: ConvergenceDecision, reasoning: String) -> ConvergenceResult {
        let latest = self.records.last();
        ConvergenceResult {
            decision,
            iteration_count: self.records.len(),
            converged_at: self.converged_at,
            reasoning,
            satisfaction_stable: false,
            coherence_stable: false,
            variance_stable: false,
            satisfaction_window: WindowStats::default(),
            coherence_window: WindowStats::default(),
            spatial_variance_window: WindowStats::default(),
            final_satisfaction: latest.map_or(0.0, |r| r.satisfaction),
            final_coherence: latest.map_or(0.0, |r| r.field_coherence),
            final_spatial_variance: latest.map_or(0.0, |r| r.spatial_variance),
            final_confidence: latest.map_or(0.0, |r| r.emission_confidence),
            final_regime: latest.and_then(|r| r.regime),
            final_tau: latest.and_then(|r| r.tau),
        }
    }

    /// Recorded iterations, oldest first.
    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    /// The most recent record.
    pub fn latest(&self) -> Option<&IterationRecord> {
        self.records.last()
    }

    /// Number of recorded iterations.
    pub fn iteration_count(&self) -> usize {
        self.records.len()
    }

    /// Satisfaction series, oldest first.
    pub fn satisfaction_history(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.satisfaction).collect()
    }

    /// Coherence series, oldest first.
    pub fn coherence_history(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.field_coherence).collect()
    }

    /// Spatial variance series, oldest first.
    pub fn spatial_variance_history(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.spatial_variance).collect()
    }

    /// Whether the tracker reached a terminal decision.
    pub const fn is_converged(&self) -> bool {
        self.converged
    }

    /// Iteration count of the first `Halt`.
    pub const fn converged_at(&self) -> Option<usize> {
        self.converged_at
    }

    /// Satisfaction target this tracker checks against.
    pub const fn satisfaction_target(&self) -> f64 {
        self.satisfaction_target
    }

    /// Iteration cap.
    pub const fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn input(
        satisfaction: f64,
        coherence: f64,
        spatial_variance: f64,
        regime: Option<Regime>,
    ) -> IterationInput {
        IterationInput {
            satisfaction,
            field_coherence: coherence,
            spatial_variance,
            emission_confidence: 0.8,
            v0_final: 0.1,
            convergence_cycles: 4,
            regime,
            tau: Some(0.5),
        }
    }

    #[test]
    fn test_record_iteration_indexes_sequentially() {
        let mut tracker = ConvergenceTracker::new(0.75, 5);
        assert_eq!(tracker.record_iteration(input(0.5, 0.7, 0.001, None)).iteration, 0);
        assert_eq!(tracker.record_iteration(input(0.6, 0.7, 0.001, None)).iteration, 1);
        assert_eq!(tracker.iteration_count(), 2);
    }

    #[test]
    fn test_minimum_not_met() {
        let mut tracker = ConvergenceTracker::new(0.75, 5);
        let result = tracker.evaluate_convergence();
        assert_eq!(result.decision, ConvergenceDecision::Continue);
        assert!(result.reasoning.contains("Minimum not met"));

        tracker.record_iteration(input(0.9, 0.9, 0.001, Some(Regime::Stable)));
        assert_eq!(
            tracker.evaluate_convergence().decision,
            ConvergenceDecision::Continue
        );
    }

    #[test]
    fn test_two_iterations_is_too_few_for_stability() {
        let mut tracker = ConvergenceTracker::new(0.75, 5);
        for _ in 0..2 {
            tracker.record_iteration(input(0.9, 0.9, 0.001, Some(Regime::Stable)));
        }
        let result = tracker.evaluate_convergence();
        assert_eq!(result.decision, ConvergenceDecision::Continue);
        assert!(!result.fully_stable());
    }

    #[test]
    fn test_identical_stable_iterations_halt() {
        let mut tracker = ConvergenceTracker::new(0.75, 10);
        let mut decisions = Vec::new();
        for _ in 0..5 {
            tracker.record_iteration(input(0.80, 0.80, 0.001, Some(Regime::Stable)));
            decisions.push(tracker.evaluate_convergence());
        }
        assert_eq!(decisions[2].decision, ConvergenceDecision::Halt);
        assert_eq!(decisions[4].decision, ConvergenceDecision::Halt);
        assert_eq!(tracker.converged_at(), Some(3));
        assert_eq!(decisions[4].converged_at, Some(3));
        assert!(tracker.is_converged());
    }

    #[test]
    fn test_max_iterations_preempts_regime_gate() {
        let mut tracker = ConvergenceTracker::new(0.75, 3);
        tracker.record_iteration(input(0.80, 0.80, 0.001, Some(Regime::Initializing)));
        tracker.record_iteration(input(0.80, 0.80, 0.001, Some(Regime::Initializing)));
        tracker.record_iteration(input(0.80, 0.80, 0.001, Some(Regime::Exploring)));
        let result = tracker.evaluate_convergence();
        assert_eq!(result.decision, ConvergenceDecision::MaxIterations);
        assert!(result.converged_at.is_none());
        assert!(tracker.is_converged());
        assert!(tracker.converged_at().is_none());
    }

    #[test]
    fn test_exploring_regime_forces_continue() {
        let mut tracker = ConvergenceTracker::new(0.75, 10);
        for _ in 0..4 {
            tracker.record_iteration(input(0.80, 0.80, 0.001, Some(Regime::Exploring)));
        }
        let result = tracker.evaluate_convergence();
        assert_eq!(result.decision, ConvergenceDecision::Continue);
        assert!(result.fully_stable());
        assert!(result.reasoning.contains("EXPLORING"));
        assert!(!tracker.is_converged());
    }

    #[test]
    fn test_high_spatial_variance_blocks_halt() {
        let mut tracker = ConvergenceTracker::new(0.75, 10);
        for _ in 0..4 {
            tracker.record_iteration(input(0.80, 0.80, 0.008, Some(Regime::Stable)));
        }
        let result = tracker.evaluate_convergence();
        assert_eq!(result.decision, ConvergenceDecision::Continue);
        assert!(result.satisfaction_stable);
        assert!(result.coherence_stable);
        assert!(!result.variance_stable);
        assert!(result.reasoning.starts_with("2/3 stable"));
        assert!(result.reasoning.contains("spatial variance still high"));
    }

    #[test]
    fn test_low_satisfaction_blocks_halt() {
        let mut tracker = ConvergenceTracker::new(0.75, 10);
        for _ in 0..4 {
            tracker.record_iteration(input(0.60, 0.80, 0.001, Some(Regime::Stable)));
        }
        let result = tracker.evaluate_convergence();
        assert_eq!(result.decision, ConvergenceDecision::Continue);
        assert!(!result.satisfaction_stable);
        assert!(result.reasoning.contains("below target"));
    }

    #[test]
    fn test_low_coherence_blocks_halt() {
        let mut tracker = ConvergenceTracker::new(0.75, 10);
        for _ in 0..4 {
            tracker.record_iteration(input(0.80, 0.55, 0.001, Some(Regime::Stable)));
        }
        let result = tracker.evaluate_convergence();
        assert_eq!(result.decision, ConvergenceDecision::Continue);
        assert!(!result.coherence_stable);
        assert!(result.reasoning.contains("coherence"));
    }

    #[test]
    fn test_window_only_sees_trailing_records() {
        let mut tracker = ConvergenceTracker::new(0.75, 20);
        for _ in 0..3 {
            tracker.record_iteration(input(0.10, 0.20, 0.05, Some(Regime::Exploring)));
        }
        for _ in 0..5 {
            tracker.record_iteration(input(0.85, 0.85, 0.001, Some(Regime::Stable)));
        }
        let result = tracker.evaluate_convergence();
        assert_eq!(result.decision, ConvergenceDecision::Halt);
        assert_eq!(result.converged_at, Some(8));
    }

    #[test]
    fn test_final_snapshot_tracks_latest_record() {
        let mut tracker = ConvergenceTracker::new(0.75, 10);
        tracker.record_iteration(input(0.4, 0.6, 0.002, Some(Regime::Initializing)));
        tracker.record_iteration(input(0.7, 0.65, 0.003, Some(Regime::Initializing)));
        let result = tracker.evaluate_convergence();
        assert!((result.final_satisfaction - 0.7).abs() < f64::EPSILON);
        assert!((result.final_coherence - 0.65).abs() < f64::EPSILON);
        assert_eq!(result.final_regime, Some(Regime::Initializing));
        assert_eq!(result.final_tau, Some(0.5));
    }

    #[test]
    fn test_unknown_regime_does_not_gate() {
        let mut tracker = ConvergenceTracker::new(0.75, 10);
        for _ in 0..3 {
            tracker.record_iteration(input(0.80, 0.80, 0.001, None));
        }
        assert_eq!(
            tracker.evaluate_convergence().decision,
            ConvergenceDecision::Halt
        );
    }
}
