//! Training outcomes at pair, batch, and epoch scope.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::convergence::ConvergenceDecision;
use super::curriculum::RegimeConfig;
use super::regime::Regime;
use super::statistics::{mean, std_dev};

// ---------------------------------------------------------------------------
// TrainingPair
// ---------------------------------------------------------------------------

/// One conversation pair to train on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPair {
    /// Stable identifier.
    pub pair_id: String,
    /// Input text fed to the organism.
    pub input_text: String,
}

impl TrainingPair {
    /// Create a pair.
    pub fn new(pair_id: impl Into<String>, input_text: impl Into<String>) -> Self {
        Self {
            pair_id: pair_id.into(),
            input_text: input_text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TrainingPairResult
// ---------------------------------------------------------------------------

/// Terminal record of one pair's training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPairResult {
    /// Pair identifier.
    pub pair_id: String,
    /// Input text.
    pub input_text: String,
    /// True only when the tracker halted on stability.
    pub converged: bool,
    /// Iterations run.
    pub iterations: usize,
    /// Final tracker decision.
    ///
    /// An aborted pair keeps the last non-terminal decision, `Continue`, so
    /// check [`Self::is_failed`] before treating the decision as terminal.
    pub decision: ConvergenceDecision,
    /// Iteration count at which the pair halted.
    pub converged_at: Option<usize>,
    /// Final tracker reasoning.
    pub reasoning: String,
    /// Latest satisfaction.
    pub final_satisfaction: f64,
    /// Latest field coherence.
    pub final_field_coherence: f64,
    /// Latest spatial variance.
    pub final_spatial_variance: f64,
    /// Latest emission confidence.
    pub final_confidence: f64,
    /// Latest V0 energy.
    pub final_v0: f64,
    /// Latest regime.
    pub final_regime: Regime,
    /// Tau after the last iteration.
    pub final_tau: f64,
    /// Satisfaction per iteration.
    pub satisfaction_history: Vec<f64>,
    /// Regime per iteration.
    pub regime_history: Vec<Regime>,
    /// Tau before the first iteration, then after each one.
    pub tau_history: Vec<f64>,
    /// Collaborator failure that aborted the loop, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When training started.
    pub started_at: DateTime<Utc>,
    /// When training ended.
    pub completed_at: DateTime<Utc>,
}

impl TrainingPairResult {
    /// Whether the organism failed during this pair.
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the pair stopped on the iteration cap.
    pub fn hit_max_iterations(&self) -> bool {
        !self.is_failed() && self.decision == ConvergenceDecision::MaxIterations
    }

    /// Whether the pair reached a terminal decision without failing.
    pub fn is_finished(&self) -> bool {
        !self.is_failed() && self.decision.is_terminal()
    }

    /// Reward credited to this pair: its final emission confidence.
    pub const fn task_reward(&self) -> f64 {
        self.final_confidence
    }
}

// ---------------------------------------------------------------------------
// TrainingBatchReport
// ---------------------------------------------------------------------------

/// Dump of one `train_multiple_pairs` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingBatchReport {
    /// Identifier of this batch.
    pub batch_id: Uuid,
    /// When the batch finished.
    pub created_at: DateTime<Utc>,
    /// Initial tau for every pair.
    pub initial_tau: f64,
    /// Iteration cap per pair.
    pub max_iterations: usize,
    /// Satisfaction target per pair.
    pub satisfaction_target: f64,
    /// Pairs trained.
    pub total_pairs: usize,
    /// Pairs that halted on stability.
    pub converged_pairs: usize,
    /// Per-pair results, in training order.
    pub results: Vec<TrainingPairResult>,
}

// ---------------------------------------------------------------------------
// CouplingSnapshot
// ---------------------------------------------------------------------------

/// Summary and copy of the organism's organ-coupling matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingSnapshot {
    /// Mean coupling strength.
    pub mean: f64,
    /// Standard deviation of coupling strength.
    pub std: f64,
    /// Strongest coupling.
    pub max: f64,
    /// Weakest coupling.
    pub min: f64,
    /// Full matrix, row-major.
    pub matrix: Vec<Vec<f64>>,
}

impl CouplingSnapshot {
    /// Summarise a matrix. An empty matrix yields zeroed statistics.
    pub fn from_matrix(matrix: Vec<Vec<f64>>) -> Self {
        let flat: Vec<f64> = matrix.iter().flatten().copied().collect();
        let (max, min) = if flat.is_empty() {
            (0.0, 0.0)
        } else {
            (
                flat.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                flat.iter().copied().fold(f64::INFINITY, f64::min),
            )
        };
        Self {
            mean: mean(&flat),
            std: std_dev(&flat),
            max,
            min,
            matrix,
        }
    }
}

// ---------------------------------------------------------------------------
// EpochTrainingResult
// ---------------------------------------------------------------------------

/// Aggregate over every pair trained in one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochTrainingResult {
    /// Epoch number.
    pub epoch_id: u32,
    /// Training run this epoch belongs to.
    pub run_id: Uuid,
    /// Name of the governing regime config.
    pub regime_config: String,
    /// Initial tau used for each pair.
    pub initial_tau: f64,
    /// Iteration cap used for each pair.
    pub max_iterations: usize,
    /// Satisfaction target used for each pair.
    pub satisfaction_target: f64,
    /// Pairs attempted.
    pub total_pairs: usize,
    /// Pairs that halted on stability.
    pub converged_pairs: usize,
    /// Pairs that stopped on the iteration cap.
    pub max_iteration_pairs: usize,
    /// Pairs aborted by an organism failure.
    pub failed_pairs: usize,
    /// `converged_pairs / total_pairs`.
    pub convergence_rate: f64,
    /// Mean iterations over completed pairs.
    pub mean_iterations: f64,
    /// Mean final satisfaction over completed pairs.
    pub mean_satisfaction: f64,
    /// Mean final emission confidence over completed pairs.
    pub mean_confidence: f64,
    /// Mean final tau over completed pairs.
    pub mean_tau: f64,
    /// Mean final field coherence over completed pairs.
    pub mean_field_coherence: f64,
    /// Mean final spatial variance over completed pairs.
    pub mean_spatial_variance: f64,
    /// Count of completed pairs by final regime.
    pub regime_distribution: BTreeMap<String, usize>,
    /// Per-pair reward (final emission confidence), completed pairs only.
    pub task_rewards: Vec<f64>,
    /// Mean of `task_rewards`.
    pub epoch_reward: f64,
    /// Global confidence after folding this epoch in.
    pub global_confidence: f64,
    /// When the epoch started.
    pub started_at: DateTime<Utc>,
    /// When the epoch ended.
    pub completed_at: DateTime<Utc>,
    /// Wall-clock duration in seconds.
    pub duration_secs: f64,
    /// Organ-coupling matrix after the epoch, if the organism exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r_matrix_snapshot: Option<CouplingSnapshot>,
}

impl EpochTrainingResult {
    /// Fold per-pair results into epoch statistics.
    ///
    /// Failed pairs count toward `total_pairs` and `failed_pairs` only. Zero
    /// pairs yields zeroed rates and means.
    pub fn aggregate(
        epoch_id: u32,
        run_id: Uuid,
        config: &RegimeConfig,
        pairs: &[TrainingPairResult],
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let completed: Vec<&TrainingPairResult> = pairs.iter().filter(|p| !p.is_failed()).collect();
        let total_pairs = pairs.len();
        let converged_pairs = pairs.iter().filter(|p| p.converged).count();
        let max_iteration_pairs = completed.iter().filter(|p| p.hit_max_iterations()).count();
        let failed_pairs = total_pairs - completed.len();

        let collect = |f: fn(&TrainingPairResult) -> f64| -> Vec<f64> {
            completed.iter().map(|p| f(p)).collect()
        };

        let mut regime_distribution = BTreeMap::new();
        for pair in &completed {
            *regime_distribution
                .entry(pair.final_regime.to_string())
                .or_insert(0) += 1;
        }

        let task_rewards = collect(TrainingPairResult::task_reward);
        let epoch_reward = mean(&task_rewards);

        Self {
            epoch_id,
            run_id,
            regime_config: config.name.clone(),
            initial_tau: config.tau_threshold,
            max_iterations: config.max_iterations,
            satisfaction_target: config.satisfaction_target,
            total_pairs,
            converged_pairs,
            max_iteration_pairs,
            failed_pairs,
            convergence_rate: if total_pairs == 0 {
                0.0
            } else {
                converged_pairs as f64 / total_pairs as f64
            },
            mean_iterations: mean(&collect(|p| p.iterations as f64)),
            mean_satisfaction: mean(&collect(|p| p.final_satisfaction)),
            mean_confidence: mean(&collect(|p| p.final_confidence)),
            mean_tau: mean(&collect(|p| p.final_tau)),
            mean_field_coherence: mean(&collect(|p| p.final_field_coherence)),
            mean_spatial_variance: mean(&collect(|p| p.final_spatial_variance)),
            regime_distribution,
            task_rewards,
            epoch_reward,
            global_confidence: 0.0,
            started_at,
            completed_at,
            duration_secs: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            r_matrix_snapshot: None,
        }
    }

    /// Pairs that finished without an organism failure.
    pub const fn completed_pairs(&self) -> usize {
        self.total_pairs.saturating_sub(self.failed_pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::training::curriculum::default_regime_configs;

    fn pair_result(
        id: &str,
        decision: ConvergenceDecision,
        confidence: f64,
        regime: Regime,
        error: Option<&str>,
    ) -> TrainingPairResult {
        let now = Utc::now();
        TrainingPairResult {
            pair_id: id.to_string(),
            input_text: format!("input {id}"),
            converged: decision == ConvergenceDecision::Halt && error.is_none(),
            iterations: 4,
            decision,
            converged_at: None,
            reasoning: String::new(),
            final_satisfaction: 0.7,
            final_field_coherence: 0.8,
            final_spatial_variance: 0.002,
            final_confidence: confidence,
            final_v0: 0.2,
            final_regime: regime,
            final_tau: 0.5,
            satisfaction_history: vec![0.7; 4],
            regime_history: vec![regime; 4],
            tau_history: vec![0.5; 5],
            error: error.map(String::from),
            started_at: now,
            completed_at: now,
        }
    }

    #[test]
    fn test_aggregate_counts_and_rewards() {
        let config = &default_regime_configs()[0];
        let pairs = vec![
            pair_result("a", ConvergenceDecision::Halt, 0.9, Regime::Stable, None),
            pair_result(
                "b",
                ConvergenceDecision::MaxIterations,
                0.5,
                Regime::Exploring,
                None,
            ),
            pair_result(
                "c",
                ConvergenceDecision::Continue,
                0.0,
                Regime::Initializing,
                Some("boom"),
            ),
        ];
        let now = Utc::now();
        let epoch = EpochTrainingResult::aggregate(3, Uuid::new_v4(), config, &pairs, now, now);

        assert_eq!(epoch.total_pairs, 3);
        assert_eq!(epoch.converged_pairs, 1);
        assert_eq!(epoch.max_iteration_pairs, 1);
        assert_eq!(epoch.failed_pairs, 1);
        assert_eq!(epoch.completed_pairs(), 2);
        assert!((epoch.convergence_rate - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(epoch.task_rewards, vec![0.9, 0.5]);
        assert!((epoch.epoch_reward - 0.7).abs() < 1e-12);
        assert_eq!(epoch.regime_distribution.get("STABLE"), Some(&1));
        assert_eq!(epoch.regime_distribution.get("EXPLORING"), Some(&1));
        assert!(!epoch.regime_distribution.contains_key("INITIALIZING"));
        assert_eq!(epoch.regime_config, "exploration");
    }

    #[test]
    fn test_aggregate_empty_epoch_is_neutral() {
        let config = &default_regime_configs()[0];
        let now = Utc::now();
        let epoch = EpochTrainingResult::aggregate(1, Uuid::new_v4(), config, &[], now, now);
        assert_eq!(epoch.total_pairs, 0);
        assert_eq!(epoch.convergence_rate, 0.0);
        assert_eq!(epoch.epoch_reward, 0.0);
        assert!(epoch.task_rewards.is_empty());
        assert!(epoch.regime_distribution.is_empty());
    }

    #[test]
    fn test_aborted_pair_is_neither_finished_nor_capped() {
        let aborted = pair_result(
            "x",
            ConvergenceDecision::Continue,
            0.0,
            Regime::Initializing,
            Some("down"),
        );
        assert!(aborted.is_failed());
        assert!(!aborted.is_finished());
        assert!(!aborted.hit_max_iterations());

        let capped = pair_result(
            "y",
            ConvergenceDecision::MaxIterations,
            0.4,
            Regime::Exploring,
            None,
        );
        assert!(capped.is_finished());
        assert!(capped.hit_max_iterations());
    }

    #[test]
    fn test_coupling_snapshot_statistics() {
        let snapshot = CouplingSnapshot::from_matrix(vec![vec![0.0, 0.5], vec![0.5, 1.0]]);
        assert!((snapshot.mean - 0.5).abs() < 1e-12);
        assert!((snapshot.max - 1.0).abs() < f64::EPSILON);
        assert!(snapshot.min.abs() < f64::EPSILON);
        assert!(snapshot.std > 0.0);
        assert_eq!(snapshot.matrix.len(), 2);
    }

    #[test]
    fn test_coupling_snapshot_empty_matrix() {
        let snapshot = CouplingSnapshot::from_matrix(Vec::new());
        assert_eq!(snapshot.mean, 0.0);
        assert_eq!(snapshot.max, 0.0);
        assert_eq!(snapshot.min, 0.0);
    }

    #[test]
    fn test_failed_pair_error_round_trips_through_json() {
        let pair = pair_result(
            "x",
            ConvergenceDecision::Continue,
            0.0,
            Regime::Initializing,
            Some("down"),
        );
        let json = serde_json::to_string(&pair).unwrap();
        let back: TrainingPairResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.error.as_deref(), Some("down"));
        assert!(back.is_failed());
    }
}
