//! Cross-epoch training accumulator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::results::EpochTrainingResult;

/// Global confidence before any epoch has been recorded.
pub const INITIAL_GLOBAL_CONFIDENCE: f64 = 0.5;

/// Default EMA smoothing factor for global confidence.
pub const DEFAULT_EMA_ALPHA: f64 = 0.1;

/// Exponential moving average step, clamped to `[0, 1]`.
pub fn ema(previous: f64, value: f64, alpha: f64) -> f64 {
    alpha.mul_add(value, (1.0 - alpha) * previous).clamp(0.0, 1.0)
}

/// Per-epoch growth rate implied by the first and last entries of `history`.
///
/// Returns 0.0 for fewer than two entries or a non-positive starting value.
pub fn compound_growth_rate(history: &[f64]) -> f64 {
    match (history.first(), history.last()) {
        (Some(&first), Some(&last)) if history.len() >= 2 && first > 0.0 && last >= 0.0 => {
            (last / first).powf(1.0 / (history.len() - 1) as f64) - 1.0
        }
        _ => 0.0,
    }
}

/// Totals and histories accumulated over an entire training run.
///
/// Owned by one orchestrator for the life of a run and checkpointed after every
/// epoch. Missing fields in an older checkpoint fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalTrainingState {
    /// Epochs folded in.
    pub total_epochs: u32,
    /// Completed pairs across all epochs.
    pub total_conversations: u64,
    /// Latest family count reported by the organism.
    pub total_families: u64,
    /// R7: EMA of epoch rewards.
    pub global_confidence: f64,
    /// Global confidence after each epoch, starting with the initial value.
    pub confidence_history: Vec<f64>,
    /// Per-epoch growth rate over `confidence_history`.
    pub compound_growth_rate: f64,
    /// Reward of each epoch.
    pub epoch_reward_history: Vec<f64>,
    /// Mean final satisfaction of each epoch.
    pub satisfaction_history: Vec<f64>,
    /// Convergence rate of each epoch.
    pub convergence_rate_history: Vec<f64>,
    /// Coupling matrix mean, for epochs that reported a matrix.
    pub coupling_mean_history: Vec<f64>,
    /// Most recent epoch folded in.
    pub last_epoch: Option<u32>,
    /// When the state last advanced.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for GlobalTrainingState {
    fn default() -> Self {
        Self {
            total_epochs: 0,
            total_conversations: 0,
            total_families: 0,
            global_confidence: INITIAL_GLOBAL_CONFIDENCE,
            confidence_history: vec![INITIAL_GLOBAL_CONFIDENCE],
            compound_growth_rate: 0.0,
            epoch_reward_history: Vec::new(),
            satisfaction_history: Vec::new(),
            convergence_rate_history: Vec::new(),
            coupling_mean_history: Vec::new(),
            last_epoch: None,
            updated_at: None,
        }
    }
}

impl GlobalTrainingState {
    /// Fold one epoch in and return the new global confidence.
    ///
    /// Only completed pairs count as conversations. `families` replaces the family total when the organism reports one.
    pub fn record_epoch(
        &mut self,
        epoch: &EpochTrainingResult,
        alpha: f64,
        families: Option<u64>,
    ) -> f64 {
        self.total_epochs += 1;
        self.total_conversations += epoch.completed_pairs() as u64;
        if let Some(families) = families {
            self.total_families = families;
        }

        self.global_confidence = ema(self.global_confidence, epoch.epoch_reward, alpha);
        self.confidence_history.push(self.global_confidence);
        self.compound_growth_rate = compound_growth_rate(&self.confidence_history);

        self.epoch_reward_history.push(epoch.epoch_reward);
        self.satisfaction_history.push(epoch.mean_satisfaction);
        self.convergence_rate_history.push(epoch.convergence_rate);
        if let Some(snapshot) = &epoch.r_matrix_snapshot {
            self.coupling_mean_history.push(snapshot.mean);
        }

        self.last_epoch = Some(epoch.epoch_id);
        self.updated_at = Some(Utc::now());
        self.global_confidence
    }

    /// Next epoch to train when resuming from this state.
    pub fn next_epoch(&self) -> u32 {
        self.last_epoch.map_or(1, |e| e.saturating_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::training::curriculum::default_regime_configs;
    use crate::domain::models::training::results::CouplingSnapshot;
    use uuid::Uuid;

    fn epoch_with_reward(epoch_id: u32, reward: f64) -> EpochTrainingResult {
        let now = Utc::now();
        let mut epoch = EpochTrainingResult::aggregate(
            epoch_id,
            Uuid::new_v4(),
            &default_regime_configs()[0],
            &[],
            now,
            now,
        );
        epoch.epoch_reward = reward;
        epoch.total_pairs = 4;
        epoch
    }

    #[test]
    fn test_default_state_is_neutral() {
        let state = GlobalTrainingState::default();
        assert!((state.global_confidence - 0.5).abs() < f64::EPSILON);
        assert_eq!(state.confidence_history, vec![0.5]);
        assert_eq!(state.next_epoch(), 1);
    }

    #[test]
    fn test_ema_update() {
        let mut state = GlobalTrainingState::default();
        let r7 = state.record_epoch(&epoch_with_reward(1, 1.0), 0.1, None);
        assert!((r7 - 0.55).abs() < 1e-12);
        assert_eq!(state.total_epochs, 1);
        assert_eq!(state.total_conversations, 4);
        assert_eq!(state.confidence_history.len(), 2);
        assert_eq!(state.next_epoch(), 2);
    }

    #[test]
    fn test_failed_pairs_are_not_conversations() {
        let mut state = GlobalTrainingState::default();
        let mut epoch = epoch_with_reward(1, 0.8);
        epoch.failed_pairs = 3;
        state.record_epoch(&epoch, 0.1, None);
        assert_eq!(state.total_conversations, 1);
    }

    #[test]
    fn test_compound_growth_rate() {
        assert_eq!(compound_growth_rate(&[]), 0.0);
        assert_eq!(compound_growth_rate(&[0.5]), 0.0);
        assert!((compound_growth_rate(&[0.5, 0.5]) - 0.0).abs() < 1e-12);
        // 0.5 -> 0.72 over two steps is 20% per step.
        assert!((compound_growth_rate(&[0.5, 0.6, 0.72]) - 0.2).abs() < 1e-9);
        assert_eq!(compound_growth_rate(&[0.0, 0.5]), 0.0);
    }

    #[test]
    fn test_families_and_coupling_history() {
        let mut state = GlobalTrainingState::default();
        let mut epoch = epoch_with_reward(1, 0.6);
        epoch.r_matrix_snapshot = Some(CouplingSnapshot::from_matrix(vec![vec![0.2, 0.4]]));
        state.record_epoch(&epoch, 0.1, Some(7));
        assert_eq!(state.total_families, 7);
        assert_eq!(state.coupling_mean_history.len(), 1);
        assert!((state.coupling_mean_history[0] - 0.3).abs() < 1e-12);

        state.record_epoch(&epoch_with_reward(2, 0.6), 0.1, None);
        assert_eq!(state.total_families, 7);
        assert_eq!(state.coupling_mean_history.len(), 1);
    }

    #[test]
    fn test_partial_checkpoint_deserializes() {
        let state: GlobalTrainingState =
            serde_json::from_str(r#"{"total_epochs": 3, "global_confidence": 0.61}"#).unwrap();
        assert_eq!(state.total_epochs, 3);
        assert!((state.global_confidence - 0.61).abs() < f64::EPSILON);
        assert!(state.epoch_reward_history.is_empty());
    }
}
