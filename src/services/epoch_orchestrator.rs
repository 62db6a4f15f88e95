//! Epoch orchestrator.
//!
//! Drives whole epochs: picks the curriculum entry for the epoch, trains each
//! pair with a fresh [`MultiIterationTrainer`], aggregates the results, folds
//! them into the run's [`GlobalTrainingState`], and checkpoints after every
//! epoch so an interrupted run loses at most the epoch in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::config::{Config, SignalProxyConfig};
use crate::domain::models::training::{
    ConvergenceCriteria, CouplingSnapshot, Curriculum, EpochTrainingResult, GlobalTrainingState,
    TrainingPair, DEFAULT_EMA_ALPHA,
};
use crate::domain::ports::{FieldSignalProxy, LinearFieldProxy, Organism, TrainingStore};

use super::multi_iteration_trainer::{MultiIterationTrainer, TrainerConfig};

/// Run-level parameters for an orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Regime config schedule.
    pub curriculum: Curriculum,
    /// Stability checks applied to every pair.
    pub criteria: ConvergenceCriteria,
    /// Coefficients for the default field signal proxy.
    pub signal_proxy: SignalProxyConfig,
    /// EMA smoothing factor, in (0, 1].
    pub ema_alpha: f64,
    /// Sampling seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            curriculum: Curriculum::default(),
            criteria: ConvergenceCriteria::default(),
            signal_proxy: SignalProxyConfig::default(),
            ema_alpha: DEFAULT_EMA_ALPHA,
            seed: None,
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            curriculum: config.curriculum.clone(),
            criteria: config.convergence.clone(),
            signal_proxy: config.signal_proxy,
            ema_alpha: config.training.ema_alpha,
            seed: config.training.seed,
        }
    }
}

/// Owns the global training state for one run.
pub struct EpochOrchestrator<O: Organism, S: TrainingStore> {
    organism: Arc<O>,
    store: Arc<S>,
    proxy: Arc<dyn FieldSignalProxy>,
    config: OrchestratorConfig,
    state: GlobalTrainingState,
    rng: StdRng,
    run_id: Uuid,
    cancelled: Arc<AtomicBool>,
}

impl<O: Organism, S: TrainingStore> EpochOrchestrator<O, S> {
    /// Create an orchestrator, resuming from the store's checkpoint if any.
    ///
    /// A corrupt checkpoint is logged and replaced by a fresh state. Other
    /// store failures are returned.
    pub async fn new(
        organism: Arc<O>,
        store: Arc<S>,
        config: OrchestratorConfig,
    ) -> DomainResult<Self> {
        if !(config.ema_alpha > 0.0 && config.ema_alpha <= 1.0) {
            return Err(DomainError::InvalidConfig(format!(
                "ema_alpha {} must be in (0, 1]",
                config.ema_alpha
            )));
        }

        let state = match store.load_global_state().await {
            Ok(Some(state)) => {
                info!(
                    total_epochs = state.total_epochs,
                    global_confidence = state.global_confidence,
                    "resuming from checkpoint"
                );
                state
            }
            Ok(None) => GlobalTrainingState::default(),
            Err(DomainError::SerializationError(reason)) => {
                warn!(%reason, "checkpoint unreadable, starting from fresh state");
                GlobalTrainingState::default()
            }
            Err(e) => return Err(e),
        };

        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        Ok(Self {
            organism,
            store,
            proxy: Arc::new(LinearFieldProxy::new(config.signal_proxy)),
            config,
            state,
            rng,
            run_id: Uuid::new_v4(),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share an externally owned cancellation flag.
    #[must_use]
    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Replace the field signal proxy.
    #[must_use]
    pub fn with_signal_proxy(mut self, proxy: Arc<dyn FieldSignalProxy>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Flag that stops training at the next pair or epoch boundary.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// State as of the last committed epoch.
    pub const fn global_state(&self) -> &GlobalTrainingState {
        &self.state
    }

    /// Identifier stamped on every epoch of this run.
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Schedule this run trains under.
    pub const fn curriculum(&self) -> &Curriculum {
        &self.config.curriculum
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Train every pair once under the curriculum entry for `epoch_id`.
    ///
    /// The epoch result and then the global state are persisted before the
    /// in-memory state advances. An epoch with no completed pair is saved but
    /// leaves the global state and its checkpoint untouched. Cancellation
    /// between pairs discards the epoch and returns [`DomainError::Cancelled`].
    #[instrument(skip(self, pairs), fields(pair_count = pairs.len(), run_id = %self.run_id))]
    pub async fn train_epoch(
        &mut self,
        epoch_id: u32,
        pairs: &[TrainingPair],
    ) -> DomainResult<EpochTrainingResult> {
        let regime = self.config.curriculum.config_for_epoch(epoch_id)?.clone();
        let trainer = MultiIterationTrainer::with_proxy(
            Arc::clone(&self.organism),
            Arc::clone(&self.proxy),
            TrainerConfig::from_regime(&regime, self.config.criteria.clone()),
        );

        info!(
            epoch_id,
            regime = %regime.name,
            tau = regime.tau_threshold,
            max_iterations = regime.max_iterations,
            "epoch started"
        );

        let started_at = Utc::now();
        let mut results = Vec::with_capacity(pairs.len());
        for pair in pairs {
            if self.is_cancelled() {
                warn!(epoch_id, completed = results.len(), "epoch cancelled");
                return Err(DomainError::Cancelled);
            }
            results.push(trainer.train_single_pair(&pair.pair_id, &pair.input_text).await);
        }

        let mut epoch = EpochTrainingResult::aggregate(
            epoch_id,
            self.run_id,
            &regime,
            &results,
            started_at,
            Utc::now(),
        );
        epoch.r_matrix_snapshot = self
            .organism
            .coupling_matrix()
            .await
            .map(CouplingSnapshot::from_matrix);

        if epoch.completed_pairs() == 0 {
            epoch.global_confidence = self.state.global_confidence;
            self.store.save_epoch_result(&epoch).await?;
            warn!(
                epoch_id,
                total = epoch.total_pairs,
                failed = epoch.failed_pairs,
                "no pair completed, global state not advanced"
            );
            return Ok(epoch);
        }

        let families = self.organism.family_count().await;
        let mut next_state = self.state.clone();
        epoch.global_confidence = next_state.record_epoch(&epoch, self.config.ema_alpha, families);

        self.store.save_epoch_result(&epoch).await?;
        self.store.save_global_state(&next_state).await?;
        self.state = next_state;

        info!(
            epoch_id,
            converged = epoch.converged_pairs,
            max_iterations = epoch.max_iteration_pairs,
            failed = epoch.failed_pairs,
            convergence_rate = epoch.convergence_rate,
            epoch_reward = epoch.epoch_reward,
            global_confidence = epoch.global_confidence,
            "epoch complete"
        );
        Ok(epoch)
    }

    /// Train epochs `start..=end`, sampling `pairs_per_epoch` pairs from
    /// `corpus` for each.
    ///
    /// A corpus no larger than the batch is used whole, in order. Cancellation
    /// stops the run early and returns the epochs already completed.
    pub async fn train_multiple_epochs(
        &mut self,
        start: u32,
        end: u32,
        pairs_per_epoch: usize,
        corpus: &[TrainingPair],
    ) -> DomainResult<Vec<EpochTrainingResult>> {
        if start > end {
            return Err(DomainError::InvalidEpochRange { start, end });
        }

        let mut completed = Vec::new();
        for epoch_id in start..=end {
            if self.is_cancelled() {
                info!(epoch_id, "training cancelled before epoch");
                break;
            }

            let batch = self.sample_pairs(corpus, pairs_per_epoch);
            match self.train_epoch(epoch_id, &batch).await {
                Ok(epoch) => completed.push(epoch),
                Err(DomainError::Cancelled) => break,
                Err(e) => return Err(e),
            }
        }

        info!(
            epochs = completed.len(),
            global_confidence = self.state.global_confidence,
            compound_growth_rate = self.state.compound_growth_rate,
            "training run finished"
        );
        Ok(completed)
    }

    /// Uniform sample without replacement.
    fn sample_pairs(&mut self, corpus: &[TrainingPair], count: usize) -> Vec<TrainingPair> {
        if corpus.len() <= count {
            return corpus.to_vec();
        }
        corpus
            .choose_multiple(&mut self.rng, count)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{JsonTrainingStore, ScriptedOrganism};
    use crate::domain::ports::OrganismResponse;
    use tempfile::TempDir;

    fn organism() -> Arc<ScriptedOrganism> {
        Arc::new(ScriptedOrganism::constant(
            OrganismResponse::new(0.85, 0.1, 2, 0.9)
                .with_field_coherence(0.85)
                .with_spatial_variance(0.001),
        ))
    }

    fn corpus(n: usize) -> Vec<TrainingPair> {
        (0..n)
            .map(|i| TrainingPair::new(format!("pair-{i}"), format!("input {i}")))
            .collect()
    }

    fn seeded(seed: u64) -> OrchestratorConfig {
        OrchestratorConfig {
            seed: Some(seed),
            ..OrchestratorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_rejects_invalid_alpha() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonTrainingStore::new(dir.path()));
        let config = OrchestratorConfig {
            ema_alpha: 0.0,
            ..OrchestratorConfig::default()
        };
        let result = EpochOrchestrator::new(organism(), store, config).await;
        assert!(matches!(result, Err(DomainError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_same_seed_samples_same_pairs() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let mut a = EpochOrchestrator::new(
            organism(),
            Arc::new(JsonTrainingStore::new(dir_a.path())),
            seeded(42),
        )
        .await
        .unwrap();
        let mut b = EpochOrchestrator::new(
            organism(),
            Arc::new(JsonTrainingStore::new(dir_b.path())),
            seeded(42),
        )
        .await
        .unwrap();

        let pool = corpus(20);
        let picked_a: Vec<String> = a
            .sample_pairs(&pool, 5)
            .into_iter()
            .map(|p| p.pair_id)
            .collect();
        let picked_b: Vec<String> = b
            .sample_pairs(&pool, 5)
            .into_iter()
            .map(|p| p.pair_id)
            .collect();
        assert_eq!(picked_a, picked_b);
        assert_eq!(picked_a.len(), 5);

        let mut unique = picked_a.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);
    }

    #[tokio::test]
    async fn test_small_corpus_is_used_whole() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator = EpochOrchestrator::new(
            organism(),
            Arc::new(JsonTrainingStore::new(dir.path())),
            seeded(1),
        )
        .await
        .unwrap();
        let pool = corpus(3);
        assert_eq!(orchestrator.sample_pairs(&pool, 10), pool);
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator = EpochOrchestrator::new(
            organism(),
            Arc::new(JsonTrainingStore::new(dir.path())),
            seeded(1),
        )
        .await
        .unwrap();
        let err = orchestrator
            .train_multiple_epochs(5, 2, 3, &corpus(3))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidEpochRange { start: 5, end: 2 }));
    }

    #[tokio::test]
    async fn test_cancelled_epoch_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonTrainingStore::new(dir.path()));
        let flag = Arc::new(AtomicBool::new(true));
        let mut orchestrator = EpochOrchestrator::new(organism(), Arc::clone(&store), seeded(1))
            .await
            .unwrap()
            .with_cancellation(Arc::clone(&flag));

        let err = orchestrator.train_epoch(1, &corpus(2)).await.unwrap_err();
        assert!(matches!(err, DomainError::Cancelled));
        assert_eq!(orchestrator.global_state(), &GlobalTrainingState::default());
        assert!(!store.global_state_path().exists());

        let completed = orchestrator
            .train_multiple_epochs(1, 3, 2, &corpus(2))
            .await
            .unwrap();
        assert!(completed.is_empty());
    }
}
