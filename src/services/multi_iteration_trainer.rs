//! Multi-iteration trainer.
//!
//! Runs one pair through the organism repeatedly, classifying the regime and
//! evolving tau after each iteration, until the convergence tracker halts on
//! stability or hits the iteration cap.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::training::{
    classify_regime_with_wave, evolve_tau, ConvergenceCriteria, ConvergenceDecision,
    ConvergenceResult, ConvergenceTracker, IterationInput, Regime, RegimeConfig,
    TauEvolutionRequest, TrainingBatchReport, TrainingPair, TrainingPairResult, WaveContext,
    DEFAULT_MAX_ITERATIONS, DEFAULT_SATISFACTION_TARGET, WARMUP_ITERATIONS,
};
use crate::domain::ports::{
    ExplorationContext, FieldSignalProxy, LinearFieldProxy, Organism, TrainingStore,
};

/// Initial tau when no regime config supplies one.
pub const DEFAULT_INITIAL_TAU: f64 = 0.5;

/// Exploration pressure when no regime config supplies one.
pub const DEFAULT_EXPLORATION_FACTOR: f64 = 0.5;

/// Fixed parameters for every pair a trainer runs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    /// Tau at the start of every pair.
    pub initial_tau: f64,
    /// Iteration cap per pair.
    pub max_iterations: usize,
    /// Satisfaction target, fixed for the pair's loop.
    pub satisfaction_target: f64,
    /// Urgency passed to the organism in each context.
    pub exploration_factor: f64,
    /// Stability checks.
    pub criteria: ConvergenceCriteria,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            initial_tau: DEFAULT_INITIAL_TAU,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            satisfaction_target: DEFAULT_SATISFACTION_TARGET,
            exploration_factor: DEFAULT_EXPLORATION_FACTOR,
            criteria: ConvergenceCriteria::default(),
        }
    }
}

impl TrainerConfig {
    /// Parameters for an epoch governed by `regime`.
    pub fn from_regime(regime: &RegimeConfig, criteria: ConvergenceCriteria) -> Self {
        Self {
            initial_tau: regime.tau_threshold,
            max_iterations: regime.max_iterations,
            satisfaction_target: regime.satisfaction_target,
            exploration_factor: regime.exploration_factor,
            criteria,
        }
    }
}

/// Trains pairs against an organism.
///
/// The config is fixed for the trainer's lifetime, so the satisfaction target
/// never changes inside a pair's loop.
pub struct MultiIterationTrainer<O: Organism> {
    organism: Arc<O>,
    proxy: Arc<dyn FieldSignalProxy>,
    config: TrainerConfig,
}

impl<O: Organism> MultiIterationTrainer<O> {
    /// Trainer using the default linear signal proxy.
    pub fn new(organism: Arc<O>, config: TrainerConfig) -> Self {
        Self::with_proxy(organism, Arc::new(LinearFieldProxy::default()), config)
    }

    /// Trainer deriving field signals through `proxy`.
    pub fn with_proxy(
        organism: Arc<O>,
        proxy: Arc<dyn FieldSignalProxy>,
        config: TrainerConfig,
    ) -> Self {
        Self {
            organism,
            proxy,
            config,
        }
    }

    /// Parameters applied to every pair.
    pub const fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train one pair to a terminal decision.
    ///
    /// Never fails: an organism error ends the loop early and is recorded in
    /// the result's `error` field alongside the partial histories.
    #[instrument(skip(self, input_text), fields(max_iterations = self.config.max_iterations))]
    pub async fn train_single_pair(&self, pair_id: &str, input_text: &str) -> TrainingPairResult {
        let started_at = Utc::now();
        let target = self.config.satisfaction_target;
        let mut tracker = ConvergenceTracker::with_criteria(
            target,
            self.config.max_iterations,
            self.config.criteria.clone(),
        );

        let mut tau = self.config.initial_tau;
        let mut tau_history = vec![tau];
        let mut satisfaction_history = Vec::new();
        let mut regime_history: Vec<Regime> = Vec::new();
        let mut wave = WaveContext::default();
        let mut last_result: Option<ConvergenceResult> = None;
        let mut error = None;

        for iteration in 1..=self.config.max_iterations {
            let previous_regime = regime_history.last().copied().unwrap_or(Regime::Exploring);
            let context = ExplorationContext::new(previous_regime, self.config.exploration_factor);

            let response = match self.organism.process(input_text, &context).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(pair_id, iteration, error = %e, "organism failed, abandoning pair");
                    error = Some(e.to_string());
                    break;
                }
            };

            let signals = self.proxy.signals(&response);
            satisfaction_history.push(response.satisfaction);
            wave.field_coherence.push(signals.field_coherence);
            wave.spatial_variance.push(signals.spatial_variance);
            wave.phases.push(response.appetitive_phase);

            let regime = if iteration >= WARMUP_ITERATIONS {
                let classification =
                    classify_regime_with_wave(&satisfaction_history, iteration, &wave);
                let mut request = TauEvolutionRequest::new(
                    tau,
                    response.satisfaction,
                    target,
                    classification.regime,
                )
                .with_rate(classification.evolution_rate)
                .with_spatial_variance(signals.spatial_variance)
                .with_field_coherence(signals.field_coherence);
                if let Some(phase) = response.appetitive_phase {
                    request = request.with_phase(phase);
                }

                let evolution = evolve_tau(&request);
                if evolution.bounded {
                    debug!(pair_id, iteration, tau = evolution.tau_new, "tau clamped to bounds");
                }
                tau = evolution.tau_new;
                classification.regime
            } else {
                Regime::Initializing
            };

            if regime_history.last() != Some(&regime) {
                debug!(pair_id, iteration, %regime, "regime changed");
            }
            regime_history.push(regime);
            tau_history.push(tau);

            tracker.record_iteration(IterationInput {
                satisfaction: response.satisfaction,
                field_coherence: signals.field_coherence,
                spatial_variance: signals.spatial_variance,
                emission_confidence: response.emission_confidence,
                v0_final: response.v0_final_energy,
                convergence_cycles: response.convergence_cycles,
                regime: Some(regime),
                tau: Some(tau),
            });

            let result = tracker.evaluate_convergence();
            let decision = result.decision;
            last_result = Some(result);
            if decision.is_terminal() {
                break;
            }
        }

        let decision = match last_result.as_ref().map(|r| r.decision) {
            Some(decision) if decision.is_terminal() => decision,
            Some(decision) if error.is_some() => decision,
            None if error.is_some() => ConvergenceDecision::Continue,
            _ => ConvergenceDecision::MaxIterations,
        };

        let iterations = tracker.iteration_count();
        match decision {
            ConvergenceDecision::Halt => info!(pair_id, iterations, tau, "pair converged"),
            ConvergenceDecision::MaxIterations => {
                info!(pair_id, iterations, tau, "pair hit max iterations");
            }
            ConvergenceDecision::Continue => {}
        }

        let latest = tracker.latest();
        TrainingPairResult {
            pair_id: pair_id.to_string(),
            input_text: input_text.to_string(),
            converged: decision == ConvergenceDecision::Halt,
            iterations,
            decision,
            converged_at: tracker.converged_at(),
            reasoning: last_result
                .map(|r| r.reasoning)
                .or_else(|| error.clone())
                .unwrap_or_default(),
            final_satisfaction: latest.map_or(0.0, |r| r.satisfaction),
            final_field_coherence: latest.map_or(0.0, |r| r.field_coherence),
            final_spatial_variance: latest.map_or(0.0, |r| r.spatial_variance),
            final_confidence: latest.map_or(0.0, |r| r.emission_confidence),
            final_v0: latest.map_or(0.0, |r| r.v0_final),
            final_regime: regime_history.last().copied().unwrap_or(Regime::Initializing),
            final_tau: tau,
            satisfaction_history,
            regime_history,
            tau_history,
            error,
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Train every pair in order and persist a batch dump.
    pub async fn train_multiple_pairs<S>(
        &self,
        pairs: &[TrainingPair],
        store: &S,
    ) -> DomainResult<TrainingBatchReport>
    where
        S: TrainingStore + ?Sized,
    {
        let mut results = Vec::with_capacity(pairs.len());
        for pair in pairs {
            results.push(self.train_single_pair(&pair.pair_id, &pair.input_text).await);
        }

        let report = TrainingBatchReport {
            batch_id: Uuid::new_v4(),
            created_at: Utc::now(),
            initial_tau: self.config.initial_tau,
            max_iterations: self.config.max_iterations,
            satisfaction_target: self.config.satisfaction_target,
            total_pairs: results.len(),
            converged_pairs: results.iter().filter(|r| r.converged).count(),
            results,
        };
        store.save_batch_report(&report).await?;

        info!(
            total = report.total_pairs,
            converged = report.converged_pairs,
            "batch training complete"
        );
        Ok(report)
    }
}
