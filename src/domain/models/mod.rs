//! Domain models.

/// Run configuration.
pub mod config;
pub mod training;

pub use config::{Config, LoggingConfig, SignalProxyConfig, TrainingConfig};
pub use training::{
    ConvergenceCriteria, ConvergenceDecision, ConvergenceResult, ConvergenceTracker, Curriculum,
    EpochTrainingResult, GlobalTrainingState, Regime, RegimeConfig, TrainingPair,
    TrainingPairResult,
};
