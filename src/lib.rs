//! Organism Trainer - epoch training and convergence control
//!
//! Trains an adaptive organism on conversation pairs over many epochs. Each
//! pair is run repeatedly until the organism's satisfaction, field coherence,
//! and spatial variance settle, while an acceptance threshold (tau) evolves
//! with the observed training regime. Epoch results fold into a global
//! confidence that is checkpointed after every epoch.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Regime classification, tau evolution,
//!   convergence tracking, curriculum, and the ports services depend on
//! - **Service Layer** (`services`): Per-pair training loop and epoch orchestration
//! - **Adapters** (`adapters`): JSON checkpoint store and a scripted organism
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use organism_trainer::adapters::JsonTrainingStore;
//! use organism_trainer::infrastructure::config::ConfigLoader;
//! use organism_trainer::services::{EpochOrchestrator, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let store = Arc::new(JsonTrainingStore::new(&config.training.output_dir));
//!     let mut orchestrator =
//!         EpochOrchestrator::new(Arc::new(my_organism()), store, OrchestratorConfig::from(&config))
//!             .await?;
//!     orchestrator
//!         .train_multiple_epochs(1, 10, config.training.pairs_per_epoch, &corpus())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, ConvergenceDecision, ConvergenceTracker, Curriculum, EpochTrainingResult,
    GlobalTrainingState, Regime, RegimeConfig, TrainingPair, TrainingPairResult,
};
pub use domain::ports::{ExplorationContext, Organism, OrganismResponse, TrainingStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{EpochOrchestrator, MultiIterationTrainer, OrchestratorConfig, TrainerConfig};
