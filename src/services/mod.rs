//! Training services built on the domain ports.

pub mod epoch_orchestrator;
pub mod multi_iteration_trainer;

pub use epoch_orchestrator::{EpochOrchestrator, OrchestratorConfig};
pub use multi_iteration_trainer::{MultiIterationTrainer, TrainerConfig};
