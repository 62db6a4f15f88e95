use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::training::{
    EpochTrainingResult, GlobalTrainingState, TrainingBatchReport,
};

/// Persistence for training checkpoints and result dumps.
#[async_trait]
pub trait TrainingStore: Send + Sync {
    /// Load the global checkpoint.
    ///
    /// `Ok(None)` when no checkpoint exists yet. A checkpoint that exists but
    /// cannot be parsed is an error.
    async fn load_global_state(&self) -> DomainResult<Option<GlobalTrainingState>>;

    /// Replace the global checkpoint.
    async fn save_global_state(&self, state: &GlobalTrainingState) -> DomainResult<()>;

    /// Persist one epoch's aggregate.
    async fn save_epoch_result(&self, result: &EpochTrainingResult) -> DomainResult<()>;

    /// Persist a batch dump.
    async fn save_batch_report(&self, report: &TrainingBatchReport) -> DomainResult<()>;
}
