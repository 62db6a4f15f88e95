//! JSON file implementation of [`TrainingStore`].
//!
//! Layout under the output directory:
//! - `global_training_state.json`
//! - `epoch_<NNN>_result.json`
//! - `training_results_<YYYYmmdd_HHMMSS>.json`
//!
//! Every write goes to a sibling `.tmp` file first and is renamed over the
//! target, so a crash mid-write never leaves a truncated checkpoint.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::training::{
    EpochTrainingResult, GlobalTrainingState, TrainingBatchReport,
};
use crate::domain::ports::TrainingStore;

const GLOBAL_STATE_FILE: &str = "global_training_state.json";

/// Stores training artifacts as pretty-printed JSON files.
#[derive(Debug, Clone)]
pub struct JsonTrainingStore {
    output_dir: PathBuf,
}

impl JsonTrainingStore {
    /// Store rooted at `output_dir`, created on first write.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory every artifact is written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the global state checkpoint.
    pub fn global_state_path(&self) -> PathBuf {
        self.output_dir.join(GLOBAL_STATE_FILE)
    }

    /// Path of one epoch's result.
    pub fn epoch_result_path(&self, epoch_id: u32) -> PathBuf {
        self.output_dir.join(format!("epoch_{epoch_id:03}_result.json"))
    }

    /// Path of a batch dump, stamped with its creation time.
    pub fn batch_report_path(&self, report: &TrainingBatchReport) -> PathBuf {
        self.output_dir.join(format!(
            "training_results_{}.json",
            report.created_at.format("%Y%m%d_%H%M%S")
        ))
    }

    async fn write_json<T: Serialize + Sync>(&self, path: &Path, value: &T) -> DomainResult<()> {
        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            DomainError::Persistence(format!(
                "failed to create {}: {e}",
                self.output_dir.display()
            ))
        })?;

        let json = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            DomainError::Persistence(format!("failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            DomainError::Persistence(format!("failed to replace {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), "wrote training artifact");
        Ok(())
    }
}

#[async_trait]
impl TrainingStore for JsonTrainingStore {
    async fn load_global_state(&self) -> DomainResult<Option<GlobalTrainingState>> {
        let path = self.global_state_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DomainError::Persistence(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            DomainError::SerializationError(format!("corrupt checkpoint {}: {e}", path.display()))
        })
    }

    async fn save_global_state(&self, state: &GlobalTrainingState) -> DomainResult<()> {
        self.write_json(&self.global_state_path(), state).await
    }

    async fn save_epoch_result(&self, result: &EpochTrainingResult) -> DomainResult<()> {
        self.write_json(&self.epoch_result_path(result.epoch_id), result)
            .await
    }

    async fn save_batch_report(&self, report: &TrainingBatchReport) -> DomainResult<()> {
        self.write_json(&self.batch_report_path(report), report).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_missing_checkpoint_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonTrainingStore::new(dir.path());
        assert!(store.load_global_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_global_state_round_trip_creates_directory() {
        let dir = TempDir::new().unwrap();
        let store = JsonTrainingStore::new(dir.path().join("nested/out"));

        let mut state = GlobalTrainingState::default();
        state.total_epochs = 2;
        state.global_confidence = 0.57;
        store.save_global_state(&state).await.unwrap();

        let loaded = store.load_global_state().await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert!(!store.global_state_path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonTrainingStore::new(dir.path());
        tokio::fs::write(store.global_state_path(), b"{ not json")
            .await
            .unwrap();

        let err = store.load_global_state().await.unwrap_err();
        assert!(matches!(err, DomainError::SerializationError(_)));
    }

    #[tokio::test]
    async fn test_artifact_file_names() {
        let dir = TempDir::new().unwrap();
        let store = JsonTrainingStore::new(dir.path());
        assert!(store
            .epoch_result_path(7)
            .ends_with("epoch_007_result.json"));

        let report = TrainingBatchReport {
            batch_id: Uuid::new_v4(),
            created_at: Utc::now(),
            initial_tau: 0.5,
            max_iterations: 5,
            satisfaction_target: 0.75,
            total_pairs: 0,
            converged_pairs: 0,
            results: Vec::new(),
        };
        store.save_batch_report(&report).await.unwrap();
        let path = store.batch_report_path(&report);
        assert!(path.exists());

        let json: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(json["max_iterations"], 5);
        assert_eq!(json["satisfaction_target"], 0.75);
    }
}
