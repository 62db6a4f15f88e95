//! Domain errors for the organism training system.

use thiserror::Error;

/// Domain-level errors that can occur while training the organism.
///
/// Statistical outcomes (no clear regime yet, max iterations reached) are
/// ordinary values, never errors. Only invalid input and the I/O boundary
/// (organism calls, persistence) produce these.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The organism call returned an error.
    #[error("Organism failed to process input: {0}")]
    OrganismFailure(String),

    /// Reading or writing a training artifact failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// An artifact could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Curriculum entries are empty, malformed, or not contiguous.
    #[error("Invalid curriculum: {0}")]
    InvalidCurriculum(String),

    /// No curriculum entry covers the requested epoch.
    #[error("Epoch {epoch} precedes the curriculum start at epoch {first}")]
    EpochBeforeCurriculum {
        /// Requested epoch.
        epoch: u32,
        /// First epoch the curriculum covers.
        first: u32,
    },

    /// The epoch range is inverted.
    #[error("Invalid epoch range: start {start} is after end {end}")]
    InvalidEpochRange {
        /// First epoch requested.
        start: u32,
        /// Last epoch requested.
        end: u32,
    },

    /// A run-level parameter is out of range.
    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    /// The cancellation flag was raised mid-epoch.
    #[error("Training cancelled")]
    Cancelled,
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Persistence(err.to_string())
    }
}
