//! Epoch curriculum: which regime configuration governs which epochs.
//!
//! A [`Curriculum`] is an ordered, gap-free, non-overlapping list of
//! [`RegimeConfig`] entries. The last entry is an open tail: it also governs
//! every epoch after its nominal end, so long runs never fall off the schedule.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

use super::threshold::{MAX_TAU, MIN_TAU};

/// Inclusive epoch range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochRange {
    /// First epoch covered.
    pub start: u32,
    /// Last epoch covered (inclusive).
    pub end: u32,
}

impl EpochRange {
    /// Create a range covering `start..=end`.
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Whether `epoch` falls inside the range.
    pub const fn contains(&self, epoch: u32) -> bool {
        epoch >= self.start && epoch <= self.end
    }
}

/// Static training parameters for a span of epochs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// Short name, e.g. `"exploration"`.
    pub name: String,
    /// Epochs this entry governs.
    pub epoch_range: EpochRange,
    /// Initial tau for each pair trained in these epochs.
    pub tau_threshold: f64,
    /// How strongly the organism is pushed to explore (0.0 -- 1.0).
    pub exploration_factor: f64,
    /// Iteration cap per pair.
    pub max_iterations: usize,
    /// Satisfaction each pair is trained toward.
    pub satisfaction_target: f64,
    /// Human-readable intent.
    #[serde(default)]
    pub description: String,
}

impl RegimeConfig {
    fn validate(&self) -> DomainResult<()> {
        let fail = |msg: String| -> DomainResult<()> {
            Err(DomainError::InvalidCurriculum(format!("{}: {msg}", self.name)))
        };

        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidCurriculum(
                "regime config name cannot be empty".to_string(),
            ));
        }
        if self.epoch_range.start > self.epoch_range.end {
            return fail(format!(
                "epoch range {}..={} is inverted",
                self.epoch_range.start, self.epoch_range.end
            ));
        }
        if !(MIN_TAU..=MAX_TAU).contains(&self.tau_threshold) {
            return fail(format!(
                "tau_threshold {} outside [{MIN_TAU}, {MAX_TAU}]",
                self.tau_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.exploration_factor) {
            return fail(format!(
                "exploration_factor {} outside [0, 1]",
                self.exploration_factor
            ));
        }
        if !(0.0..=1.0).contains(&self.satisfaction_target) {
            return fail(format!(
                "satisfaction_target {} outside [0, 1]",
                self.satisfaction_target
            ));
        }
        if self.max_iterations == 0 {
            return fail("max_iterations must be at least 1".to_string());
        }
        Ok(())
    }
}

/// The default four-stage schedule.
pub fn default_regime_configs() -> Vec<RegimeConfig> {
    vec![
        RegimeConfig {
            name: "exploration".to_string(),
            epoch_range: EpochRange::new(1, 10),
            tau_threshold: 0.40,
            exploration_factor: 0.8,
            max_iterations: 5,
            satisfaction_target: 0.65,
            description: "Low tau, wide exploration while organ couplings form".to_string(),
        },
        RegimeConfig {
            name: "consolidation".to_string(),
            epoch_range: EpochRange::new(11, 25),
            tau_threshold: 0.50,
            exploration_factor: 0.5,
            max_iterations: 5,
            satisfaction_target: 0.70,
            description: "Moderate tau; reinforce families that keep converging".to_string(),
        },
        RegimeConfig {
            name: "refinement".to_string(),
            epoch_range: EpochRange::new(26, 40),
            tau_threshold: 0.60,
            exploration_factor: 0.3,
            max_iterations: 7,
            satisfaction_target: 0.75,
            description: "Raise the bar; allow more iterations to settle".to_string(),
        },
        RegimeConfig {
            name: "commitment".to_string(),
            epoch_range: EpochRange::new(41, 60),
            tau_threshold: 0.65,
            exploration_factor: 0.1,
            max_iterations: 10,
            satisfaction_target: 0.80,
            description: "High tau, minimal exploration; open-ended tail".to_string(),
        },
    ]
}

/// Validated epoch schedule with an open tail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Curriculum {
    entries: Vec<RegimeConfig>,
}

impl Curriculum {
    /// Validate and build a curriculum.
    ///
    /// Entries must be non-empty, individually valid, and contiguous: each
    /// range starts exactly one epoch after the previous one ends.
    pub fn new(entries: Vec<RegimeConfig>) -> DomainResult<Self> {
        if entries.is_empty() {
            return Err(DomainError::InvalidCurriculum(
                "curriculum must contain at least one regime config".to_string(),
            ));
        }
        for entry in &entries {
            entry.validate()?;
        }
        for pair in entries.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.epoch_range.start != prev.epoch_range.end.saturating_add(1) {
                return Err(DomainError::InvalidCurriculum(format!(
                    "'{}' starts at epoch {} but '{}' ends at epoch {} (ranges must be \
                     contiguous and non-overlapping)",
                    next.name, next.epoch_range.start, prev.name, prev.epoch_range.end
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Regime config governing `epoch`.
    ///
    /// Epochs past the last range resolve to the last entry. Epochs before the
    /// first range are rejected.
    pub fn config_for_epoch(&self, epoch: u32) -> DomainResult<&RegimeConfig> {
        let first = &self.entries[0];
        if epoch < first.epoch_range.start {
            return Err(DomainError::EpochBeforeCurriculum {
                epoch,
                first: first.epoch_range.start,
            });
        }
        Ok(self
            .entries
            .iter()
            .find(|c| c.epoch_range.contains(epoch))
            .unwrap_or_else(|| self.open_tail()))
    }

    /// The last entry, which also covers every later epoch.
    pub fn open_tail(&self) -> &RegimeConfig {
        &self.entries[self.entries.len() - 1]
    }

    /// Entries in schedule order.
    pub fn entries(&self) -> &[RegimeConfig] {
        &self.entries
    }
}

impl Default for Curriculum {
    fn default() -> Self {
        Self {
            entries: default_regime_configs(),
        }
    }
}

impl<'de> Deserialize<'de> for Curriculum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = Vec::<RegimeConfig>::deserialize(deserializer)?;
        Self::new(entries).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_curriculum_is_valid() {
        let curriculum = Curriculum::new(default_regime_configs()).unwrap();
        assert_eq!(curriculum.entries().len(), 4);
        assert_eq!(curriculum, Curriculum::default());
    }

    #[test]
    fn test_lookup_inside_ranges() {
        let curriculum = Curriculum::default();
        assert_eq!(curriculum.config_for_epoch(1).unwrap().name, "exploration");
        assert_eq!(curriculum.config_for_epoch(10).unwrap().name, "exploration");
        assert_eq!(curriculum.config_for_epoch(11).unwrap().name, "consolidation");
        assert_eq!(curriculum.config_for_epoch(40).unwrap().name, "refinement");
    }

    #[test]
    fn test_open_tail_covers_later_epochs() {
        let curriculum = Curriculum::default();
        assert_eq!(curriculum.config_for_epoch(61).unwrap().name, "commitment");
        assert_eq!(curriculum.config_for_epoch(10_000).unwrap().name, "commitment");
    }

    #[test]
    fn test_epoch_before_start_is_rejected() {
        let curriculum = Curriculum::default();
        assert!(matches!(
            curriculum.config_for_epoch(0),
            Err(DomainError::EpochBeforeCurriculum { epoch: 0, first: 1 })
        ));
    }

    #[test]
    fn test_empty_curriculum_is_rejected() {
        assert!(matches!(
            Curriculum::new(vec![]),
            Err(DomainError::InvalidCurriculum(_))
        ));
    }

    #[test]
    fn test_gap_is_rejected() {
        let mut entries = default_regime_configs();
        entries[1].epoch_range.start = 12;
        let err = Curriculum::new(entries).unwrap_err();
        assert!(err.to_string().contains("contiguous"));
    }

    #[test]
    fn test_overlap_is_rejected() {
        let mut entries = default_regime_configs();
        entries[1].epoch_range.start = 10;
        assert!(Curriculum::new(entries).is_err());
    }

    #[test]
    fn test_tau_outside_bounds_is_rejected() {
        let mut entries = default_regime_configs();
        entries[0].tau_threshold = 0.9;
        let err = Curriculum::new(entries).unwrap_err();
        assert!(err.to_string().contains("tau_threshold"));
    }

    #[test]
    fn test_zero_max_iterations_is_rejected() {
        let mut entries = default_regime_configs();
        entries[2].max_iterations = 0;
        assert!(Curriculum::new(entries).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let json = serde_json::to_string(&default_regime_configs()).unwrap();
        let curriculum: Curriculum = serde_json::from_str(&json).unwrap();
        assert_eq!(curriculum.entries().len(), 4);

        let mut broken = default_regime_configs();
        broken[3].epoch_range.start = 50;
        let json = serde_json::to_string(&broken).unwrap();
        assert!(serde_json::from_str::<Curriculum>(&json).is_err());
    }
}
