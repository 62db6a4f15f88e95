use serde::{Deserialize, Serialize};

use super::training::{ConvergenceCriteria, Curriculum, DEFAULT_EMA_ALPHA};

/// Main configuration structure for the organism trainer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Run-level training settings
    #[serde(default)]
    pub training: TrainingConfig,

    /// Stability thresholds used by every per-pair tracker
    #[serde(default)]
    pub convergence: ConvergenceCriteria,

    /// Coefficients for deriving field signals the organism does not report
    #[serde(default)]
    pub signal_proxy: SignalProxyConfig,

    /// Epoch schedule
    #[serde(default)]
    pub curriculum: Curriculum,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Run-level training settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrainingConfig {
    /// Directory for checkpoints and result dumps
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// EMA smoothing factor for global confidence, in (0, 1]
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f64,

    /// Seed for pair sampling; unseeded runs draw from OS entropy
    #[serde(default)]
    pub seed: Option<u64>,

    /// Pairs sampled from the corpus per epoch
    #[serde(default = "default_pairs_per_epoch")]
    pub pairs_per_epoch: usize,
}

fn default_output_dir() -> String {
    "results/epoch_training".to_string()
}

const fn default_ema_alpha() -> f64 {
    DEFAULT_EMA_ALPHA
}

const fn default_pairs_per_epoch() -> usize {
    20
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            ema_alpha: default_ema_alpha(),
            seed: None,
            pairs_per_epoch: default_pairs_per_epoch(),
        }
    }
}

/// Linear proxy coefficients
///
/// `coherence = coherence_base + coherence_slope * confidence`,
/// `spatial_variance = variance_slope * v0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SignalProxyConfig {
    /// Coherence at zero emission confidence.
    #[serde(default = "default_coherence_base")]
    pub coherence_base: f64,

    /// Coherence gained per unit of emission confidence.
    #[serde(default = "default_coherence_slope")]
    pub coherence_slope: f64,

    /// Spatial variance per unit of V0 energy.
    #[serde(default = "default_variance_slope")]
    pub variance_slope: f64,
}

const fn default_coherence_base() -> f64 {
    0.50
}

const fn default_coherence_slope() -> f64 {
    0.35
}

const fn default_variance_slope() -> f64 {
    0.010
}

impl Default for SignalProxyConfig {
    fn default() -> Self {
        Self {
            coherence_base: default_coherence_base(),
            coherence_slope: default_coherence_slope(),
            variance_slope: default_variance_slope(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
