use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Smoothing factor outside (0, 1].
    #[error("Invalid ema_alpha: {0}. Must be in (0, 1]")]
    InvalidEmaAlpha(f64),

    /// Unknown log level.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Unknown rotation policy.
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    /// Empty output directory.
    #[error("Output directory cannot be empty")]
    EmptyOutputDir,

    /// Zero pairs per epoch.
    #[error("Invalid pairs_per_epoch: {0}. Must be at least 1")]
    InvalidPairsPerEpoch(usize),

    /// Zero-length stability window.
    #[error("Invalid stability_window: {0}. Must be at least 1")]
    InvalidStabilityWindow(usize),

    /// Terminal minimum exceeds the stability minimum.
    #[error(
        "Invalid iteration minimums: min_iterations ({0}) must not exceed min_iterations_for_stability ({1})"
    )]
    InvalidIterationMinimums(usize, usize),

    /// Any other validation failure.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .organism/config.yaml (project config)
    /// 3. .organism/local.yaml (project local overrides, optional)
    /// 4. Environment variables (ORGANISM_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".organism/config.yaml"))
            .merge(Yaml::file(".organism/local.yaml"))
            .merge(Env::prefixed("ORGANISM_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Curriculum shape is validated when it is deserialized.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let training = &config.training;
        if !(training.ema_alpha > 0.0 && training.ema_alpha <= 1.0) {
            return Err(ConfigError::InvalidEmaAlpha(training.ema_alpha));
        }

        if training.output_dir.trim().is_empty() {
            return Err(ConfigError::EmptyOutputDir);
        }

        if training.pairs_per_epoch == 0 {
            return Err(ConfigError::InvalidPairsPerEpoch(training.pairs_per_epoch));
        }

        let convergence = &config.convergence;
        if convergence.stability_window == 0 {
            return Err(ConfigError::InvalidStabilityWindow(
                convergence.stability_window,
            ));
        }

        if convergence.min_iterations > convergence.min_iterations_for_stability {
            return Err(ConfigError::InvalidIterationMinimums(
                convergence.min_iterations,
                convergence.min_iterations_for_stability,
            ));
        }

        let proxy = &config.signal_proxy;
        if proxy.coherence_slope < 0.0 || proxy.variance_slope < 0.0 {
            return Err(ConfigError::ValidationFailed(
                "signal proxy slopes cannot be negative".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        Ok(())
    }
}
