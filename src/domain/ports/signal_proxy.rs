//! Field signal derivation.
//!
//! Field coherence and spatial variance drive the stability checks, but not
//! every organism measures them. A [`FieldSignalProxy`] fills the gaps from the
//! signals every organism does report.

use crate::domain::models::config::SignalProxyConfig;

use super::organism::OrganismResponse;

/// Derived field signals for one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSignals {
    /// Field coherence (0.0 -- 1.0).
    pub field_coherence: f64,
    /// Spatial variance (>= 0.0).
    pub spatial_variance: f64,
}

/// Maps an organism response to field signals.
pub trait FieldSignalProxy: Send + Sync {
    /// Coherence estimate from emission confidence.
    fn coherence(&self, emission_confidence: f64) -> f64;

    /// Spatial variance estimate from V0 energy.
    fn spatial_variance(&self, v0_final_energy: f64) -> f64;

    /// Measured signals where present, proxies otherwise.
    fn signals(&self, response: &OrganismResponse) -> FieldSignals {
        FieldSignals {
            field_coherence: response
                .field_coherence
                .unwrap_or_else(|| self.coherence(response.emission_confidence)),
            spatial_variance: response
                .spatial_variance
                .unwrap_or_else(|| self.spatial_variance(response.v0_final_energy)),
        }
    }
}

/// Linear proxy: `base + slope * confidence` and `slope * v0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFieldProxy {
    config: SignalProxyConfig,
}

impl LinearFieldProxy {
    /// Proxy with the given coefficients.
    pub const fn new(config: SignalProxyConfig) -> Self {
        Self { config }
    }
}

impl Default for LinearFieldProxy {
    fn default() -> Self {
        Self::new(SignalProxyConfig::default())
    }
}

impl FieldSignalProxy for LinearFieldProxy {
    fn coherence(&self, emission_confidence: f64) -> f64 {
        self.config
            .coherence_slope
            .mul_add(emission_confidence, self.config.coherence_base)
            .clamp(0.0, 1.0)
    }

    fn spatial_variance(&self, v0_final_energy: f64) -> f64 {
        (self.config.variance_slope * v0_final_energy).max(0.0)
    }
}
