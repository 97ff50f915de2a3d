use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_DECAY_RATE, DEFAULT_MACRO_CLUSTER_COUNT, DEFAULT_RADIUS,
    DEFAULT_SIGMA, TFIDF_COSINE_DISTANCE,
};
use crate::distance::DistanceMetric;
use crate::error::{ClusterError, Result};
use crate::fading::Fading;
use crate::threshold::ThresholdPolicy;

/// Engine configuration. Every field has a default, so partial TOML or JSON
/// documents deserialize cleanly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Fixed merge-distance threshold, within (0, 1].
    pub radius: f64,
    /// Exponential fading rate λ.
    pub decay_rate: f64,
    /// Elapsed time between cleanup cycles.
    pub cleanup_interval: f64,
    /// Fade individual term frequencies as well as cluster weights.
    pub term_fading: bool,
    /// Use caller-supplied timestamps instead of the observation counter.
    pub real_time_fading: bool,
    pub micro_distance: String,
    pub macro_distance: String,
    pub macro_cluster_count: usize,
    /// Clusters at or below this weight are ignored by reclustering and queries.
    pub min_weight: f64,
    pub adaptive_threshold: bool,
    pub auto_merge: bool,
    /// Standard-deviation multiplier for the adaptive threshold.
    pub sigma: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            decay_rate: DEFAULT_DECAY_RATE,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            term_fading: true,
            real_time_fading: true,
            micro_distance: TFIDF_COSINE_DISTANCE.to_string(),
            macro_distance: TFIDF_COSINE_DISTANCE.to_string(),
            macro_cluster_count: DEFAULT_MACRO_CLUSTER_COUNT,
            min_weight: 0.0,
            adaptive_threshold: false,
            auto_merge: true,
            sigma: DEFAULT_SIGMA,
        }
    }
}

impl ClusterConfig {
    /// Check every field. Called once at engine construction.
    pub fn validate(&self) -> Result<()> {
        if !(self.radius > 0.0 && self.radius <= 1.0) {
            return Err(ClusterError::InvalidRadius(self.radius));
        }
        if !self.decay_rate.is_finite() || self.decay_rate < 0.0 {
            return Err(ClusterError::InvalidConfig(format!(
                "decay_rate must be finite and >= 0, got {}",
                self.decay_rate
            )));
        }
        if !self.cleanup_interval.is_finite() || self.cleanup_interval <= 0.0 {
            return Err(ClusterError::InvalidConfig(format!(
                "cleanup_interval must be finite and > 0, got {}",
                self.cleanup_interval
            )));
        }
        if self.macro_cluster_count == 0 {
            return Err(ClusterError::InvalidConfig(
                "macro_cluster_count must be at least 1".to_string(),
            ));
        }
        if !self.min_weight.is_finite() {
            return Err(ClusterError::InvalidConfig(format!(
                "min_weight must be finite, got {}",
                self.min_weight
            )));
        }
        if !self.sigma.is_finite() {
            return Err(ClusterError::InvalidConfig(format!(
                "sigma must be finite, got {}",
                self.sigma
            )));
        }
        self.micro_metric()?;
        self.macro_metric()?;
        Ok(())
    }

    pub fn micro_metric(&self) -> Result<DistanceMetric> {
        self.micro_distance.parse()
    }

    pub fn macro_metric(&self) -> Result<DistanceMetric> {
        self.macro_distance.parse()
    }

    pub fn fading(&self) -> Fading {
        Fading::new(self.decay_rate, self.cleanup_interval, self.term_fading)
    }

    pub fn threshold_policy(&self) -> ThresholdPolicy {
        if self.adaptive_threshold {
            ThresholdPolicy::Adaptive { sigma: self.sigma }
        } else {
            ThresholdPolicy::Fixed {
                radius: self.radius,
            }
        }
    }
}
