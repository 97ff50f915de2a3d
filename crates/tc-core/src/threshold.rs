//! Merge-or-create decision for a new observation.
//!
//! The fixed policy compares the nearest distance against a configured
//! radius. The adaptive policy derives the cutoff from the distribution of
//! distances to every *other* live cluster: an observation joins its nearest
//! cluster only when that cluster stands out by more than `sigma` standard
//! deviations from the rest.

use serde::{Deserialize, Serialize};

use crate::micro_cluster::ClusterId;

/// Running statistics over the distances from one candidate to every live cluster.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceStats {
    pub count: usize,
    pub sum: f64,
    pub sum_sq: f64,
    /// Smallest distance seen, starting at the maximum distance of 1.
    pub min: f64,
    /// Owner of `min`. `None` until some distance drops strictly below 1.
    pub nearest: Option<ClusterId>,
}

impl Default for DistanceStats {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: 1.0,
            nearest: None,
        }
    }
}

impl DistanceStats {
    /// Fold one distance in. Only a strictly smaller distance replaces the
    /// nearest cluster, so the first cluster visited wins ties.
    pub fn observe(&mut self, id: ClusterId, distance: f64) {
        self.count += 1;
        self.sum += distance;
        self.sum_sq += distance * distance;
        if distance < self.min {
            self.min = distance;
            self.nearest = Some(id);
        }
    }
}

impl FromIterator<(ClusterId, f64)> for DistanceStats {
    fn from_iter<I: IntoIterator<Item = (ClusterId, f64)>>(iter: I) -> Self {
        let mut stats = Self::default();
        for (id, d) in iter {
            stats.observe(id, d);
        }
        stats
    }
}

/// Outcome of a threshold decision.
#[derive(Clone, Debug, PartialEq)]
pub struct NearestMatch {
    /// Cluster to merge into, or `None` to start a new cluster.
    pub cluster_id: Option<ClusterId>,
    pub min_distance: f64,
    pub candidates: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ThresholdPolicy {
    Fixed { radius: f64 },
    Adaptive { sigma: f64 },
}

impl ThresholdPolicy {
    /// Distance cutoff for the given statistics. `None` when no merge is
    /// possible (adaptive mode with fewer than two candidates).
    pub fn threshold(&self, stats: &DistanceStats) -> Option<f64> {
        match *self {
            Self::Fixed { radius } => Some(radius),
            Self::Adaptive { sigma } => {
                if stats.count < 2 {
                    return None;
                }
                let others = (stats.count - 1) as f64;
                let mu = (stats.sum - stats.min) / others;
                let variance = (stats.sum_sq / others - mu * mu).max(0.0);
                Some(mu - sigma * variance.sqrt())
            }
        }
    }

    pub fn decide(&self, stats: &DistanceStats) -> NearestMatch {
        let accept = self
            .threshold(stats)
            .is_some_and(|threshold| stats.min < threshold);
        NearestMatch {
            cluster_id: if accept { stats.nearest } else { None },
            min_distance: stats.min,
            candidates: stats.count,
        }
    }
}
