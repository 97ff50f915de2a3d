//! Periodic maintenance of the micro-cluster set.
//!
//! Every `cleanup_interval` time units the engine fades all clusters to the
//! current time, evicts the ones that decayed below ω, records weight trends,
//! and optionally merges pairs of clusters that drifted close together.

use tracing::debug;

use crate::distance::DistanceMetric;
use crate::fading::Fading;
use crate::store::MicroClusterStore;

/// Merge distances accumulated between two cleanup cycles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleStats {
    pub accumulated_distance: f64,
    pub merged_observations: u64,
}

impl CycleStats {
    /// Count one accepted merge at `distance`.
    pub fn record_merge(&mut self, distance: f64) {
        self.accumulated_distance += distance;
        self.merged_observations += 1;
    }

    /// Mean merge distance, with one added to the denominator so an idle
    /// cycle yields 0.
    pub fn mean_merge_distance(&self) -> f64 {
        self.accumulated_distance / (self.merged_observations as f64 + 1.0)
    }
}

/// How cleanup picks the distance below which two live clusters merge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MergeRule {
    Off,
    Radius(f64),
    /// Mean distance of the observation merges accepted this cycle.
    MeanMergeDistance,
}

impl MergeRule {
    pub fn threshold(&self, cycle: &CycleStats) -> Option<f64> {
        match *self {
            Self::Off => None,
            Self::Radius(r) => Some(r),
            Self::MeanMergeDistance => Some(cycle.mean_merge_distance()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub evicted: usize,
    pub merged: usize,
    pub remaining: usize,
}

/// Decides when cleanup is due and runs it.
#[derive(Clone, Debug)]
pub struct CleanupScheduler {
    interval: f64,
    last_cleanup: f64,
    metric: DistanceMetric,
    rule: MergeRule,
}

impl CleanupScheduler {
    pub fn new(interval: f64, metric: DistanceMetric, rule: MergeRule) -> Self {
        Self {
            interval,
            last_cleanup: 0.0,
            metric,
            rule,
        }
    }

    pub fn last_cleanup(&self) -> f64 {
        self.last_cleanup
    }

    pub fn is_due(&self, now: f64) -> bool {
        now - self.last_cleanup >= self.interval
    }

    /// Run one cleanup cycle at `now`, consuming the cycle's merge statistics.
    pub fn run(
        &mut self,
        store: &mut MicroClusterStore,
        now: f64,
        fading: &Fading,
        cycle: CycleStats,
    ) -> CleanupReport {
        self.last_cleanup = now;

        let evicted = store.fade_all(now, fading);
        store.snapshot_trends();

        let merged = match self.rule.threshold(&cycle) {
            Some(threshold) => auto_merge(store, threshold, self.metric, now, fading),
            None => 0,
        };

        let report = CleanupReport {
            evicted,
            merged,
            remaining: store.len(),
        };
        debug!(
            now,
            evicted = report.evicted,
            merged = report.merged,
            remaining = report.remaining,
            "cleanup"
        );
        report
    }
}

/// Merge every pair of live clusters closer than `threshold`.
///
/// IDF is computed once over the set as it stands before merging. Pairs are
/// visited in ascending id order; the lower id absorbs the higher one and
/// keeps being compared against the rest. Returns the number of merges.
pub fn auto_merge(
    store: &mut MicroClusterStore,
    threshold: f64,
    metric: DistanceMetric,
    now: f64,
    fading: &Fading,
) -> usize {
    let idf = store.idf();
    let mut ids = store.ids();
    let mut merged = 0;

    let mut i = 0;
    while i < ids.len() {
        let mut j = i + 1;
        while j < ids.len() {
            let distance = match (store.get(ids[i]), store.get(ids[j])) {
                (Some(a), Some(b)) => metric.distance(a, b, &idf),
                _ => 1.0,
            };
            if distance < threshold && store.merge_pair(ids[i], ids[j], now, fading) {
                ids.remove(j);
                merged += 1;
            } else {
                j += 1;
            }
        }
        i += 1;
    }

    if merged > 0 {
        store.invalidate();
    }
    merged
}
