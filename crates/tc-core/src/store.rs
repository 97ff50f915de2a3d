use std::collections::BTreeMap;

use crate::distance::{DistanceMetric, IdfTable};
use crate::fading::Fading;
use crate::micro_cluster::{ClusterId, MicroCluster};
use crate::threshold::DistanceStats;

/// Position of an observation in the stream, starting at 1.
pub type ObservationIndex = u64;

/// Live micro clusters keyed by id, plus the assignment log.
///
/// Clusters are kept in ascending id order. Ids come from a monotonic
/// counter, so iteration order is insertion order and stays stable across
/// deletions. The `fresh` flag tracks whether the macro clustering computed
/// from this set is still valid; every structural mutation clears it.
#[derive(Debug, Default)]
pub struct MicroClusterStore {
    clusters: BTreeMap<ClusterId, MicroCluster>,
    assignments: BTreeMap<ObservationIndex, ClusterId>,
    next_id: ClusterId,
    fresh: bool,
}

impl MicroClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, id: ClusterId) -> Option<&MicroCluster> {
        self.clusters.get(&id)
    }

    /// Live clusters in ascending id order.
    pub fn clusters(&self) -> impl Iterator<Item = &MicroCluster> {
        self.clusters.values()
    }

    pub fn ids(&self) -> Vec<ClusterId> {
        self.clusters.keys().copied().collect()
    }

    /// Id the next inserted cluster will receive.
    pub fn next_id(&self) -> ClusterId {
        self.next_id
    }

    pub fn assignments(&self) -> &BTreeMap<ObservationIndex, ClusterId> {
        &self.assignments
    }

    /// IDF over the current live set.
    pub fn idf(&self) -> IdfTable {
        IdfTable::from_clusters(self.clusters.values())
    }

    /// Distances from `candidate` to every live cluster.
    pub fn distance_stats(
        &self,
        candidate: &MicroCluster,
        metric: DistanceMetric,
        idf: &IdfTable,
    ) -> DistanceStats {
        self.clusters
            .values()
            .map(|c| (c.id(), metric.distance(candidate, c, idf)))
            .collect()
    }

    /// Insert under a fresh id. Returns the id.
    pub fn insert(&mut self, mut cluster: MicroCluster) -> ClusterId {
        let id = self.next_id;
        self.next_id += 1;
        cluster.set_id(id);
        self.clusters.insert(id, cluster);
        self.fresh = false;
        id
    }

    /// Merge `source` into the live cluster `target`. Hands `source` back if
    /// `target` is not live.
    pub fn merge_into(
        &mut self,
        target: ClusterId,
        source: MicroCluster,
        now: f64,
        fading: &Fading,
    ) -> Result<(), MicroCluster> {
        match self.clusters.get_mut(&target) {
            Some(cluster) => {
                cluster.merge(source, now, fading);
                self.fresh = false;
                Ok(())
            }
            None => Err(source),
        }
    }

    /// Merge live cluster `absorbed` into live cluster `keep`, removing `absorbed`.
    /// Returns false (and changes nothing) unless both are live and distinct.
    pub fn merge_pair(&mut self, keep: ClusterId, absorbed: ClusterId, now: f64, fading: &Fading) -> bool {
        if keep == absorbed || !self.clusters.contains_key(&keep) {
            return false;
        }
        let Some(source) = self.clusters.remove(&absorbed) else {
            return false;
        };
        self.merge_into(keep, source, now, fading).is_ok()
    }

    pub fn remove(&mut self, id: ClusterId) -> Option<MicroCluster> {
        let removed = self.clusters.remove(&id);
        if removed.is_some() {
            self.fresh = false;
        }
        removed
    }

    pub fn record_assignment(&mut self, observation: ObservationIndex, cluster: ClusterId) {
        self.assignments.insert(observation, cluster);
    }

    /// Fade every cluster to `now` and evict those at or below the decay
    /// floor or without terms. Returns the number evicted.
    pub fn fade_all(&mut self, now: f64, fading: &Fading) -> usize {
        let before = self.clusters.len();
        self.clusters.retain(|_, cluster| {
            cluster.fade(now, fading);
            !cluster.is_evictable(fading.omega)
        });
        self.fresh = false;
        before - self.clusters.len()
    }

    /// Record weight trends for the current cleanup cycle.
    pub fn snapshot_trends(&mut self) {
        for cluster in self.clusters.values_mut() {
            cluster.snapshot_trend();
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn mark_fresh(&mut self) {
        self.fresh = true;
    }

    pub fn invalidate(&mut self) {
        self.fresh = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::micro_cluster::TermFrequencies;

    fn obs(pairs: &[(&str, f64)], time: f64) -> MicroCluster {
        let tf: TermFrequencies = pairs.iter().map(|(t, f)| (t.to_string(), *f)).collect();
        MicroCluster::from_observation(0, &tf, time, None)
    }

    fn fading() -> Fading {
        Fading::new(0.1, 10.0, true)
    }

    #[test]
    fn test_insert_assigns_monotonic_ids() {
        let mut store = MicroClusterStore::new();
        let a = store.insert(obs(&[("a", 1.0)], 0.0));
        let b = store.insert(obs(&[("b", 1.0)], 0.0));
        assert_eq!((a, b), (0, 1));
        assert_eq!(store.get(b).unwrap().id(), 1);

        store.remove(a);
        let c = store.insert(obs(&[("c", 1.0)], 0.0));
        assert_eq!(c, 2, "ids are never reused");
        assert_eq!(store.ids(), vec![1, 2]);
    }

    #[test]
    fn test_mutations_clear_freshness() {
        let mut store = MicroClusterStore::new();
        store.mark_fresh();
        let id = store.insert(obs(&[("a", 1.0)], 0.0));
        assert!(!store.is_fresh());

        store.mark_fresh();
        store
            .merge_into(id, obs(&[("a", 1.0)], 1.0), 1.0, &fading())
            .unwrap();
        assert!(!store.is_fresh());

        store.mark_fresh();
        store.remove(id);
        assert!(!store.is_fresh());
    }

    #[test]
    fn test_merge_into_missing_target_returns_source() {
        let mut store = MicroClusterStore::new();
        let source = obs(&[("a", 1.0)], 0.0);
        let back = store.merge_into(42, source, 0.0, &fading()).unwrap_err();
        assert_eq!(back.frequency("a"), 1.0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_merge_pair() {
        let mut store = MicroClusterStore::new();
        let a = store.insert(obs(&[("a", 2.0)], 0.0));
        let b = store.insert(obs(&[("a", 2.0)], 0.0));
        assert!(!store.merge_pair(a, a, 0.0, &fading()));
        assert!(!store.merge_pair(a, 99, 0.0, &fading()));
        assert!(store.merge_pair(a, b, 0.0, &fading()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(a).unwrap().weight(), 2.0);
        assert_eq!(store.get(a).unwrap().frequency("a"), 4.0);
    }

    #[test]
    fn test_fade_all_evicts_below_floor() {
        let mut store = MicroClusterStore::new();
        store.insert(obs(&[("old", 5.0)], 0.0));
        let recent = store.insert(obs(&[("new", 5.0)], 15.0));
        // The old cluster faded over 20 units keeps 0.25 of its weight (< ω = 0.5).
        let evicted = store.fade_all(20.0, &fading());
        assert_eq!(evicted, 1);
        assert_eq!(store.ids(), vec![recent]);
    }

    #[test]
    fn test_fade_all_evicts_empty_term_maps() {
        let mut store = MicroClusterStore::new();
        // Heavy cluster whose only term is at the floor.
        store.insert(obs(&[("tiny", 0.5)], 0.0));
        assert_eq!(store.fade_all(0.0, &fading()), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_distance_stats_visits_every_cluster() {
        let mut store = MicroClusterStore::new();
        store.insert(obs(&[("a", 1.0)], 0.0));
        store.insert(obs(&[("b", 1.0)], 0.0));
        let candidate = obs(&[("a", 1.0)], 0.0);
        let idf = store.idf();
        let stats = store.distance_stats(&candidate, DistanceMetric::TfIdfCosine, &idf);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.nearest, Some(0));
        assert_eq!(stats.min, 0.0);
    }

    #[test]
    fn test_assignment_log() {
        let mut store = MicroClusterStore::new();
        store.record_assignment(1, 0);
        store.record_assignment(2, 0);
        store.record_assignment(3, 5);
        assert_eq!(store.assignments().len(), 3);
        assert_eq!(store.assignments()[&3], 5);
    }
}
