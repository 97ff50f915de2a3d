use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::fading::Fading;

/// Stable identifier of a live micro cluster. Never reused.
pub type ClusterId = u64;

/// Identifier of an upstream record (document, message, ...).
pub type RecordId = String;

/// Input vector for one record: term → frequency.
pub type TermFrequencies = HashMap<String, f64>;

/// Frequency of one term inside a cluster plus the records that contributed it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    pub frequency: f64,
    pub record_ids: Vec<RecordId>,
}

/// A decaying summary of one or more similar observations.
///
/// State only changes through [`MicroCluster::fade`] and
/// [`MicroCluster::merge`]; everything else is read access.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MicroCluster {
    id: ClusterId,
    weight: f64,
    time: f64,
    terms: BTreeMap<String, TermEntry>,
    record_ids: Vec<RecordId>,
    old_weight: f64,
    delta_weight: f64,
    observation_count: u64,
}

impl MicroCluster {
    /// Wrap a single observation as a cluster of weight 1.
    pub fn from_observation(
        id: ClusterId,
        terms: &TermFrequencies,
        time: f64,
        record_id: Option<&str>,
    ) -> Self {
        let ids: Vec<RecordId> = record_id.map(str::to_string).into_iter().collect();
        let terms = terms
            .iter()
            .map(|(term, &frequency)| {
                (
                    term.clone(),
                    TermEntry {
                        frequency,
                        record_ids: ids.clone(),
                    },
                )
            })
            .collect();
        Self {
            id,
            weight: 1.0,
            time,
            terms,
            record_ids: ids,
            old_weight: 0.0,
            delta_weight: 0.0,
            observation_count: 1,
        }
    }

    /// A weightless cluster with no terms, used as a merge target for
    /// macro-cluster representatives.
    pub fn empty(id: ClusterId, time: f64) -> Self {
        Self {
            id,
            weight: 0.0,
            time,
            terms: BTreeMap::new(),
            record_ids: Vec::new(),
            old_weight: 0.0,
            delta_weight: 0.0,
            observation_count: 0,
        }
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Time of the last update.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn terms(&self) -> &BTreeMap<String, TermEntry> {
        &self.terms
    }

    /// Frequency of `term`, 0 when absent.
    pub fn frequency(&self, term: &str) -> f64 {
        self.terms.get(term).map_or(0.0, |e| e.frequency)
    }

    pub fn record_ids(&self) -> &[RecordId] {
        &self.record_ids
    }

    /// Weight at the previous cleanup cycle.
    pub fn old_weight(&self) -> f64 {
        self.old_weight
    }

    /// Weight change between the last two cleanup cycles.
    pub fn delta_weight(&self) -> f64 {
        self.delta_weight
    }

    pub fn observation_count(&self) -> u64 {
        self.observation_count
    }

    /// Weight this cluster would have if faded to `now`, without fading it.
    pub fn weight_at(&self, now: f64, fading: &Fading) -> f64 {
        self.weight * fading.factor(self.time, now)
    }

    /// Eligible for eviction: faded to the floor or no terms left.
    pub fn is_evictable(&self, omega: f64) -> bool {
        self.weight <= omega || self.terms.is_empty()
    }

    /// Fade weight (and term frequencies, if term fading is on) to `now`.
    /// Terms at or below the decay floor are dropped.
    pub fn fade(&mut self, now: f64, fading: &Fading) {
        let factor = fading.factor(self.time, now);
        self.weight *= factor;
        if fading.term_fading {
            let omega = fading.omega;
            self.terms.retain(|_, entry| {
                entry.frequency *= factor;
                entry.frequency > omega
            });
        }
        if now > self.time {
            self.time = now;
        }
    }

    /// Merge `other` into `self`. Both sides are faded to `now` first, then
    /// weights, term frequencies, record ids and observation counts are summed.
    /// `self` keeps its id.
    pub fn merge(&mut self, mut other: MicroCluster, now: f64, fading: &Fading) {
        self.fade(now, fading);
        other.fade(now, fading);

        self.weight += other.weight;
        self.observation_count += other.observation_count;
        self.record_ids.append(&mut other.record_ids);

        for (term, incoming) in other.terms {
            match self.terms.entry(term) {
                Entry::Occupied(mut slot) => {
                    let entry = slot.get_mut();
                    entry.frequency += incoming.frequency;
                    entry.record_ids.extend(incoming.record_ids);
                }
                Entry::Vacant(slot) => {
                    slot.insert(incoming);
                }
            }
        }

        if now > self.time {
            self.time = now;
        }
    }

    /// Heaviest `n` terms, by frequency descending.
    pub fn top_terms(&self, n: usize) -> Vec<(String, f64)> {
        let mut terms: Vec<(String, f64)> = self
            .terms
            .iter()
            .map(|(t, e)| (t.clone(), e.frequency))
            .collect();
        terms.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        terms.truncate(n);
        terms
    }

    /// Record the weight trend for this cleanup cycle.
    pub(crate) fn snapshot_trend(&mut self) {
        self.delta_weight = self.weight - self.old_weight;
        self.old_weight = self.weight;
    }

    pub(crate) fn set_id(&mut self, id: ClusterId) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tf(pairs: &[(&str, f64)]) -> TermFrequencies {
        pairs.iter().map(|(t, f)| (t.to_string(), *f)).collect()
    }

    fn fading(term_fading: bool) -> Fading {
        Fading::new(0.1, 10.0, term_fading)
    }

    #[test]
    fn test_from_observation() {
        let mc = MicroCluster::from_observation(7, &tf(&[("rust", 2.0), ("code", 1.0)]), 3.0, Some("doc-1"));
        assert_eq!(mc.id(), 7);
        assert_eq!(mc.weight(), 1.0);
        assert_eq!(mc.time(), 3.0);
        assert_eq!(mc.observation_count(), 1);
        assert_eq!(mc.frequency("rust"), 2.0);
        assert_eq!(mc.frequency("missing"), 0.0);
        assert_eq!(mc.record_ids(), ["doc-1".to_string()]);
        assert_eq!(mc.terms()["code"].record_ids, vec!["doc-1".to_string()]);
    }

    #[test]
    fn test_from_observation_without_record_id() {
        let mc = MicroCluster::from_observation(0, &tf(&[("a", 1.0)]), 0.0, None);
        assert!(mc.record_ids().is_empty());
        assert!(mc.terms()["a"].record_ids.is_empty());
    }

    #[test]
    fn test_fade_weight_and_terms() {
        let f = fading(true);
        let mut mc = MicroCluster::from_observation(0, &tf(&[("a", 4.0)]), 0.0, None);
        mc.fade(10.0, &f);
        assert_relative_eq!(mc.weight(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(mc.frequency("a"), 2.0, epsilon = 1e-12);
        assert_eq!(mc.time(), 10.0);
    }

    #[test]
    fn test_fade_drops_terms_at_floor() {
        let f = fading(true);
        // omega = 0.5; a term of 1.0 faded over one interval lands exactly on it
        let mut mc = MicroCluster::from_observation(0, &tf(&[("a", 1.0), ("b", 3.0)]), 0.0, None);
        mc.fade(10.0, &f);
        assert!(!mc.terms().contains_key("a"));
        assert!(mc.terms().contains_key("b"));
    }

    #[test]
    fn test_fade_without_term_fading_keeps_frequencies() {
        let f = fading(false);
        let mut mc = MicroCluster::from_observation(0, &tf(&[("a", 1.0)]), 0.0, None);
        mc.fade(50.0, &f);
        assert_eq!(mc.frequency("a"), 1.0);
        assert!(mc.weight() < 1.0);
    }

    #[test]
    fn test_fade_never_moves_time_backwards() {
        let f = fading(true);
        let mut mc = MicroCluster::from_observation(0, &tf(&[("a", 5.0)]), 5.0, None);
        mc.fade(2.0, &f);
        assert_eq!(mc.time(), 5.0);
        assert_eq!(mc.weight(), 1.0);
    }

    #[test]
    fn test_merge_conserves_weight() {
        let f = fading(false);
        let mut a = MicroCluster::from_observation(1, &tf(&[("x", 1.0)]), 0.0, Some("r1"));
        let b = MicroCluster::from_observation(2, &tf(&[("x", 1.0), ("y", 2.0)]), 5.0, Some("r2"));
        let expected = a.weight_at(10.0, &f) + b.weight_at(10.0, &f);

        a.merge(b, 10.0, &f);

        assert_relative_eq!(a.weight(), expected, epsilon = 1e-12);
        assert_eq!(a.id(), 1);
        assert_eq!(a.time(), 10.0);
        assert_eq!(a.observation_count(), 2);
        assert_eq!(a.record_ids(), ["r1".to_string(), "r2".to_string()]);
        assert_eq!(a.terms()["x"].record_ids, vec!["r1".to_string(), "r2".to_string()]);
        assert_eq!(a.terms()["y"].record_ids, vec!["r2".to_string()]);
        assert_relative_eq!(a.frequency("x"), 1.0 * 0.5 + 1.0 * 2f64.powf(-0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_merge_numeric_state_is_symmetric() {
        let f = fading(true);
        let a = MicroCluster::from_observation(1, &tf(&[("x", 3.0), ("y", 2.0)]), 0.0, None);
        let b = MicroCluster::from_observation(2, &tf(&[("y", 4.0), ("z", 5.0)]), 3.0, None);

        let mut ab = a.clone();
        ab.merge(b.clone(), 4.0, &f);
        let mut ba = b;
        ba.merge(a, 4.0, &f);

        assert_relative_eq!(ab.weight(), ba.weight(), epsilon = 1e-12);
        for term in ["x", "y", "z"] {
            assert_relative_eq!(ab.frequency(term), ba.frequency(term), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_merge_into_empty() {
        let f = fading(false);
        let mut rep = MicroCluster::empty(0, 10.0);
        let mc = MicroCluster::from_observation(4, &tf(&[("a", 2.0)]), 10.0, None);
        rep.merge(mc, 10.0, &f);
        assert_eq!(rep.weight(), 1.0);
        assert_eq!(rep.frequency("a"), 2.0);
        assert_eq!(rep.observation_count(), 1);
    }

    #[test]
    fn test_evictable() {
        let mc = MicroCluster::from_observation(0, &tf(&[("a", 1.0)]), 0.0, None);
        assert!(!mc.is_evictable(0.5));
        assert!(mc.is_evictable(1.0));
        assert!(MicroCluster::empty(1, 0.0).is_evictable(0.0));
    }

    #[test]
    fn test_top_terms_sorted() {
        let mc = MicroCluster::from_observation(
            0,
            &tf(&[("low", 1.0), ("high", 9.0), ("mid", 4.0)]),
            0.0,
            None,
        );
        let top = mc.top_terms(2);
        assert_eq!(top, vec![("high".to_string(), 9.0), ("mid".to_string(), 4.0)]);
    }

    #[test]
    fn test_snapshot_trend() {
        let f = fading(false);
        let mut mc = MicroCluster::from_observation(0, &tf(&[("a", 1.0)]), 0.0, None);
        mc.snapshot_trend();
        assert_eq!(mc.delta_weight(), 1.0);
        assert_eq!(mc.old_weight(), 1.0);
        mc.fade(10.0, &f);
        mc.snapshot_trend();
        assert_relative_eq!(mc.delta_weight(), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mc = MicroCluster::from_observation(3, &tf(&[("a", 1.5)]), 2.0, Some("r"));
        let json = serde_json::to_string(&mc).unwrap();
        let back: MicroCluster = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), 3);
        assert_eq!(back.frequency("a"), 1.5);
        assert_eq!(back.record_ids(), mc.record_ids());
    }
}
