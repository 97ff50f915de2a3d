//! Macro clustering: complete-linkage agglomeration over the live micro clusters.
//!
//! Reclustering is lazy. The micro→macro mapping is recomputed only when a
//! caller asks for macro information and the micro-cluster set changed since
//! the last run.

use std::collections::BTreeMap;

use tracing::debug;

use crate::distance::{DistanceMetric, IdfTable};
use crate::fading::Fading;
use crate::micro_cluster::{ClusterId, MicroCluster};
use crate::store::MicroClusterStore;

/// Label of a macro cluster. Labels are dense, starting at 0.
pub type MacroLabel = usize;

/// Symmetric pairwise distances between a fixed list of clusters.
#[derive(Clone, Debug)]
pub struct DistanceMatrix {
    ids: Vec<ClusterId>,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Pairwise distances with IDF computed over `clusters` alone.
    pub fn build(clusters: &[&MicroCluster], metric: DistanceMetric) -> Self {
        let n = clusters.len();
        let idf = IdfTable::from_clusters(clusters.iter().copied());
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = metric.distance(clusters[i], clusters[j], &idf);
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }
        Self {
            ids: clusters.iter().map(|c| c.id()).collect(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[ClusterId] {
        &self.ids
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.ids.len() + j]
    }
}

/// Agglomerative clustering with complete linkage, stopped at `k` groups.
///
/// Returns one label per matrix row. Labels are numbered in order of first
/// appearance, so row 0 is always label 0. Ties between equally close pairs
/// go to the pair with the lowest row indices.
pub fn complete_linkage(matrix: &DistanceMatrix, k: usize) -> Vec<MacroLabel> {
    let n = matrix.len();
    if n == 0 {
        return Vec::new();
    }
    let k = k.clamp(1, n);

    let mut groups: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    let mut linkage: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| matrix.get(i, j)).collect())
        .collect();
    let mut active = vec![true; n];
    let mut remaining = n;

    while remaining > k {
        let mut closest: Option<(usize, usize, f64)> = None;
        for a in (0..n).filter(|&a| active[a]) {
            for b in ((a + 1)..n).filter(|&b| active[b]) {
                let d = linkage[a][b];
                if closest.is_none_or(|(_, _, best)| d < best) {
                    closest = Some((a, b, d));
                }
            }
        }
        let Some((a, b, _)) = closest else {
            break;
        };

        let absorbed = std::mem::take(&mut groups[b]);
        groups[a].extend(absorbed);
        active[b] = false;
        for c in (0..n).filter(|&c| active[c] && c != a) {
            let d = linkage[a][c].max(linkage[b][c]);
            linkage[a][c] = d;
            linkage[c][a] = d;
        }
        remaining -= 1;
    }

    let mut owner = vec![0; n];
    for (g, members) in groups.iter().enumerate() {
        for &m in members {
            owner[m] = g;
        }
    }

    let mut label_of_group: Vec<Option<MacroLabel>> = vec![None; n];
    let mut next = 0;
    let mut labels = Vec::with_capacity(n);
    for g in owner {
        let label = match label_of_group[g] {
            Some(label) => label,
            None => {
                let label = next;
                next += 1;
                label_of_group[g] = Some(label);
                label
            }
        };
        labels.push(label);
    }
    labels
}

/// Holds the cached micro→macro mapping and rebuilds it on demand.
#[derive(Clone, Debug)]
pub struct Reclusterer {
    metric: DistanceMetric,
    macro_cluster_count: usize,
    min_weight: f64,
    micro_to_macro: BTreeMap<ClusterId, MacroLabel>,
}

impl Reclusterer {
    pub fn new(metric: DistanceMetric, macro_cluster_count: usize, min_weight: f64) -> Self {
        Self {
            metric,
            macro_cluster_count,
            min_weight,
            micro_to_macro: BTreeMap::new(),
        }
    }

    pub fn mapping(&self) -> &BTreeMap<ClusterId, MacroLabel> {
        &self.micro_to_macro
    }

    pub fn label_of(&self, id: ClusterId) -> Option<MacroLabel> {
        self.micro_to_macro.get(&id).copied()
    }

    /// Recompute the mapping unless the store is unchanged since the last run.
    ///
    /// Fades and evicts first, then clusters every micro cluster heavier than
    /// `min_weight`. Returns whether a recomputation happened.
    pub fn refresh(&mut self, store: &mut MicroClusterStore, now: f64, fading: &Fading) -> bool {
        if store.is_fresh() {
            return false;
        }

        let evicted = store.fade_all(now, fading);
        let survivors: Vec<&MicroCluster> = store
            .clusters()
            .filter(|c| c.weight() > self.min_weight)
            .collect();

        if survivors.len() < self.macro_cluster_count {
            debug!(
                requested = self.macro_cluster_count,
                available = survivors.len(),
                "fewer micro clusters than requested macro clusters"
            );
        }

        let labels = if survivors.len() < 2 {
            vec![0; survivors.len()]
        } else {
            let k = self.macro_cluster_count.min(survivors.len());
            complete_linkage(&DistanceMatrix::build(&survivors, self.metric), k)
        };

        self.micro_to_macro = survivors.iter().map(|c| c.id()).zip(labels).collect();
        debug!(
            now,
            evicted,
            micro = self.micro_to_macro.len(),
            "reclustered"
        );
        store.mark_fresh();
        true
    }

    /// One representative per macro label: the merge of its member micro
    /// clusters in ascending id order, all faded to `now`.
    pub fn representatives(
        &self,
        store: &MicroClusterStore,
        now: f64,
        fading: &Fading,
    ) -> BTreeMap<MacroLabel, MicroCluster> {
        let mut macros: BTreeMap<MacroLabel, MicroCluster> = BTreeMap::new();
        for (&id, &label) in &self.micro_to_macro {
            let Some(cluster) = store.get(id) else {
                continue;
            };
            macros
                .entry(label)
                .or_insert_with(|| MicroCluster::empty(label as ClusterId, now))
                .merge(cluster.clone(), now, fading);
        }
        macros
    }
}
