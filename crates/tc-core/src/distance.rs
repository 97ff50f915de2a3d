//! IDF-weighted cosine distance between micro clusters.
//!
//! IDF is a property of the *current* live cluster population, not of the
//! stream history: every nearest-neighbour scan and every macro distance
//! matrix recomputes it from the clusters at hand.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{DISTANCE_PRECISION, TFIDF_COSINE_DISTANCE};
use crate::error::ClusterError;
use crate::micro_cluster::MicroCluster;

/// Inverse document frequency per term, counting clusters as documents.
#[derive(Clone, Debug, Default)]
pub struct IdfTable {
    weights: HashMap<String, f64>,
    cluster_count: usize,
}

impl IdfTable {
    /// idf(t) = 1 + ln(N / df(t)) over the given clusters.
    pub fn from_clusters<'a>(clusters: impl IntoIterator<Item = &'a MicroCluster>) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut cluster_count = 0;
        for cluster in clusters {
            cluster_count += 1;
            for term in cluster.terms().keys() {
                *doc_freq.entry(term.clone()).or_default() += 1;
            }
        }

        let n = cluster_count as f64;
        let weights = doc_freq
            .into_iter()
            .map(|(term, df)| (term, 1.0 + (n / df as f64).ln()))
            .collect();

        Self {
            weights,
            cluster_count,
        }
    }

    /// IDF weight of `term`, 0 for terms no cluster contains.
    pub fn weight(&self, term: &str) -> f64 {
        self.weights.get(term).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.weights.contains_key(term)
    }

    /// Number of clusters the table was computed over.
    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Supported distance metrics, resolved from their configured name once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    #[default]
    #[serde(rename = "tfidf_cosine_distance")]
    TfIdfCosine,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TfIdfCosine => TFIDF_COSINE_DISTANCE,
        }
    }

    /// Distance between two clusters under the given IDF table.
    pub fn distance(&self, a: &MicroCluster, b: &MicroCluster, idf: &IdfTable) -> f64 {
        match self {
            Self::TfIdfCosine => tfidf_cosine_distance(a, b, idf),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            TFIDF_COSINE_DISTANCE => Ok(Self::TfIdfCosine),
            other => Err(ClusterError::UnknownDistanceMetric(other.to_string())),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1 − cos(a, b) over tf·idf vectors, rounded to [`DISTANCE_PRECISION`]
/// digits. A zero vector on either side is maximally distant (1).
///
/// Terms without an IDF entry are skipped. Each side is scaled by its
/// largest frequency first, so huge frequencies cannot overflow the norms.
pub fn tfidf_cosine_distance(a: &MicroCluster, b: &MicroCluster, idf: &IdfTable) -> f64 {
    let scale_a = max_frequency(a, idf);
    let scale_b = max_frequency(b, idf);
    if scale_a == 0.0 || scale_b == 0.0 {
        return 1.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    for (term, entry) in a.terms() {
        if !idf.contains(term) {
            continue;
        }
        let w = idf.weight(term);
        let va = entry.frequency / scale_a * w;
        if let Some(other) = b.terms().get(term) {
            dot += va * (other.frequency / scale_b * w);
        }
        norm_a += va * va;
    }

    let norm_b: f64 = b
        .terms()
        .iter()
        .filter(|(term, _)| idf.contains(term))
        .map(|(term, entry)| {
            let vb = entry.frequency / scale_b * idf.weight(term);
            vb * vb
        })
        .sum();

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    round_to(1.0 - dot / (norm_a * norm_b), DISTANCE_PRECISION)
}

/// Largest frequency among the terms of `cluster` that carry an IDF weight.
fn max_frequency(cluster: &MicroCluster, idf: &IdfTable) -> f64 {
    cluster
        .terms()
        .iter()
        .filter(|(term, _)| idf.contains(term))
        .map(|(_, entry)| entry.frequency)
        .fold(0.0, f64::max)
}

fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}
