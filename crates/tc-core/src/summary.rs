use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::micro_cluster::{ClusterId, MicroCluster};
use crate::recluster::MacroLabel;

/// Which level of clustering a query addresses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    #[default]
    Micro,
    Macro,
}

impl FromStr for ClusterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "micro" => Ok(Self::Micro),
            "macro" => Ok(Self::Macro),
            other => Err(format!("unknown cluster mode '{other}', expected micro or macro")),
        }
    }
}

impl fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Micro => f.write_str("micro"),
            Self::Macro => f.write_str("macro"),
        }
    }
}

/// Result of a prediction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "id", rename_all = "lowercase")]
pub enum Assignment {
    Micro(ClusterId),
    Macro(MacroLabel),
}

/// Human-readable snapshot of one cluster: weight, trend and heaviest terms.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub id: u64,
    pub weight: f64,
    /// Weight change between the last two cleanup cycles.
    pub trend: f64,
    pub observations: u64,
    pub top_terms: Vec<(String, f64)>,
}

impl ClusterSummary {
    pub fn from_cluster(cluster: &MicroCluster, weight: f64, terms: usize) -> Self {
        Self {
            id: cluster.id(),
            weight,
            trend: cluster.delta_weight(),
            observations: cluster.observation_count(),
            top_terms: cluster.top_terms(terms),
        }
    }
}

impl fmt::Display for ClusterSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "cluster {} (weight {:.4}, trend {:+.4}, {} observations)",
            self.id, self.weight, self.trend, self.observations
        )?;
        for (term, freq) in &self.top_terms {
            writeln!(f, "  {freq:>8.3}  {term}")?;
        }
        Ok(())
    }
}

/// Render a list of summaries under a heading for `mode`.
pub fn render_summaries(mode: ClusterMode, summaries: &[ClusterSummary]) -> String {
    let mut out = format!("{} clusters: {}\n", mode, summaries.len());
    for summary in summaries {
        out.push_str(&summary.to_string());
    }
    out
}

/// Counters describing the engine's current state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineStats {
    /// Live micro clusters.
    pub clusters: usize,
    /// Successfully learned observations.
    pub observations: u64,
    pub now: f64,
    pub last_cleanup: f64,
    /// Whether the cached macro clustering reflects the current micro clusters.
    pub fresh: bool,
}
