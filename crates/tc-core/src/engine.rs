//! The streaming clustering engine.
//!
//! `TextClust` owns the micro-cluster store and every policy object. Each
//! observation is either absorbed by its nearest micro cluster or starts a new
//! one; cleanup runs on a fixed time gap; macro clusters are derived lazily.

use std::collections::BTreeMap;

use tracing::trace;

use crate::cleanup::{CleanupScheduler, CycleStats, MergeRule};
use crate::config::ClusterConfig;
use crate::distance::{DistanceMetric, IdfTable};
use crate::error::{ClusterError, Result};
use crate::fading::Fading;
use crate::micro_cluster::{ClusterId, MicroCluster, TermFrequencies};
use crate::recluster::{MacroLabel, Reclusterer};
use crate::store::{MicroClusterStore, ObservationIndex};
use crate::summary::{Assignment, ClusterMode, ClusterSummary, EngineStats};
use crate::threshold::ThresholdPolicy;

pub struct TextClust {
    config: ClusterConfig,
    fading: Fading,
    policy: ThresholdPolicy,
    micro_metric: DistanceMetric,
    store: MicroClusterStore,
    scheduler: CleanupScheduler,
    cycle: CycleStats,
    reclusterer: Reclusterer,
    now: f64,
    observations: u64,
}

impl TextClust {
    /// Build an engine. Fails on any invalid configuration value.
    pub fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;
        let micro_metric = config.micro_metric()?;
        let macro_metric = config.macro_metric()?;

        let rule = match (config.auto_merge, config.adaptive_threshold) {
            (false, _) => MergeRule::Off,
            (true, false) => MergeRule::Radius(config.radius),
            (true, true) => MergeRule::MeanMergeDistance,
        };

        Ok(Self {
            fading: config.fading(),
            policy: config.threshold_policy(),
            micro_metric,
            store: MicroClusterStore::new(),
            scheduler: CleanupScheduler::new(config.cleanup_interval, micro_metric, rule),
            cycle: CycleStats::default(),
            reclusterer: Reclusterer::new(
                macro_metric,
                config.macro_cluster_count,
                config.min_weight,
            ),
            now: 0.0,
            observations: 0,
            config,
        })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Absorb one observation and return the micro cluster it landed in.
    ///
    /// `time` is required when real-time fading is on and ignored otherwise;
    /// the observation counter is the clock in that case. Nothing changes
    /// when an error is returned.
    pub fn learn_one(
        &mut self,
        terms: &TermFrequencies,
        time: Option<f64>,
        record_id: Option<&str>,
    ) -> Result<ClusterId> {
        if terms.is_empty() {
            return Err(ClusterError::EmptyObservation);
        }
        let supplied = self.supplied_time(time)?;
        validate_frequencies(terms)?;
        let now = match supplied {
            Some(t) => {
                if self.observations > 0 && t < self.now {
                    return Err(ClusterError::TimeRegression {
                        now: self.now,
                        supplied: t,
                    });
                }
                t
            }
            None => (self.observations + 1) as f64,
        };

        let candidate = MicroCluster::from_observation(self.store.next_id(), terms, now, record_id);
        let idf = self.store.idf();
        let stats = self.store.distance_stats(&candidate, self.micro_metric, &idf);
        let decision = self.policy.decide(&stats);

        self.now = now;
        self.observations += 1;
        let observation: ObservationIndex = self.observations;

        let id = match decision.cluster_id {
            Some(target) => match self.store.merge_into(target, candidate, now, &self.fading) {
                Ok(()) => {
                    self.cycle.record_merge(decision.min_distance);
                    trace!(observation, cluster = target, distance = decision.min_distance, "merged");
                    target
                }
                Err(candidate) => self.store.insert(candidate),
            },
            None => {
                let id = self.store.insert(candidate);
                trace!(observation, cluster = id, candidates = decision.candidates, "new cluster");
                id
            }
        };
        self.store.record_assignment(observation, id);

        if self.scheduler.is_due(now) {
            let cycle = std::mem::take(&mut self.cycle);
            self.scheduler.run(&mut self.store, now, &self.fading, cycle);
        }

        Ok(id)
    }

    /// Nearest micro or macro cluster for `terms`, without learning it.
    pub fn predict_one(
        &mut self,
        terms: &TermFrequencies,
        mode: ClusterMode,
    ) -> Result<Option<Assignment>> {
        match mode {
            ClusterMode::Micro => Ok(self.predict_micro(terms)?.map(Assignment::Micro)),
            ClusterMode::Macro => Ok(self.predict_macro(terms)?.map(Assignment::Macro)),
        }
    }

    /// Nearest micro cluster that would survive a fade to the current time
    /// and is heavier than `min_weight`. IDF covers the same clusters.
    /// Lowest id wins ties. Read-only.
    pub fn predict_micro(&self, terms: &TermFrequencies) -> Result<Option<ClusterId>> {
        if terms.is_empty() {
            return Err(ClusterError::EmptyObservation);
        }
        validate_frequencies(terms)?;

        let eligible: Vec<&MicroCluster> = self
            .store
            .clusters()
            .filter(|c| {
                let weight = c.weight_at(self.now, &self.fading);
                weight > self.fading.omega && weight > self.config.min_weight
            })
            .collect();

        let candidate = MicroCluster::from_observation(0, terms, self.now, None);
        let idf = IdfTable::from_clusters(eligible.iter().copied());
        let mut nearest: Option<(ClusterId, f64)> = None;
        for cluster in eligible {
            let d = self.micro_metric.distance(&candidate, cluster, &idf);
            if nearest.is_none_or(|(_, best)| d < best) {
                nearest = Some((cluster.id(), d));
            }
        }
        Ok(nearest.map(|(id, _)| id))
    }

    /// Macro label of the nearest eligible micro cluster.
    pub fn predict_macro(&mut self, terms: &TermFrequencies) -> Result<Option<MacroLabel>> {
        if terms.is_empty() {
            return Err(ClusterError::EmptyObservation);
        }
        validate_frequencies(terms)?;
        self.refresh_macro();
        let nearest = self.predict_micro(terms)?;
        Ok(nearest.and_then(|id| self.reclusterer.label_of(id)))
    }

    /// One merged representative per macro cluster.
    pub fn macro_clusters(&mut self) -> BTreeMap<MacroLabel, MicroCluster> {
        self.refresh_macro();
        self.reclusterer
            .representatives(&self.store, self.now, &self.fading)
    }

    pub fn micro_to_macro(&mut self) -> &BTreeMap<ClusterId, MacroLabel> {
        self.refresh_macro();
        self.reclusterer.mapping()
    }

    /// The `top_n` heaviest clusters with their `terms_per_cluster` heaviest terms.
    pub fn top_clusters(
        &mut self,
        top_n: usize,
        terms_per_cluster: usize,
        mode: ClusterMode,
    ) -> Vec<ClusterSummary> {
        let mut summaries: Vec<ClusterSummary> = match mode {
            ClusterMode::Micro => self
                .store
                .clusters()
                .map(|c| {
                    ClusterSummary::from_cluster(c, c.weight_at(self.now, &self.fading), terms_per_cluster)
                })
                .collect(),
            ClusterMode::Macro => {
                let macros = self.macro_clusters();
                let mut trends: BTreeMap<MacroLabel, f64> = BTreeMap::new();
                for (&id, &label) in self.reclusterer.mapping() {
                    if let Some(c) = self.store.get(id) {
                        *trends.entry(label).or_default() += c.delta_weight();
                    }
                }
                macros
                    .iter()
                    .map(|(label, c)| ClusterSummary {
                        trend: trends.get(label).copied().unwrap_or(0.0),
                        ..ClusterSummary::from_cluster(c, c.weight(), terms_per_cluster)
                    })
                    .collect()
            }
        };
        summaries.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        summaries.truncate(top_n);
        summaries
    }

    /// Live micro clusters in ascending id order.
    pub fn micro_clusters(&self) -> impl Iterator<Item = &MicroCluster> {
        self.store.clusters()
    }

    pub fn micro_cluster(&self, id: ClusterId) -> Option<&MicroCluster> {
        self.store.get(id)
    }

    pub fn cluster_count(&self) -> usize {
        self.store.len()
    }

    /// Observation index (from 1) → micro cluster the observation was assigned to.
    pub fn assignments(&self) -> &BTreeMap<ObservationIndex, ClusterId> {
        self.store.assignments()
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            clusters: self.store.len(),
            observations: self.observations,
            now: self.now,
            last_cleanup: self.scheduler.last_cleanup(),
            fresh: self.store.is_fresh(),
        }
    }

    fn refresh_macro(&mut self) {
        self.reclusterer
            .refresh(&mut self.store, self.now, &self.fading);
    }

    fn supplied_time(&self, time: Option<f64>) -> Result<Option<f64>> {
        if !self.config.real_time_fading {
            return Ok(None);
        }
        match time {
            None => Err(ClusterError::MissingTimestamp),
            Some(t) if !t.is_finite() => Err(ClusterError::InvalidTimestamp(t)),
            Some(t) => Ok(Some(t)),
        }
    }
}

fn validate_frequencies(terms: &TermFrequencies) -> Result<()> {
    match terms.iter().find(|(_, v)| !v.is_finite() || **v < 0.0) {
        Some((term, &value)) => Err(ClusterError::InvalidFrequency {
            term: term.clone(),
            value,
        }),
        None => Ok(()),
    }
}
