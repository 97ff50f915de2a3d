//! textclust: online clustering of text streams.
//!
//! A stream of sparse term-frequency vectors is summarised into a bounded set
//! of time-decayed micro clusters. Each observation joins its nearest micro
//! cluster under an IDF-weighted cosine distance, or starts a new one.
//! Periodic cleanup fades, evicts and merges micro clusters; on demand they
//! are grouped into macro clusters by complete-linkage agglomeration.
//!
//! Zero I/O: the engine has no opinions about transport or input format.

pub mod cleanup;
pub mod config;
pub mod constants;
pub mod distance;
pub mod engine;
pub mod error;
pub mod fading;
pub mod micro_cluster;
pub mod recluster;
pub mod store;
pub mod summary;
pub mod threshold;
pub mod tokenizer;

pub use cleanup::{CleanupReport, CleanupScheduler, CycleStats, MergeRule, auto_merge};
pub use config::ClusterConfig;
pub use constants::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_DECAY_RATE, DEFAULT_MACRO_CLUSTER_COUNT, DEFAULT_RADIUS,
    DEFAULT_SIGMA, DISTANCE_PRECISION, TFIDF_COSINE_DISTANCE,
};
pub use distance::{DistanceMetric, IdfTable, tfidf_cosine_distance};
pub use engine::TextClust;
pub use error::{ClusterError, Result};
pub use fading::{Fading, decay_factor, decay_floor, fade};
pub use micro_cluster::{ClusterId, MicroCluster, RecordId, TermEntry, TermFrequencies};
pub use recluster::{DistanceMatrix, MacroLabel, Reclusterer, complete_linkage};
pub use store::{MicroClusterStore, ObservationIndex};
pub use summary::{Assignment, ClusterMode, ClusterSummary, EngineStats, render_summaries};
pub use threshold::{DistanceStats, NearestMatch, ThresholdPolicy};
pub use tokenizer::{BagOfWords, tokenize};
