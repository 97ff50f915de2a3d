/// Name of the tf-idf weighted cosine distance metric.
pub const TFIDF_COSINE_DISTANCE: &str = "tfidf_cosine_distance";

/// Decimal digits kept when rounding distances.
/// Stabilizes threshold comparisons against floating-point noise.
pub const DISTANCE_PRECISION: i32 = 10;

/// Default fixed merge radius
pub const DEFAULT_RADIUS: f64 = 0.3;

/// Default fading rate λ
pub const DEFAULT_DECAY_RATE: f64 = 0.0005;

/// Default time between cleanup cycles
pub const DEFAULT_CLEANUP_INTERVAL: f64 = 100.0;

/// Default number of macro clusters requested from reclustering
pub const DEFAULT_MACRO_CLUSTER_COUNT: usize = 3;

/// Default standard-deviation multiplier for the adaptive threshold
pub const DEFAULT_SIGMA: f64 = 1.0;
