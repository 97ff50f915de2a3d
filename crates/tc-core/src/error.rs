use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ClusterError {
    /// The observation has no terms, so no cluster can be formed.
    EmptyObservation,
    /// Real-time fading is enabled but the observation carries no timestamp.
    MissingTimestamp,
    /// A supplied timestamp is NaN or infinite.
    InvalidTimestamp(f64),
    /// A real-time timestamp lies before the engine's current time.
    TimeRegression { now: f64, supplied: f64 },
    /// A term frequency is negative, NaN or infinite.
    InvalidFrequency { term: String, value: f64 },
    UnknownDistanceMetric(String),
    InvalidRadius(f64),
    InvalidConfig(String),
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterError::EmptyObservation => write!(f, "empty observation: no terms to cluster"),
            ClusterError::MissingTimestamp => {
                write!(f, "missing timestamp: real-time fading requires a time per observation")
            }
            ClusterError::InvalidTimestamp(t) => write!(f, "invalid timestamp {t}: must be finite"),
            ClusterError::TimeRegression { now, supplied } => {
                write!(f, "time regression: observation at {supplied} is before current time {now}")
            }
            ClusterError::InvalidFrequency { term, value } => {
                write!(f, "invalid frequency {value} for term '{term}'")
            }
            ClusterError::UnknownDistanceMetric(name) => write!(f, "unknown distance metric: {name}"),
            ClusterError::InvalidRadius(r) => write!(f, "invalid radius {r}: must be within (0, 1]"),
            ClusterError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ClusterError {}

impl ClusterError {
    /// Whether the error rejects a single record rather than the whole setup.
    pub fn is_per_record(&self) -> bool {
        matches!(
            self,
            ClusterError::EmptyObservation
                | ClusterError::MissingTimestamp
                | ClusterError::InvalidTimestamp(_)
                | ClusterError::TimeRegression { .. }
                | ClusterError::InvalidFrequency { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;
