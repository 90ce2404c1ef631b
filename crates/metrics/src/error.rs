//! Error types for the metrics registry.

use crate::metric::MetricKind;

/// Errors reported by registry construction, metric creation and updates.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The process-wide registry was looked up before one was installed.
    #[error("no metrics registry has been bootstrapped")]
    NotBootstrapped,

    /// A registry was already installed in the process-wide slot.
    #[error("a metrics registry has already been bootstrapped")]
    AlreadyBootstrapped,

    #[error("metric '{name}' already registered as {existing}, requested {requested}")]
    KindConflict {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    #[error("metric '{name}' already registered with labels {existing:?}, requested {requested:?}")]
    LabelShapeConflict {
        name: String,
        existing: Vec<String>,
        requested: Vec<String>,
    },

    /// Two metrics would write samples under the same name, e.g. a gauge
    /// `build_info` next to an info metric `build`.
    #[error("metric '{name}' would emit '{sample}', already emitted by metric '{existing}'")]
    NameCollision {
        name: String,
        sample: String,
        existing: String,
    },

    /// Histogram bounds must be finite and strictly ascending.
    #[error("invalid histogram buckets: {0}")]
    InvalidBuckets(String),

    /// Summary quantiles must lie in the open interval (0, 1).
    #[error("invalid quantile {0}: must be within (0, 1)")]
    InvalidQuantile(f64),

    #[error("invalid metric name '{0}'")]
    InvalidMetricName(String),

    #[error("invalid label name '{0}'")]
    InvalidLabelName(String),

    #[error("label '{0}' declared more than once")]
    DuplicateLabelName(String),

    /// `le` and `quantile` are added at render time and cannot be declared.
    #[error("label '{label}' is reserved for {kind} metrics")]
    ReservedLabel { label: String, kind: MetricKind },

    #[error("invalid metrics config: {0}")]
    Config(String),

    /// Counters are monotonic; the counter is left unchanged.
    #[error("counter '{name}' cannot be incremented by negative amount {amount}")]
    NegativeIncrement { name: String, amount: f64 },

    #[error("metric '{name}' expects labels {expected:?}, got {got:?}")]
    LabelMismatch {
        name: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("labels must serialize to a flat map of scalars: {0}")]
    LabelConversion(String),
}

impl Error {
    /// Whether this error was raised while creating or configuring a metric.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::KindConflict { .. }
                | Error::LabelShapeConflict { .. }
                | Error::NameCollision { .. }
                | Error::InvalidBuckets(_)
                | Error::InvalidQuantile(_)
                | Error::InvalidMetricName(_)
                | Error::InvalidLabelName(_)
                | Error::DuplicateLabelName(_)
                | Error::ReservedLabel { .. }
                | Error::Config(_)
        )
    }

    /// Whether this error was raised by a value update on an existing metric.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::NegativeIncrement { .. }
                | Error::LabelMismatch { .. }
                | Error::LabelConversion(_)
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, Error>;
