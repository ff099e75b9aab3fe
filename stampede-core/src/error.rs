use std::time::Duration;

use stampede_metrics::MetricError;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level failure of a run. Threshold failures are not errors; they are
/// reported through [`crate::summary::RunSummary::passed`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Rejected run options. These surface before any traffic is generated.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("only http:// URLs are supported for now: {0}")]
    OnlyHttpSupported(String),

    #[error("invalid threshold `{expression}` on metric `{metric}`: {reason}")]
    Threshold {
        metric: String,
        expression: String,
        reason: String,
    },

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

/// Failure of a single iteration of the workload. The virtual user records it
/// and moves on; it never tears down the run.
#[derive(Debug, thiserror::Error)]
pub enum IterationError {
    #[error(transparent)]
    Transport(#[from] crate::http::Error),

    #[error("check setup failed: {0}")]
    Check(String),
}

impl IterationError {
    /// True when the underlying request timed out rather than completing.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            IterationError::Transport(crate::http::Error::Timeout(_))
        )
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self {
            IterationError::Transport(crate::http::Error::Timeout(d)) => Some(*d),
            _ => None,
        }
    }
}

/// Failure while writing summary artifacts. Distinct from run errors so the
/// caller can report "the test ran but the artifacts did not land".
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("invalid output path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
