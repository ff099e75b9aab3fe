use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::schedule::StageSchedule;
use crate::thresholds::ParsedThreshold;

pub const DEFAULT_PACING: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One ramp segment: ramp to `target` virtual users across `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

/// A threshold as given by the caller, not yet parsed.
#[derive(Debug, Clone)]
pub struct Threshold {
    pub metric: String,
    pub expression: String,
}

/// Raw run options as collected from the caller. [`RunOptions::validate`]
/// turns these into a [`RunPlan`]; nothing here is trusted until then.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub url: String,
    pub stages: Vec<Stage>,
    pub thresholds: Vec<Threshold>,
    pub pacing: Duration,
    pub request_timeout: Duration,
    pub zone: Option<String>,
}

impl RunOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stages: Vec::new(),
            thresholds: Vec::new(),
            pacing: DEFAULT_PACING,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            zone: None,
        }
    }

    pub fn validate(self) -> Result<RunPlan, ConfigError> {
        let parsed = url::Url::parse(&self.url).map_err(|_| ConfigError::InvalidUrl(self.url.clone()))?;
        if parsed.scheme() != "http" {
            return Err(ConfigError::OnlyHttpSupported(self.url));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        let thresholds = self
            .thresholds
            .iter()
            .map(|t| ParsedThreshold::parse(&t.metric, &t.expression))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RunPlan {
            url: self.url,
            schedule: Arc::new(StageSchedule::new(0, self.stages)),
            thresholds,
            pacing: self.pacing,
            request_timeout: self.request_timeout,
            zone: self.zone,
        })
    }
}

/// A validated plan. Construction via [`RunOptions::validate`] guarantees the
/// URL is an http:// URL, the timeout is non-zero, and every threshold
/// expression parsed.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub url: String,
    pub schedule: Arc<StageSchedule>,
    pub thresholds: Vec<ParsedThreshold>,
    pub pacing: Duration,
    pub request_timeout: Duration,
    pub zone: Option<String>,
}
