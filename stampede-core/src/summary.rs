use std::time::Duration;

use stampede_metrics::{MetricSnapshot, MetricValues};

use crate::config::Stage;
use crate::executor::names;
use crate::thresholds::ThresholdResult;

/// Everything a reporter needs about a finished run. Built once, after all
/// workers have drained, so reading it twice yields identical data.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// False when any threshold failed.
    pub passed: bool,
    pub run_duration: Duration,
    pub peak_vus: u64,
    pub stages: Vec<Stage>,
    pub zone: Option<String>,
    /// Every metric the run touched, sorted by name.
    pub metrics: Vec<MetricSnapshot>,
    /// One result per configured threshold, in configuration order.
    pub threshold_results: Vec<ThresholdResult>,
}

impl RunSummary {
    pub fn metric(&self, name: &str) -> Option<&MetricSnapshot> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Counter count, or 0 when the metric never recorded.
    pub fn counter_count(&self, name: &str) -> f64 {
        match self.metric(name).map(|m| &m.values) {
            Some(MetricValues::Counter { count, .. }) => *count,
            _ => 0.0,
        }
    }

    /// Counter per-second rate, or 0 when the metric never recorded.
    pub fn counter_rate(&self, name: &str) -> f64 {
        match self.metric(name).map(|m| &m.values) {
            Some(MetricValues::Counter { rate, .. }) => *rate,
            _ => 0.0,
        }
    }

    /// Rate-metric pass ratio, or 0 when the metric never recorded.
    pub fn rate(&self, name: &str) -> f64 {
        match self.metric(name).map(|m| &m.values) {
            Some(MetricValues::Rate { rate, .. }) => *rate,
            _ => 0.0,
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.counter_count(names::HTTP_REQS) as u64
    }

    pub fn failed_thresholds(&self) -> usize {
        self.threshold_results.iter().filter(|r| !r.passed).count()
    }
}
