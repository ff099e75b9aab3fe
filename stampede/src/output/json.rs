use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write as _;

use stampede_core::{RunPlan, RunSummary};
use stampede_metrics::MetricValues;

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _plan: &RunPlan) {}

    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()> {
        let doc = JsonSummary::from_summary(summary);
        let line = serde_json::to_string(&doc)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")?;
        stdout.flush()?;
        Ok(())
    }
}

/// Pretty-printed JSON artifact of the whole summary. Metric keys are sorted,
/// so identical summaries serialize to identical bytes.
pub(crate) fn render_json(summary: &RunSummary) -> anyhow::Result<String> {
    let doc = JsonSummary::from_summary(summary);
    let mut out = serde_json::to_string_pretty(&doc)?;
    out.push('\n');
    Ok(out)
}

#[derive(Debug, Serialize)]
struct JsonSummary {
    passed: bool,
    run_duration_secs: f64,
    peak_vus: u64,
    requests_total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    zone: Option<String>,
    stages: Vec<JsonStage>,
    metrics: BTreeMap<String, JsonMetric>,
    thresholds: Vec<JsonThreshold>,
}

#[derive(Debug, Serialize)]
struct JsonStage {
    duration_secs: f64,
    target: u64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JsonMetric {
    Counter {
        count: f64,
        rate: f64,
    },
    Rate {
        passes: u64,
        total: u64,
        rate: f64,
    },
    Trend {
        count: u64,
        min: Option<f64>,
        max: Option<f64>,
        avg: Option<f64>,
        p50: Option<f64>,
        p90: Option<f64>,
        p95: Option<f64>,
        p99: Option<f64>,
    },
}

#[derive(Debug, Serialize)]
struct JsonThreshold {
    metric: String,
    expression: String,
    observed: Option<f64>,
    passed: bool,
}

impl JsonSummary {
    fn from_summary(summary: &RunSummary) -> Self {
        let metrics = summary
            .metrics
            .iter()
            .map(|m| {
                let values = match &m.values {
                    MetricValues::Counter { count, rate } => JsonMetric::Counter {
                        count: *count,
                        rate: *rate,
                    },
                    MetricValues::Rate {
                        passes,
                        total,
                        rate,
                    } => JsonMetric::Rate {
                        passes: *passes,
                        total: *total,
                        rate: *rate,
                    },
                    MetricValues::Trend {
                        count,
                        min,
                        max,
                        avg,
                        p50,
                        p90,
                        p95,
                        p99,
                    } => JsonMetric::Trend {
                        count: *count,
                        min: *min,
                        max: *max,
                        avg: *avg,
                        p50: *p50,
                        p90: *p90,
                        p95: *p95,
                        p99: *p99,
                    },
                };
                (m.name.clone(), values)
            })
            .collect();

        JsonSummary {
            passed: summary.passed,
            run_duration_secs: summary.run_duration.as_secs_f64(),
            peak_vus: summary.peak_vus,
            requests_total: summary.requests_total(),
            zone: summary.zone.clone(),
            stages: summary
                .stages
                .iter()
                .map(|s| JsonStage {
                    duration_secs: s.duration.as_secs_f64(),
                    target: s.target,
                })
                .collect(),
            metrics,
            thresholds: summary
                .threshold_results
                .iter()
                .map(|r| JsonThreshold {
                    metric: r.metric.clone(),
                    expression: r.expression.clone(),
                    observed: r.observed,
                    passed: r.passed,
                })
                .collect(),
        }
    }
}
