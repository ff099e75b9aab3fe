use std::fmt::Write as _;

use stampede_core::executor::names;
use stampede_core::{RunPlan, RunSummary};
use stampede_metrics::MetricValues;

use super::OutputFormatter;

pub(crate) struct HumanOutput;

impl OutputFormatter for HumanOutput {
    fn print_header(&self, plan: &RunPlan) {
        println!("target: {}", plan.url);
        for (i, stage) in plan.schedule.stages().iter().enumerate() {
            println!(
                "stage {}: ramp to {} VUs over {}",
                i + 1,
                stage.target,
                humantime::format_duration(stage.duration)
            );
        }
        if !plan.schedule.stages().is_empty() {
            println!();
        }
    }

    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()> {
        print!("{}", render_text(summary));

        let failed: Vec<_> = summary
            .threshold_results
            .iter()
            .filter(|r| !r.passed)
            .collect();
        if !failed.is_empty() {
            eprintln!("thresholds failed:");
            for r in failed {
                match r.observed {
                    Some(obs) => eprintln!("  {}: {} (observed {obs})", r.metric, r.expression),
                    None => eprintln!("  {}: {} (no data)", r.metric, r.expression),
                }
            }
        }

        Ok(())
    }
}

fn trend_stats(summary: &RunSummary, name: &str) -> (f64, f64, f64) {
    match summary.metric(name).map(|m| &m.values) {
        Some(MetricValues::Trend {
            avg, p95, max, ..
        }) => (
            avg.unwrap_or(0.0),
            p95.unwrap_or(0.0),
            max.unwrap_or(0.0),
        ),
        _ => (0.0, 0.0, 0.0),
    }
}

/// Fixed-format text summary. Field order and rounding are an external
/// contract; rendering the same summary twice yields identical bytes.
pub(crate) fn render_text(summary: &RunSummary) -> String {
    let (avg_ms, p95_ms, max_ms) = trend_stats(summary, names::HTTP_REQ_DURATION);
    let failed_pct = summary.rate(names::HTTP_REQ_FAILED) * 100.0;
    let received_kb = summary.counter_count(names::DATA_RECEIVED) / 1024.0;

    let mut out = String::new();
    let _ = writeln!(out, "Load Test Summary");
    let _ = writeln!(out, "=================");
    let _ = writeln!(out, "Total Requests: {}", summary.requests_total());
    let _ = writeln!(out, "Failed Requests: {failed_pct:.2}%");
    let _ = writeln!(out, "Average Duration: {avg_ms:.2}ms");
    let _ = writeln!(out, "95th Percentile: {p95_ms:.2}ms");
    let _ = writeln!(out, "Max Duration: {max_ms:.2}ms");
    let _ = writeln!(
        out,
        "Requests/sec: {:.2}",
        summary.counter_rate(names::HTTP_REQS)
    );
    let _ = writeln!(out, "Data Received: {received_kb:.2} KB");
    let _ = writeln!(out, "Peak Virtual Users: {}", summary.peak_vus);
    let _ = writeln!(
        out,
        "Test Duration: {:.2}s",
        summary.run_duration.as_secs_f64()
    );
    match summary.failed_thresholds() {
        0 => {
            let _ = writeln!(out, "Thresholds: PASSED");
        }
        n => {
            let _ = writeln!(out, "Thresholds: FAILED ({n} failed)");
        }
    }

    out
}
