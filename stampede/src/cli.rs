use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use stampede_core::{Stage, Threshold};

fn parse_duration(input: &str) -> Result<Duration, String> {
    humantime::parse_duration(input.trim())
        .map_err(|_| format!("invalid duration '{input}' (expected e.g. 10s, 250ms, 1m)"))
}

fn parse_stage(input: &str) -> Result<Stage, String> {
    let (duration, target) = input
        .split_once(':')
        .ok_or_else(|| format!("invalid stage '{input}' (expected DURATION:TARGET, e.g. 30s:10)"))?;

    let duration = parse_duration(duration)?;
    let target: u64 = target
        .trim()
        .parse()
        .map_err(|_| format!("invalid stage target '{target}' (expected an integer)"))?;

    Ok(Stage { duration, target })
}

fn parse_threshold(input: &str) -> Result<Threshold, String> {
    let (metric, expression) = input.split_once(':').ok_or_else(|| {
        format!("invalid threshold '{input}' (expected METRIC:EXPR, e.g. 'http_req_duration:p(95)<500')")
    })?;

    let metric = metric.trim();
    let expression = expression.trim();
    if metric.is_empty() || expression.is_empty() {
        return Err(format!(
            "invalid threshold '{input}' (expected METRIC:EXPR, e.g. 'checks:rate>0.99')"
        ));
    }

    Ok(Threshold {
        metric: metric.to_string(),
        expression: expression.to_string(),
    })
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    Human,
    /// Emit the summary as a single JSON line to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "stampede",
    author,
    version,
    about = "Staged HTTP load testing with streaming metrics and thresholds",
    after_help = "Examples:\n  stampede run http://localhost:8080/health --stage 30s:10 --stage 1m:10 --stage 30s:0\n  stampede run http://localhost:8080/api --stage 10s:5 --threshold 'http_req_duration:p(95)<500' --threshold 'http_req_failed:rate<0.01'\n  stampede run http://localhost:8080/ --stage 10s:2 --expect-status 200 --check-duration-under 200 --output json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test against a URL
    #[command(
        long_about = "Run a load test against a URL.\n\nStages ramp the number of virtual users linearly; each virtual user issues one request per iteration, runs the configured checks against the response, and sleeps for the pacing interval. After the last stage drains, thresholds are evaluated and summary artifacts are written."
    )]
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Target URL (http:// only)
    pub url: String,

    /// Ramp stage as DURATION:TARGET (repeatable, e.g. 30s:10)
    #[arg(long = "stage", value_name = "DURATION:TARGET", value_parser = parse_stage)]
    pub stages: Vec<Stage>,

    /// Threshold as METRIC:EXPR (repeatable, e.g. 'http_req_duration:p(95)<500')
    #[arg(long = "threshold", value_name = "METRIC:EXPR", value_parser = parse_threshold)]
    pub thresholds: Vec<Threshold>,

    /// Sleep between iterations of one virtual user
    #[arg(long, value_parser = parse_duration, default_value = "1s")]
    pub pacing: Duration,

    /// Per-request timeout; a timed-out request counts as failed
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub timeout: Duration,

    /// Directory for summary.json and summary.txt
    #[arg(long, value_name = "DIR", env = "RESULTS_DIR", default_value = "results")]
    pub out_dir: PathBuf,

    /// Check that every response has this status code
    #[arg(long, value_name = "CODE")]
    pub expect_status: Option<u16>,

    /// Check that every response body contains this substring
    #[arg(long, value_name = "TEXT")]
    pub expect_body_contains: Option<String>,

    /// Check that every request completes in under this many milliseconds
    #[arg(long, value_name = "MS")]
    pub check_duration_under: Option<u64>,

    /// Informational zone label carried into the JSON summary
    #[arg(long)]
    pub zone: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,
}
