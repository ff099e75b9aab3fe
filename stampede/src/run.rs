use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use stampede_core::{Check, Executor, HttpClient, IterationContext, Response, RunOptions};
use stampede_metrics::Registry;

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let mut opts = RunOptions::new(args.url.clone());
    opts.stages = args.stages.clone();
    opts.thresholds = args.thresholds.clone();
    opts.pacing = args.pacing;
    opts.request_timeout = args.timeout;
    opts.zone = args.zone.clone();

    let plan = opts
        .validate()
        .map_err(|err| RunError::InvalidInput(err.into()))?;

    let registry = Arc::new(Registry::default());
    let executor = Executor::new(
        HttpClient::default(),
        &registry,
        build_checks(&args),
        plan.request_timeout,
    )
    .map_err(|err| RunError::InvalidInput(err.into()))?;
    let executor = Arc::new(executor);

    let formatter = output::formatter(args.output);
    formatter.print_header(&plan);

    let url = plan.url.clone();
    let workload = move |_ctx: IterationContext| {
        let executor = executor.clone();
        let url = url.clone();
        async move {
            let res = executor.get(&url).await?;
            executor.run_checks(&res);
            Ok(())
        }
    };

    let summary = stampede_core::run(&plan, registry, workload)
        .await
        .map_err(|err| RunError::Runtime(err.into()))?;

    formatter.print_summary(&summary).map_err(RunError::Runtime)?;

    // Artifacts are written even when thresholds failed; only a write failure
    // changes the outcome, and the verdict above has already been printed.
    let files = vec![
        (
            "summary.json".to_string(),
            output::json::render_json(&summary).map_err(RunError::Reporting)?,
        ),
        (
            "summary.txt".to_string(),
            output::human::render_text(&summary),
        ),
    ];
    stampede_core::outputs::write_artifacts(&args.out_dir, &files)
        .with_context(|| format!("writing summary artifacts under {}", args.out_dir.display()))
        .map_err(RunError::Reporting)?;

    Ok(ExitCode::from_verdict(summary.passed))
}

fn build_checks(args: &RunArgs) -> Vec<Check> {
    let mut checks = Vec::new();

    if let Some(status) = args.expect_status {
        checks.push(Check::new(format!("status is {status}"), move |res| {
            res.status == status
        }));
    }

    if let Some(needle) = args.expect_body_contains.clone() {
        checks.push(Check::new("response has message", move |res: &Response| {
            res.body_utf8().is_some_and(|body| body.contains(&needle))
        }));
    }

    if let Some(ms) = args.check_duration_under {
        let limit = Duration::from_millis(ms);
        checks.push(Check::new(
            format!("response time < {ms}ms"),
            move |res: &Response| res.duration < limit,
        ));
    }

    checks
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser as _;

    fn args_from(argv: &[&str]) -> RunArgs {
        let cli = match crate::cli::Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => panic!("{err}"),
        };
        let crate::cli::Command::Run(args) = cli.command;
        args
    }

    #[test]
    fn no_check_flags_means_no_checks() {
        let args = args_from(&["stampede", "run", "http://localhost/"]);
        assert!(build_checks(&args).is_empty());
    }

    #[test]
    fn check_ids_follow_flag_values() {
        let args = args_from(&[
            "stampede",
            "run",
            "http://localhost/",
            "--expect-status",
            "200",
            "--expect-body-contains",
            "hello",
            "--check-duration-under",
            "200",
        ]);
        let checks = build_checks(&args);
        let ids: Vec<&str> = checks.iter().map(|c| c.id()).collect();
        assert_eq!(
            ids,
            vec!["status is 200", "response has message", "response time < 200ms"]
        );
    }
}
