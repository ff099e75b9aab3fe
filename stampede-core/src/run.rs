use std::sync::Arc;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use stampede_metrics::{MetricKind, Registry};
use tokio::time::MissedTickBehavior;

use crate::config::RunPlan;
use crate::error::{Error, Result};
use crate::executor::names;
use crate::summary::RunSummary;
use crate::thresholds;
use crate::vu::{IterationContext, StartSignal, VuContext, VuGauges, WorkloadResult, run_vu};

const VU_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Drives one load-test run to completion: spawns a worker task per possible
/// virtual user, opens the start gate, waits for the schedule to drain, then
/// snapshots metrics and evaluates thresholds.
///
/// The workload closure is invoked once per iteration on whichever worker is
/// active; it typically wraps an [`crate::executor::Executor`].
pub async fn run<W, Fut>(plan: &RunPlan, registry: Arc<Registry>, workload: W) -> Result<RunSummary>
where
    W: Fn(IterationContext) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = WorkloadResult> + Send + 'static,
{
    let schedule = plan.schedule.clone();
    let max_vus = schedule.max_target();

    let run_started: Arc<OnceLock<Instant>> = Arc::new(OnceLock::new());
    let start_signal = Arc::new(StartSignal::new());
    let gauges = Arc::new(VuGauges::default());

    let iterations = registry.handle(names::ITERATIONS, MetricKind::Counter)?;
    let iteration_duration = registry.handle(names::ITERATION_DURATION, MetricKind::Trend)?;
    let iteration_failures = registry.handle(names::ITERATION_FAILURES, MetricKind::Counter)?;
    let vus_metric = registry.handle(names::VUS, MetricKind::Trend)?;

    let mut workers = Vec::with_capacity(max_vus as usize);
    for vu_index in 1..=max_vus {
        let ctx = VuContext {
            vu_index,
            schedule: schedule.clone(),
            pacing: plan.pacing,
            run_started: run_started.clone(),
            start_signal: start_signal.clone(),
            gauges: gauges.clone(),
            iterations: iterations.clone(),
            iteration_duration: iteration_duration.clone(),
            iteration_failures: iteration_failures.clone(),
        };
        let workload = workload.clone();
        workers.push(tokio::spawn(run_vu(ctx, workload)));
    }

    // All workers exist and are parked on the gate; the run clock starts now.
    let started = Instant::now();
    let _ = run_started.set(started);
    start_signal.start();

    // Control task: sole writer of the `vus` series. Samples taken while no
    // worker is active are dropped by the trend, so the series reflects
    // active periods only (see `names::VUS`).
    let sampler = {
        let gauges = gauges.clone();
        let vus_metric = vus_metric.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(VU_SAMPLE_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                vus_metric.add(gauges.active() as f64);
            }
        })
    };

    let mut first_panic: Option<Error> = None;
    for worker in workers {
        if let Err(err) = worker.await
            && first_panic.is_none()
        {
            first_panic = Some(Error::Join(err));
        }
    }

    sampler.abort();
    let _ = sampler.await;

    if let Some(err) = first_panic {
        return Err(err);
    }

    let run_duration = started.elapsed();
    let metrics = registry.snapshot(run_duration);
    let threshold_results = thresholds::evaluate(&plan.thresholds, &metrics);
    let passed = threshold_results.iter().all(|r| r.passed);

    Ok(RunSummary {
        passed,
        run_duration,
        peak_vus: gauges.peak(),
        stages: schedule.stages().to_vec(),
        zone: plan.zone.clone(),
        metrics,
        threshold_results,
    })
}
