use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use stampede_metrics::MetricHandle;
use tokio::sync::Notify;

use crate::error::IterationError;
use crate::schedule::StageSchedule;

pub type WorkloadResult = std::result::Result<(), IterationError>;

/// Longest uninterrupted slice of a pacing sleep. The loop re-samples the
/// ramp between slices so a mid-run target decrease takes effect within one
/// tick, not after the full pacing interval.
const PACING_RECHECK: Duration = Duration::from_millis(50);

/// Identity of one iteration, handed to the workload closure.
#[derive(Debug, Clone, Copy)]
pub struct IterationContext {
    /// 1-based virtual-user index, stable for the task's lifetime.
    pub vu_index: u64,
    /// 1-based iteration count within this virtual user.
    pub iteration: u64,
}

/// One-shot start gate. Workers are spawned parked on this so the run clock
/// starts only once every task exists.
#[derive(Debug, Default)]
pub struct StartSignal {
    started: AtomicBool,
    notify: Notify,
}

impl StartSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub async fn wait(&self) {
        loop {
            if self.started.load(Ordering::SeqCst) {
                return;
            }
            let notified = self.notify.notified();
            if self.started.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

/// Pool-level activity counters. `peak` is maintained with fetch_max so it is
/// exact regardless of sampling cadence.
#[derive(Debug, Default)]
pub(crate) struct VuGauges {
    active: AtomicU64,
    peak: AtomicU64,
}

impl VuGauges {
    pub(crate) fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak.fetch_max(now, Ordering::Relaxed);
    }

    pub(crate) fn leave(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    pub(crate) fn peak(&self) -> u64 {
        self.peak.load(Ordering::Relaxed)
    }
}

pub(crate) struct VuContext {
    pub(crate) vu_index: u64,
    pub(crate) schedule: Arc<StageSchedule>,
    pub(crate) pacing: Duration,
    pub(crate) run_started: Arc<OnceLock<Instant>>,
    pub(crate) start_signal: Arc<StartSignal>,
    pub(crate) gauges: Arc<VuGauges>,
    pub(crate) iterations: MetricHandle,
    pub(crate) iteration_duration: MetricHandle,
    pub(crate) iteration_failures: MetricHandle,
}

/// Body of one virtual-user task. The task idles while the ramp target is
/// below its index, iterates the workload while at or above it, and exits
/// when the schedule completes. Workload errors are recorded and skipped;
/// they never end the task early.
pub(crate) async fn run_vu<W, Fut>(ctx: VuContext, workload: W)
where
    W: Fn(IterationContext) -> Fut,
    Fut: Future<Output = WorkloadResult>,
{
    ctx.start_signal.wait().await;
    let started = ctx.run_started.get().copied().unwrap_or_else(Instant::now);

    let mut active = false;
    let mut iteration: u64 = 0;

    loop {
        let elapsed = started.elapsed();
        if ctx.schedule.is_complete(elapsed) {
            break;
        }

        if ctx.vu_index > ctx.schedule.target_at(elapsed) {
            if active {
                ctx.gauges.leave();
                active = false;
            }
            let wait = ctx.schedule.next_recheck_in(elapsed, ctx.vu_index);
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
            continue;
        }

        if !active {
            ctx.gauges.enter();
            active = true;
        }

        iteration += 1;
        let iter_started = Instant::now();
        if workload(IterationContext {
            vu_index: ctx.vu_index,
            iteration,
        })
        .await
        .is_err()
        {
            ctx.iteration_failures.add(1.0);
        }
        ctx.iterations.add(1.0);
        ctx.iteration_duration
            .add(iter_started.elapsed().as_secs_f64() * 1000.0);

        // Pacing sleep, taken in tick-sized slices and abandoned as soon as
        // the schedule completes or the target drops below this user. The
        // iteration itself is never cut short; only the sleep is.
        let mut pacing_left = ctx.pacing;
        while !pacing_left.is_zero() {
            let elapsed = started.elapsed();
            if ctx.schedule.is_complete(elapsed) {
                break;
            }
            if ctx.vu_index > ctx.schedule.target_at(elapsed) {
                break;
            }
            let until_run_end = ctx.schedule.total_duration().saturating_sub(elapsed);
            let nap = pacing_left.min(until_run_end).min(PACING_RECHECK);
            if nap.is_zero() {
                break;
            }
            tokio::time::sleep(nap).await;
            pacing_left = pacing_left.saturating_sub(nap);
        }
    }

    if active {
        ctx.gauges.leave();
    }
}
