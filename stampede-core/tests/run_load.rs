use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use stampede_core::executor::names;
use stampede_core::http::{Response, Result as HttpResult, Transport};
use stampede_core::{Check, Executor, RunOptions, Stage, Threshold};
use stampede_metrics::{MetricValues, Registry};

/// Canned transport: responds instantly, failing every `fail_every`-th
/// request with a 500 (0 disables failures).
struct FakeTransport {
    calls: AtomicU64,
    fail_every: u64,
}

impl FakeTransport {
    fn new(fail_every: u64) -> Self {
        Self {
            calls: AtomicU64::new(0),
            fail_every,
        }
    }
}

impl Transport for FakeTransport {
    async fn perform(
        &self,
        _method: http::Method,
        _url: &str,
        _timeout: Duration,
    ) -> HttpResult<Response> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let failed = self.fail_every != 0 && n.is_multiple_of(self.fail_every);
        let status = if failed { 500 } else { 200 };
        Ok(Response {
            status,
            body: Bytes::from_static(b"hello"),
            bytes_sent: 40,
            bytes_received: 150,
            duration: Duration::from_millis(3),
        })
    }
}

fn short_plan(thresholds: Vec<Threshold>) -> stampede_core::RunPlan {
    let mut opts = RunOptions::new("http://localhost:1/");
    opts.stages = vec![
        Stage {
            duration: Duration::from_millis(300),
            target: 3,
        },
        Stage {
            duration: Duration::from_millis(200),
            target: 0,
        },
    ];
    opts.thresholds = thresholds;
    opts.pacing = Duration::from_millis(10);
    match opts.validate() {
        Ok(plan) => plan,
        Err(err) => panic!("{err}"),
    }
}

fn rate_values(summary: &stampede_core::RunSummary, name: &str) -> (u64, u64, f64) {
    match summary.metric(name).map(|m| &m.values) {
        Some(MetricValues::Rate {
            passes,
            total,
            rate,
        }) => (*passes, *total, *rate),
        other => panic!("expected rate metric for {name}, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn clean_run_passes_thresholds_and_records_builtins() {
    let plan = short_plan(vec![
        Threshold {
            metric: names::HTTP_REQ_FAILED.to_string(),
            expression: "rate<0.01".to_string(),
        },
        Threshold {
            metric: names::CHECKS.to_string(),
            expression: "rate>0.99".to_string(),
        },
    ]);

    let registry = Arc::new(Registry::default());
    let exec = match Executor::new(
        FakeTransport::new(0),
        &registry,
        vec![Check::new("status is 200", |res: &Response| {
            res.status == 200
        })],
        Duration::from_secs(1),
    ) {
        Ok(exec) => Arc::new(exec),
        Err(err) => panic!("{err}"),
    };

    let url = plan.url.clone();
    let summary = {
        let exec = exec.clone();
        let workload = move |_ctx| {
            let exec = exec.clone();
            let url = url.clone();
            async move {
                let res = exec.get(&url).await?;
                exec.run_checks(&res);
                Ok(())
            }
        };
        match stampede_core::run(&plan, registry, workload).await {
            Ok(summary) => summary,
            Err(err) => panic!("{err}"),
        }
    };

    assert!(summary.passed);
    assert_eq!(summary.failed_thresholds(), 0);
    assert!(summary.requests_total() > 0);
    assert!(summary.peak_vus >= 1);
    assert!(summary.peak_vus <= 3);
    assert!(summary.run_duration >= Duration::from_millis(500));

    let (_, total, rate) = rate_values(&summary, names::HTTP_REQ_FAILED);
    assert!(total > 0);
    assert_eq!(rate, 0.0);

    let (passes, total, _) = rate_values(&summary, "status is 200");
    assert_eq!(passes, total);

    assert_eq!(
        summary.counter_count(names::DATA_SENT),
        40.0 * summary.requests_total() as f64
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_responses_fail_thresholds_but_not_the_run() {
    let plan = short_plan(vec![Threshold {
        metric: names::HTTP_REQ_FAILED.to_string(),
        expression: "rate<0.1".to_string(),
    }]);

    let registry = Arc::new(Registry::default());
    // Every 5th response is a 500, so the failure rate lands near 0.2.
    let exec = match Executor::new(
        FakeTransport::new(5),
        &registry,
        Vec::new(),
        Duration::from_secs(1),
    ) {
        Ok(exec) => Arc::new(exec),
        Err(err) => panic!("{err}"),
    };

    let url = plan.url.clone();
    let workload = move |_ctx| {
        let exec = exec.clone();
        let url = url.clone();
        async move {
            exec.get(&url).await?;
            Ok(())
        }
    };
    let summary = match stampede_core::run(&plan, registry, workload).await {
        Ok(summary) => summary,
        Err(err) => panic!("{err}"),
    };

    assert!(!summary.passed);
    assert_eq!(summary.failed_thresholds(), 1);
    let observed = match summary.threshold_results[0].observed {
        Some(observed) => observed,
        None => panic!("expected an observed rate"),
    };
    assert!(observed > 0.1, "observed={observed}");
    assert!(observed < 0.3, "observed={observed}");
    // The summary still carries full metrics for reporting.
    assert!(summary.requests_total() > 0);
    assert!(summary.metric(names::HTTP_REQ_DURATION).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn ramp_down_interrupts_pacing_sleep() {
    // Ramp to 2 workers, hold, then drop to 0 and idle for the rest of the
    // run. The pacing interval is far longer than the whole run, so workers
    // only drain promptly if the sleep re-checks the ramp between slices.
    let mut opts = RunOptions::new("http://localhost:1/");
    opts.stages = vec![
        Stage {
            duration: Duration::from_millis(50),
            target: 2,
        },
        Stage {
            duration: Duration::from_millis(300),
            target: 2,
        },
        Stage {
            duration: Duration::ZERO,
            target: 0,
        },
        Stage {
            duration: Duration::from_millis(2_500),
            target: 0,
        },
    ];
    opts.pacing = Duration::from_secs(30);
    let plan = match opts.validate() {
        Ok(plan) => plan,
        Err(err) => panic!("{err}"),
    };

    let registry = Arc::new(Registry::default());
    let exec = match Executor::new(
        FakeTransport::new(0),
        &registry,
        Vec::new(),
        Duration::from_secs(1),
    ) {
        Ok(exec) => Arc::new(exec),
        Err(err) => panic!("{err}"),
    };

    let url = plan.url.clone();
    let workload = move |_ctx| {
        let exec = exec.clone();
        let url = url.clone();
        async move {
            exec.get(&url).await?;
            Ok(())
        }
    };
    let summary = match stampede_core::run(&plan, registry, workload).await {
        Ok(summary) => summary,
        Err(err) => panic!("{err}"),
    };

    // Both workers ran while the target was up.
    assert_eq!(summary.peak_vus, 2);
    assert!(summary.requests_total() >= 2);

    // Idle samples are not recorded, and all per-second ticks after the
    // first land well past the drop to 0. A worker still parked in its
    // pacing sleep would be sampled as active at both the 1s and 2s ticks;
    // only the initial tick can legitimately catch the ramp-up.
    match summary.metric(names::VUS).map(|m| &m.values) {
        Some(MetricValues::Trend { count, .. }) => {
            assert!(*count <= 1, "workers still active after ramp-down: {count} samples");
        }
        other => panic!("expected trend values for vus, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_threshold_metric_fails_the_run() {
    let plan = short_plan(vec![Threshold {
        metric: "no_such_metric".to_string(),
        expression: "avg<1".to_string(),
    }]);

    let registry = Arc::new(Registry::default());
    let summary = match stampede_core::run(&plan, registry, |_ctx| async { Ok(()) }).await {
        Ok(summary) => summary,
        Err(err) => panic!("{err}"),
    };

    assert!(!summary.passed);
    assert_eq!(summary.threshold_results[0].observed, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_schedule_finishes_immediately_with_no_traffic() {
    let mut opts = RunOptions::new("http://localhost:1/");
    opts.stages = Vec::new();
    let plan = match opts.validate() {
        Ok(plan) => plan,
        Err(err) => panic!("{err}"),
    };

    let registry = Arc::new(Registry::default());
    let summary = match stampede_core::run(&plan, registry, |_ctx| async { Ok(()) }).await {
        Ok(summary) => summary,
        Err(err) => panic!("{err}"),
    };

    assert!(summary.passed);
    assert_eq!(summary.requests_total(), 0);
    assert_eq!(summary.peak_vus, 0);
}
