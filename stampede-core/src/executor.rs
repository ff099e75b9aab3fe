use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use stampede_metrics::{MetricError, MetricHandle, MetricKind, Registry};

use crate::error::IterationError;
use crate::http::{Response, Transport};

/// Built-in metric names, recorded by the executor on every request.
pub mod names {
    pub const HTTP_REQS: &str = "http_reqs";
    pub const HTTP_REQ_DURATION: &str = "http_req_duration";
    pub const HTTP_REQ_FAILED: &str = "http_req_failed";
    pub const DATA_RECEIVED: &str = "data_received";
    pub const DATA_SENT: &str = "data_sent";
    pub const CHECKS: &str = "checks";
    pub const ITERATIONS: &str = "iterations";
    pub const ITERATION_DURATION: &str = "iteration_duration";
    pub const ITERATION_FAILURES: &str = "iteration_failures";
    /// Trend of active-worker counts sampled once per second. Zero-valued
    /// samples are not recorded (Trend drops non-positive values), so the
    /// series covers active periods only; the exact peak is tracked
    /// separately and reported as `peak_vus`.
    pub const VUS: &str = "vus";
}

/// A named predicate run against every response. Outcomes feed the aggregate
/// `checks` rate and a per-check rate metric named after the check id.
pub struct Check {
    id: String,
    predicate: Arc<dyn Fn(&Response) -> bool + Send + Sync>,
}

impl Check {
    pub fn new(
        id: impl Into<String>,
        predicate: impl Fn(&Response) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check").field("id", &self.id).finish()
    }
}

struct CheckSlot {
    check: Check,
    handle: MetricHandle,
}

/// Issues requests through a [`Transport`] and records the built-in request
/// metrics. Handles are resolved once at construction, so the record path
/// never touches the registry and cannot fail mid-run.
pub struct Executor<T> {
    transport: T,
    timeout: Duration,
    checks: Vec<CheckSlot>,
    http_reqs: MetricHandle,
    http_req_duration: MetricHandle,
    http_req_failed: MetricHandle,
    data_received: MetricHandle,
    data_sent: MetricHandle,
    checks_metric: MetricHandle,
}

impl<T: Transport> Executor<T> {
    pub fn new(
        transport: T,
        registry: &Registry,
        checks: Vec<Check>,
        timeout: Duration,
    ) -> Result<Self, MetricError> {
        let checks = checks
            .into_iter()
            .map(|check| {
                let handle = registry.handle(&check.id, MetricKind::Rate)?;
                Ok(CheckSlot { check, handle })
            })
            .collect::<Result<Vec<_>, MetricError>>()?;

        Ok(Self {
            transport,
            timeout,
            checks,
            http_reqs: registry.handle(names::HTTP_REQS, MetricKind::Counter)?,
            http_req_duration: registry.handle(names::HTTP_REQ_DURATION, MetricKind::Trend)?,
            http_req_failed: registry.handle(names::HTTP_REQ_FAILED, MetricKind::Rate)?,
            data_received: registry.handle(names::DATA_RECEIVED, MetricKind::Counter)?,
            data_sent: registry.handle(names::DATA_SENT, MetricKind::Counter)?,
            checks_metric: registry.handle(names::CHECKS, MetricKind::Rate)?,
        })
    }

    pub async fn get(&self, url: &str) -> Result<Response, IterationError> {
        self.request(http::Method::GET, url).await
    }

    /// Performs one request and records it. A transport failure (timeout,
    /// refused connection) still counts as a request and as a failure.
    pub async fn request(
        &self,
        method: http::Method,
        url: &str,
    ) -> Result<Response, IterationError> {
        let result = self.transport.perform(method, url, self.timeout).await;
        self.http_reqs.add(1.0);

        match result {
            Ok(res) => {
                self.http_req_duration
                    .add(res.duration.as_secs_f64() * 1000.0);
                self.http_req_failed.add_bool(res.is_failure());
                self.data_sent.add(res.bytes_sent as f64);
                self.data_received.add(res.bytes_received as f64);
                Ok(res)
            }
            Err(err) => {
                self.http_req_failed.add_bool(true);
                Err(IterationError::Transport(err))
            }
        }
    }

    /// Runs every check against a response, recording each outcome. Returns
    /// true only when all checks pass.
    pub fn run_checks(&self, res: &Response) -> bool {
        let mut all_passed = true;
        for slot in &self.checks {
            let passed = (slot.check.predicate)(res);
            slot.handle.add_bool(passed);
            self.checks_metric.add_bool(passed);
            all_passed &= passed;
        }
        all_passed
    }
}

impl<T> fmt::Debug for Executor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("timeout", &self.timeout)
            .field("checks", &self.checks.len())
            .finish()
    }
}
