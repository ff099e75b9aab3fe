use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metric kind, fixed on first observation of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum MetricKind {
    Counter,
    Rate,
    Trend,
}

/// Point-in-time view of a single metric, taken after the run has drained.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub name: String,
    pub kind: MetricKind,
    pub values: MetricValues,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValues {
    Counter {
        count: f64,
        /// count / elapsed run duration. 0 when the run duration is 0.
        rate: f64,
    },
    Rate {
        passes: u64,
        total: u64,
        /// passes / total. 0 when total is 0 (never NaN).
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

/// Lock-free f64 accumulator (bit-cast CAS loop).
#[derive(Debug, Default)]
pub(crate) struct CounterAgg {
    bits: AtomicU64,
}

impl CounterAgg {
    pub(crate) fn add(&self, v: f64) {
        if !v.is_finite() {
            return;
        }

        let mut cur = self.bits.load(Ordering::Relaxed);
        loop {
            let next = f64::from_bits(cur) + v;
            match self.bits.compare_exchange_weak(
                cur,
                next.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => cur = observed,
            }
        }
    }

    pub(crate) fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
pub(crate) struct RateAgg {
    total: AtomicU64,
    passes: AtomicU64,
}

impl RateAgg {
    pub(crate) fn add(&self, pass: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if pass {
            self.passes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn summarize(&self) -> MetricValues {
        let total = self.total.load(Ordering::Relaxed);
        let passes = self.passes.load(Ordering::Relaxed);
        let rate = if total == 0 {
            0.0
        } else {
            passes as f64 / total as f64
        };
        MetricValues::Rate {
            passes,
            total,
            rate,
        }
    }
}

/// Streaming distribution: atomics for count/sum/min/max plus an HDR
/// histogram for quantiles. Values are recorded in milliseconds and stored
/// scaled to microseconds (3 significant figures in the histogram, so the
/// reported percentiles are an approximation).
#[derive(Debug)]
pub(crate) struct TrendAgg {
    count: AtomicU64,
    sum_scaled: AtomicU64,
    min_scaled: AtomicU64,
    max_scaled: AtomicU64,
    hist: Mutex<Histogram<u64>>,
}

impl TrendAgg {
    pub(crate) fn new() -> Self {
        // Upper bound: 1 hour in microseconds.
        let hist = Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3)
            .unwrap_or_else(|err| panic!("failed to init histogram: {err}"));
        Self {
            count: AtomicU64::new(0),
            sum_scaled: AtomicU64::new(0),
            min_scaled: AtomicU64::new(u64::MAX),
            max_scaled: AtomicU64::new(0),
            hist: Mutex::new(hist),
        }
    }

    pub(crate) fn record(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let scaled = (value * 1000.0).round();
        if scaled <= 0.0 {
            return;
        }
        let scaled = scaled as u64;

        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_scaled.fetch_add(scaled, Ordering::Relaxed);

        let mut cur = self.min_scaled.load(Ordering::Relaxed);
        while scaled < cur {
            match self.min_scaled.compare_exchange_weak(
                cur,
                scaled,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }

        let mut cur = self.max_scaled.load(Ordering::Relaxed);
        while scaled > cur {
            match self.max_scaled.compare_exchange_weak(
                cur,
                scaled,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }

        let mut h = self.hist.lock();
        let _ = h.record(scaled);
    }

    pub(crate) fn summarize(&self) -> MetricValues {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return MetricValues::Trend {
                count: 0,
                min: None,
                max: None,
                avg: None,
                p50: None,
                p90: None,
                p95: None,
                p99: None,
            };
        }

        let sum = self.sum_scaled.load(Ordering::Relaxed) as f64;
        let min = self.min_scaled.load(Ordering::Relaxed) as f64;
        let max = self.max_scaled.load(Ordering::Relaxed) as f64;

        let h = self.hist.lock();
        // Clamp quantile estimates into the exact [min, max] envelope so the
        // snapshot always satisfies min <= p50 <= p95 <= p99 <= max.
        let q = |quantile: f64| -> f64 {
            (h.value_at_quantile(quantile) as f64).clamp(min, max) / 1000.0
        };

        MetricValues::Trend {
            count,
            min: Some(min / 1000.0),
            max: Some(max / 1000.0),
            avg: Some(sum / (count as f64) / 1000.0),
            p50: Some(q(0.50)),
            p90: Some(q(0.90)),
            p95: Some(q(0.95)),
            p99: Some(q(0.99)),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Storage {
    Counter(CounterAgg),
    Rate(RateAgg),
    Trend(TrendAgg),
}

impl Storage {
    pub(crate) fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Storage::Counter(CounterAgg::default()),
            MetricKind::Rate => Storage::Rate(RateAgg::default()),
            MetricKind::Trend => Storage::Trend(TrendAgg::new()),
        }
    }

    pub(crate) fn kind(&self) -> MetricKind {
        match self {
            Storage::Counter(_) => MetricKind::Counter,
            Storage::Rate(_) => MetricKind::Rate,
            Storage::Trend(_) => MetricKind::Trend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_under_cas() {
        let c = CounterAgg::default();
        c.add(1.0);
        c.add(2.5);
        c.add(f64::NAN);
        c.add(f64::INFINITY);
        assert_eq!(c.get(), 3.5);
    }

    #[test]
    fn rate_with_zero_total_is_zero_not_nan() {
        let r = RateAgg::default();
        let MetricValues::Rate { rate, total, .. } = r.summarize() else {
            panic!("expected rate values");
        };
        assert_eq!(total, 0);
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn rate_tracks_passes_and_total() {
        let r = RateAgg::default();
        r.add(true);
        r.add(false);
        r.add(true);

        let MetricValues::Rate {
            passes,
            total,
            rate,
        } = r.summarize()
        else {
            panic!("expected rate values");
        };
        assert_eq!((passes, total), (2, 3));
        assert_eq!(rate, 2.0 / 3.0);
    }

    #[test]
    fn empty_trend_has_no_stats() {
        let t = TrendAgg::new();
        let MetricValues::Trend {
            count, min, p95, ..
        } = t.summarize()
        else {
            panic!("expected trend values");
        };
        assert_eq!(count, 0);
        assert!(min.is_none());
        assert!(p95.is_none());
    }

    #[test]
    fn trend_ignores_non_positive_and_non_finite_values() {
        let t = TrendAgg::new();
        t.record(f64::NAN);
        t.record(0.0);
        t.record(-5.0);
        t.record(1.0);
        t.record(3.0);

        let MetricValues::Trend {
            count,
            min,
            max,
            avg,
            ..
        } = t.summarize()
        else {
            panic!("expected trend values");
        };
        assert_eq!(count, 2);
        assert_eq!(min, Some(1.0));
        assert_eq!(max, Some(3.0));
        assert_eq!(avg, Some(2.0));
    }

    #[test]
    fn trend_percentiles_are_ordered() {
        let t = TrendAgg::new();
        for i in 1..=1000u64 {
            t.record((i % 317) as f64 + 0.5);
        }

        let MetricValues::Trend {
            min,
            max,
            p50,
            p95,
            p99,
            ..
        } = t.summarize()
        else {
            panic!("expected trend values");
        };

        let (min, max) = (min.unwrap_or(0.0), max.unwrap_or(0.0));
        let (p50, p95, p99) = (
            p50.unwrap_or(0.0),
            p95.unwrap_or(0.0),
            p99.unwrap_or(0.0),
        );
        assert!(min <= p50, "min={min} p50={p50}");
        assert!(p50 <= p95, "p50={p50} p95={p95}");
        assert!(p95 <= p99, "p95={p95} p99={p99}");
        assert!(p99 <= max, "p99={p99} max={max}");
    }
}
