use stampede_metrics::{MetricSnapshot, MetricValues};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Eq => "==",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Avg,
    Min,
    Max,
    Count,
    Rate,
    P(u32),
}

/// One threshold bound to a metric, parsed up front so a malformed expression
/// fails the run before any traffic is generated.
#[derive(Debug, Clone)]
pub struct ParsedThreshold {
    pub metric: String,
    pub expression: String,
    pub selector: Selector,
    pub comparator: Comparator,
    pub value: f64,
}

/// Outcome of one threshold after the run has drained. `observed` is `None`
/// when the metric never recorded a sample or the selector does not apply to
/// its kind; either way the threshold fails.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

impl ParsedThreshold {
    pub fn parse(metric: &str, expression: &str) -> Result<Self, ConfigError> {
        let fail = |reason: String| ConfigError::Threshold {
            metric: metric.to_string(),
            expression: expression.to_string(),
            reason,
        };

        let s: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
        if s.is_empty() {
            return Err(fail("empty expression".to_string()));
        }

        let ops = [
            ("<=", Comparator::Lte),
            (">=", Comparator::Gte),
            ("==", Comparator::Eq),
            ("<", Comparator::Lt),
            (">", Comparator::Gt),
        ];
        let (op_pos, op_len, comparator) = ops
            .iter()
            .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
            .ok_or_else(|| fail("missing comparator".to_string()))?;

        let (left, right_with_op) = s.split_at(op_pos);
        let right = &right_with_op[op_len..];
        if left.is_empty() {
            return Err(fail("missing selector".to_string()));
        }
        if right.is_empty() {
            return Err(fail("missing numeric bound".to_string()));
        }

        let selector = if left.eq_ignore_ascii_case("avg") {
            Selector::Avg
        } else if left.eq_ignore_ascii_case("min") {
            Selector::Min
        } else if left.eq_ignore_ascii_case("max") {
            Selector::Max
        } else if left.eq_ignore_ascii_case("count") {
            Selector::Count
        } else if left.eq_ignore_ascii_case("rate") {
            Selector::Rate
        } else if let Some(inner) = left.strip_prefix("p(").and_then(|v| v.strip_suffix(')')) {
            let p: u32 = inner
                .parse()
                .map_err(|_| fail(format!("invalid percentile `{inner}`")))?;
            if !matches!(p, 50 | 90 | 95 | 99) {
                return Err(fail(format!(
                    "unsupported percentile p({p}) (supported: 50, 90, 95, 99)"
                )));
            }
            Selector::P(p)
        } else {
            return Err(fail(format!("unknown selector `{left}`")));
        };

        let value: f64 = right
            .parse()
            .map_err(|_| fail(format!("invalid numeric bound `{right}`")))?;
        if !value.is_finite() {
            return Err(fail(format!("non-finite numeric bound `{right}`")));
        }

        Ok(ParsedThreshold {
            metric: metric.to_string(),
            expression: expression.to_string(),
            selector,
            comparator,
            value,
        })
    }

    pub fn evaluate(&self, metrics: &[MetricSnapshot]) -> ThresholdResult {
        let snapshot = metrics.iter().find(|m| m.name == self.metric);
        let observed = snapshot.and_then(|s| observed_value(&s.values, self.selector));
        let passed = observed
            .map(|v| compare(v, self.comparator, self.value))
            .unwrap_or(false);

        ThresholdResult {
            metric: self.metric.clone(),
            expression: self.expression.clone(),
            observed,
            passed,
        }
    }
}

/// Evaluates every threshold against a drained snapshot, in input order.
pub fn evaluate(thresholds: &[ParsedThreshold], metrics: &[MetricSnapshot]) -> Vec<ThresholdResult> {
    thresholds.iter().map(|t| t.evaluate(metrics)).collect()
}

fn compare(left: f64, comparator: Comparator, right: f64) -> bool {
    match comparator {
        Comparator::Lt => left < right,
        Comparator::Lte => left <= right,
        Comparator::Gt => left > right,
        Comparator::Gte => left >= right,
        Comparator::Eq => left == right,
    }
}

fn observed_value(values: &MetricValues, selector: Selector) -> Option<f64> {
    match (values, selector) {
        (MetricValues::Trend { avg, .. }, Selector::Avg) => *avg,
        (MetricValues::Trend { min, .. }, Selector::Min) => *min,
        (MetricValues::Trend { max, .. }, Selector::Max) => *max,
        (MetricValues::Trend { count, .. }, Selector::Count) => Some(*count as f64),
        (
            MetricValues::Trend {
                p50, p90, p95, p99, ..
            },
            Selector::P(p),
        ) => match p {
            50 => *p50,
            90 => *p90,
            95 => *p95,
            99 => *p99,
            _ => None,
        },

        (MetricValues::Counter { count, .. }, Selector::Count) => Some(*count),
        (MetricValues::Counter { rate, .. }, Selector::Rate) => Some(*rate),

        (MetricValues::Rate { rate, .. }, Selector::Rate) => Some(*rate),
        (MetricValues::Rate { total, .. }, Selector::Count) => Some(*total as f64),

        // Non-sensical combinations.
        (_, _) => None,
    }
}
