pub mod metric;
pub mod registry;

pub use metric::{MetricKind, MetricSnapshot, MetricValues};
pub use registry::{MetricError, MetricHandle, Registry};
