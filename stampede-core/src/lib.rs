//! Core load-generation engine: staged virtual-user scheduling, an HTTP
//! executor with built-in metrics, threshold evaluation, and run
//! orchestration. Reporting lives in the binary crate.

pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod outputs;
pub mod run;
pub mod schedule;
pub mod summary;
pub mod thresholds;
mod vu;

pub use config::{RunOptions, RunPlan, Stage, Threshold};
pub use error::{ConfigError, Error, IterationError, ReportError, Result};
pub use executor::{Check, Executor, names};
pub use http::{HttpClient, Response, Transport};
pub use run::run;
pub use schedule::StageSchedule;
pub use summary::RunSummary;
pub use thresholds::{Comparator, ParsedThreshold, Selector, ThresholdResult};
pub use vu::{IterationContext, StartSignal, WorkloadResult};
