#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod benchmark;
pub mod chart;
pub mod cli;
pub mod error;
pub mod persist;
pub mod report;
pub mod worker;

pub mod aggregator;

pub use benchmark::{Benchmark, RunOutcome};

#[cfg(feature = "metrics")]
pub(crate) const LATENCY_METRIC: &str = "echobench_latency";
#[cfg(feature = "metrics")]
pub(crate) const SUCCESS_METRIC: &str = "echobench_success";
#[cfg(feature = "metrics")]
pub(crate) const ERROR_METRIC: &str = "echobench_error";

pub mod prelude {
    pub use crate::benchmark::{Benchmark, RunOutcome};
    pub use echobench_core::{RunConfig, RunStatistics};
}
