//! Load generator for the `/api/math/add` endpoint.
//!
//! A run computes `a` and `b` for every request index from two small
//! formulas, sends the requests either sequentially or through a bounded
//! worker pool, and reduces the outcomes to latency and success statistics.
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod formula;
pub mod report;
pub mod statistics;

pub use client::HttpClient;
pub use config::{CliArgs, LoadTestConfig};
pub use dispatch::{Dispatcher, LoadTestResult, Mode};
pub use error::{ConfigError, FormulaError, RunError};
pub use executor::{Execute, RequestExecutor, RequestOutcome};
pub use formula::{evaluate, Formula, FormulaPair};
pub use statistics::{summarize, LatencyStats, SummaryStatistics};
