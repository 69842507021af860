use std::num::NonZeroUsize;
use std::time::Duration;

use clap::Parser;
use hyper::Uri;
use math_api_util::ADD_PATH;

use crate::dispatch::Mode;
use crate::error::ConfigError;
use crate::formula::{Formula, FormulaPair};

const FULL_SCAN_LIMIT: u64 = 100_000;
const SAMPLED_INDICES: u64 = 1_000;

const EXAMPLES: &str = "\
Examples:
  math-load 10                                    # 10 requests, a=i, b=i*2
  math-load 20 --delay 0.5                        # 20 requests with 0.5s delay
  math-load 50 --concurrent 5                     # 50 requests, 5 concurrent workers
  math-load 10 --a-formula 'i*3' --b-formula 'i+5'  # Custom formulas
  math-load 100 --url http://prod:8080            # Different server";

/// Math API load testing CLI
#[derive(Parser, Debug, Clone)]
#[command(name = "math-load")]
#[command(about = "Load test the /api/math/add endpoint", after_help = EXAMPLES)]
pub struct CliArgs {
    /// Number of requests to make
    #[arg(allow_negative_numbers = true)]
    pub iterations: i64,

    /// Base URL of the math service
    #[arg(long, env = "MATH_LOAD_URL", default_value = "http://localhost:8080")]
    pub url: String,

    /// Delay between requests in seconds (sequential mode only)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub delay: f64,

    /// Number of concurrent workers (0 = sequential)
    #[arg(long, default_value_t = 0, value_name = "WORKERS", allow_negative_numbers = true)]
    pub concurrent: i64,

    /// Formula for parameter a
    #[arg(long, default_value = "i", allow_hyphen_values = true)]
    pub a_formula: String,

    /// Formula for parameter b
    #[arg(long, default_value = "i*2", allow_hyphen_values = true)]
    pub b_formula: String,

    /// Show individual request details
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated run parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTestConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    pub iterations: u64,
    pub mode: Mode,
    pub formulas: FormulaPair,
    pub verbose: bool,
}

impl CliArgs {
    /// Checks every argument before anything is sent, including that both
    /// formulas evaluate across the run.
    pub fn into_config(self) -> Result<LoadTestConfig, ConfigError> {
        let iterations = u64::try_from(self.iterations)
            .ok()
            .filter(|&n| n > 0)
            .ok_or(ConfigError::NonPositiveIterations)?;
        let mode = match usize::try_from(self.concurrent).ok().and_then(NonZeroUsize::new) {
            Some(workers) => Mode::Concurrent { workers },
            None => Mode::Sequential {
                delay: Duration::try_from_secs_f64(self.delay)
                    .map_err(|_| ConfigError::InvalidDelay(self.delay))?,
            },
        };
        let base_url = validate_url(&self.url)?;
        let formulas = FormulaPair::new(
            compile('a', &self.a_formula)?,
            compile('b', &self.b_formula)?,
        );
        check_range(&formulas, iterations)?;
        Ok(LoadTestConfig {
            base_url,
            iterations,
            mode,
            formulas,
            verbose: self.verbose,
        })
    }
}

fn validate_url(url: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: url.to_owned(),
        reason,
    };
    let base_url = url.trim_end_matches('/');
    let uri: Uri = format!("{base_url}{ADD_PATH}")
        .parse()
        .map_err(|e| invalid(format!("{e}")))?;
    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => return Err(invalid(format!("unsupported scheme '{other}'"))),
        None => return Err(invalid("missing scheme, expected http://".to_owned())),
    }
    if uri.host().is_none() {
        return Err(invalid("missing host".to_owned()));
    }
    if uri.query().is_some() {
        return Err(invalid("base url must not carry a query".to_owned()));
    }
    Ok(base_url.to_owned())
}

fn compile(param: char, formula: &str) -> Result<Formula, ConfigError> {
    Formula::parse(formula).map_err(|source| ConfigError::InvalidFormula {
        param,
        formula: formula.to_owned(),
        source,
    })
}

fn check_range(formulas: &FormulaPair, iterations: u64) -> Result<(), ConfigError> {
    for index in checked_indices(iterations) {
        let i = i64::try_from(index).unwrap_or(i64::MAX);
        for (param, formula) in [('a', &formulas.a), ('b', &formulas.b)] {
            formula
                .evaluate(i)
                .map_err(|source| ConfigError::Unevaluable {
                    param,
                    formula: formula.to_string(),
                    index,
                    source,
                })?;
        }
    }
    Ok(())
}

/// Indices evaluated before the run: all of them for runs up to
/// `FULL_SCAN_LIMIT`, otherwise that prefix plus `SAMPLED_INDICES` evenly
/// spaced indices and the last one. Unchecked indices that fail surface as
/// `RunError::Formula` during dispatch.
fn checked_indices(iterations: u64) -> impl Iterator<Item = u64> {
    let head = 1..=iterations.min(FULL_SCAN_LIMIT);
    let stride = (iterations / SAMPLED_INDICES).max(1);
    let tail = (iterations > FULL_SCAN_LIMIT)
        .then(|| {
            (1..=SAMPLED_INDICES)
                .map(move |k| k * stride)
                .chain(std::iter::once(iterations))
        })
        .into_iter()
        .flatten();
    head.chain(tail)
}
