//! Human readable output: the run banner, per-request lines and the final
//! statistics block.
use std::fmt::{self, Display, Formatter};

use math_api_util::{AddQuery, ADD_PATH};

use crate::config::LoadTestConfig;
use crate::dispatch::Mode;
use crate::executor::RequestOutcome;
use crate::statistics::SummaryStatistics;

const RULER: &str = "==================================================";

/// Printed before the first request.
pub struct Banner<'a>(pub &'a LoadTestConfig);

impl Display for Banner<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let config = self.0;
        writeln!(f, "Math API Load Tester")?;
        writeln!(f, "{RULER}")?;
        writeln!(f, "URL:         {}{ADD_PATH}", config.base_url)?;
        writeln!(f, "Iterations:  {}", config.iterations)?;
        writeln!(f, "A formula:   {}", config.formulas.a)?;
        writeln!(f, "B formula:   {}", config.formulas.b)?;
        match config.mode {
            Mode::Concurrent { workers } => {
                writeln!(f, "Mode:        Concurrent ({workers} workers)")?;
                writeln!(f)?;
                writeln!(
                    f,
                    "Running {} concurrent requests with {workers} workers...",
                    config.iterations
                )
            }
            Mode::Sequential { delay } => {
                writeln!(f, "Mode:        Sequential (delay: {}s)", delay.as_secs_f64())?;
                writeln!(f)?;
                writeln!(f, "Running {} sequential requests...", config.iterations)
            }
        }
    }
}

/// One `--verbose` line.
pub struct RequestLine {
    index: u64,
    query: AddQuery,
    outcome: RequestOutcome,
}

impl RequestLine {
    #[must_use]
    pub fn new(index: u64, query: AddQuery, outcome: &RequestOutcome) -> Self {
        Self {
            index,
            query,
            outcome: *outcome,
        }
    }
}

impl Display for RequestLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let glyph = if self.outcome.success { "✓" } else { "✗" };
        write!(
            f,
            "Request {:3}: a={:2}, b={:2}, result={:3}, time={:.1}ms {glyph}",
            self.index,
            self.query.a,
            self.query.b,
            self.outcome.value,
            self.outcome.elapsed.as_secs_f64() * 1000.0,
        )
    }
}

struct Optional<'a>(Option<f64>, &'a str);

impl Display for Optional<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => {
                if let Some(precision) = f.precision() {
                    write!(f, "{v:.precision$}{}", self.1)
                } else {
                    write!(f, "{v}{}", self.1)
                }
            }
            None => f.write_str("n/a"),
        }
    }
}

impl Display for SummaryStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{RULER}")?;
        writeln!(f, "STATISTICS")?;
        writeln!(f, "{RULER}")?;
        writeln!(f, "Total requests:      {}", self.total)?;
        writeln!(f, "Successful:          {}", self.successes)?;
        writeln!(f, "Failed:              {}", self.failures)?;
        writeln!(f, "Success rate:        {:.1}", Optional(self.success_rate_pct, "%"))?;
        writeln!(f, "Total time:          {:.2}s", self.wall_clock_seconds)?;
        writeln!(f, "Requests per second: {:.2}", Optional(self.requests_per_second, ""))?;
        let Some(latency) = self.latency else {
            return Ok(());
        };
        writeln!(f)?;
        writeln!(f, "Response Times:")?;
        writeln!(f, "  Average:           {:.1}ms", latency.mean_ms)?;
        writeln!(f, "  Median:            {:.1}ms", latency.median_ms)?;
        writeln!(f, "  Min:               {:.1}ms", latency.min_ms)?;
        writeln!(f, "  Max:               {:.1}ms", latency.max_ms)?;
        if let Some(stddev) = latency.stddev_ms {
            writeln!(f, "  Std deviation:     {stddev:.1}ms")?;
        }
        Ok(())
    }
}
