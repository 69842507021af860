use std::time::Duration;

use crate::dispatch::LoadTestResult;

/// Latency distribution over every outcome, failures included, in milliseconds.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LatencyStats {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Sample standard deviation, `None` with fewer than two samples.
    pub stddev_ms: Option<f64>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SummaryStatistics {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    /// `None` when no request was made.
    pub success_rate_pct: Option<f64>,
    pub wall_clock_seconds: f64,
    /// `None` when no request was made or no time elapsed.
    pub requests_per_second: Option<f64>,
    /// `None` when no request was made.
    pub latency: Option<LatencyStats>,
}

#[must_use]
pub fn summarize(result: &LoadTestResult, wall_clock_seconds: f64) -> SummaryStatistics {
    let total = result.total_count();
    let successes = result.success_count();
    let success_rate_pct = (total > 0).then(|| successes as f64 / total as f64 * 100.0);
    let requests_per_second = (total > 0 && wall_clock_seconds > 0.0)
        .then(|| total as f64 / wall_clock_seconds);
    let samples: Vec<f64> = result.outcomes().iter().map(|o| millis(o.elapsed)).collect();
    SummaryStatistics {
        total,
        successes,
        failures: total - successes,
        success_rate_pct,
        wall_clock_seconds,
        requests_per_second,
        latency: latency_stats(samples),
    }
}

#[inline]
fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

fn latency_stats(mut samples: Vec<f64>) -> Option<LatencyStats> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_unstable_by(f64::total_cmp);
    let n = samples.len();
    let mean = samples.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 1 {
        samples[n / 2]
    } else {
        (samples[n / 2 - 1] + samples[n / 2]) / 2.0
    };
    let stddev = (n > 1).then(|| {
        let sum_sq: f64 = samples.iter().map(|x| (x - mean) * (x - mean)).sum();
        (sum_sq / (n - 1) as f64).sqrt()
    });
    Some(LatencyStats {
        mean_ms: mean,
        median_ms: median,
        min_ms: samples[0],
        max_ms: samples[n - 1],
        stddev_ms: stddev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RequestOutcome;

    fn result_of(outcomes: &[(bool, u64)]) -> LoadTestResult {
        outcomes
            .iter()
            .map(|&(success, ms)| {
                let elapsed = Duration::from_millis(ms);
                if success {
                    RequestOutcome::success(1, elapsed)
                } else {
                    RequestOutcome::failure(elapsed)
                }
            })
            .collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn three_successful_samples() {
        let result = result_of(&[(true, 30), (true, 10), (true, 20)]);
        let stats = summarize(&result, 2.0);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.successes, 3);
        assert_eq!(stats.failures, 0);
        assert_eq!(stats.success_rate_pct, Some(100.0));
        assert_eq!(stats.requests_per_second, Some(1.5));
        let latency = stats.latency.unwrap();
        assert!(approx(latency.mean_ms, 20.0));
        assert!(approx(latency.median_ms, 20.0));
        assert!(approx(latency.min_ms, 10.0));
        assert!(approx(latency.max_ms, 30.0));
        assert!(approx(latency.stddev_ms.unwrap(), 10.0));
    }

    #[test]
    fn failures_count_toward_latency() {
        let result = result_of(&[(true, 10), (false, 5000), (true, 20), (false, 2)]);
        let stats = summarize(&result, 4.0);

        assert_eq!(stats.failures, 2);
        assert_eq!(stats.success_rate_pct, Some(50.0));
        let latency = stats.latency.unwrap();
        assert!(approx(latency.max_ms, 5000.0));
        assert!(approx(latency.min_ms, 2.0));
        assert!(approx(latency.median_ms, 15.0));
    }

    #[test]
    fn single_sample_has_no_stddev() {
        let stats = summarize(&result_of(&[(true, 12)]), 0.5);
        let latency = stats.latency.unwrap();
        assert!(approx(latency.mean_ms, 12.0));
        assert_eq!(latency.stddev_ms, None);
    }

    #[test]
    fn empty_result_is_not_applicable() {
        let stats = summarize(&LoadTestResult::default(), 1.0);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate_pct, None);
        assert_eq!(stats.requests_per_second, None);
        assert_eq!(stats.latency, None);
    }

    #[test]
    fn zero_wall_clock_has_no_throughput() {
        let stats = summarize(&result_of(&[(true, 1), (true, 1)]), 0.0);
        assert_eq!(stats.requests_per_second, None);
        assert_eq!(stats.success_rate_pct, Some(100.0));
    }
}
