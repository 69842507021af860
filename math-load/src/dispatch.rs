//! Drives the configured number of requests through an [`Execute`]
//! implementation, either one after another or through a bounded pool of
//! workers.
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::RunError;
use crate::executor::{Execute, RequestOutcome};
use crate::formula::FormulaPair;
use crate::report::RequestLine;

/// Outcomes preallocated up front, larger runs grow on demand.
const MAX_PREALLOCATED: u64 = 1 << 16;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    /// One request at a time in index order, pausing `delay` between requests.
    Sequential { delay: Duration },
    /// Up to `workers` requests in flight. Outcomes arrive in completion order.
    Concurrent { workers: NonZeroUsize },
}

/// Outcomes collected by a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadTestResult {
    outcomes: Vec<RequestOutcome>,
    success_count: u64,
}

impl LoadTestResult {
    #[must_use]
    pub fn with_capacity(iterations: u64) -> Self {
        let capacity = usize::try_from(iterations.min(MAX_PREALLOCATED)).unwrap_or_default();
        Self {
            outcomes: Vec::with_capacity(capacity),
            success_count: 0,
        }
    }

    pub fn push(&mut self, outcome: RequestOutcome) {
        if outcome.success {
            self.success_count += 1;
        }
        self.outcomes.push(outcome);
    }

    #[must_use]
    pub fn outcomes(&self) -> &[RequestOutcome] {
        &self.outcomes
    }

    #[inline]
    #[must_use]
    pub fn success_count(&self) -> u64 {
        self.success_count
    }

    #[inline]
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.outcomes.len() as u64
    }

    #[inline]
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.total_count() - self.success_count
    }
}

impl FromIterator<RequestOutcome> for LoadTestResult {
    fn from_iter<T: IntoIterator<Item = RequestOutcome>>(iter: T) -> Self {
        let mut result = Self::default();
        for outcome in iter {
            result.push(outcome);
        }
        result
    }
}

pub struct Dispatcher<E> {
    executor: Arc<E>,
    formulas: Arc<FormulaPair>,
    verbose: bool,
}

impl<E> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            formulas: self.formulas.clone(),
            verbose: self.verbose,
        }
    }
}

impl<E: Execute> Dispatcher<E> {
    #[must_use]
    pub fn new(executor: E, formulas: FormulaPair) -> Self {
        Self {
            executor: Arc::new(executor),
            formulas: Arc::new(formulas),
            verbose: false,
        }
    }

    /// Print one line per finished request.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub async fn run(&self, iterations: u64, mode: Mode) -> Result<LoadTestResult, RunError> {
        match mode {
            Mode::Sequential { delay } => self.run_sequential(iterations, delay).await,
            Mode::Concurrent { workers } => self.run_concurrent(iterations, workers).await,
        }
    }

    /// Like [`Dispatcher::run`], but gives up with [`RunError::Interrupted`]
    /// as soon as `shutdown` resolves. Requests still in flight are abandoned
    /// and their outcomes discarded.
    pub async fn run_until<F>(
        &self,
        iterations: u64,
        mode: Mode,
        shutdown: F,
    ) -> Result<LoadTestResult, RunError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            () = shutdown => Err(RunError::Interrupted),
            res = self.run(iterations, mode) => res,
        }
    }

    pub async fn run_sequential(
        &self,
        iterations: u64,
        delay: Duration,
    ) -> Result<LoadTestResult, RunError> {
        let mut result = LoadTestResult::with_capacity(iterations);
        for index in 1..=iterations {
            result.push(self.run_one(index).await?);
            if !delay.is_zero() && index < iterations {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(result)
    }

    pub async fn run_concurrent(
        &self,
        iterations: u64,
        workers: NonZeroUsize,
    ) -> Result<LoadTestResult, RunError> {
        let next_index = Arc::new(AtomicU64::new(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let num_workers = u64::try_from(workers.get()).map_or(iterations, |w| w.min(iterations));
        // Dropping the set aborts every worker, which is how an interrupted
        // run abandons its in-flight requests.
        let mut tasks = JoinSet::new();
        for _ in 0..num_workers {
            tasks.spawn(work(
                self.clone(),
                next_index.clone(),
                iterations,
                tx.clone(),
            ));
        }
        drop(tx);

        let mut result = LoadTestResult::with_capacity(iterations);
        while let Some(outcome) = rx.recv().await {
            result.push(outcome);
        }
        while let Some(joined) = tasks.join_next().await {
            joined??;
        }
        Ok(result)
    }

    async fn run_one(&self, index: u64) -> Result<RequestOutcome, RunError> {
        let query = self
            .formulas
            .params(index)
            .map_err(|source| RunError::Formula { index, source })?;
        let outcome = self.executor.execute(query.a, query.b).await;
        if self.verbose {
            println!("{}", RequestLine::new(index, query, &outcome));
        }
        Ok(outcome)
    }
}

/// Worker loop: claims the next unclaimed index until all `iterations` are taken.
async fn work<E: Execute>(
    dispatcher: Dispatcher<E>,
    next_index: Arc<AtomicU64>,
    iterations: u64,
    tx: mpsc::UnboundedSender<RequestOutcome>,
) -> Result<(), RunError> {
    loop {
        let index = next_index.fetch_add(1, Ordering::Relaxed);
        if index > iterations {
            return Ok(());
        }
        let outcome = dispatcher.run_one(index).await?;
        if tx.send(outcome).is_err() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;

    use math_api_util::AddQuery;

    #[derive(Default)]
    struct FakeExecutor {
        latency: Duration,
        fail_when_a: Option<i64>,
        seen: Mutex<Vec<AddQuery>>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl FakeExecutor {
        fn with_latency(latency: Duration) -> Self {
            Self {
                latency,
                ..Self::default()
            }
        }
    }

    impl Execute for FakeExecutor {
        fn execute(&self, a: i64, b: i64) -> impl Future<Output = RequestOutcome> + Send {
            async move {
                self.seen.lock().unwrap().push(AddQuery::new(a, b));
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
                if !self.latency.is_zero() {
                    tokio::time::sleep(self.latency).await;
                }
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                if self.fail_when_a == Some(a) {
                    RequestOutcome::failure(self.latency)
                } else {
                    RequestOutcome::success(a + b, self.latency)
                }
            }
        }
    }

    fn default_formulas() -> FormulaPair {
        FormulaPair::new("i".parse().unwrap(), "i*2".parse().unwrap())
    }

    fn sequential(delay: Duration) -> Mode {
        Mode::Sequential { delay }
    }

    fn concurrent(workers: usize) -> Mode {
        Mode::Concurrent {
            workers: NonZeroUsize::new(workers).unwrap(),
        }
    }

    #[tokio::test]
    async fn sequential_preserves_index_order() {
        let dispatcher = Dispatcher::new(FakeExecutor::default(), default_formulas());
        let result = dispatcher.run(25, sequential(Duration::ZERO)).await.unwrap();

        assert_eq!(result.total_count(), 25);
        assert_eq!(result.success_count(), 25);
        let values: Vec<i64> = result.outcomes().iter().map(|o| o.value).collect();
        let expected: Vec<i64> = (1..=25).map(|i| 3 * i).collect();
        assert_eq!(values, expected);

        let seen = dispatcher.executor.seen.lock().unwrap().clone();
        assert_eq!(seen[0], AddQuery::new(1, 2));
        assert_eq!(seen[24], AddQuery::new(25, 50));
    }

    #[tokio::test]
    async fn sequential_sleeps_between_requests_only() {
        let dispatcher = Dispatcher::new(FakeExecutor::default(), default_formulas());
        let start = Instant::now();
        let result = dispatcher
            .run(3, sequential(Duration::from_millis(30)))
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(result.total_count(), 3);
        assert!(elapsed >= Duration::from_millis(60), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(90 + 500), "{elapsed:?}");
    }

    #[tokio::test]
    async fn failed_request_does_not_abort_the_run() {
        let executor = FakeExecutor {
            fail_when_a: Some(4),
            ..FakeExecutor::default()
        };
        let dispatcher = Dispatcher::new(executor, default_formulas());
        let result = dispatcher.run(10, sequential(Duration::ZERO)).await.unwrap();

        assert_eq!(result.total_count(), 10);
        assert_eq!(result.success_count(), 9);
        assert_eq!(result.failure_count(), 1);
        assert!(!result.outcomes()[3].success);
        assert_eq!(result.outcomes()[3].value, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_respects_worker_bound() {
        let dispatcher = Dispatcher::new(
            FakeExecutor::with_latency(Duration::from_millis(10)),
            default_formulas(),
        );
        let result = dispatcher.run(40, concurrent(4)).await.unwrap();

        assert_eq!(result.total_count(), 40);
        assert_eq!(result.success_count() + result.failure_count(), 40);
        let peak = dispatcher.executor.peak_in_flight.load(Ordering::SeqCst);
        assert!((1..=4).contains(&peak), "peak in flight {peak}");

        let mut values: Vec<i64> = result.outcomes().iter().map(|o| o.value).collect();
        values.sort_unstable();
        let expected: Vec<i64> = (1..=40).map(|i| 3 * i).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn concurrent_with_more_workers_than_requests() {
        let dispatcher = Dispatcher::new(FakeExecutor::default(), default_formulas());
        let result = dispatcher.run(3, concurrent(16)).await.unwrap();
        assert_eq!(result.total_count(), 3);
        assert_eq!(dispatcher.executor.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn concurrent_absorbs_failures() {
        let executor = FakeExecutor {
            fail_when_a: Some(7),
            ..FakeExecutor::default()
        };
        let dispatcher = Dispatcher::new(executor, default_formulas());
        let result = dispatcher.run(10, concurrent(3)).await.unwrap();
        assert_eq!(result.total_count(), 10);
        assert_eq!(result.success_count(), 9);
    }

    #[tokio::test]
    async fn interrupt_discards_partial_results() {
        let dispatcher = Dispatcher::new(
            FakeExecutor::with_latency(Duration::from_secs(30)),
            default_formulas(),
        );
        for mode in [sequential(Duration::ZERO), concurrent(4)] {
            let start = Instant::now();
            let res = dispatcher
                .run_until(100, mode, tokio::time::sleep(Duration::from_millis(20)))
                .await;
            assert!(matches!(res, Err(RunError::Interrupted)), "{mode:?}");
            assert!(start.elapsed() < Duration::from_secs(5));
        }
    }

    #[tokio::test]
    async fn formula_failure_aborts_the_run() {
        let formulas = FormulaPair::new("10 / (i - 2)".parse().unwrap(), "i".parse().unwrap());
        let dispatcher = Dispatcher::new(FakeExecutor::default(), formulas);
        let res = dispatcher.run(5, sequential(Duration::ZERO)).await;
        assert!(matches!(res, Err(RunError::Formula { index: 2, .. })));
    }

    #[test]
    fn result_counts_stay_consistent() {
        let result: LoadTestResult = [
            RequestOutcome::success(3, Duration::from_millis(1)),
            RequestOutcome::failure(Duration::from_millis(2)),
            RequestOutcome::success(6, Duration::from_millis(3)),
        ]
        .into_iter()
        .collect();
        assert_eq!(result.total_count(), 3);
        assert_eq!(result.success_count(), 2);
        assert_eq!(result.failure_count(), 1);
    }
}
