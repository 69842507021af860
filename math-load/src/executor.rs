use std::future::Future;
use std::time::{Duration, Instant};

use hyper::{StatusCode, Uri};
use math_api_util::{add_uri, AddQuery};
use tracing::warn;

use crate::client::HttpClient;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one dispatched request.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RequestOutcome {
    pub success: bool,
    pub elapsed: Duration,
    /// Parsed response value, `0` for failed requests.
    pub value: i64,
}

impl RequestOutcome {
    #[must_use]
    pub fn success(value: i64, elapsed: Duration) -> Self {
        Self {
            success: true,
            elapsed,
            value,
        }
    }

    #[must_use]
    pub fn failure(elapsed: Duration) -> Self {
        Self {
            success: false,
            elapsed,
            value: 0,
        }
    }
}

/// Performs a single addition request.
///
/// Failures are reported through [`RequestOutcome::success`], never as an
/// error, so a run keeps going no matter how individual requests end.
pub trait Execute: Send + Sync + 'static {
    fn execute(&self, a: i64, b: i64) -> impl Future<Output = RequestOutcome> + Send;
}

/// Executes requests against `{base_url}/api/math/add` over a shared client.
#[derive(Clone)]
pub struct RequestExecutor {
    client: HttpClient,
    base_url: String,
    timeout: Duration,
}

impl RequestExecutor {
    #[must_use]
    pub fn new(client: HttpClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Execute for RequestExecutor {
    fn execute(&self, a: i64, b: i64) -> impl Future<Output = RequestOutcome> + Send {
        async move {
            let uri: Uri = match add_uri(&self.base_url, AddQuery::new(a, b)).parse() {
                Ok(uri) => uri,
                Err(e) => {
                    warn!(base_url = %self.base_url, error = %e, "Request failed: invalid uri");
                    return RequestOutcome::failure(Duration::ZERO);
                }
            };
            let (elapsed, res) =
                run_timed(tokio::time::timeout(self.timeout, self.client.get(uri))).await;
            let resp = match res {
                Ok(Ok(resp)) => resp,
                Ok(Err(e)) => {
                    let error = format!("{e:#}");
                    warn!(a, b, %error, "Request failed");
                    return RequestOutcome::failure(elapsed);
                }
                Err(_) => {
                    warn!(a, b, timeout = ?self.timeout, "Request timed out");
                    return RequestOutcome::failure(elapsed);
                }
            };
            let body = String::from_utf8_lossy(&resp.body);
            if resp.status != StatusCode::OK {
                warn!(a, b, status = resp.status.as_u16(), %body, "HTTP error");
                return RequestOutcome::failure(elapsed);
            }
            match body.trim().parse::<i64>() {
                Ok(value) => RequestOutcome::success(value, elapsed),
                Err(e) => {
                    warn!(a, b, %body, error = %e, "Response body is not an integer");
                    RequestOutcome::failure(elapsed)
                }
            }
        }
    }
}

#[inline]
async fn run_timed<T, F: Future<Output = T>>(fut: F) -> (Duration, T) {
    let start = Instant::now();
    let res = fut.await;
    (start.elapsed(), res)
}
