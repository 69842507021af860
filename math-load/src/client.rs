use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use math_api_util::drain::DrainBodyFuture;
use math_api_util::empty_body;

/// Upper bound on a response body we are willing to buffer.
const MAX_BODY_LEN: usize = 64 * 1024;

/// Pooled HTTP/1 client. Clones share the same connection pool.
#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl HttpClient {
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    pub async fn get(&self, uri: Uri) -> Result<HttpResponse> {
        let request = Request::get(uri)
            .body(empty_body())
            .context("Failed to build request")?;
        let resp = self
            .client
            .request(request)
            .await
            .context("Failed to send request")?;
        let status = resp.status();
        let body = DrainBodyFuture::with_limit(resp.into_body(), MAX_BODY_LEN)
            .await
            .context("Failed to read response body")?;
        Ok(HttpResponse { status, body })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}
