use anyhow::Context;
use axum::extract::Query;
use axum::routing::get;
use axum::Router;
use math_api_util::{AddQuery, ADD_PATH};
use tokio::net::TcpListener;

/// Routes of the arithmetic service. Requests with a missing or non-integer
/// `a` or `b` are rejected by the query extractor with `400 Bad Request`.
pub fn router() -> Router {
    Router::new().route(ADD_PATH, get(add))
}

pub async fn serve(listener: TcpListener) -> anyhow::Result<()> {
    let addr = listener.local_addr().context("Failed to read local address")?;
    tracing::info!(%addr, "math server listening");
    axum::serve(listener, router())
        .await
        .context("Math server terminated")
}

#[inline]
async fn add(Query(query): Query<AddQuery>) -> String {
    let sum = query.sum();
    tracing::debug!(a = query.a, b = query.b, sum, "add");
    sum.to_string()
}
