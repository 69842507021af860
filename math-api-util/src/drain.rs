use bytes::Buf;
use hyper::body::Body;
use pin_project_lite::pin_project;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

pin_project! {
    /// Collects every data frame of a body into a single buffer, failing once
    /// more than `limit` bytes have arrived.
    pub struct DrainBodyFuture<B: Body> {
        #[pin]
        body: B,
        buf: Vec<u8>,
        limit: usize,
    }
}

impl<B> DrainBodyFuture<B>
where
    B: Body,
{
    #[inline]
    #[must_use]
    pub fn with_limit(body: B, limit: usize) -> Self {
        let capacity = usize::try_from(body.size_hint().lower())
            .unwrap_or(limit)
            .min(limit);
        Self {
            body,
            buf: Vec::with_capacity(capacity),
            limit,
        }
    }
}

impl<B> Future for DrainBodyFuture<B>
where
    B: Body,
    B::Error: Display,
{
    type Output = Result<Vec<u8>, anyhow::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slf = self.project();
        loop {
            if slf.body.is_end_stream() {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            }
            let Some(next_res) = ready!(slf.body.as_mut().poll_frame(cx)) else {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            };
            let next_frame = match next_res {
                Ok(frame) => frame,
                Err(e) => {
                    return Poll::Ready(Err(anyhow::anyhow!("Failed to poll next frame: {e}")));
                }
            };
            // Trailers carry no payload
            let Ok(mut data) = next_frame.into_data() else {
                continue;
            };
            if slf.buf.len() + data.remaining() > *slf.limit {
                return Poll::Ready(Err(anyhow::anyhow!(
                    "Body exceeds limit of {} bytes",
                    slf.limit
                )));
            }
            while data.has_remaining() {
                let chunk = data.chunk();
                let len = chunk.len();
                slf.buf.extend_from_slice(chunk);
                data.advance(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{Empty, Full};

    #[tokio::test]
    async fn drains_full_body() {
        let body = Full::new(Bytes::from_static(b"15\n"));
        let drained = DrainBodyFuture::with_limit(body, 64).await.unwrap();
        assert_eq!(drained, b"15\n");
    }

    #[tokio::test]
    async fn empty_body_drains_to_nothing() {
        let drained = DrainBodyFuture::with_limit(Empty::<Bytes>::new(), 64)
            .await
            .unwrap();
        assert!(drained.is_empty());
    }

    #[tokio::test]
    async fn rejects_body_over_limit() {
        let body = Full::new(Bytes::from_static(b"123456789"));
        let err = DrainBodyFuture::with_limit(body, 4).await.unwrap_err();
        assert!(err.to_string().contains("limit of 4 bytes"));
    }
}
