//! HTTP body utilities.
//!
//! Minimal replacements for http-body-util:
//! - Empty: Body with no data, used for GET requests
//! - Limited: Body adapter that caps the number of bytes read
//! - collect_limited: Drain a body into Bytes under a size cap

use bytes::{Buf, BufMut, Bytes, BytesMut};
use hyper::body::{Body, Frame};
use std::pin::Pin;
use std::task::{Context, Poll};

/// An empty HTTP body.
#[derive(Debug, Clone, Copy, Default)]
pub struct Empty<D> {
    _marker: std::marker::PhantomData<fn() -> D>,
}

impl<D> Empty<D> {
    /// Create a new empty body.
    pub fn new() -> Self {
        Empty {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<D: Buf + Send + 'static> Body for Empty<D> {
    type Data = D;
    type Error = std::convert::Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(None)
    }

    fn is_end_stream(&self) -> bool {
        true
    }

    fn size_hint(&self) -> hyper::body::SizeHint {
        hyper::body::SizeHint::with_exact(0)
    }
}

/// Extension trait for Body types.
pub trait BodyExt: Body {
    /// Limit the body to a maximum number of bytes.
    /// Returns LimitExceeded error if the limit is exceeded.
    fn limited(self, limit: u64) -> Limited<Self>
    where
        Self: Sized,
    {
        Limited::new(self, limit)
    }
}

impl<T: Body> BodyExt for T {}

/// Error returned when body size limit is exceeded.
#[derive(Debug)]
pub struct LimitExceeded {
    pub limit: u64,
}

impl std::fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "body size limit exceeded: {} bytes", self.limit)
    }
}

impl std::error::Error for LimitExceeded {}

/// Body adapter that limits the number of bytes read.
pub struct Limited<B> {
    inner: B,
    remaining: u64,
    limit: u64,
}

impl<B> Limited<B> {
    /// Create a new Limited body with the given byte limit.
    pub fn new(inner: B, limit: u64) -> Self {
        Limited {
            inner,
            remaining: limit,
            limit,
        }
    }
}

impl<B: Unpin> Unpin for Limited<B> {}

impl<B> Body for Limited<B>
where
    B: Body + Unpin,
    B::Data: Buf,
{
    type Data = B::Data;
    type Error = LimitedError<B::Error>;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match Pin::new(&mut self.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    let len = data.remaining() as u64;
                    if len > self.remaining {
                        return Poll::Ready(Some(Err(LimitedError::LimitExceeded(
                            LimitExceeded { limit: self.limit },
                        ))));
                    }
                    self.remaining -= len;
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(LimitedError::Inner(e)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }
}

/// Error type for Limited body - either limit exceeded or inner body error.
#[derive(Debug)]
pub enum LimitedError<E> {
    LimitExceeded(LimitExceeded),
    Inner(E),
}

impl<E: std::fmt::Display> std::fmt::Display for LimitedError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitedError::LimitExceeded(e) => write!(f, "{}", e),
            LimitedError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for LimitedError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LimitedError::LimitExceeded(e) => Some(e),
            LimitedError::Inner(e) => Some(e),
        }
    }
}

/// Read a whole body into memory, failing once more than `limit` bytes arrive.
/// Trailers are ignored.
pub async fn collect_limited<B>(body: B, limit: u64) -> Result<Bytes, LimitedError<B::Error>>
where
    B: Body + Unpin,
    B::Data: Buf,
{
    let mut body = body.limited(limit);
    let mut collected = BytesMut::new();

    while let Some(frame) = std::future::poll_fn(|cx| Pin::new(&mut body).poll_frame(cx)).await {
        if let Ok(data) = frame?.into_data() {
            collected.put(data);
        }
    }

    Ok(collected.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::convert::Infallible;

    /// Body yielding a fixed list of chunks
    struct Chunks(VecDeque<Bytes>);

    impl Chunks {
        fn new(chunks: &[&'static str]) -> Self {
            Chunks(chunks.iter().map(|c| Bytes::from_static(c.as_bytes())).collect())
        }
    }

    impl Body for Chunks {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
            Poll::Ready(self.0.pop_front().map(|chunk| Ok(Frame::data(chunk))))
        }
    }

    #[test]
    fn test_empty_is_end_stream() {
        let body: Empty<Bytes> = Empty::new();
        assert!(body.is_end_stream());
    }

    #[test]
    fn test_empty_size_hint() {
        let body: Empty<Bytes> = Empty::new();
        let hint = body.size_hint();
        assert_eq!(hint.lower(), 0);
        assert_eq!(hint.upper(), Some(0));
    }

    #[tokio::test]
    async fn test_collect_empty() {
        let collected = collect_limited(Empty::<Bytes>::new(), 10).await.unwrap();
        assert!(collected.is_empty());
    }

    #[tokio::test]
    async fn test_collect_joins_chunks() {
        let body = Chunks::new(&["<html>", "<body>", "</body></html>"]);
        let collected = collect_limited(body, 1024).await.unwrap();
        assert_eq!(&collected[..], b"<html><body></body></html>");
    }

    #[tokio::test]
    async fn test_collect_exactly_at_limit() {
        let body = Chunks::new(&["hello", "world"]);
        let collected = collect_limited(body, 10).await.unwrap();
        assert_eq!(collected.len(), 10);
    }

    #[tokio::test]
    async fn test_collect_over_limit() {
        let body = Chunks::new(&["hello", "world!"]);
        let result = collect_limited(body, 10).await;
        match result {
            Err(LimitedError::LimitExceeded(e)) => assert_eq!(e.limit, 10),
            other => panic!("expected limit error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_limit_exceeded_display() {
        let err: LimitedError<Infallible> = LimitedError::LimitExceeded(LimitExceeded { limit: 5 });
        assert_eq!(err.to_string(), "body size limit exceeded: 5 bytes");
    }
}
