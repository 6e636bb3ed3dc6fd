//! TokioIo adapter from tokio IO traits to hyper IO traits.
//!
//! This replaces hyper_util::rt::TokioIo with a minimal implementation for
//! the one direction the upstream client needs: tokio AsyncRead/AsyncWrite
//! (TcpStream, TLS streams) -> hyper Read/Write.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use hyper::rt::{Read, ReadBufCursor, Write};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Wraps a tokio stream so hyper's client connection can drive it.
#[derive(Debug)]
pub struct TokioIo<T> {
    inner: T,
}

impl<T> TokioIo<T> {
    pub fn new(inner: T) -> Self {
        TokioIo { inner }
    }
}

impl<T: AsyncRead + Unpin> Read for TokioIo<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        mut buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        // SAFETY: tokio's ReadBuf only reports bytes it initialized as filled,
        // and only those are advanced over.
        let unfilled = unsafe { buf.as_mut() };
        let mut read_buf = ReadBuf::uninit(unfilled);

        match Pin::new(&mut self.inner).poll_read(cx, &mut read_buf) {
            Poll::Ready(Ok(())) => {
                let filled = read_buf.filled().len();
                // SAFETY: We just filled these bytes via poll_read
                unsafe {
                    buf.advance(filled);
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T: AsyncWrite + Unpin> Write for TokioIo<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_tokio_io_read_write_roundtrip() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut io = TokioIo::new(client);

        let written =
            std::future::poll_fn(|cx| Write::poll_write(Pin::new(&mut io), cx, b"GET / HTTP/1.1"))
                .await
                .unwrap();
        assert_eq!(written, 14);

        let mut received = [0u8; 14];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"GET / HTTP/1.1");

        server.write_all(b"HTTP/1.1 200 OK").await.unwrap();
        let mut raw = [std::mem::MaybeUninit::<u8>::uninit(); 32];
        let mut buf = hyper::rt::ReadBuf::uninit(&mut raw);
        std::future::poll_fn(|cx| Read::poll_read(Pin::new(&mut io), cx, buf.unfilled()))
            .await
            .unwrap();
        assert_eq!(buf.filled(), b"HTTP/1.1 200 OK");
    }
}
