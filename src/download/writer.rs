//! Writer adapter that reports progress as bytes are accepted.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;

use super::DownloadRegistry;

/// Wraps an async writer and credits every accepted byte to an item
pub struct ProgressWriter<W> {
    inner: W,
    registry: Arc<DownloadRegistry>,
    item_id: String,
    written: u64,
}

impl<W: AsyncWrite + Unpin> ProgressWriter<W> {
    pub fn new(inner: W, registry: Arc<DownloadRegistry>, item_id: &str) -> Self {
        Self {
            inner,
            registry,
            item_id: item_id.to_string(),
            written: 0,
        }
    }

    /// Bytes accepted so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for ProgressWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = poll {
            this.written += n as u64;
            this.registry.add_received(&this.item_id, n as u64);
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_counts_written_bytes() {
        let registry = Arc::new(DownloadRegistry::new());
        registry.start("a", "mem");
        registry.set_total("a", 10);

        let mut writer = ProgressWriter::new(Vec::new(), Arc::clone(&registry), "a");
        writer.write_all(b"hello").await.unwrap();
        writer.write_all(b"world").await.unwrap();
        writer.flush().await.unwrap();

        assert_eq!(writer.written(), 10);
        assert_eq!(writer.into_inner(), b"helloworld".to_vec());
        let snap = registry.snapshot("a").unwrap();
        assert_eq!(snap.bytes_received, 10);
        assert!((snap.percent - 100.0).abs() < f64::EPSILON);
    }
}
