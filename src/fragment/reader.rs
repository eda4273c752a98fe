//! FragmentReader: presents an ordered list of fragment streams as one byte stream.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep};

/// One opened fragment. Closing releases whatever the backend holds for it
/// (an HTTP body, an object download, a file).
#[async_trait]
pub trait FragmentStream: AsyncRead + Send + Unpin {
    async fn close(&mut self) -> io::Result<()>;
}

/// Adapts any `AsyncRead` into a `FragmentStream`; closing drops the reader.
pub struct ReaderFragment {
    locator: String,
    inner: Option<Pin<Box<dyn AsyncRead + Send>>>,
}

impl ReaderFragment {
    pub fn new(locator: impl Into<String>, reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            locator: locator.into(),
            inner: Some(Box::pin(reader)),
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }
}

impl AsyncRead for ReaderFragment {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match this.inner.as_mut() {
            Some(inner) => inner.as_mut().poll_read(cx, buf),
            None => Poll::Ready(Err(io::Error::other(format!(
                "fragment {} is closed",
                this.locator
            )))),
        }
    }
}

#[async_trait]
impl FragmentStream for ReaderFragment {
    async fn close(&mut self) -> io::Result<()> {
        self.inner.take();
        Ok(())
    }
}

/// Bounds how long a fragment may sit without delivering data. A read that stays
/// pending for longer than `idle` fails with `ErrorKind::TimedOut`; the clock
/// restarts whenever the inner stream makes progress.
pub struct IdleDeadline {
    inner: Box<dyn FragmentStream>,
    locator: String,
    idle: Duration,
    deadline: Pin<Box<Sleep>>,
    waiting: bool,
}

impl IdleDeadline {
    pub fn new(inner: Box<dyn FragmentStream>, locator: impl Into<String>, idle: Duration) -> Self {
        Self {
            inner,
            locator: locator.into(),
            idle,
            deadline: Box::pin(tokio::time::sleep(idle)),
            waiting: false,
        }
    }
}

impl AsyncRead for IdleDeadline {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Poll::Ready(res) = Pin::new(&mut this.inner).poll_read(cx, buf) {
            this.waiting = false;
            return Poll::Ready(res);
        }

        // time spent between reads is the consumer's, only a pending read counts
        if !this.waiting {
            this.waiting = true;
            this.deadline.as_mut().reset(Instant::now() + this.idle);
        }
        ready!(this.deadline.as_mut().poll(cx));
        this.waiting = false;
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("fragment {} sent nothing for {:?}", this.locator, this.idle),
        )))
    }
}

#[async_trait]
impl FragmentStream for IdleDeadline {
    async fn close(&mut self) -> io::Result<()> {
        self.inner.close().await
    }
}

/// Reads its sources one after the other: the first until EOF, then the next.
/// All sources are opened before the reader is built, but none is read ahead.
pub struct FragmentReader {
    sources: Vec<Box<dyn FragmentStream>>,
    current: usize,
    closed: bool,
}

impl FragmentReader {
    pub fn new(sources: Vec<Box<dyn FragmentStream>>) -> Self {
        Self {
            sources,
            current: 0,
            closed: false,
        }
    }

    /// A reader over no fragments; the first read returns EOF.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Closes every source exactly once. A failing source does not stop the others
    /// from being closed; all failures are reported together.
    pub async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let total = self.sources.len();
        let mut failures = Vec::new();
        for (idx, source) in self.sources.iter_mut().enumerate() {
            if let Err(e) = source.close().await {
                tracing::warn!("failed to close fragment #{}: {e}", idx + 1);
                failures.push(format!("#{}: {e}", idx + 1));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "failed to close {} of {total} fragment streams ({})",
                failures.len(),
                failures.join(", ")
            )))
        }
    }
}

impl AsyncRead for FragmentReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.closed {
            return Poll::Ready(Err(io::Error::other("fragment reader is closed")));
        }
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        while this.current < this.sources.len() {
            let before = buf.filled().len();
            ready!(Pin::new(&mut this.sources[this.current]).poll_read(cx, buf))?;
            if buf.filled().len() > before {
                return Poll::Ready(Ok(()));
            }
            // current source is exhausted
            this.current += 1;
        }
        Poll::Ready(Ok(()))
    }
}
