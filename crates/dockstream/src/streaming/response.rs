//! Lazily-resolved streamed responses.

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, OnceCell};

use crate::errors::{Error, Result};
use crate::exitstack::ScopedResource;
use crate::streaming::chunked::{ChunkedByteStream, ChunkedTextStream};
use crate::streaming::framing::{FramedStream, JsonSplitter, Splitter};
use crate::transport::ChunkTransport;

/// Future resolving to the transport backing a streamed response.
pub type PendingTransport = BoxFuture<'static, Result<Box<dyn ChunkTransport>>>;

/// A response to a method that streams blocks of data.
///
/// Construction is non-blocking: the wrapped response has not resolved yet.
/// The first use resolves it, exactly once, no matter how many tasks race to
/// get there.
///
/// The sequence is forward-only and single-pass. Sharing one instance across
/// consumers hands each consumer a disjoint subset of the items; callers who
/// need fan-out must multiplex themselves. A response that is neither
/// consumed to exhaustion nor closed leaves its transport open.
pub struct StreamableResponse<S: Splitter = JsonSplitter> {
    pending: Mutex<Option<PendingTransport>>,
    splitter: Mutex<Option<S>>,
    resolved: OnceCell<()>,
    stream: Mutex<Option<FramedStream<S>>>,
}

impl StreamableResponse<JsonSplitter> {
    /// Wrap a pending transport with the default self-delimiting JSON
    /// framing.
    pub fn new(pending: PendingTransport) -> Self {
        Self::with_splitter(pending, JsonSplitter)
    }
}

impl<S: Splitter> StreamableResponse<S> {
    pub fn with_splitter(pending: PendingTransport, splitter: S) -> Self {
        Self {
            pending: Mutex::new(Some(pending)),
            splitter: Mutex::new(Some(splitter)),
            resolved: OnceCell::new(),
            stream: Mutex::new(None),
        }
    }

    /// Wait for the response to resolve and bind the decode pipeline to it.
    ///
    /// Idempotent and safe against concurrent first calls: however many
    /// tasks call `ready()` before resolution, the pending response is
    /// awaited exactly once and all callers observe the same ready state.
    /// The response status and headers are not inspected here.
    pub async fn ready(&self) -> Result<()> {
        self.resolved
            .get_or_try_init(|| async {
                let pending = self.pending.lock().await.take().ok_or(Error::Closed)?;
                let transport = pending.await?;
                tracing::debug!(charset = ?transport.charset(), "streamed response resolved");
                let splitter = self.splitter.lock().await.take().ok_or(Error::Closed)?;
                let text = ChunkedTextStream::new(ChunkedByteStream::new(transport));
                *self.stream.lock().await = Some(FramedStream::new(text, splitter));
                Ok(())
            })
            .await
            .map(|_: &()| ())
    }

    /// Advance the stream by one decoded object.
    ///
    /// `Ok(None)` once the stream is exhausted, and after [`close`](Self::close).
    pub async fn next_item(&self) -> Result<Option<S::Item>> {
        self.ready().await?;
        let mut stream = self.stream.lock().await;
        match stream.as_mut() {
            Some(stream) => stream.next_frame().await,
            None => Ok(None),
        }
    }

    /// Collect up to `n` decoded objects, or all remaining when `n` is
    /// `None`.
    ///
    /// A shorter list than requested means the stream ended first. With
    /// `n = None` this does not return while the stream is unbounded; that
    /// is the caller's responsibility.
    pub async fn as_list(&self, n: Option<usize>) -> Result<Vec<S::Item>> {
        let mut items = Vec::new();
        loop {
            if n.is_some_and(|limit| items.len() >= limit) {
                return Ok(items);
            }
            match self.next_item().await? {
                Some(item) => items.push(item),
                None => return Ok(items),
            }
        }
    }

    /// Consume the remainder of the stream, releasing the transport on every
    /// exit path.
    pub async fn complete(&self) -> Result<()> {
        self.ready().await?;
        let consumed = async {
            while self.next_item().await?.is_some() {}
            Ok(())
        }
        .await;
        let closed = self.close().await;
        match consumed {
            Ok(()) => closed,
            Err(err) => {
                if let Err(close_err) = closed {
                    tracing::warn!(error = %close_err, "close failed after stream error");
                }
                Err(err)
            }
        }
    }

    /// Drain unread chunks and release the transport.
    ///
    /// Idempotent. Closing an unresolved response drops the pending request
    /// instead; iterating after close yields `Ok(None)` only when the
    /// response had resolved, and [`Error::Closed`] otherwise.
    pub async fn close(&self) -> Result<()> {
        *self.pending.lock().await = None;
        let mut slot = self.stream.lock().await;
        match slot.take() {
            Some(mut stream) => stream.shutdown().await,
            None => Ok(()),
        }
    }

    /// Adapt into a [`futures::Stream`] of decoded objects.
    pub fn into_stream(self) -> impl futures::Stream<Item = Result<S::Item>>
    where
        S: 'static,
    {
        async_stream::try_stream! {
            while let Some(item) = self.next_item().await? {
                yield item;
            }
        }
    }
}

#[async_trait]
impl<S: Splitter> ScopedResource for StreamableResponse<S> {
    async fn enter(&mut self) -> Result<()> {
        self.ready().await
    }

    async fn exit(&mut self, _error: Option<&Error>) -> Result<bool> {
        self.close().await.map(|_| false)
    }
}
