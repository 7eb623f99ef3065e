//! Shared test fixtures.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dockstream::{ChunkRead, ChunkTransport, PendingTransport, Result};
use futures::FutureExt;

/// Transport replaying a fixed list of chunks, tracking close calls.
pub struct ChunkScript {
    chunks: VecDeque<Bytes>,
    charset: Option<String>,
    closed: Arc<AtomicUsize>,
}

impl ChunkScript {
    pub fn new(chunks: &[&[u8]]) -> (Self, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicUsize::new(0));
        let transport = Self {
            chunks: chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect(),
            charset: None,
            closed: Arc::clone(&closed),
        };
        (transport, closed)
    }

    #[allow(dead_code)]
    pub fn with_charset(mut self, charset: &str) -> Self {
        self.charset = Some(charset.to_string());
        self
    }
}

#[async_trait]
impl ChunkTransport for ChunkScript {
    fn at_eof(&self) -> bool {
        self.chunks.is_empty()
    }

    async fn read_chunk(&mut self) -> Result<ChunkRead> {
        let data = self.chunks.pop_front().unwrap_or_default();
        Ok(ChunkRead::complete(data))
    }

    fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Box a scripted transport into a resolved-on-first-use pending future.
#[allow(dead_code)]
pub fn pending(chunks: &[&[u8]]) -> (PendingTransport, Arc<AtomicUsize>) {
    let (transport, closed) = ChunkScript::new(chunks);
    let future = async move { Ok(Box::new(transport) as Box<dyn ChunkTransport>) }.boxed();
    (future, closed)
}
