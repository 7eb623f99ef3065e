//! Scripted in-memory transport for pipeline tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::{Error, Result};
use crate::transport::{ChunkRead, ChunkTransport};

/// Replays a fixed script of transport reads and counts closes.
pub(crate) struct ScriptedTransport {
    steps: VecDeque<Result<ChunkRead>>,
    charset: Option<String>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: Vec<Result<ChunkRead>>) -> (Self, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicUsize::new(0));
        let transport = Self {
            steps: steps.into(),
            charset: None,
            closed: Arc::clone(&closed),
        };
        (transport, closed)
    }

    pub(crate) fn from_chunks(chunks: &[&[u8]]) -> (Self, Arc<AtomicUsize>) {
        let steps = chunks
            .iter()
            .map(|chunk| Ok(ChunkRead::complete(Bytes::copy_from_slice(chunk))))
            .collect();
        Self::new(steps)
    }

    pub(crate) fn with_charset(mut self, charset: &str) -> Self {
        self.charset = Some(charset.to_string());
        self
    }
}

/// A read that fails the way a reset connection would.
pub(crate) fn corrupted_read() -> Result<ChunkRead> {
    Err(Error::corrupted("scripted mid-read failure"))
}

#[async_trait]
impl ChunkTransport for ScriptedTransport {
    fn at_eof(&self) -> bool {
        self.steps.is_empty()
    }

    async fn read_chunk(&mut self) -> Result<ChunkRead> {
        match self.steps.pop_front() {
            Some(step) => step,
            None => Ok(ChunkRead::complete(Bytes::new())),
        }
    }

    fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
