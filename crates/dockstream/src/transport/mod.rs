//! Transport boundary for streamed responses.
//!
//! The streaming pipeline knows nothing about how bytes are obtained over
//! the wire; it consumes any [`ChunkTransport`]. The reqwest-backed
//! implementation lives in [`http`].

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::Result;

pub mod http;

pub use http::HttpChunkTransport;

/// One transport-level read.
#[derive(Debug, Clone)]
pub struct ChunkRead {
    pub data: Bytes,
    /// Whether `data` completes the current chunk. Incomplete reads are
    /// reassembled by the chunk layer before framing sees them.
    pub complete: bool,
}

impl ChunkRead {
    /// A complete read carrying `data`.
    pub fn complete(data: Bytes) -> Self {
        Self {
            data,
            complete: true,
        }
    }
}

/// An abstract source of an ordered sequence of byte chunks.
///
/// Chunk sizes are transport-determined and never frame-aligned. Read
/// failures must be distinguishable from normal end-of-stream: a transport
/// failing mid-read reports [`Error::TransportCorrupted`], while exhaustion
/// is observed through [`at_eof`].
///
/// [`Error::TransportCorrupted`]: crate::errors::Error::TransportCorrupted
/// [`at_eof`]: ChunkTransport::at_eof
#[async_trait]
pub trait ChunkTransport: Send {
    /// Whether the end of the payload has been reached.
    fn at_eof(&self) -> bool;

    /// Read the next piece of the payload.
    async fn read_chunk(&mut self) -> Result<ChunkRead>;

    /// The text encoding declared for the payload, if any.
    fn charset(&self) -> Option<&str>;

    /// Release the underlying handle.
    async fn close(&mut self) -> Result<()>;
}
