//! Chunk acquisition and text decoding.
//!
//! The first two stages of the streaming pipeline: pulling reassembled byte
//! chunks from a transport, and decoding them to text with the charset the
//! response declared.

use bytes::{Bytes, BytesMut};
use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};

use crate::errors::Result;
use crate::transport::ChunkTransport;

/// Pulls byte chunks from a transport.
///
/// End of stream is idempotent: once the transport reports EOF the handle is
/// closed exactly once and every further call returns `Ok(None)`. Transport
/// reads marked incomplete are reassembled into one chunk before being
/// yielded.
pub struct ChunkedByteStream {
    transport: Box<dyn ChunkTransport>,
    closed: bool,
}

impl ChunkedByteStream {
    pub fn new(transport: Box<dyn ChunkTransport>) -> Self {
        Self {
            transport,
            closed: false,
        }
    }

    /// The charset declared by the transport, if any.
    pub fn charset(&self) -> Option<&str> {
        self.transport.charset()
    }

    /// Next byte chunk, or `Ok(None)` at end of stream.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.transport.at_eof() {
            self.close_transport().await?;
            return Ok(None);
        }
        let mut buffer = BytesMut::new();
        loop {
            let read = self.transport.read_chunk().await?;
            buffer.extend_from_slice(&read.data);
            if read.complete {
                break;
            }
        }
        Ok(Some(buffer.freeze()))
    }

    /// Drain unread chunks, then close the transport.
    ///
    /// Transports that recycle connections require the payload to be fully
    /// consumed before the handle is released, so the drain is not optional.
    pub async fn shutdown(&mut self) -> Result<()> {
        let drained = loop {
            match self.next_chunk().await {
                Ok(Some(_)) => continue,
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            }
        };
        if let Err(close_err) = self.close_transport().await {
            match drained {
                Ok(()) => return Err(close_err),
                Err(_) => {
                    tracing::warn!(error = %close_err, "transport close failed after drain error");
                }
            }
        }
        drained
    }

    async fn close_transport(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transport.close().await
    }
}

/// Lossy incremental text decoder bound to one charset.
///
/// Malformed byte sequences decode to U+FFFD instead of failing; a stream
/// must never die from encoding noise alone.
pub struct TextDecoder {
    decoder: Decoder,
}

impl TextDecoder {
    /// Resolve a decoder from a declared charset label, defaulting to UTF-8
    /// when the label is missing, empty, or unknown.
    pub fn from_label(label: Option<&str>) -> Self {
        let encoding = label
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);
        Self {
            decoder: encoding.new_decoder(),
        }
    }

    /// Decode one chunk. Multi-byte sequences may end mid-chunk; the decoder
    /// carries that state over to the next call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.run(bytes, false)
    }

    /// Flush decoder state at end of stream. A dangling partial sequence
    /// decodes to U+FFFD.
    pub fn finish(&mut self) -> String {
        self.run(&[], true)
    }

    fn run(&mut self, bytes: &[u8], last: bool) -> String {
        let mut output = String::with_capacity(
            self.decoder
                .max_utf8_buffer_length(bytes.len())
                .unwrap_or(bytes.len() + 16),
        );
        let mut consumed = 0;
        loop {
            let (result, read, _) =
                self.decoder
                    .decode_to_string(&bytes[consumed..], &mut output, last);
            consumed += read;
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => output.reserve(
                    self.decoder
                        .max_utf8_buffer_length(bytes.len() - consumed)
                        .unwrap_or(64),
                ),
            }
        }
        output
    }
}

/// Decodes the byte stream to text chunks.
///
/// The charset is resolved once, when the stream is constructed.
pub struct ChunkedTextStream {
    inner: ChunkedByteStream,
    decoder: TextDecoder,
    flushed: bool,
}

impl ChunkedTextStream {
    pub fn new(inner: ChunkedByteStream) -> Self {
        let decoder = TextDecoder::from_label(inner.charset());
        Self {
            inner,
            decoder,
            flushed: false,
        }
    }

    /// Next decoded text chunk, or `Ok(None)` at end of stream.
    pub async fn next_chunk(&mut self) -> Result<Option<String>> {
        match self.inner.next_chunk().await? {
            Some(bytes) => Ok(Some(self.decoder.decode(&bytes))),
            None => {
                if !self.flushed {
                    self.flushed = true;
                    let tail = self.decoder.finish();
                    if !tail.is_empty() {
                        return Ok(Some(tail));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Drain unread data and release the transport.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::errors::Error;
    use crate::streaming::testing::{corrupted_read, ScriptedTransport};
    use crate::transport::ChunkRead;

    fn byte_stream(transport: ScriptedTransport) -> ChunkedByteStream {
        ChunkedByteStream::new(Box::new(transport))
    }

    #[tokio::test]
    async fn test_chunks_yielded_in_arrival_order() {
        let (transport, _closed) = ScriptedTransport::from_chunks(&[b"abc", b"def"]);
        let mut stream = byte_stream(transport);
        assert_eq!(
            stream.next_chunk().await.unwrap(),
            Some(Bytes::from_static(b"abc"))
        );
        assert_eq!(
            stream.next_chunk().await.unwrap(),
            Some(Bytes::from_static(b"def"))
        );
        assert_eq!(stream.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_eof_idempotent_and_closes_once() {
        let (transport, closed) = ScriptedTransport::from_chunks(&[b"x"]);
        let mut stream = byte_stream(transport);
        assert!(stream.next_chunk().await.unwrap().is_some());
        assert_eq!(stream.next_chunk().await.unwrap(), None);
        assert_eq!(stream.next_chunk().await.unwrap(), None);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_incomplete_reads_reassembled() {
        let (transport, _closed) = ScriptedTransport::new(vec![
            Ok(ChunkRead {
                data: Bytes::from_static(b"hel"),
                complete: false,
            }),
            Ok(ChunkRead::complete(Bytes::from_static(b"lo"))),
        ]);
        let mut stream = byte_stream(transport);
        assert_eq!(
            stream.next_chunk().await.unwrap(),
            Some(Bytes::from_static(b"hello"))
        );
    }

    #[tokio::test]
    async fn test_mid_read_failure_surfaces_as_corruption() {
        let (transport, _closed) = ScriptedTransport::new(vec![corrupted_read()]);
        let mut stream = byte_stream(transport);
        let err = stream.next_chunk().await.unwrap_err();
        assert!(matches!(err, Error::TransportCorrupted(_)));
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_closes() {
        let (transport, closed) = ScriptedTransport::from_chunks(&[b"a", b"b", b"c"]);
        let mut stream = byte_stream(transport);
        assert!(stream.next_chunk().await.unwrap().is_some());
        stream.shutdown().await.unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(stream.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lossy_decode_replaces_malformed_bytes() {
        let (transport, _closed) = ScriptedTransport::from_chunks(&[&[0xff, b'a']]);
        let mut stream = ChunkedTextStream::new(byte_stream(transport));
        assert_eq!(stream.next_chunk().await.unwrap(), Some("\u{FFFD}a".into()));
    }

    #[tokio::test]
    async fn test_multibyte_sequence_split_across_chunks() {
        // "é" split across two transport chunks
        let (transport, _closed) = ScriptedTransport::from_chunks(&[&[0xc3], &[0xa9]]);
        let mut stream = ChunkedTextStream::new(byte_stream(transport));
        let mut decoded = String::new();
        while let Some(text) = stream.next_chunk().await.unwrap() {
            decoded.push_str(&text);
        }
        assert_eq!(decoded, "é");
    }

    #[tokio::test]
    async fn test_dangling_sequence_flushed_at_eof() {
        let (transport, _closed) = ScriptedTransport::from_chunks(&[&[0xc3]]);
        let mut stream = ChunkedTextStream::new(byte_stream(transport));
        let mut decoded = String::new();
        while let Some(text) = stream.next_chunk().await.unwrap() {
            decoded.push_str(&text);
        }
        assert_eq!(decoded, "\u{FFFD}");
    }

    #[tokio::test]
    async fn test_declared_charset_used_for_decoding() {
        let (transport, _closed) = ScriptedTransport::from_chunks(&[&[0xe9]]);
        let transport = transport.with_charset("iso-8859-1");
        let mut stream = ChunkedTextStream::new(ChunkedByteStream::new(Box::new(transport)));
        assert_eq!(stream.next_chunk().await.unwrap(), Some("é".into()));
    }

    #[test]
    fn test_unknown_or_empty_charset_defaults_to_utf8() {
        let mut decoder = TextDecoder::from_label(Some("no-such-charset"));
        assert_eq!(decoder.decode("ok".as_bytes()), "ok");
        let mut decoder = TextDecoder::from_label(Some(""));
        assert_eq!(decoder.decode("ok".as_bytes()), "ok");
        let mut decoder = TextDecoder::from_label(None);
        assert_eq!(decoder.decode("ok".as_bytes()), "ok");
    }
}
