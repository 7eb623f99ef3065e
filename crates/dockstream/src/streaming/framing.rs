//! Frame extraction from an accumulating text buffer.
//!
//! A [`Splitter`] defines what one complete frame is; [`FramedStream`] owns
//! the buffer, feeds it from decoded text chunks, and splits frames off the
//! front until the transport runs dry. Whatever is left in the buffer at end
//! of stream is decoded once as the tail.

use serde_json::Value;

use crate::errors::{Error, Result};
use crate::streaming::chunked::ChunkedTextStream;

/// Splits complete frames off the front of an accumulating text buffer.
///
/// [`split`](Self::split) is called in a loop after every appended chunk,
/// since one chunk may carry zero, one, or many complete frames; `Ok(None)`
/// means no complete frame yet. [`decode_tail`](Self::decode_tail) runs at
/// most once, at end of stream, against whatever undelimited text remains.
pub trait Splitter: Send {
    type Item: Send;

    /// Extract one frame and return it with the unconsumed remainder.
    fn split(&mut self, buffer: &str) -> Result<Option<(Self::Item, String)>>;

    /// Decode the final tail. `Ok(None)` when the remainder holds nothing
    /// decodable (for example only whitespace).
    fn decode_tail(&mut self, buffer: &str) -> Result<Option<Self::Item>>;
}

/// Delimiter framing: a frame is everything before a fixed marker.
pub struct LineSplitter {
    marker: String,
}

impl LineSplitter {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new("\r\n")
    }
}

impl Splitter for LineSplitter {
    type Item = String;

    fn split(&mut self, buffer: &str) -> Result<Option<(String, String)>> {
        let Some(index) = buffer.find(&self.marker) else {
            return Ok(None);
        };
        let frame = buffer.get(..index).unwrap_or_default().to_string();
        let rest = buffer
            .get(index + self.marker.len()..)
            .unwrap_or_default()
            .to_string();
        Ok(Some((frame, rest)))
    }

    fn decode_tail(&mut self, buffer: &str) -> Result<Option<String>> {
        if buffer.is_empty() {
            return Ok(None);
        }
        Ok(Some(buffer.to_string()))
    }
}

/// Self-delimiting framing: a frame is the longest prefix parseable as one
/// complete JSON document.
///
/// The streaming parser distinguishes an incomplete document (wait for more
/// input) from an invalid one (fatal), so corrupt data fails fast instead of
/// stalling until end of stream.
#[derive(Default)]
pub struct JsonSplitter;

impl Splitter for JsonSplitter {
    type Item = Value;

    fn split(&mut self, buffer: &str) -> Result<Option<(Value, String)>> {
        let trimmed = buffer.trim_start();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let mut documents = serde_json::Deserializer::from_str(trimmed).into_iter::<Value>();
        match documents.next() {
            Some(Ok(value)) => {
                let rest = trimmed
                    .get(documents.byte_offset()..)
                    .unwrap_or_default()
                    .trim_start()
                    .to_string();
                Ok(Some((value, rest)))
            }
            Some(Err(err)) if err.is_eof() => Ok(None),
            Some(Err(err)) => Err(Error::chunked(err)),
            None => Ok(None),
        }
    }

    fn decode_tail(&mut self, buffer: &str) -> Result<Option<Value>> {
        decode_json_tail(buffer)
    }
}

/// Delimiter framing whose frames are JSON documents (the engine's
/// JSON-lines format). Empty frames between consecutive markers are skipped.
pub struct JsonLineSplitter {
    lines: LineSplitter,
}

impl JsonLineSplitter {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            lines: LineSplitter::new(marker),
        }
    }
}

impl Default for JsonLineSplitter {
    fn default() -> Self {
        Self {
            lines: LineSplitter::default(),
        }
    }
}

impl Splitter for JsonLineSplitter {
    type Item = Value;

    fn split(&mut self, buffer: &str) -> Result<Option<(Value, String)>> {
        let mut cursor = buffer.to_string();
        while let Some((frame, rest)) = self.lines.split(&cursor)? {
            cursor = rest;
            let frame = frame.trim();
            if frame.is_empty() {
                continue;
            }
            let value = serde_json::from_str(frame).map_err(Error::chunked)?;
            return Ok(Some((value, cursor)));
        }
        Ok(None)
    }

    fn decode_tail(&mut self, buffer: &str) -> Result<Option<Value>> {
        decode_json_tail(buffer)
    }
}

fn decode_json_tail(buffer: &str) -> Result<Option<Value>> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(Error::chunked)
}

/// The framing pipeline: an accumulation buffer fed by decoded text chunks,
/// with complete frames split off the front.
///
/// The buffer always equals the text received so far minus the text already
/// yielded as frames. Frames come out strictly in extraction order; once the
/// tail has been decoded the stream reports exhaustion forever.
pub struct FramedStream<S: Splitter> {
    chunks: ChunkedTextStream,
    splitter: S,
    buffer: String,
    at_eof: bool,
    finished: bool,
}

impl<S: Splitter> FramedStream<S> {
    pub fn new(chunks: ChunkedTextStream, splitter: S) -> Self {
        Self {
            chunks,
            splitter,
            buffer: String::new(),
            at_eof: false,
            finished: false,
        }
    }

    /// Next decoded frame, or `Ok(None)` once the stream is exhausted.
    pub async fn next_frame(&mut self) -> Result<Option<S::Item>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            if let Some((item, rest)) = self.splitter.split(&self.buffer)? {
                self.buffer = rest;
                return Ok(Some(item));
            }
            if self.at_eof {
                self.finished = true;
                let tail = std::mem::take(&mut self.buffer);
                return self.splitter.decode_tail(&tail);
            }
            match self.chunks.next_chunk().await? {
                Some(text) => self.buffer.push_str(&text),
                None => self.at_eof = true,
            }
        }
    }

    /// Drain unread data and release the transport.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.finished = true;
        self.buffer.clear();
        self.chunks.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::streaming::chunked::ChunkedByteStream;
    use crate::streaming::testing::ScriptedTransport;

    fn pipeline<S: Splitter>(
        chunks: &[&[u8]],
        splitter: S,
    ) -> (FramedStream<S>, Arc<AtomicUsize>) {
        let (transport, closed) = ScriptedTransport::from_chunks(chunks);
        let text = ChunkedTextStream::new(ChunkedByteStream::new(Box::new(transport)));
        (FramedStream::new(text, splitter), closed)
    }

    async fn collect<S: Splitter>(stream: &mut FramedStream<S>) -> Vec<S::Item> {
        let mut items = Vec::new();
        while let Some(item) = stream.next_frame().await.unwrap() {
            items.push(item);
        }
        items
    }

    #[test]
    fn test_line_splitter_extracts_frame_and_rest() {
        let mut splitter = LineSplitter::new("\r\n");
        let (frame, rest) = splitter.split("one\r\ntwo\r\n").unwrap().unwrap();
        assert_eq!(frame, "one");
        assert_eq!(rest, "two\r\n");
        assert!(splitter.split("no marker yet").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_line_stream_clean_termination_yields_no_empty_frame() {
        // A marker-terminated stream leaves an empty buffer at EOF; that is
        // exhaustion, not a final empty frame.
        let (mut stream, _closed) = pipeline(&[b"a\r\n"], LineSplitter::default());
        assert_eq!(stream.next_frame().await.unwrap(), Some("a".to_string()));
        assert_eq!(stream.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_stream_undelimited_tail_is_yielded() {
        let (mut stream, _closed) = pipeline(&[b"a\r\nb"], LineSplitter::default());
        assert_eq!(stream.next_frame().await.unwrap(), Some("a".to_string()));
        assert_eq!(stream.next_frame().await.unwrap(), Some("b".to_string()));
        assert_eq!(stream.next_frame().await.unwrap(), None);
    }

    #[test]
    fn test_json_splitter_waits_for_complete_document() {
        let mut splitter = JsonSplitter;
        assert!(splitter.split("{\"a\": 1").unwrap().is_none());
        let (value, rest) = splitter.split("{\"a\": 1}").unwrap().unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(rest, "");
    }

    #[test]
    fn test_json_splitter_leaves_untrimmed_remainder() {
        let mut splitter = JsonSplitter;
        let (value, rest) = splitter.split("{\"a\":1}  {\"b\"").unwrap().unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(rest, "{\"b\"");
    }

    #[test]
    fn test_json_splitter_rejects_invalid_document() {
        let mut splitter = JsonSplitter;
        let err = splitter.split("}not json").unwrap_err();
        assert!(matches!(err, Error::ChunkedStreaming(_)));
    }

    #[tokio::test]
    async fn test_many_documents_in_one_chunk() {
        let (mut stream, _closed) =
            pipeline(&[b"{\"a\":1}{\"b\":2}\n{\"c\":3}"], JsonSplitter);
        let items = collect(&mut stream).await;
        assert_eq!(items, vec![json!({"a":1}), json!({"b":2}), json!({"c":3})]);
    }

    #[tokio::test]
    async fn test_document_split_across_chunks() {
        let (mut stream, _closed) = pipeline(&[b"{\"a\":", b"1}{\"b\"", b":2}"], JsonSplitter);
        let items = collect(&mut stream).await;
        assert_eq!(items, vec![json!({"a":1}), json!({"b":2})]);
    }

    #[tokio::test]
    async fn test_trailing_tail_yielded_exactly_once() {
        // No delimiter after the last document; it is still decoded, once.
        let (mut stream, _closed) = pipeline(&[b"{\"a\":1}\n", b"{\"tail\":true}"], JsonSplitter);
        let items = collect(&mut stream).await;
        assert_eq!(items, vec![json!({"a":1}), json!({"tail":true})]);
        assert!(stream.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_tail_wraps_parse_error_as_cause() {
        let (mut stream, _closed) = pipeline(&[b"{\"a\":"], JsonSplitter);
        let err = stream.next_frame().await.unwrap_err();
        assert!(matches!(err, Error::ChunkedStreaming(_)));
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn test_json_lines_with_double_newline_marker() {
        let (mut stream, _closed) = pipeline(
            &[b"{\"x\":1}", b"\n\n{\"y\":2}\n\n"],
            JsonLineSplitter::new("\n\n"),
        );
        let items = collect(&mut stream).await;
        assert_eq!(items, vec![json!({"x":1}), json!({"y":2})]);
    }

    #[tokio::test]
    async fn test_json_lines_skips_empty_frames() {
        let (mut stream, _closed) = pipeline(
            &[b"\r\n{\"a\":1}\r\n\r\n{\"b\":2}\r\n"],
            JsonLineSplitter::default(),
        );
        let items = collect(&mut stream).await;
        assert_eq!(items, vec![json!({"a":1}), json!({"b":2})]);
    }

    #[tokio::test]
    async fn test_json_lines_invalid_frame_fails() {
        let (mut stream, _closed) =
            pipeline(&[b"not json\r\n"], JsonLineSplitter::default());
        let err = stream.next_frame().await.unwrap_err();
        assert!(matches!(err, Error::ChunkedStreaming(_)));
    }

    #[tokio::test]
    async fn test_empty_stream_exhausts_cleanly() {
        let (mut stream, closed) = pipeline(&[], JsonSplitter);
        assert!(stream.next_frame().await.unwrap().is_none());
        assert!(stream.next_frame().await.unwrap().is_none());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_whitespace_only_tail_is_not_an_error() {
        let (mut stream, _closed) = pipeline(&[b"{\"a\":1}\n\n"], JsonSplitter);
        let items = collect(&mut stream).await;
        assert_eq!(items, vec![json!({"a":1})]);
    }

    #[tokio::test]
    async fn test_shutdown_drains_remaining_chunks() {
        let (mut stream, closed) = pipeline(&[b"{\"a\":1}\n", b"{\"b\":2}\n"], JsonSplitter);
        assert_eq!(stream.next_frame().await.unwrap(), Some(json!({"a":1})));
        stream.shutdown().await.unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(stream.next_frame().await.unwrap().is_none());
    }
}
