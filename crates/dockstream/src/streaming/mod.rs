//! Streamed response decoding.
//!
//! Turns an open-ended, incrementally-arriving byte stream into a lazy
//! sequence of decoded JSON objects:
//! - [`chunked`] pulls byte chunks from a transport and decodes them to text
//! - [`framing`] extracts complete frames from an accumulating buffer
//! - [`response`] wraps a not-yet-resolved response in the public lazy
//!   sequence type

pub mod chunked;
pub mod framing;
pub mod response;

pub use chunked::{ChunkedByteStream, ChunkedTextStream, TextDecoder};
pub use framing::{FramedStream, JsonLineSplitter, JsonSplitter, LineSplitter, Splitter};
pub use response::{PendingTransport, StreamableResponse};

#[cfg(test)]
pub(crate) mod testing;
