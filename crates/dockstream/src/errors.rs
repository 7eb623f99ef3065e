//! Error types.
//!
//! Streamed responses fail in one of two fatal ways: the transport breaks
//! mid-read (`TransportCorrupted`) or the framing layer cannot decode what it
//! buffered (`ChunkedStreaming`). Exhaustion of a stream is not an error; it
//! is reported as `Ok(None)` by the iteration methods. Teardown failures are
//! composed into [`TeardownFailure`] so that no release failure is ever
//! dropped.

use std::fmt;

use thiserror::Error;

/// Result type alias for all fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error used as a cause inside stream-level errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport failed mid-read. Originates below the framing layer and
    /// propagates through it unchanged.
    #[error("transport payload corrupted")]
    TransportCorrupted(#[source] BoxError),

    /// The final tail of a stream could not be decoded, or a complete frame
    /// failed to parse mid-stream. Always carries the decode failure.
    #[error("invalid chunked stream")]
    ChunkedStreaming(#[source] BoxError),

    /// Request issuance or a non-streamed response failed.
    #[error("request failed")]
    Request(#[source] reqwest::Error),

    /// JSON (de)serialization failed outside the streaming pipeline.
    #[error("JSON conversion failed")]
    Json(#[source] serde_json::Error),

    /// A URL could not be parsed or formatted.
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// Client configuration is invalid or unsupported.
    #[error("configuration error: {0}")]
    Config(String),

    /// The streamed response was closed, or its resolution already failed.
    #[error("streamed response is closed")]
    Closed,

    /// One or more releases failed while unwinding an exit stack.
    #[error(transparent)]
    Teardown(#[from] TeardownFailure),
}

impl Error {
    /// Wrap a mid-read transport failure.
    pub fn corrupted(source: impl Into<BoxError>) -> Self {
        Error::TransportCorrupted(source.into())
    }

    /// Wrap a frame or tail decode failure.
    pub fn chunked(source: impl Into<BoxError>) -> Self {
        Error::ChunkedStreaming(source.into())
    }
}

/// Composed failure from unwinding an exit stack.
///
/// [`primary`](Self::primary) is the most recent release failure; superseded
/// failures, including the error that was in flight when unwinding started,
/// follow in most-recent-first order. Every registered release was attempted
/// before this was surfaced.
#[derive(Debug)]
pub struct TeardownFailure {
    primary: Box<Error>,
    causes: Vec<Error>,
}

impl TeardownFailure {
    pub(crate) fn new(primary: Error, mut superseded: Vec<Error>) -> Self {
        superseded.reverse();
        Self {
            primary: Box::new(primary),
            causes: superseded,
        }
    }

    /// The most recent release failure.
    pub fn primary(&self) -> &Error {
        &self.primary
    }

    /// Superseded failures, most recent first.
    pub fn causes(&self) -> &[Error] {
        &self.causes
    }
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource teardown failed: {}", self.primary)?;
        for cause in &self.causes {
            write!(f, "; caused by: {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TeardownFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.causes
            .first()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
            .or_else(|| std::error::Error::source(self.primary.as_ref()))
    }
}
