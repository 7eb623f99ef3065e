//! HTTP chunk transport over reqwest.

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::{Error, Result};
use crate::transport::{ChunkRead, ChunkTransport};

/// Adapts a [`reqwest::Response`] body to the [`ChunkTransport`] contract.
///
/// reqwest hands back whole chunks, so every read is complete. End of stream
/// is observed when the body runs out; a body error mid-read surfaces as
/// [`Error::TransportCorrupted`].
pub struct HttpChunkTransport {
    response: Option<reqwest::Response>,
    charset: Option<String>,
    eof: bool,
}

impl HttpChunkTransport {
    pub fn new(response: reqwest::Response) -> Self {
        let charset = content_type_charset(response.headers());
        Self {
            response: Some(response),
            charset,
            eof: false,
        }
    }
}

#[async_trait]
impl ChunkTransport for HttpChunkTransport {
    fn at_eof(&self) -> bool {
        self.eof || self.response.is_none()
    }

    async fn read_chunk(&mut self) -> Result<ChunkRead> {
        let Some(response) = self.response.as_mut() else {
            return Ok(ChunkRead::complete(Bytes::new()));
        };
        match response.chunk().await {
            Ok(Some(data)) => Ok(ChunkRead::complete(data)),
            Ok(None) => {
                self.eof = true;
                Ok(ChunkRead::complete(Bytes::new()))
            }
            Err(err) => {
                self.eof = true;
                Err(Error::corrupted(err))
            }
        }
    }

    fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the response releases the connection back to the pool.
        if let Some(response) = self.response.take() {
            tracing::debug!(url = %response.url(), "closing streamed response");
            drop(response);
        }
        self.eof = true;
        Ok(())
    }
}

/// Charset declared by a `Content-Type` header, if any.
fn content_type_charset(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let value = headers
        .get(reqwest::header::CONTENT_TYPE)?
        .to_str()
        .ok()?;
    value.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}
